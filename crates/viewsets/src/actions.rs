//! Custom action descriptors.
//!
//! Actions are registered on the ViewSet builder in source order; the route
//! compiler preserves that order because disambiguating overlapping paths
//! relies on first-registered-wins.

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use serde_json::Value;

use opsdesk_core::{Record, RecordId};

use crate::context::RequestContext;
use crate::errors::ApiError;
use crate::permissions::PermissionCheck;
use crate::schema::Schema;

/// What a handler sends back: a status code and a JSON body.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: StatusCode,
    pub body: Value,
}

impl Reply {
    pub fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body,
        }
    }

    pub fn created(body: Value) -> Self {
        Self {
            status: StatusCode::CREATED,
            body,
        }
    }

    pub fn no_content() -> Self {
        Self {
            status: StatusCode::NO_CONTENT,
            body: Value::Null,
        }
    }
}

/// Arguments handed to a custom action handler.
pub struct ActionCall<'a> {
    pub ctx: &'a mut RequestContext,
    /// Parsed identifier for detail actions.
    pub id: Option<RecordId>,
    /// Request body: validated against the action's schema when one is
    /// declared, the raw JSON object (or multipart field map) otherwise.
    pub body: Option<Record>,
}

pub type ActionResult = Result<Reply, ApiError>;

pub type ActionHandler = Arc<dyn Fn(&mut ActionCall<'_>) -> ActionResult + Send + Sync>;

/// Wraps an action invocation; receives the call and the wrapped handler.
pub type Interceptor =
    Arc<dyn Fn(&mut ActionCall<'_>, &ActionHandler) -> ActionResult + Send + Sync>;

/// A custom, non-CRUD operation exposed as an additional route.
#[derive(Clone)]
pub struct ActionDef {
    pub name: String,
    pub detail: bool,
    pub methods: Vec<Method>,
    pub url_path: Option<String>,
    /// Per-action permission override; replaces (never appends to) the
    /// ViewSet-level list when set.
    pub permissions: Option<Vec<Arc<dyn PermissionCheck>>>,
    /// Declared body schema; file-bearing schemas route through multipart.
    pub request_schema: Option<Arc<Schema>>,
    /// Status documented for (and defaulted onto) successful replies.
    pub success_status: StatusCode,
    pub interceptor: Option<Interceptor>,
    pub handler: ActionHandler,
}

impl ActionDef {
    pub fn new(
        name: impl Into<String>,
        handler: impl Fn(&mut ActionCall<'_>) -> ActionResult + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            detail: false,
            methods: vec![Method::GET],
            url_path: None,
            permissions: None,
            request_schema: None,
            success_status: StatusCode::OK,
            interceptor: None,
            handler: Arc::new(handler),
        }
    }

    /// Scope this action to one identified record.
    pub fn detail(mut self) -> Self {
        self.detail = true;
        self
    }

    /// Single-method shorthand; replaces the method list.
    pub fn method(mut self, method: Method) -> Self {
        self.methods = vec![method];
        self
    }

    pub fn methods(mut self, methods: Vec<Method>) -> Self {
        self.methods = methods;
        self
    }

    pub fn url_path(mut self, path: impl Into<String>) -> Self {
        self.url_path = Some(path.into());
        self
    }

    pub fn permissions(mut self, checks: Vec<Arc<dyn PermissionCheck>>) -> Self {
        self.permissions = Some(checks);
        self
    }

    pub fn request_schema(mut self, schema: Arc<Schema>) -> Self {
        self.request_schema = Some(schema);
        self
    }

    pub fn success_status(mut self, status: StatusCode) -> Self {
        self.success_status = status;
        self
    }

    pub fn intercept(
        mut self,
        interceptor: impl Fn(&mut ActionCall<'_>, &ActionHandler) -> ActionResult
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.interceptor = Some(Arc::new(interceptor));
        self
    }

    /// URL segment: explicit override, or the action name with underscores
    /// replaced by hyphens.
    pub fn url_segment(&self) -> String {
        self.url_path
            .clone()
            .unwrap_or_else(|| self.name.replace('_', "-"))
    }

    /// Invoke the handler, through the interceptor when one is attached.
    pub fn invoke(&self, call: &mut ActionCall<'_>) -> ActionResult {
        match &self.interceptor {
            Some(interceptor) => interceptor(call, &self.handler),
            None => (self.handler)(call),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Method;
    use serde_json::json;

    use super::*;

    #[test]
    fn url_segment_kebab_cases_the_name() {
        let action = ActionDef::new("initial_form_data", |_| Ok(Reply::ok(json!({}))));
        assert_eq!(action.url_segment(), "initial-form-data");

        let action =
            ActionDef::new("unblock", |_| Ok(Reply::ok(json!({})))).url_path("force-unblock");
        assert_eq!(action.url_segment(), "force-unblock");
    }

    #[test]
    fn defaults_to_collection_get() {
        let action = ActionDef::new("default", |_| Ok(Reply::ok(json!({}))));
        assert!(!action.detail);
        assert_eq!(action.methods, vec![Method::GET]);
    }

    #[test]
    fn interceptor_wraps_the_handler() {
        let action = ActionDef::new("echo", |call: &mut ActionCall<'_>| {
            Ok(Reply::ok(json!({"body": call.body.clone()})))
        })
        .intercept(|call, next| {
            let reply = next(call)?;
            Ok(Reply {
                status: reply.status,
                body: json!({"wrapped": reply.body}),
            })
        });

        let mut ctx = RequestContext::new("echo", Method::GET);
        let mut call = ActionCall {
            ctx: &mut ctx,
            id: None,
            body: None,
        };
        let reply = action.invoke(&mut call).unwrap();
        assert!(reply.body.get("wrapped").is_some());
    }
}
