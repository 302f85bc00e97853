//! Request-scoped context.
//!
//! Built by the dispatch layer for every call: resolved action name, HTTP
//! method, the authenticated principal (if any), raw path/query parameters,
//! and — after the permission gate has passed — the persistence session.

use std::collections::HashMap;

use axum::http::Method;

use opsdesk_auth::Principal;

use crate::errors::ApiError;
use crate::store::Session;

/// An authentication failure detected by the transport layer but deferred
/// until a permission check actually requires authentication. This lets
/// `AllowAny` routes serve requests carrying stale tokens.
#[derive(Debug, Clone)]
pub struct DeferredAuthError(pub ApiError);

pub struct RequestContext {
    pub action: String,
    pub method: Method,
    pub principal: Option<Principal>,
    pub auth_error: Option<ApiError>,
    pub path_params: HashMap<String, String>,
    pub query: HashMap<String, String>,
    session: Option<Session>,
}

impl RequestContext {
    pub fn new(action: impl Into<String>, method: Method) -> Self {
        Self {
            action: action.into(),
            method,
            principal: None,
            auth_error: None,
            path_params: HashMap::new(),
            query: HashMap::new(),
            session: None,
        }
    }

    pub fn with_principal(mut self, principal: Option<Principal>) -> Self {
        self.principal = principal;
        self
    }

    pub fn with_auth_error(mut self, error: Option<DeferredAuthError>) -> Self {
        self.auth_error = error.map(|e| e.0);
        self
    }

    pub fn with_path_params(mut self, params: HashMap<String, String>) -> Self {
        self.path_params = params;
        self
    }

    pub fn with_query(mut self, query: HashMap<String, String>) -> Self {
        self.query = query;
        self
    }

    /// Attach the persistence session. The dispatch layer does this after
    /// the permission gate passes, so denied requests never touch storage.
    pub fn attach_session(&mut self, session: Session) {
        self.session = Some(session);
    }

    /// The active persistence session.
    pub fn db(&mut self) -> Result<&mut Session, ApiError> {
        self.session
            .as_mut()
            .ok_or_else(|| ApiError::internal("no session attached to request context"))
    }

    /// Raw `id` path segment, when the route has one.
    pub fn raw_id(&self) -> Option<&str> {
        self.path_params.get("id").map(String::as_str)
    }

    /// Roll back and drop the session, releasing it.
    pub fn release_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.rollback();
        }
    }
}

/// Safe/idempotent methods, as used by read-only permission checks.
pub fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}
