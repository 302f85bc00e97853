//! Request dispatch for compiled routes.
//!
//! Per call: build the request context, run the permission gate, attach the
//! persistence session, parse the body per the route's synthesized
//! signature, execute the CRUD primitive or custom action, and render the
//! reply (or the structured error envelope). The session is released
//! unconditionally at the end of the request.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{FromRequest, FromRequestParts, Multipart, Path, Query, Request};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodFilter, MethodRouter};
use serde_json::{Map, Value, json};

use opsdesk_auth::Principal;
use opsdesk_core::{Record, RecordId};

use crate::actions::{ActionCall, Reply};
use crate::compiler::{CompiledRoute, RouteExec};
use crate::context::{DeferredAuthError, RequestContext};
use crate::crud;
use crate::errors::{ApiError, ErrorDetail};
use crate::permissions::enforce;
use crate::signature::{ParamSource, RouteSignature};
use crate::store::SessionProvider;
use crate::viewset::ViewSetDef;

const BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Build the mounted method router for one compiled route.
pub(crate) fn method_route(
    def: Arc<ViewSetDef>,
    sessions: Arc<dyn SessionProvider>,
    route: Arc<CompiledRoute>,
    filter: MethodFilter,
) -> MethodRouter {
    let handler = move |req: Request| {
        let def = Arc::clone(&def);
        let sessions = Arc::clone(&sessions);
        let route = Arc::clone(&route);
        async move {
            match run(def, sessions, route, req).await {
                Ok(reply) => reply_response(reply),
                Err(err) => err.into_response(),
            }
        }
    };
    axum::routing::on(filter, handler)
}

fn reply_response(reply: Reply) -> Response {
    if reply.status == StatusCode::NO_CONTENT {
        reply.status.into_response()
    } else {
        (reply.status, axum::Json(reply.body)).into_response()
    }
}

async fn run(
    def: Arc<ViewSetDef>,
    sessions: Arc<dyn SessionProvider>,
    route: Arc<CompiledRoute>,
    req: Request,
) -> Result<Reply, ApiError> {
    let (mut parts, body) = req.into_parts();

    let path_params =
        match Path::<HashMap<String, String>>::from_request_parts(&mut parts, &()).await {
            Ok(Path(params)) => params,
            Err(_) => HashMap::new(),
        };
    let query = match Query::<HashMap<String, String>>::from_request_parts(&mut parts, &()).await {
        Ok(Query(query)) => query,
        Err(_) => HashMap::new(),
    };
    let principal = parts.extensions.get::<Principal>().cloned();
    let deferred = parts.extensions.get::<DeferredAuthError>().cloned();

    let mut ctx = RequestContext::new(route.action.clone(), parts.method.clone())
        .with_principal(principal)
        .with_auth_error(deferred)
        .with_path_params(path_params)
        .with_query(query);

    // The gate runs before the session is acquired and before the body is
    // read: a denied request never touches storage.
    enforce(&route.checks, &ctx)?;

    ctx.attach_session(sessions.session());

    let result = match read_body(&route.signature, parts, body).await {
        Ok(body) => execute(&def, &route, &mut ctx, body),
        Err(err) => Err(err),
    };
    // Released on every path, success or failure.
    ctx.release_session();
    result
}

enum BodyData {
    None,
    Json(Value),
    Fields(Record),
}

async fn read_body(
    signature: &RouteSignature,
    parts: Parts,
    body: Body,
) -> Result<BodyData, ApiError> {
    if signature.is_multipart() {
        let req = Request::from_parts(parts, body);
        return Ok(BodyData::Fields(parse_multipart(signature, req).await?));
    }

    let bytes = axum::body::to_bytes(body, BODY_LIMIT)
        .await
        .map_err(|e| ApiError::internal(format!("failed to read request body: {e}")))?;
    if bytes.is_empty() {
        return Ok(BodyData::None);
    }
    let value: Value =
        serde_json::from_slice(&bytes).map_err(|_| ApiError::malformed_json_body())?;
    Ok(BodyData::Json(value))
}

fn missing_body() -> ApiError {
    ApiError::Validation(vec![
        ErrorDetail::new("value_error.missing")
            .msg("field required")
            .loc(vec!["body"]),
    ])
}

fn execute(
    def: &ViewSetDef,
    route: &CompiledRoute,
    ctx: &mut RequestContext,
    body: BodyData,
) -> Result<Reply, ApiError> {
    match &route.exec {
        RouteExec::List { response } => crud::list(def, ctx, response),
        RouteExec::Retrieve { response } => crud::retrieve(def, ctx, response),
        RouteExec::InitialFormData { response } => crud::initial_form_data(def, ctx, response),
        RouteExec::Delete => crud::delete(def, ctx),
        RouteExec::Create { schema, response } => match body {
            BodyData::Fields(fields) => {
                crud::create_multipart(def, ctx, response.as_deref(), fields)
            }
            BodyData::Json(value) => crud::create(def, ctx, schema, response.as_deref(), &value),
            BodyData::None => Err(missing_body()),
        },
        RouteExec::Update { schema, response } => match body {
            BodyData::Fields(fields) => {
                crud::update_multipart(def, ctx, response.as_deref(), fields)
            }
            BodyData::Json(value) => crud::update(def, ctx, schema, response.as_deref(), &value),
            BodyData::None => Err(missing_body()),
        },
        RouteExec::Action { index } => run_action(def, *index, ctx, body),
    }
}

fn run_action(
    def: &ViewSetDef,
    index: usize,
    ctx: &mut RequestContext,
    body: BodyData,
) -> Result<Reply, ApiError> {
    let action = def
        .actions
        .get(index)
        .ok_or_else(|| ApiError::internal("action index out of range"))?;

    let id = if action.detail {
        let raw = ctx
            .raw_id()
            .ok_or_else(|| ApiError::internal("detail action without id path param"))?;
        // Malformed identifiers degrade to 404, same as get_object.
        Some(RecordId::parse(raw, def.entity.id_kind).map_err(|_| ApiError::NotFound)?)
    } else {
        None
    };

    let body = match (&action.request_schema, body) {
        (Some(schema), BodyData::Json(value)) => {
            Some(schema.validate(&value, false).map_err(ApiError::Validation)?)
        }
        // Upload-aware path: the raw field map goes straight through.
        (Some(_), BodyData::Fields(fields)) => Some(fields),
        (Some(_), BodyData::None) => return Err(missing_body()),
        (None, BodyData::Json(value)) => value.as_object().cloned(),
        (None, BodyData::Fields(fields)) => Some(fields),
        (None, BodyData::None) => None,
    };

    let mut call = ActionCall { ctx, id, body };
    action.invoke(&mut call)
}

async fn parse_multipart(signature: &RouteSignature, req: Request) -> Result<Record, ApiError> {
    let invalid = || {
        ApiError::Validation(vec![
            ErrorDetail::new("value_error.multipart")
                .msg("Request body is not valid multipart form data.")
                .loc(vec!["body"]),
        ])
    };

    let mut multipart = Multipart::from_request(req, &())
        .await
        .map_err(|_| invalid())?;

    let mut texts: HashMap<String, String> = HashMap::new();
    let mut files: HashMap<String, Value> = HashMap::new();
    while let Some(field) = multipart.next_field().await.map_err(|_| invalid())? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let filename = field.file_name().map(str::to_string);
        match filename {
            Some(filename) => {
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await.map_err(|_| invalid())?;
                files.insert(
                    name,
                    json!({
                        "filename": filename,
                        "content_type": content_type,
                        "size": data.len(),
                    }),
                );
            }
            None => {
                let text = field.text().await.map_err(|_| invalid())?;
                texts.insert(name, text);
            }
        }
    }

    let mut out = Map::new();
    let mut errors = Vec::new();
    for param in signature.form_params() {
        let missing = || {
            ErrorDetail::new("value_error.missing")
                .msg("field required")
                .loc(vec!["body".to_string(), param.name.clone()])
        };
        match &param.source {
            ParamSource::FileField => match files.remove(&param.name) {
                Some(value) => {
                    out.insert(param.name.clone(), value);
                }
                None if param.required => errors.push(missing()),
                None => {}
            },
            ParamSource::FormField(kind) => match texts.remove(&param.name) {
                Some(text) => match kind.coerce_text(&text) {
                    Ok(value) => {
                        out.insert(param.name.clone(), value);
                    }
                    Err(type_error) => errors.push(
                        ErrorDetail::new(type_error)
                            .msg(format!("Invalid value for {}", param.name))
                            .loc(vec!["body".to_string(), param.name.clone()]),
                    ),
                },
                None if param.required => errors.push(missing()),
                None => {}
            },
            _ => {}
        }
    }

    if errors.is_empty() {
        Ok(out)
    } else {
        Err(ApiError::Validation(errors))
    }
}
