use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use opsdesk_auth::{Principal, TokenValidator};
use opsdesk_viewsets::{ApiError, DeferredAuthError};

#[derive(Clone)]
pub struct AuthState {
    pub tokens: Arc<dyn TokenValidator>,
}

/// Identify the caller from a bearer token.
///
/// This middleware never rejects by itself: a valid token attaches a
/// [`Principal`] extension; an invalid-but-present token attaches a deferred
/// authentication error instead, so routes open to anonymous callers still
/// serve and the permission gate raises the precise failure on routes that
/// require authentication.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    if let Some(token) = extract_bearer(req.headers()) {
        match state.tokens.validate(token, Utc::now()) {
            Ok(claims) => {
                req.extensions_mut().insert(Principal::from_claims(&claims));
            }
            Err(err) => {
                req.extensions_mut().insert(DeferredAuthError(
                    ApiError::Authentication(err.to_string()),
                ));
            }
        }
    }

    next.run(req).await
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?;
    let header = header.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() { None } else { Some(token) }
}
