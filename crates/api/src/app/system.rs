use axum::{Json, http::StatusCode, response::IntoResponse};

use opsdesk_auth::Principal;
use opsdesk_viewsets::ApiError;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(
    principal: Option<axum::extract::Extension<Principal>>,
) -> axum::response::Response {
    match principal {
        Some(axum::extract::Extension(principal)) => Json(serde_json::json!({
            "principal_id": principal.id.to_string(),
            "name": principal.name,
            "scopes": principal.scopes.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
            "is_active": principal.is_active,
        }))
        .into_response(),
        None => ApiError::authentication().into_response(),
    }
}
