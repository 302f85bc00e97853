//! Request-facing error taxonomy and the structured error envelope.
//!
//! Every structured failure serializes to `{"detail": [{type, msg?, loc?}]}`.
//! Configuration failures are a separate enum and surface at route
//! compilation, never as HTTP responses.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

pub const NOT_FOUND_MESSAGE: &str = "Resource not found";

const AUTHENTICATION_ERROR_MESSAGE: &str = "You must be authenticated to perform this action.";
const AUTHORIZATION_ERROR_MESSAGE: &str = "You are not permitted to perform this action.";

/// One entry of the error envelope's `detail` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub loc: Option<Vec<String>>,
}

impl ErrorDetail {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            msg: None,
            loc: None,
        }
    }

    pub fn msg(mut self, msg: impl Into<String>) -> Self {
        self.msg = Some(msg.into());
        self
    }

    pub fn loc(mut self, loc: Vec<impl Into<String>>) -> Self {
        self.loc = Some(loc.into_iter().map(Into::into).collect());
        self
    }
}

/// Structured request-time failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("resource not found")]
    NotFound,

    #[error("validation failed")]
    Validation(Vec<ErrorDetail>),

    #[error("{msg}")]
    BadRequest { kind: String, msg: String },

    #[error("{0}")]
    Authentication(String),

    #[error("{0}")]
    Authorization(String),

    #[error("{msg}")]
    Conflict { kind: String, msg: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn authentication() -> Self {
        Self::Authentication(AUTHENTICATION_ERROR_MESSAGE.to_string())
    }

    pub fn authorization() -> Self {
        Self::Authorization(AUTHORIZATION_ERROR_MESSAGE.to_string())
    }

    pub fn bad_request(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::BadRequest {
            kind: kind.into(),
            msg: msg.into(),
        }
    }

    pub fn conflict(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Conflict {
            kind: kind.into(),
            msg: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// 422 raised when a partial update carries no fields at all.
    pub fn empty_update_body() -> Self {
        Self::Validation(vec![
            ErrorDetail::new("value_error.missing")
                .msg("At least one field from schema is required.")
                .loc(vec!["body"]),
        ])
    }

    /// 422 raised when the request body is not valid JSON.
    pub fn malformed_json_body() -> Self {
        Self::Validation(vec![
            ErrorDetail::new("value_error.jsondecode")
                .msg("Request body is not valid JSON.")
                .loc(vec!["body"]),
        ])
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Authentication(_) => StatusCode::UNAUTHORIZED,
            Self::Authorization(_) => StatusCode::FORBIDDEN,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn details(&self) -> Vec<ErrorDetail> {
        match self {
            Self::NotFound => vec![ErrorDetail::new("not_found").msg(NOT_FOUND_MESSAGE)],
            Self::Validation(details) => details.clone(),
            Self::BadRequest { kind, msg } | Self::Conflict { kind, msg } => {
                vec![ErrorDetail::new(kind.clone()).msg(msg.clone())]
            }
            Self::Authentication(msg) => {
                vec![ErrorDetail::new("authentication_error").msg(msg.clone())]
            }
            Self::Authorization(msg) => {
                vec![ErrorDetail::new("authorization_error").msg(msg.clone())]
            }
            Self::Internal(_) => vec![ErrorDetail::new("server_error")],
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        if let Self::Internal(msg) = &self {
            tracing::error!(error = %msg, "unhandled internal error");
        }
        (self.status(), axum::Json(json!({ "detail": self.details() }))).into_response()
    }
}

/// Translate a persistence integrity failure into a structured error.
///
/// Called once, at the point of commit, after the session has rolled back.
pub fn translate_store_error(err: StoreError) -> ApiError {
    match err {
        StoreError::MalformedId | StoreError::NotFound => ApiError::NotFound,
        StoreError::UniqueViolation { field } => ApiError::Validation(vec![
            ErrorDetail::new("value_error.duplicate")
                .msg(format!("Duplicate value for {field}"))
                .loc(vec!["body".to_string(), field]),
        ]),
        StoreError::ForeignKeyInvalid { table } => ApiError::Validation(vec![
            ErrorDetail::new(format!("integrity_error.invalid_foreign_key.{table}"))
                .msg(format!("Invalid foreign key value for {table}")),
        ]),
        StoreError::ForeignKeyProtected { constraint } => ApiError::Validation(vec![
            ErrorDetail::new(format!(
                "integrity_error.deletion_failure_foreign_key_reference.{constraint}"
            ))
            .msg(format!(
                "Cannot delete when foreign key is still referenced. Constraint: {constraint}"
            )),
        ]),
        StoreError::UnknownEntity(name) => ApiError::internal(format!("unknown entity `{name}`")),
    }
}

/// Startup-time configuration failure.
///
/// These abort route compilation; a misdeclared ViewSet must never make it
/// into a served route table.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("view `{view}`: either {hint} must be defined for the {action} view")]
    MissingSchema {
        view: String,
        action: &'static str,
        hint: &'static str,
    },

    #[error("view `{view}`: page_size must be greater than zero")]
    ZeroPageSize { view: String },

    #[error("view `{view}`: unsupported HTTP method `{method}` on action `{action}`")]
    UnsupportedMethod {
        view: String,
        action: String,
        method: String,
    },
}
