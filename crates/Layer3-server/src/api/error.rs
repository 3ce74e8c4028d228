//! API error type.
//!
//! Every handler returns `Result<T, ApiError>`, which implements
//! [`axum::response::IntoResponse`]. Caller mistakes are reported verbatim;
//! internal failures are logged in full and answered with a generic message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use iotask_foundation::Error;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Errors surfaced by the HTTP layer
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or invalid request body
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Id that cannot name any task
    #[error("not found: {0}")]
    NotFound(String),

    /// Propagated from the task layer
    #[error(transparent)]
    Service(#[from] Error),
}

/// `{"status":"failed","error":...}` with the given status code
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let message = message.into();
    (status, Json(json!({ "status": "failed", "error": message }))).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Service(e) if !e.is_user_facing() => {
                error!(error = %e, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
            ApiError::Service(e) => {
                let status = match &e {
                    Error::NotFound(_) => StatusCode::NOT_FOUND,
                    Error::AlreadyExists(_) => StatusCode::CONFLICT,
                    Error::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
                    _ => StatusCode::BAD_REQUEST,
                };
                let message = match e {
                    Error::NotFound(_) => "task not found".to_owned(),
                    Error::ShuttingDown => "service is shutting down".to_owned(),
                    Error::InvalidInput(m) | Error::AlreadyExists(m) => m,
                    other => other.to_string(),
                };
                (status, message)
            }
        };

        error_response(status, message)
    }
}
