//! HTTP error type.
//!
//! Every failure leaves a handler as a JSON body `{"error": ..., "code": ...}`
//! with a status derived from the domain error.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::error::SetlistError;

/// Errors returned to clients.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] SetlistError),

    /// Request body or parameters could not be decoded.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A blocking task panicked or was cancelled.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience alias for handler return values.
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Status, machine-readable code and client-facing message.
    pub fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::Domain(err) => match err {
                SetlistError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                SetlistError::InvalidOrder(_) => {
                    (StatusCode::BAD_REQUEST, "INVALID_ORDER", err.to_string())
                }
                SetlistError::Unauthorized => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", err.to_string())
                }
                SetlistError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
                SetlistError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                SetlistError::RateLimited { .. } => {
                    (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED", err.to_string())
                }
                SetlistError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string()),
                SetlistError::Database(_) | SetlistError::Pool(_) | SetlistError::Corrupt(_) => {
                    tracing::error!(error = %err, "Storage error");
                    internal()
                }
            },
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal()
            }
        }
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        (status, Json(json!({ "error": message, "code": code }))).into_response()
    }
}
