//! Errors returned to HTTP clients of the host.
//!
//! A failed task keeps the status chosen by the dispatcher; the body is a
//! small JSON record with the message and a stable code.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// The intercepted task failed.
    #[error("{message}")]
    Task { status: u16, code: &'static str, message: String },

    /// The request could not be turned into a scheme URL.
    #[error("BAD_REQUEST: {0}")]
    BadRequest(String),

    /// The dispatcher went away before answering.
    #[error("INTERNAL: {0}")]
    Internal(String),
}

impl From<&folio_core::Error> for HostError {
    fn from(err: &folio_core::Error) -> Self {
        HostError::Task { status: err.status_code(), code: err.code(), message: err.to_string() }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for HostError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            HostError::Task { status, code, .. } => {
                (StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY), *code)
            }
            HostError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            HostError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
        };

        let body = ErrorResponse { error: self.to_string(), code: code.to_string() };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_error_keeps_status() {
        let err = HostError::from(&folio_core::Error::HttpStatus(503));
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let err = HostError::from(&folio_core::Error::NotFound("article Rust".into()));
        assert!(err.to_string().contains("article Rust"));
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_invalid_status_becomes_bad_gateway() {
        let err = HostError::Task { status: 42, code: "HTTP_STATUS", message: "odd".into() };
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }
}
