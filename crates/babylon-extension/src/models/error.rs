//! Error responses returned by extension endpoints.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use babylon_core::PayloadError;
use serde::Serialize;
use std::fmt;

/// Error response rendered as `{"error": "<reason>"}`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Reason sent to the caller.
    pub error: String,
    /// HTTP status code.
    #[serde(skip)]
    pub status: StatusCode,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, status: StatusCode) -> Self {
        Self {
            error: error.into(),
            status,
        }
    }

    /// Bad request (400).
    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(error, StatusCode::BAD_REQUEST)
    }

    /// Service unavailable (503).
    pub fn service_unavailable(error: impl Into<String>) -> Self {
        Self::new(error, StatusCode::SERVICE_UNAVAILABLE)
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status = self.status;
        (status, axum::Json(self)).into_response()
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.status.as_u16(), self.error)
    }
}

impl std::error::Error for ErrorResponse {}

impl From<PayloadError> for ErrorResponse {
    fn from(e: PayloadError) -> Self {
        Self::bad_request(e.to_string())
    }
}

/// Result type for extension endpoint handlers.
pub type ApiResult<T> = Result<T, ErrorResponse>;
