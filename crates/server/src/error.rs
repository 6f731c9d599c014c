//! API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use porter_coordinator::CoordinatorError;
use porter_storage::StorageError;
use serde::Serialize;

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    /// A stage ran before the stage that establishes its precondition.
    #[error("stage {stage} ran without {missing}")]
    StageOrdering {
        stage: &'static str,
        missing: &'static str,
    },

    #[error("{target} failed after {attempts} attempts: {message}")]
    RetriesExhausted {
        target: &'static str,
        attempts: u32,
        message: String,
    },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("coordinator error: {0}")]
    Coordinator(#[from] CoordinatorError),

    #[error("invalid request: {0}")]
    Core(#[from] porter_core::Error),
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized(_) => "unauthorized",
            Self::PayloadTooLarge(_) => "payload_too_large",
            Self::StageOrdering { .. } => "pipeline_misconfigured",
            Self::RetriesExhausted { .. } => "retries_exhausted",
            Self::Storage(StorageError::RangeNotSatisfiable { .. }) => "range_not_satisfiable",
            Self::Storage(StorageError::InvalidKey(_)) => "invalid_key",
            Self::Storage(_) => "storage_error",
            Self::Coordinator(CoordinatorError::InvalidRequest(_)) => "bad_request",
            Self::Coordinator(_) => "coordinator_error",
            Self::Core(_) => "bad_request",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::StageOrdering { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::RetriesExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Storage(e) => match e {
                StorageError::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
                StorageError::InvalidKey(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Coordinator(e) => match e {
                CoordinatorError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::BAD_GATEWAY,
            },
            Self::Core(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Internal details stay in the logs.
        let message = match &self {
            Self::StageOrdering { .. } => "internal error".to_string(),
            _ => self.to_string(),
        };
        let body = ErrorResponse {
            code: self.code().to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
