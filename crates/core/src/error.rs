//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("invalid service id: {0}")]
    InvalidServiceId(String),

    #[error("invalid upload metadata: {0}")]
    InvalidUploadMetadata(String),

    #[error("invalid range: {0}")]
    InvalidRange(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
