//! Storage error types.

use porter_core::Retryability;
use thiserror::Error;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("range not satisfiable for {key} (size {size})")]
    RangeNotSatisfiable { key: String, size: u64 },

    #[error("configuration error: {0}")]
    Config(String),
}

impl StorageError {
    /// Whether repeating the same call may succeed.
    ///
    /// Range and key errors depend only on the request, so they never change
    /// between attempts.
    pub fn retryability(&self) -> Retryability {
        match self {
            StorageError::Io(_) | StorageError::Unavailable(_) => Retryability::Transient,
            StorageError::InvalidKey(_)
            | StorageError::RangeNotSatisfiable { .. }
            | StorageError::Config(_) => Retryability::Permanent,
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
