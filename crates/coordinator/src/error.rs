//! Coordinator error types.

use porter_core::Retryability;
use std::time::Duration;
use thiserror::Error;

/// Coordinator dispatch errors.
///
/// Every variant has a fixed classification except `Dispatch`, which carries
/// the one its producer decided on.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("coordinator call failed: {message}")]
    Dispatch {
        message: String,
        retryability: Retryability,
    },

    #[error("coordinator call exceeded deadline of {0:?}")]
    DeadlineExceeded(Duration),

    #[error("invalid coordinator request: {0}")]
    InvalidRequest(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl CoordinatorError {
    /// A failure the same call may recover from.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Dispatch {
            message: message.into(),
            retryability: Retryability::Transient,
        }
    }

    /// A failure that repeating the call will not fix.
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Dispatch {
            message: message.into(),
            retryability: Retryability::Permanent,
        }
    }

    pub fn retryability(&self) -> Retryability {
        match self {
            CoordinatorError::Dispatch { retryability, .. } => *retryability,
            CoordinatorError::DeadlineExceeded(_) => Retryability::Transient,
            CoordinatorError::InvalidRequest(_) | CoordinatorError::Config(_) => {
                Retryability::Permanent
            }
        }
    }
}

impl From<reqwest::Error> for CoordinatorError {
    fn from(err: reqwest::Error) -> Self {
        // Connection setup and timeouts are platform hiccups; anything else
        // (redirect loops, bad bodies, builder errors) is not.
        if err.is_connect() || err.is_timeout() {
            Self::transient(err.to_string())
        } else {
            Self::permanent(err.to_string())
        }
    }
}

/// Result type for coordinator operations.
pub type CoordinatorResult<T> = std::result::Result<T, CoordinatorError>;
