//! HTTP request handlers.

pub mod attachments;
pub mod backups;
pub mod health;
pub mod read;
pub mod upload;

pub use attachments::*;
pub use backups::*;
pub use health::*;

use crate::error::ApiError;

/// Catch-all for unknown paths and unsupported methods.
pub async fn not_found() -> ApiError {
    ApiError::NotFound("no route".to_string())
}
