//! Core domain types and shared logic for the porter upload gateway.
//!
//! This crate defines the pieces that carry no I/O:
//! - Capability usernames and permission scopes
//! - The closed namespace enumeration
//! - Storage key sanitization and validation
//! - tus `Upload-Metadata` and HTTP `Range` parsing
//! - The retry engine and failure classification
//! - Configuration types

pub mod capability;
pub mod config;
pub mod error;
pub mod keys;
pub mod namespace;
pub mod range;
pub mod retry;
pub mod upload_metadata;

pub use capability::{Capability, Permission};
pub use error::{Error, Result};
pub use namespace::Namespace;
pub use range::{ByteRange, ResolvedRange};
pub use retry::{Backoff, RetryError, RetryPolicy, Retryability};
pub use upload_metadata::UploadMetadata;

/// Maximum storage key length in UTF-8 bytes.
pub const MAX_KEY_BYTES: usize = 1024;
