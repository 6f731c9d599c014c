//! HTTP front end for the porter upload gateway.
//!
//! This crate provides:
//! - The capability-authorization pipeline and its stages
//! - The static namespace table
//! - Retrying access to storage and upload coordinators
//! - Read and upload handlers, the route table and metrics

pub mod auth;
pub mod bootstrap;
pub mod cache;
pub mod credentials;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod namespaces;
pub mod pipeline;
pub mod resilience;
pub mod routes;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use auth::TraceId;
pub use credentials::{CredentialValidator, HmacCredentialValidator};
pub use error::ApiError;
pub use namespaces::{NamespaceBinding, NamespaceTable};
pub use routes::create_router;
pub use state::AppState;
