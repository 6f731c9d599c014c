//! Coordinator trait definitions.

use crate::error::CoordinatorResult;
use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};

/// A tus request forwarded to the coordinator that owns an upload session.
#[derive(Clone, Debug)]
pub struct CoordinatorRequest {
    pub method: Method,
    /// Original request path and query (e.g. `/upload/attachments?serviceId=..`).
    pub path_and_query: String,
    pub headers: HeaderMap,
    /// Fully buffered body, resent unchanged on every attempt.
    pub body: Bytes,
}

/// The coordinator's response, relayed to the client as-is.
#[derive(Clone, Debug)]
pub struct CoordinatorResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Per-key upload session coordinator.
///
/// `key` selects the coordinator instance. Implementations guarantee at most
/// one in-flight session mutation per key; callers rely on that and do not
/// serialize themselves.
#[async_trait]
pub trait UploadCoordinator: Send + Sync + 'static {
    /// Forward a tus request to the instance identified by `key`.
    async fn dispatch(
        &self,
        key: &str,
        request: CoordinatorRequest,
    ) -> CoordinatorResult<CoordinatorResponse>;

    /// Static identifier for logging and metrics.
    fn backend_name(&self) -> &'static str;
}
