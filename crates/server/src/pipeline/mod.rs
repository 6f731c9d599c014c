//! Authorization pipeline.
//!
//! A route is an ordered list of [`Stage`]s. Each stage inspects the
//! inbound request, may write to the shared [`RequestContext`], and either
//! lets the chain continue or ends it with an error response. A request that
//! survives every stage reaches its terminal handler with an authorized key.

pub mod context;
pub mod keys;
pub mod stages;

pub use context::{Principal, RequestContext, ScopeRejection};
pub use keys::{
    AuthorizationOptions, AuthorizedKey, MetadataAuthorizedKey, PathAuthorizedKey,
    SubdirAuthorizedKey, UnauthenticatedKeyFromId,
};
pub use stages::{Authenticate, RequirePermission, ServiceIdFromQuery, WithNamespace};

use crate::error::{ApiError, ApiResult};
use crate::metrics::STAGE_REJECTIONS;
use async_trait::async_trait;
use axum::extract::Query;
use axum::http::{HeaderMap, Method, Uri};
use std::collections::HashMap;
use std::sync::Arc;

/// The parts of an HTTP request that stages may look at.
#[derive(Clone, Debug)]
pub struct InboundRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    /// Route path parameters (`id`, `subdir`).
    pub params: HashMap<String, String>,
    query: HashMap<String, String>,
}

impl InboundRequest {
    pub fn new(
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        params: HashMap<String, String>,
    ) -> Self {
        // A query string that does not decode is treated as empty.
        let query = Query::<HashMap<String, String>>::try_from_uri(&uri)
            .map(|Query(query)| query)
            .unwrap_or_default();
        Self {
            method,
            uri,
            headers,
            params,
            query,
        }
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// A decoded query parameter. Empty values count as absent.
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// One step of a route's authorization chain.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Stable name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Inspect the request and update `ctx`, or reject the request.
    async fn apply(&self, ctx: &mut RequestContext, req: &InboundRequest) -> ApiResult<()>;
}

/// An ordered, immutable stage list built once per route.
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage.
    pub fn then(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Stage names in execution order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage in order against a fresh context.
    ///
    /// Stops at the first rejection.
    pub async fn run(&self, req: &InboundRequest) -> ApiResult<RequestContext> {
        let mut ctx = RequestContext::new();
        for stage in &self.stages {
            if let Err(err) = stage.apply(&mut ctx, req).await {
                record_rejection(stage.name(), &err);
                return Err(err);
            }
        }
        Ok(ctx)
    }
}

fn record_rejection(stage: &'static str, err: &ApiError) {
    let status = err.status_code();
    STAGE_REJECTIONS
        .with_label_values(&[stage, status.as_str()])
        .inc();

    match err {
        ApiError::StageOrdering { .. } => {
            tracing::error!(stage, error = %err, "pipeline stage ran out of order");
        }
        _ if status.is_server_error() => {
            tracing::warn!(stage, status = status.as_u16(), error = %err, "request rejected");
        }
        _ => {
            tracing::debug!(stage, status = status.as_u16(), error = %err, "request rejected");
        }
    }
}
