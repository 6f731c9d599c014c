//! Fixtures for unit tests.

use crate::namespaces::{NamespaceBinding, NamespaceTable};
use crate::pipeline::InboundRequest;
use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use porter_coordinator::{
    CoordinatorRequest, CoordinatorResponse, CoordinatorResult, UploadCoordinator,
};
use porter_core::config::RetrySettings;
use porter_storage::MemoryBackend;
use std::collections::HashMap;
use std::sync::Arc;

/// Answers every dispatch with `204`.
pub struct NoContentCoordinator;

#[async_trait]
impl UploadCoordinator for NoContentCoordinator {
    async fn dispatch(
        &self,
        _key: &str,
        _request: CoordinatorRequest,
    ) -> CoordinatorResult<CoordinatorResponse> {
        Ok(CoordinatorResponse {
            status: StatusCode::NO_CONTENT,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        })
    }

    fn backend_name(&self) -> &'static str {
        "no-content"
    }
}

pub fn binding_table() -> Arc<NamespaceTable> {
    let retry = RetrySettings::default();
    Arc::new(NamespaceTable::new(|namespace| {
        NamespaceBinding::new(
            namespace,
            Arc::new(MemoryBackend::new()),
            Arc::new(NoContentCoordinator),
            &retry,
        )
    }))
}

pub fn inbound(
    method: Method,
    uri: &str,
    headers: HeaderMap,
    params: &[(&str, &str)],
) -> InboundRequest {
    let params: HashMap<String, String> = params
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    InboundRequest::new(method, uri.parse().unwrap(), headers, params)
}

pub fn request(uri: &str) -> InboundRequest {
    inbound(Method::GET, uri, HeaderMap::new(), &[])
}

pub fn request_with_auth(uri: &str, username: &str, password: &str) -> InboundRequest {
    let encoded = STANDARD.encode(format!("{username}:{password}"));
    let mut headers = HeaderMap::new();
    headers.insert(
        "authorization",
        HeaderValue::from_str(&format!("Basic {encoded}")).unwrap(),
    );
    inbound(Method::GET, uri, headers, &[])
}
