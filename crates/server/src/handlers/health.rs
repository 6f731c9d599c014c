//! Health check.

use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::collections::BTreeMap;

/// Storage health of one namespace.
#[derive(Debug, Serialize)]
pub struct NamespaceHealth {
    pub storage: &'static str,
    pub coordinator: &'static str,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub namespaces: BTreeMap<&'static str, NamespaceHealth>,
}

/// GET /health - storage health of every namespace.
///
/// Unauthenticated for load balancer probes. Answers `503` when any
/// namespace's storage is unhealthy.
pub async fn health_check(State(state): State<AppState>) -> Response {
    let mut namespaces = BTreeMap::new();
    for binding in state.namespaces.iter() {
        let result = binding.storage().health_check().await;
        if let Err(err) = &result {
            tracing::warn!(namespace = binding.name(), error = %err, "storage health check failed");
        }
        namespaces.insert(
            binding.name(),
            NamespaceHealth {
                storage: binding.storage().backend_name(),
                coordinator: binding.coordinator().backend_name(),
                healthy: result.is_ok(),
                error: result.err().map(|e| e.to_string()),
            },
        );
    }

    let healthy = namespaces.values().all(|ns| ns.healthy);
    let (status, label) = if healthy {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status,
        Json(HealthResponse {
            status: label,
            version: env!("CARGO_PKG_VERSION"),
            namespaces,
        }),
    )
        .into_response()
}
