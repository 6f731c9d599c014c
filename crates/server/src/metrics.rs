//! Prometheus metrics for the porter gateway.
//!
//! The `/metrics` endpoint is unauthenticated so Prometheus can scrape it.
//! Labels carry stage names, status codes and targets only, never keys or
//! usernames. Restrict the endpoint at the network layer, or turn it off
//! with `server.metrics_enabled = false`.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// Pipeline
pub static STAGE_REJECTIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "porter_stage_rejections_total",
            "Requests rejected by a pipeline stage",
        ),
        &["stage", "status"],
    )
    .expect("metric creation failed")
});

// Resilient access
pub static RETRY_ATTEMPTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "porter_retry_attempts_total",
            "Retry attempts after a transient failure, by target",
        ),
        &["target"],
    )
    .expect("metric creation failed")
});

pub static RETRIES_EXHAUSTED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "porter_retries_exhausted_total",
            "Calls that failed on every allowed attempt, by target",
        ),
        &["target"],
    )
    .expect("metric creation failed")
});

pub static COORDINATOR_DISPATCH_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "porter_coordinator_dispatch_duration_seconds",
            "Duration of a single coordinator dispatch attempt",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0, 120.0, 600.0, 1800.0]),
    )
    .expect("metric creation failed")
});

// Response cache
pub static CACHE_LOOKUPS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "porter_cache_lookups_total",
            "Response cache lookups by result (hit, miss, expired, bypass)",
        ),
        &["result"],
    )
    .expect("metric creation failed")
});

/// Guard to ensure metrics are only registered once.
static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry.
///
/// Idempotent, so tests may build as many routers as they like.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(STAGE_REJECTIONS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(RETRY_ATTEMPTS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(RETRIES_EXHAUSTED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(COORDINATOR_DISPATCH_DURATION.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(CACHE_LOOKUPS.clone()))
            .expect("metric registration failed");
    });
}

/// GET /metrics - Prometheus metrics endpoint.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}

/// Count one cache lookup outcome.
pub fn record_cache_lookup(result: &str) {
    CACHE_LOOKUPS.with_label_values(&[result]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        register_metrics();
        register_metrics();
        STAGE_REJECTIONS
            .with_label_values(&["namespace", "404"])
            .inc();

        let names: Vec<String> = REGISTRY
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"porter_stage_rejections_total".to_string()));
    }
}
