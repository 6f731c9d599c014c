//! Route configuration.

use crate::auth::trace_middleware;
use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, patch, post};
use tower_http::trace::TraceLayer;

/// Create the application router.
///
/// Namespaces are fixed, so every route names its prefix literally. A path
/// under any other prefix falls through to the `404` fallback without
/// touching a pipeline.
pub fn create_router(state: AppState) -> Router {
    let body_limit = DefaultBodyLimit::max(state.config.server.max_upload_body_bytes);

    let read_routes = Router::new()
        .route(
            "/attachments/{*id}",
            get(handlers::get_attachment)
                .head(handlers::head_attachment)
                .fallback(handlers::not_found),
        )
        .route(
            "/backups/{subdir}/{*id}",
            get(handlers::get_backup)
                .head(handlers::head_backup)
                .fallback(handlers::not_found),
        );

    let upload_routes = Router::new()
        .route(
            "/upload/attachments",
            post(handlers::create_attachment_upload).fallback(handlers::not_found),
        )
        .route(
            "/upload/attachments/{*id}",
            patch(handlers::resume_attachment_upload)
                .head(handlers::resume_attachment_upload)
                .fallback(handlers::not_found),
        )
        .route(
            "/upload/backups",
            post(handlers::create_backup_upload).fallback(handlers::not_found),
        )
        .route(
            "/upload/backups/{*id}",
            patch(handlers::resume_backup_upload)
                .head(handlers::resume_backup_upload)
                .fallback(handlers::not_found),
        )
        .layer(body_limit);

    // Health check (intentionally unauthenticated for load balancer probes)
    let mut router = Router::new()
        .route("/health", get(handlers::health_check))
        .merge(read_routes)
        .merge(upload_routes);

    // See crate::metrics for the exposure caveats.
    if state.config.server.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    // Order of execution: TraceLayer -> trace id -> handler
    router
        .fallback(handlers::not_found)
        .layer(middleware::from_fn(trace_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
