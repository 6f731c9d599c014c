//! Upload path: relay authorized tus requests to the namespace coordinator.

use crate::error::{ApiError, ApiResult};
use crate::pipeline::{InboundRequest, Pipeline};
use axum::body::{Body, Bytes};
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::http::header::{CONNECTION, TRANSFER_ENCODING};
use axum::response::Response;
use porter_coordinator::CoordinatorRequest;
use std::collections::HashMap;

const STAGE: &str = "upload";

/// Run the route's stages on the request head, then buffer the body and
/// dispatch it to the coordinator addressed by the derived key.
///
/// The body is read only after authorization succeeds and is bounded by the
/// route's `DefaultBodyLimit`.
pub async fn forward_upload(
    pipeline: &Pipeline,
    params: HashMap<String, String>,
    request: Request,
) -> ApiResult<Response> {
    let (parts, body) = request.into_parts();
    let inbound = InboundRequest::new(
        parts.method.clone(),
        parts.uri.clone(),
        parts.headers.clone(),
        params,
    );

    let ctx = pipeline.run(&inbound).await?;
    let key = ctx.require_key(STAGE)?;
    let binding = ctx.require_namespace(STAGE)?;

    let body = Bytes::from_request(Request::from_parts(parts, body), &())
        .await
        .map_err(|rejection| {
            if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                ApiError::PayloadTooLarge("upload body exceeds the configured limit".to_string())
            } else {
                ApiError::BadRequest(format!("failed to read request body: {rejection}"))
            }
        })?;

    let path_and_query = inbound
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| inbound.uri.path().to_string());

    tracing::debug!(
        key,
        namespace = binding.name(),
        method = %inbound.method,
        bytes = body.len(),
        "dispatching upload request"
    );

    let response = binding
        .coordinator()
        .dispatch(
            key,
            CoordinatorRequest {
                method: inbound.method,
                path_and_query,
                headers: inbound.headers,
                body,
            },
        )
        .await?;

    let mut headers = response.headers;
    headers.remove(CONNECTION);
    headers.remove(TRANSFER_ENCODING);

    let mut relayed = Response::new(Body::from(response.body));
    *relayed.status_mut() = response.status;
    *relayed.headers_mut() = headers;
    Ok(relayed)
}
