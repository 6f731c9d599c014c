//! Attachment routes.
//!
//! Public reads by id; uploads authenticated by credential and keyed under
//! `attachments/<service_id>/`.

use super::read::{get_object, head_object};
use super::upload::forward_upload;
use crate::error::ApiResult;
use crate::pipeline::InboundRequest;
use crate::state::AppState;
use axum::extract::{Path, Request, State};
use axum::http::{HeaderMap, Method, Uri};
use axum::response::Response;
use std::collections::HashMap;

/// GET /attachments/{*id}
pub async fn get_attachment(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let req = InboundRequest::new(method, uri, headers, params);
    get_object(&state, &state.pipelines.attachments_read, req).await
}

/// HEAD /attachments/{*id}
pub async fn head_attachment(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let req = InboundRequest::new(method, uri, headers, params);
    head_object(&state, &state.pipelines.attachments_read, req).await
}

/// POST /upload/attachments?serviceId=<uuid>
pub async fn create_attachment_upload(
    State(state): State<AppState>,
    request: Request,
) -> ApiResult<Response> {
    forward_upload(&state.pipelines.attachments_create, HashMap::new(), request).await
}

/// PATCH|HEAD /upload/attachments/{*id}
pub async fn resume_attachment_upload(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    request: Request,
) -> ApiResult<Response> {
    forward_upload(&state.pipelines.attachments_resume, params, request).await
}
