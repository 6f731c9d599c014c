//! Backup routes. Every request needs a credential with a permission scope.

use super::read::{get_object, head_object};
use super::upload::forward_upload;
use crate::error::ApiResult;
use crate::pipeline::InboundRequest;
use crate::state::AppState;
use axum::extract::{Path, Request, State};
use axum::http::{HeaderMap, Method, Uri};
use axum::response::Response;
use std::collections::HashMap;

/// GET /backups/{subdir}/{*id}
pub async fn get_backup(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let req = InboundRequest::new(method, uri, headers, params);
    get_object(&state, &state.pipelines.backups_read, req).await
}

/// HEAD /backups/{subdir}/{*id}
pub async fn head_backup(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let req = InboundRequest::new(method, uri, headers, params);
    head_object(&state, &state.pipelines.backups_read, req).await
}

/// POST /upload/backups
pub async fn create_backup_upload(
    State(state): State<AppState>,
    request: Request,
) -> ApiResult<Response> {
    forward_upload(&state.pipelines.backups_create, HashMap::new(), request).await
}

/// PATCH|HEAD /upload/backups/{*id}
pub async fn resume_backup_upload(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    request: Request,
) -> ApiResult<Response> {
    forward_upload(&state.pipelines.backups_resume, params, request).await
}
