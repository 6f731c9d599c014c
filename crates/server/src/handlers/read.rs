//! Read path: object GET and HEAD.

use crate::cache::{CachedResponse, ResponseCache};
use crate::error::{ApiError, ApiResult};
use crate::metrics::record_cache_lookup;
use crate::pipeline::{InboundRequest, Pipeline};
use crate::state::AppState;
use axum::body::Body;
use axum::http::header::{
    ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, ETAG, LAST_MODIFIED, RANGE,
};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::Response;
use porter_core::ByteRange;
use porter_storage::ObjectMeta;
use std::sync::Arc;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

/// Base64 SHA-256 of the full object, when the backend knows it.
pub const CHECKSUM_HEADER: HeaderName = HeaderName::from_static("x-checksum-sha256");

const STAGE: &str = "read";

/// RFC 9110 IMF-fixdate, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
fn http_date(at: OffsetDateTime) -> Option<String> {
    let format = format_description!(
        "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
    );
    at.to_offset(UtcOffset::UTC).format(&format).ok()
}

/// Headers describing a stored object. `Content-Length` is left to the caller.
fn object_headers(meta: &ObjectMeta) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some(value) = meta
        .content_type
        .as_deref()
        .and_then(|ct| HeaderValue::from_str(ct).ok())
    {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&meta.etag) {
        headers.insert(ETAG, value);
    }
    if let Some(value) = meta
        .last_modified
        .and_then(http_date)
        .and_then(|date| HeaderValue::from_str(&date).ok())
    {
        headers.insert(LAST_MODIFIED, value);
    }
    if let Some(value) = meta
        .checksum_sha256
        .as_deref()
        .and_then(|sum| HeaderValue::from_str(sum).ok())
    {
        headers.insert(CHECKSUM_HEADER, value);
    }
    headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    headers
}

fn build_response(status: StatusCode, headers: HeaderMap, body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

fn replay(cached: CachedResponse, with_body: bool) -> Response {
    let body = if with_body {
        Body::from(cached.body)
    } else {
        Body::empty()
    };
    build_response(cached.status, cached.headers, body)
}

/// The cache and key for this request, unless the cache is off.
fn cache_slot<'a>(
    state: &'a AppState,
    req: &InboundRequest,
) -> Option<(&'a Arc<ResponseCache>, String)> {
    let cache = state.cache.as_ref()?;
    Some((cache, cache.key_for(&req.uri, &req.headers)))
}

/// GET: run the route's stages, then serve from cache or storage.
pub async fn get_object(
    state: &AppState,
    pipeline: &Pipeline,
    req: InboundRequest,
) -> ApiResult<Response> {
    let ctx = pipeline.run(&req).await?;
    let key = ctx.require_key(STAGE)?;
    let binding = ctx.require_namespace(STAGE)?;

    let range_header = req.header(RANGE.as_str());
    let range = range_header.and_then(|value| match ByteRange::parse(value) {
        Ok(range) => Some(range),
        Err(err) => {
            tracing::debug!(range = value, error = %err, "ignoring unusable range header");
            None
        }
    });

    let slot = if range_header.is_some() {
        if state.cache.is_some() {
            record_cache_lookup("bypass");
        }
        None
    } else {
        cache_slot(state, &req)
    };

    if let Some((cache, cache_key)) = &slot
        && let Some(hit) = cache.lookup(cache_key)
    {
        return Ok(replay(hit, true));
    }

    let object = binding
        .storage()
        .get(key, range)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("object not found: {key}")))?;

    let mut headers = object_headers(&object.meta);
    headers.insert(CONTENT_LENGTH, HeaderValue::from(object.data.len()));

    if let Some(resolved) = object.range {
        let content_range = resolved.content_range(object.meta.size);
        if let Ok(value) = HeaderValue::from_str(&content_range) {
            headers.insert(CONTENT_RANGE, value);
        }
        return Ok(build_response(
            StatusCode::PARTIAL_CONTENT,
            headers,
            Body::from(object.data),
        ));
    }

    if let Some((cache, cache_key)) = slot {
        let cache = cache.clone();
        let cached = CachedResponse {
            status: StatusCode::OK,
            headers: headers.clone(),
            body: object.data.clone(),
        };
        // Populated after the response is handed back; never awaited.
        tokio::spawn(async move {
            if !cache.store(cache_key, cached) {
                tracing::debug!("response not cacheable");
            }
        });
    }

    Ok(build_response(
        StatusCode::OK,
        headers,
        Body::from(object.data),
    ))
}

/// HEAD: a cached GET answers without a body; never populates the cache.
pub async fn head_object(
    state: &AppState,
    pipeline: &Pipeline,
    req: InboundRequest,
) -> ApiResult<Response> {
    let ctx = pipeline.run(&req).await?;
    let key = ctx.require_key(STAGE)?;
    let binding = ctx.require_namespace(STAGE)?;

    if let Some((cache, cache_key)) = cache_slot(state, &req)
        && let Some(hit) = cache.lookup(&cache_key)
    {
        return Ok(replay(hit, false));
    }

    let meta = binding
        .storage()
        .head(key)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("object not found: {key}")))?;

    let mut headers = object_headers(&meta);
    headers.insert(CONTENT_LENGTH, HeaderValue::from(meta.size));
    Ok(build_response(StatusCode::OK, headers, Body::empty()))
}
