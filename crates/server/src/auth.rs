//! Request tracing middleware and Basic credential parsing.

use crate::error::{ApiError, ApiResult};
use axum::extract::Request;
use axum::http::{HeaderMap, HeaderValue};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tracing::Instrument;
use uuid::Uuid;

/// Maximum length for trace IDs.
/// Longer trace IDs are truncated to prevent log bloat and potential log injection.
const MAX_TRACE_ID_LEN: usize = 128;

/// Request header carrying a client trace id; echoed on every response.
pub const TRACE_ID_HEADER: &str = "x-trace-id";

/// Query parameter accepted in place of an `Authorization` header.
pub const TOKEN_QUERY_PARAM: &str = "token";

const BASIC_PREFIX: &str = "Basic ";

/// Trace ID for request correlation.
#[derive(Clone, Debug)]
pub struct TraceId(pub String);

impl TraceId {
    /// Generate a new random trace ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create a trace ID from a client-provided value.
    /// The value is truncated to MAX_TRACE_ID_LEN characters and non-printable characters removed.
    pub fn from_client(value: &str) -> Self {
        let sanitized: String = value
            .chars()
            .take(MAX_TRACE_ID_LEN)
            .filter(|c| c.is_ascii_graphic() || *c == ' ')
            .collect();

        if sanitized.trim().is_empty() {
            Self::new()
        } else {
            Self(sanitized)
        }
    }

    /// Get the trace ID as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Extract trace ID from X-Trace-Id header or generate a new one.
fn extract_or_generate_trace_id(req: &Request) -> TraceId {
    req.headers()
        .get(TRACE_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(TraceId::from_client)
        .unwrap_or_else(TraceId::new)
}

/// Attach a trace ID to the request and run the rest of the stack inside a
/// span carrying it.
pub async fn trace_middleware(mut req: Request, next: Next) -> Response {
    let trace_id = extract_or_generate_trace_id(&req);
    let span = tracing::info_span!(
        "request",
        trace_id = %trace_id,
        method = %req.method(),
        path = %req.uri().path()
    );
    let echoed = HeaderValue::from_str(trace_id.as_str()).ok();
    req.extensions_mut().insert(trace_id);

    let mut response = next.run(req).instrument(span).await;
    if let Some(value) = echoed {
        response.headers_mut().insert(TRACE_ID_HEADER, value);
    }
    response
}

/// A decoded `Basic` credential pair.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Locate and parse the request's credential.
///
/// The `Authorization` header wins; otherwise a `token` query parameter is
/// treated as the payload of a `Basic` header. Neither present is `401`.
pub fn credentials_from_request(
    headers: &HeaderMap,
    query_token: Option<&str>,
) -> ApiResult<BasicCredentials> {
    if let Some(value) = headers.get(AUTHORIZATION) {
        let value = value
            .to_str()
            .map_err(|_| ApiError::BadRequest("authorization header is not ASCII".to_string()))?;
        return parse_basic_auth(value);
    }

    match query_token {
        Some(token) => parse_basic_auth(&format!("Basic {token}")),
        None => Err(ApiError::Unauthorized("missing credentials".to_string())),
    }
}

/// Parse a `Basic` authorization value.
///
/// The decoded payload is split at the first colon only, so passwords may
/// contain colons. The scheme must be spelled exactly `Basic`.
pub fn parse_basic_auth(value: &str) -> ApiResult<BasicCredentials> {
    let encoded = value
        .strip_prefix(BASIC_PREFIX)
        .map(str::trim)
        .ok_or_else(|| ApiError::BadRequest("auth should be Basic".to_string()))?;

    let decoded = STANDARD
        .decode(encoded)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or_else(|| ApiError::BadRequest("invalid auth format".to_string()))?;

    match decoded.split_once(':') {
        Some((username, password)) if !username.is_empty() && !password.is_empty() => {
            Ok(BasicCredentials {
                username: username.to_string(),
                password: password.to_string(),
            })
        }
        _ => Err(ApiError::BadRequest("invalid auth format".to_string())),
    }
}
