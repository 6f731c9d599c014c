//! Coordinator reached over HTTP.

use crate::error::{CoordinatorError, CoordinatorResult};
use crate::traits::{CoordinatorRequest, CoordinatorResponse, UploadCoordinator};
use async_trait::async_trait;
use http::header::{self, HeaderName, HeaderValue};
use std::time::Duration;
use tracing::instrument;

/// Header carrying the derived key that selects the session instance.
pub const UPLOAD_KEY_HEADER: &str = "x-upload-key";

/// Request headers that describe this hop only and are not forwarded.
const HOP_BY_HOP: [HeaderName; 5] = [
    header::CONNECTION,
    header::HOST,
    header::CONTENT_LENGTH,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Forwards every dispatch to `base_url` + the inbound path and query.
pub struct HttpCoordinator {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCoordinator {
    pub fn new(base_url: &str, connect_timeout: Duration) -> CoordinatorResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| CoordinatorError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl UploadCoordinator for HttpCoordinator {
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path_and_query))]
    async fn dispatch(
        &self,
        key: &str,
        request: CoordinatorRequest,
    ) -> CoordinatorResult<CoordinatorResponse> {
        let mut headers = request.headers;
        for name in HOP_BY_HOP {
            headers.remove(name);
        }
        let key_value = HeaderValue::from_str(key).map_err(|_| {
            CoordinatorError::InvalidRequest(format!("key is not a valid header value: {key}"))
        })?;
        headers.insert(HeaderName::from_static(UPLOAD_KEY_HEADER), key_value);

        let url = format!("{}{}", self.base_url, request.path_and_query);
        let response = self
            .client
            .request(request.method, url)
            .headers(headers)
            .body(request.body)
            .send()
            .await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        tracing::debug!(status = status.as_u16(), bytes = body.len(), "coordinator responded");

        Ok(CoordinatorResponse {
            status,
            headers,
            body,
        })
    }

    fn backend_name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Request;
    use bytes::Bytes;
    use http::{HeaderMap, Method, StatusCode};
    use porter_core::Retryability;

    async fn echo(request: Request) -> (StatusCode, HeaderMap, Bytes) {
        let mut headers = HeaderMap::new();
        let key = request
            .headers()
            .get(UPLOAD_KEY_HEADER)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static("missing"));
        headers.insert("x-seen-key", key);
        let uri = request.uri().to_string();
        headers.insert("x-seen-uri", HeaderValue::from_str(&uri).unwrap());
        headers.insert(
            "x-seen-method",
            HeaderValue::from_str(request.method().as_str()).unwrap(),
        );
        let body = axum::body::to_bytes(request.into_body(), usize::MAX)
            .await
            .unwrap();
        (StatusCode::CREATED, headers, body)
    }

    #[tokio::test]
    async fn test_dispatch_forwards_key_path_and_body() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, axum::Router::new().fallback(echo))
                .await
                .unwrap();
        });

        let coordinator =
            HttpCoordinator::new(&format!("http://{addr}/"), Duration::from_secs(1)).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("tus-resumable", HeaderValue::from_static("1.0.0"));
        let response = coordinator
            .dispatch(
                "attachments/abc/file.pdf",
                CoordinatorRequest {
                    method: Method::PATCH,
                    path_and_query: "/upload/attachments/abc/file.pdf?x=1".to_string(),
                    headers,
                    body: Bytes::from_static(b"chunk"),
                },
            )
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(response.body, Bytes::from_static(b"chunk"));
        assert_eq!(
            response.headers.get("x-seen-key").unwrap(),
            "attachments/abc/file.pdf"
        );
        assert_eq!(
            response.headers.get("x-seen-uri").unwrap(),
            "/upload/attachments/abc/file.pdf?x=1"
        );
        assert_eq!(response.headers.get("x-seen-method").unwrap(), "PATCH");
    }

    #[tokio::test]
    async fn test_unreachable_coordinator_is_transient() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let coordinator =
            HttpCoordinator::new(&format!("http://{addr}"), Duration::from_secs(1)).unwrap();
        let err = coordinator
            .dispatch(
                "backups/x",
                CoordinatorRequest {
                    method: Method::HEAD,
                    path_and_query: "/upload/backups/x".to_string(),
                    headers: HeaderMap::new(),
                    body: Bytes::new(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.retryability(), Retryability::Transient);
    }

    #[tokio::test]
    async fn test_key_must_be_header_safe() {
        let coordinator =
            HttpCoordinator::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let err = coordinator
            .dispatch(
                "attachments/line\nbreak",
                CoordinatorRequest {
                    method: Method::POST,
                    path_and_query: "/upload/attachments".to_string(),
                    headers: HeaderMap::new(),
                    body: Bytes::new(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::InvalidRequest(_)));
    }
}
