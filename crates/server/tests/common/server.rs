//! Server test utilities.

use super::coordinator::MockCoordinator;
use super::storage::FlakyStore;
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use porter_core::Namespace;
use porter_core::config::AppConfig;
use porter_server::{AppState, NamespaceBinding, NamespaceTable, create_router};
use porter_storage::{FilesystemBackend, MemoryBackend};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

/// A response with its body collected.
#[allow(dead_code)]
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[allow(dead_code)]
impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap_or(serde_json::Value::Null)
    }

    /// The `code` field of a JSON error body.
    pub fn error_code(&self) -> String {
        self.json()["code"].as_str().unwrap_or_default().to_string()
    }
}

/// A test server wrapper with all dependencies.
///
/// Attachments are served from memory, backups from a temporary directory.
/// Both namespaces share one mock coordinator.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    pub attachments: Arc<FlakyStore>,
    pub backups: Arc<FlakyStore>,
    pub coordinator: Arc<MockCoordinator>,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server with fast retries.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");

        let attachments = Arc::new(FlakyStore::new(Arc::new(MemoryBackend::new())));
        let backups = Arc::new(FlakyStore::new(Arc::new(
            FilesystemBackend::new(temp_dir.path())
                .await
                .expect("Failed to create storage backend"),
        )));
        let coordinator = Arc::new(MockCoordinator::new());

        let mut config = AppConfig::for_testing();
        for retry in [&mut config.retry.storage, &mut config.retry.coordinator] {
            retry.initial_delay_ms = 1;
            retry.max_delay_ms = 5;
        }
        modifier(&mut config);

        let namespaces = NamespaceTable::new(|namespace| {
            let storage = match namespace {
                Namespace::Attachments => attachments.clone(),
                Namespace::Backups => backups.clone(),
            };
            NamespaceBinding::new(namespace, storage, coordinator.clone(), &config.retry)
        });
        let validator = porter_server::bootstrap::build_validator(&config.auth)
            .expect("Failed to build validator");

        let state = AppState::new(config, namespaces, validator);
        let router = create_router(state.clone());

        Self {
            router,
            state,
            attachments,
            backups,
            coordinator,
            _temp_dir: temp_dir,
        }
    }

    /// Send a request through the router.
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Send a bodiless request with optional headers.
    pub async fn call(&self, method: &str, uri: &str, headers: &[(&str, &str)]) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    /// Wait until the response cache holds at least `n` entries.
    pub async fn wait_for_cache(&self, n: usize) {
        let cache = self.state.cache.as_ref().expect("cache enabled");
        for _ in 0..200 {
            if cache.len() >= n {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("cache never reached {n} entries");
    }
}
