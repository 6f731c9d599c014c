//! Coordinator test double.

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use bytes::Bytes;
use porter_coordinator::{
    CoordinatorError, CoordinatorRequest, CoordinatorResponse, CoordinatorResult,
    UploadCoordinator,
};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// One dispatch as the coordinator saw it.
#[derive(Clone, Debug)]
pub struct RecordedDispatch {
    pub key: String,
    pub request: CoordinatorRequest,
}

/// Records every dispatch and replays scripted failures before answering
/// `204` with an `Upload-Offset` equal to the body length.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
#[derive(Default)]
pub struct MockCoordinator {
    calls: Mutex<Vec<RecordedDispatch>>,
    script: Mutex<VecDeque<CoordinatorError>>,
    delay: Mutex<Duration>,
}

#[allow(dead_code)]
impl MockCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an error for the next dispatch.
    pub fn fail_with(&self, error: CoordinatorError) {
        self.script.lock().unwrap().push_back(error);
    }

    /// Sleep before answering every dispatch.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn calls(&self) -> Vec<RecordedDispatch> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl UploadCoordinator for MockCoordinator {
    async fn dispatch(
        &self,
        key: &str,
        request: CoordinatorRequest,
    ) -> CoordinatorResult<CoordinatorResponse> {
        let body_len = request.body.len();
        self.calls.lock().unwrap().push(RecordedDispatch {
            key: key.to_string(),
            request,
        });

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = self.script.lock().unwrap().pop_front() {
            return Err(err);
        }

        let mut headers = HeaderMap::new();
        headers.insert("upload-offset", HeaderValue::from(body_len));
        headers.insert("connection", HeaderValue::from_static("keep-alive"));
        Ok(CoordinatorResponse {
            status: StatusCode::NO_CONTENT,
            headers,
            body: Bytes::new(),
        })
    }

    fn backend_name(&self) -> &'static str {
        "mock"
    }
}
