//! Retrying wrappers around storage reads and coordinator dispatch.
//!
//! These are the only places that catch backend faults. A permanent error
//! leaves with its classification intact; exhausting the attempt
//! cap becomes [`ApiError::RetriesExhausted`].

use crate::error::{ApiError, ApiResult};
use crate::metrics::{COORDINATOR_DISPATCH_DURATION, RETRIES_EXHAUSTED, RETRY_ATTEMPTS};
use porter_coordinator::{
    CoordinatorError, CoordinatorRequest, CoordinatorResponse, UploadCoordinator,
};
use porter_core::{ByteRange, RetryError, RetryPolicy};
use porter_storage::{BlobStore, ObjectMeta, StorageError, StorageResult, StoredObject};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

const STORAGE_TARGET: &str = "storage";
const COORDINATOR_TARGET: &str = "coordinator";

fn note_attempt(target: &'static str, attempt: u32) {
    if attempt > 1 {
        RETRY_ATTEMPTS.with_label_values(&[target]).inc();
    }
}

fn settle<T, E>(target: &'static str, result: Result<T, RetryError<E>>) -> ApiResult<T>
where
    E: Display,
    ApiError: From<E>,
{
    match result {
        Ok(value) => Ok(value),
        Err(RetryError::Permanent(err)) => Err(err.into()),
        Err(RetryError::Exhausted { attempts, last }) => {
            RETRIES_EXHAUSTED.with_label_values(&[target]).inc();
            tracing::warn!(target, attempts, error = %last, "retries exhausted");
            Err(ApiError::RetriesExhausted {
                target,
                attempts,
                message: last.to_string(),
            })
        }
    }
}

/// Blob store reads under the storage retry policy.
#[derive(Clone)]
pub struct RetryingStore {
    inner: Arc<dyn BlobStore>,
    policy: RetryPolicy,
}

impl RetryingStore {
    pub fn new(inner: Arc<dyn BlobStore>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }

    /// Fetch an object. "Range not satisfiable" is permanent and never
    /// retried.
    pub async fn get(&self, key: &str, range: Option<ByteRange>) -> ApiResult<Option<StoredObject>> {
        let result = self
            .policy
            .run(
                |attempt| {
                    note_attempt(STORAGE_TARGET, attempt);
                    self.inner.get(key, range)
                },
                StorageError::retryability,
            )
            .await;
        settle(STORAGE_TARGET, result)
    }

    pub async fn head(&self, key: &str) -> ApiResult<Option<ObjectMeta>> {
        let result = self
            .policy
            .run(
                |attempt| {
                    note_attempt(STORAGE_TARGET, attempt);
                    self.inner.head(key)
                },
                StorageError::retryability,
            )
            .await;
        settle(STORAGE_TARGET, result)
    }

    /// Single-shot probe; health checks report the live state, not a retried one.
    pub async fn health_check(&self) -> StorageResult<()> {
        self.inner.health_check().await
    }
}

/// Coordinator dispatch under the coordinator retry policy.
///
/// Each attempt runs under `deadline`. An attempt that overruns it is
/// abandoned and counts as a transient failure.
#[derive(Clone)]
pub struct RetryingCoordinator {
    inner: Arc<dyn UploadCoordinator>,
    policy: RetryPolicy,
    deadline: Duration,
}

impl RetryingCoordinator {
    pub fn new(inner: Arc<dyn UploadCoordinator>, policy: RetryPolicy, deadline: Duration) -> Self {
        Self {
            inner,
            policy,
            deadline,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }

    pub async fn dispatch(
        &self,
        key: &str,
        request: CoordinatorRequest,
    ) -> ApiResult<CoordinatorResponse> {
        let result = self
            .policy
            .run(
                |attempt| {
                    note_attempt(COORDINATOR_TARGET, attempt);
                    let request = request.clone();
                    async move {
                        let timer = COORDINATOR_DISPATCH_DURATION.start_timer();
                        let outcome =
                            tokio::time::timeout(self.deadline, self.inner.dispatch(key, request))
                                .await;
                        timer.observe_duration();
                        outcome.unwrap_or(Err(CoordinatorError::DeadlineExceeded(self.deadline)))
                    }
                },
                CoordinatorError::retryability,
            )
            .await;
        settle(COORDINATOR_TARGET, result)
    }
}
