//! Storage test utilities.

use async_trait::async_trait;
use bytes::Bytes;
use porter_core::ByteRange;
use porter_storage::{BlobStore, ObjectMeta, StorageError, StorageResult, StoredObject};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Wraps a real backend and injects transient failures on demand.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct FlakyStore {
    inner: Arc<dyn BlobStore>,
    failures_left: AtomicU32,
    calls: AtomicU32,
    healthy: AtomicBool,
}

#[allow(dead_code)]
impl FlakyStore {
    pub fn new(inner: Arc<dyn BlobStore>) -> Self {
        Self {
            inner,
            failures_left: AtomicU32::new(0),
            calls: AtomicU32::new(0),
            healthy: AtomicBool::new(true),
        }
    }

    /// Fail the next `n` reads with a transient error.
    pub fn fail_next(&self, n: u32) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// Number of get/head calls seen so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn reset_calls(&self) {
        self.calls.store(0, Ordering::SeqCst);
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub async fn seed(&self, key: &str, data: &'static [u8], content_type: Option<&str>) {
        self.inner
            .put(key, Bytes::from_static(data), content_type)
            .await
            .expect("seed object");
    }

    fn observe(&self) -> StorageResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let injected = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StorageError::Unavailable("injected failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for FlakyStore {
    async fn get(&self, key: &str, range: Option<ByteRange>) -> StorageResult<Option<StoredObject>> {
        self.observe()?;
        self.inner.get(key, range).await
    }

    async fn head(&self, key: &str) -> StorageResult<Option<ObjectMeta>> {
        self.observe()?;
        self.inner.head(key).await
    }

    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> StorageResult<ObjectMeta> {
        self.inner.put(key, data, content_type).await
    }

    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }

    async fn health_check(&self) -> StorageResult<()> {
        if !self.healthy.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("marked unhealthy".to_string()));
        }
        self.inner.health_check().await
    }
}
