//! In-memory storage backend for development and tests.

use crate::error::{StorageError, StorageResult};
use crate::traits::{BlobStore, ObjectMeta, StoredObject, checksum_sha256, slice_range};
use async_trait::async_trait;
use bytes::Bytes;
use porter_core::ByteRange;
use std::collections::HashMap;
use std::sync::RwLock;
use time::OffsetDateTime;

struct Entry {
    data: Bytes,
    meta: ObjectMeta,
}

/// Process-local blob store. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryBackend {
    objects: RwLock<HashMap<String, Entry>>,
}

impl MemoryBackend {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.read().map(|objects| objects.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> StorageError {
    StorageError::Unavailable("memory store lock poisoned".to_string())
}

#[async_trait]
impl BlobStore for MemoryBackend {
    async fn get(
        &self,
        key: &str,
        range: Option<ByteRange>,
    ) -> StorageResult<Option<StoredObject>> {
        let (data, meta) = {
            let objects = self.objects.read().map_err(|_| poisoned())?;
            match objects.get(key) {
                Some(entry) => (entry.data.clone(), entry.meta.clone()),
                None => return Ok(None),
            }
        };
        let (data, range) = slice_range(key, data, range)?;
        Ok(Some(StoredObject { meta, data, range }))
    }

    async fn head(&self, key: &str) -> StorageResult<Option<ObjectMeta>> {
        let objects = self.objects.read().map_err(|_| poisoned())?;
        Ok(objects.get(key).map(|entry| entry.meta.clone()))
    }

    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> StorageResult<ObjectMeta> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey("empty key".to_string()));
        }
        let checksum = checksum_sha256(&data);
        let meta = ObjectMeta {
            size: data.len() as u64,
            etag: format!("\"{checksum}\""),
            last_modified: Some(OffsetDateTime::now_utc()),
            content_type: content_type.map(str::to_string),
            checksum_sha256: Some(checksum),
        };
        let mut objects = self.objects.write().map_err(|_| poisoned())?;
        objects.insert(
            key.to_string(),
            Entry {
                data,
                meta: meta.clone(),
            },
        );
        Ok(meta)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
