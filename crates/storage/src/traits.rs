//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use base64::Engine as _;
use bytes::Bytes;
use porter_core::{ByteRange, ResolvedRange};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

/// Blob store consumed by the gateway's read paths.
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    /// Get an object's content, or the requested byte range of it.
    ///
    /// Returns `Ok(None)` when the object does not exist. A range that cannot
    /// be satisfied against the object's size fails with
    /// `StorageError::RangeNotSatisfiable`.
    async fn get(&self, key: &str, range: Option<ByteRange>)
    -> StorageResult<Option<StoredObject>>;

    /// Get an object's metadata without fetching content.
    async fn head(&self, key: &str) -> StorageResult<Option<ObjectMeta>>;

    /// Put an object atomically.
    async fn put(&self, key: &str, data: Bytes, content_type: Option<&str>)
    -> StorageResult<ObjectMeta>;

    /// Get the name of this storage backend.
    ///
    /// Used for metrics and logging.
    fn backend_name(&self) -> &'static str;

    /// Verify storage backend connectivity.
    ///
    /// The default implementation returns Ok(()), suitable for backends that
    /// don't require connectivity verification.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Metadata about a stored object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectMeta {
    /// Object size in bytes.
    pub size: u64,
    /// Entity tag, already quoted.
    pub etag: String,
    /// Last modification time (if available).
    pub last_modified: Option<OffsetDateTime>,
    /// Content type (if available).
    pub content_type: Option<String>,
    /// Base64 SHA-256 of the full content (if known).
    pub checksum_sha256: Option<String>,
}

/// An object body as returned by `BlobStore::get`.
#[derive(Clone, Debug)]
pub struct StoredObject {
    pub meta: ObjectMeta,
    /// The full content, or only the bytes of `range`.
    pub data: Bytes,
    /// The resolved range, for partial reads.
    pub range: Option<ResolvedRange>,
}

impl StoredObject {
    /// Whether this is a partial-content read.
    pub fn is_partial(&self) -> bool {
        self.range.is_some()
    }
}

/// Base64 SHA-256 digest, the encoding used for `checksum_sha256`.
pub fn checksum_sha256(data: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(Sha256::digest(data))
}

/// Resolve an optional range against `size`, slicing `data` accordingly.
///
/// `data` must hold the complete object.
pub(crate) fn slice_range(
    key: &str,
    data: Bytes,
    range: Option<ByteRange>,
) -> StorageResult<(Bytes, Option<ResolvedRange>)> {
    let size = data.len() as u64;
    let Some(range) = range else {
        return Ok((data, None));
    };
    let resolved = range
        .resolve(size)
        .ok_or_else(|| crate::error::StorageError::RangeNotSatisfiable {
            key: key.to_string(),
            size,
        })?;
    let start = resolved.offset as usize;
    let end = start + resolved.length as usize;
    Ok((data.slice(start..end), Some(resolved)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;

    #[test]
    fn test_checksum_sha256_base64() {
        assert_eq!(
            checksum_sha256(b"hello world"),
            "uU0nuZNNPgilLlLX2n2r+sSE7+N6U4DukIj3rOLvzek="
        );
    }

    #[test]
    fn test_slice_range() {
        let data = Bytes::from_static(b"0123456789");
        let (body, range) = slice_range(
            "k",
            data.clone(),
            Some(ByteRange::From {
                start: 2,
                end: Some(4),
            }),
        )
        .unwrap();
        assert_eq!(&body[..], b"234");
        assert_eq!(range.unwrap().content_range(10), "bytes 2-4/10");

        let (body, range) =
            slice_range("k", data.clone(), Some(ByteRange::Suffix { length: 3 })).unwrap();
        assert_eq!(&body[..], b"789");
        assert!(range.is_some());

        let err = slice_range(
            "k",
            data,
            Some(ByteRange::From {
                start: 10,
                end: None,
            }),
        )
        .unwrap_err();
        assert!(matches!(err, StorageError::RangeNotSatisfiable { size: 10, .. }));
    }
}
