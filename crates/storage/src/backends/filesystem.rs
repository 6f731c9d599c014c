//! Local filesystem storage backend.

use crate::error::{StorageError, StorageResult};
use crate::traits::{BlobStore, ObjectMeta, StoredObject, checksum_sha256};
use async_trait::async_trait;
use bytes::Bytes;
use porter_core::ByteRange;
use std::fs::Metadata;
use std::path::{Component, Path, PathBuf};
use time::OffsetDateTime;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::instrument;
use uuid::Uuid;

/// Local filesystem blob store.
///
/// Keys map to relative paths under `root`. Content types are not persisted.
pub struct FilesystemBackend {
    root: PathBuf,
}

impl FilesystemBackend {
    /// Create a new filesystem backend, creating `root` if needed.
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Resolve a key to a path under the root, off the async runtime.
    async fn key_path(&self, key: &str) -> StorageResult<PathBuf> {
        let root = self.root.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || resolve_key(&root, &key))
            .await
            .map_err(|e| {
                StorageError::Io(std::io::Error::other(format!("spawn_blocking failed: {e}")))
            })?
    }

    async fn open(&self, key: &str) -> StorageResult<Option<(fs::File, Metadata)>> {
        let path = self.key_path(key).await?;
        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::Io(e)),
        };
        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return Ok(None);
        }
        Ok(Some((file, metadata)))
    }
}

/// Map a key to a path, rejecting anything that could leave `root`.
///
/// Existing paths are canonicalized so that symlinks pointing outside the
/// root are refused. For paths that don't exist yet the nearest existing
/// ancestor is checked instead, so writes can't create directories through a
/// symlinked parent.
fn resolve_key(root: &Path, key: &str) -> StorageResult<PathBuf> {
    if key.is_empty() || key.contains("..") || key.starts_with('/') || key.contains('\\') {
        return Err(StorageError::InvalidKey(format!(
            "path traversal not allowed: {key}"
        )));
    }
    if Path::new(key)
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(StorageError::InvalidKey(format!(
            "contains unsafe path component: {key}"
        )));
    }

    let path = root.join(key);
    let root_canonical = root.canonicalize().map_err(|e| {
        StorageError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to canonicalize root: {e}"),
        ))
    })?;

    let mut candidate = Some(path.as_path());
    while let Some(current) = candidate {
        match std::fs::symlink_metadata(current) {
            Ok(meta) => {
                let canonical = current.canonicalize().map_err(|e| {
                    if meta.file_type().is_symlink() {
                        StorageError::InvalidKey(format!("symlink target missing: {key}"))
                    } else {
                        StorageError::Io(e)
                    }
                })?;
                if !canonical.starts_with(&root_canonical) {
                    return Err(StorageError::InvalidKey(format!(
                        "resolved path escapes storage root: {key}"
                    )));
                }
                return Ok(path);
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                candidate = current.parent();
            }
            Err(err) => return Err(StorageError::Io(err)),
        }
    }

    Ok(path)
}

fn object_meta(metadata: &Metadata, checksum: Option<String>) -> ObjectMeta {
    let modified = metadata.modified().ok().map(OffsetDateTime::from);
    let stamp = modified.map_or(0, |t| t.unix_timestamp_nanos());
    ObjectMeta {
        size: metadata.len(),
        etag: format!("\"{:x}-{:x}\"", metadata.len(), stamp),
        last_modified: modified,
        content_type: None,
        checksum_sha256: checksum,
    }
}

#[async_trait]
impl BlobStore for FilesystemBackend {
    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn get(
        &self,
        key: &str,
        range: Option<ByteRange>,
    ) -> StorageResult<Option<StoredObject>> {
        let Some((mut file, metadata)) = self.open(key).await? else {
            return Ok(None);
        };

        let Some(range) = range else {
            let mut buf = Vec::with_capacity(metadata.len() as usize);
            file.read_to_end(&mut buf).await?;
            let data = Bytes::from(buf);
            return Ok(Some(StoredObject {
                meta: object_meta(&metadata, Some(checksum_sha256(&data))),
                data,
                range: None,
            }));
        };

        let size = metadata.len();
        let resolved = range
            .resolve(size)
            .ok_or_else(|| StorageError::RangeNotSatisfiable {
                key: key.to_string(),
                size,
            })?;
        let len = usize::try_from(resolved.length).map_err(|_| {
            StorageError::InvalidKey(format!(
                "range of {} bytes exceeds platform address space",
                resolved.length
            ))
        })?;

        file.seek(std::io::SeekFrom::Start(resolved.offset)).await?;
        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf).await?;

        Ok(Some(StoredObject {
            meta: object_meta(&metadata, None),
            data: Bytes::from(buf),
            range: Some(resolved),
        }))
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn head(&self, key: &str) -> StorageResult<Option<ObjectMeta>> {
        let path = self.key_path(key).await?;
        match fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => Ok(Some(object_meta(&metadata, None))),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    #[instrument(skip(self, data), fields(backend = "filesystem", size = data.len()))]
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        _content_type: Option<&str>,
    ) -> StorageResult<ObjectMeta> {
        let path = self.key_path(key).await?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Unique temp name so concurrent writers to one key don't collide.
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp_path = path.with_file_name(format!("{file_name}.tmp.{}", Uuid::new_v4()));
        {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
        }
        fs::rename(&temp_path, &path).await?;

        let metadata = fs::metadata(&path).await?;
        Ok(object_meta(&metadata, Some(checksum_sha256(&data))))
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }

    async fn health_check(&self) -> StorageResult<()> {
        let metadata = fs::metadata(&self.root).await?;
        if !metadata.is_dir() {
            return Err(StorageError::Config(format!(
                "storage root is not a directory: {}",
                self.root.display()
            )));
        }
        Ok(())
    }
}
