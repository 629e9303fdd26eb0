//! Filesystem-backed blob storage for uploaded course materials.
//!
//! Materials are uploaded by the API surface and later read back by the
//! ingestion pipeline for text extraction. Paths stored in the database are
//! relative to the configured base directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use studia_core::{BlobStore, Error, Result};

/// Blob store rooted at a local directory.
pub struct FilesystemBlobStore {
    base_path: PathBuf,
}

impl FilesystemBlobStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Create from the `STUDIA_BLOB_DIR` environment variable.
    pub fn from_env() -> Self {
        let base = std::env::var("STUDIA_BLOB_DIR").unwrap_or_else(|_| "./data/blobs".to_string());
        Self::new(base)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Resolve a stored relative path against the base directory.
    ///
    /// Rejects absolute paths and parent-directory components so a corrupted
    /// database row cannot read outside the blob root.
    fn full_path(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(Error::Storage(format!("invalid blob path: {}", path)));
        }
        Ok(self.base_path.join(relative))
    }

    /// Verify the base directory is writable by round-tripping a probe file.
    pub async fn validate(&self) -> Result<()> {
        let probe_dir = self.base_path.join(".validate");
        let probe = probe_dir.join(Uuid::new_v4().to_string());

        fs::create_dir_all(&probe_dir)
            .await
            .map_err(|e| Error::Storage(format!("blob dir not creatable: {}", e)))?;
        fs::write(&probe, b"ok")
            .await
            .map_err(|e| Error::Storage(format!("blob dir not writable: {}", e)))?;
        let read_back = fs::read(&probe)
            .await
            .map_err(|e| Error::Storage(format!("blob dir not readable: {}", e)))?;
        fs::remove_file(&probe).await.ok();
        let _ = fs::remove_dir(&probe_dir).await;

        if read_back != b"ok" {
            return Err(Error::Storage("blob dir round-trip mismatch".to_string()));
        }
        Ok(())
    }

    /// Write a blob atomically (temp file + rename) and return nothing; the
    /// caller owns recording the path in the database.
    pub async fn store(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.full_path(path)?;
        debug!(
            subsystem = "storage",
            blob_path = %path,
            byte_size = data.len(),
            "Writing blob"
        );

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let temp_path = full_path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &full_path).await.map_err(|e| {
            warn!(
                from = %temp_path.display(),
                to = %full_path.display(),
                error = %e,
                "Blob rename failed"
            );
            Error::Io(e)
        })?;

        Ok(())
    }

    /// Remove a blob if present.
    pub async fn delete(&self, path: &str) -> Result<()> {
        let full_path = self.full_path(path)?;
        if fs::try_exists(&full_path).await? {
            fs::remove_file(full_path).await?;
        }
        Ok(())
    }
}

/// Relative storage path for a new material blob, sharded by id prefix to
/// keep directory fan-out bounded.
pub fn generate_blob_path(id: &Uuid, file_name: &str) -> String {
    let hex = id.simple().to_string();
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("bin");
    format!("{}/{}/{}.{}", &hex[0..2], &hex[2..4], hex, extension)
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.full_path(path)?;
        fs::read(&full_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound(format!("blob not found: {}", path))
            } else {
                Error::Io(e)
            }
        })
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let full_path = self.full_path(path)?;
        Ok(fs::try_exists(full_path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_and_download_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemBlobStore::new(dir.path());

        store.store("ab/cd/abcd.pdf", b"%PDF-1.7 content").await.unwrap();
        let data = store.download("ab/cd/abcd.pdf").await.unwrap();
        assert_eq!(data, b"%PDF-1.7 content");
        assert!(store.exists("ab/cd/abcd.pdf").await.unwrap());
    }

    #[tokio::test]
    async fn test_download_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemBlobStore::new(dir.path());

        let result = store.download("no/such/blob.pdf").await;
        assert!(matches!(result, Err(Error::NotFound(_))));
        assert!(!store.exists("no/such/blob.pdf").await.unwrap());
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemBlobStore::new(dir.path());

        assert!(matches!(
            store.download("../etc/passwd").await,
            Err(Error::Storage(_))
        ));
        assert!(matches!(
            store.download("/etc/passwd").await,
            Err(Error::Storage(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemBlobStore::new(dir.path());

        store.store("x/y/z.txt", b"bytes").await.unwrap();
        store.delete("x/y/z.txt").await.unwrap();
        store.delete("x/y/z.txt").await.unwrap();
        assert!(!store.exists("x/y/z.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_validate_in_writable_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemBlobStore::new(dir.path());
        store.validate().await.unwrap();
    }

    #[test]
    fn test_generate_blob_path_shards_by_id() {
        let id = Uuid::parse_str("a1b2c3d4-0000-0000-0000-000000000000").unwrap();
        let path = generate_blob_path(&id, "Lecture Notes.pdf");
        assert!(path.starts_with("a1/b2/"));
        assert!(path.ends_with(".pdf"));
    }

    #[test]
    fn test_generate_blob_path_missing_extension() {
        let id = Uuid::new_v4();
        let path = generate_blob_path(&id, "README");
        assert!(path.ends_with(".bin"));
    }
}
