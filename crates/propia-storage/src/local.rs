use crate::traits::{validate_key, Storage, StorageError, StorageResult};
use async_trait::async_trait;
use propia_core::StorageBackend;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Local filesystem storage implementation
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for file storage (e.g., "/var/lib/propia/media")
    /// * `base_url` - Base URL for serving files (e.g., "http://localhost:4000/media")
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            base_url,
        })
    }

    /// Convert storage key to filesystem path, rejecting traversal sequences.
    fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(self.base_path.join(key))
    }

    /// Generate public URL for file
    fn generate_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn head(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.key_to_path(key)?;
        if fs::try_exists(&path).await.unwrap_or(false) {
            Ok(Some(self.generate_url(key)))
        } else {
            Ok(None)
        }
    }

    async fn put_if_absent(
        &self,
        key: &str,
        _content_type: &str,
        data: Vec<u8>,
    ) -> StorageResult<String> {
        let path = self.key_to_path(key)?;
        let size = data.len();

        self.ensure_parent_dir(&path).await?;

        let start = std::time::Instant::now();

        // create_new fails with AlreadyExists if the object is present, which
        // under content addressing means identical bytes are already stored.
        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await;

        match file {
            Ok(mut file) => {
                file.write_all(&data).await.map_err(|e| {
                    StorageError::UploadFailed(format!(
                        "Failed to write file {}: {}",
                        path.display(),
                        e
                    ))
                })?;

                file.sync_all().await.map_err(|e| {
                    StorageError::UploadFailed(format!(
                        "Failed to sync file {}: {}",
                        path.display(),
                        e
                    ))
                })?;

                tracing::info!(
                    path = %path.display(),
                    key = %key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Local storage upload successful"
                );
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                tracing::info!(
                    path = %path.display(),
                    key = %key,
                    "Local object already exists, upload skipped"
                );
            }
            Err(e) => {
                return Err(StorageError::UploadFailed(format!(
                    "Failed to create file {}: {}",
                    path.display(),
                    e
                )));
            }
        }

        Ok(self.generate_url(key))
    }

    async fn download(&self, key: &str) -> StorageResult<Vec<u8>> {
        let path = self.key_to_path(key)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(key.to_string()));
        }

        let data = fs::read(&path).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to read file {}: {}", path.display(), e))
        })?;

        Ok(data)
    }

    fn url_for(&self, key: &str) -> String {
        self.generate_url(key)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_local_storage_upload_download() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "http://localhost:4000/media".to_string())
            .await
            .unwrap();

        let data = b"test data".to_vec();

        let url = storage
            .put_if_absent("properties/abc.webp", "image/webp", data.clone())
            .await
            .unwrap();

        assert!(url.ends_with("properties/abc.webp"));

        let downloaded = storage.download("properties/abc.webp").await.unwrap();
        assert_eq!(data, downloaded);
    }

    #[tokio::test]
    async fn test_put_if_absent_does_not_overwrite() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "http://localhost:4000/media".to_string())
            .await
            .unwrap();

        let first = b"first write".to_vec();
        let url1 = storage
            .put_if_absent("properties/dup.webp", "image/webp", first.clone())
            .await
            .unwrap();

        // Second write with the same key succeeds but leaves the stored
        // content untouched.
        let url2 = storage
            .put_if_absent("properties/dup.webp", "image/webp", b"second write".to_vec())
            .await
            .unwrap();

        assert_eq!(url1, url2);
        let stored = storage.download("properties/dup.webp").await.unwrap();
        assert_eq!(stored, first);
    }

    #[tokio::test]
    async fn test_head() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "http://localhost:4000/media".to_string())
            .await
            .unwrap();

        assert_eq!(storage.head("properties/missing.webp").await.unwrap(), None);

        storage
            .put_if_absent("properties/here.webp", "image/webp", b"x".to_vec())
            .await
            .unwrap();

        let url = storage.head("properties/here.webp").await.unwrap();
        assert_eq!(
            url,
            Some("http://localhost:4000/media/properties/here.webp".to_string())
        );
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "http://localhost:4000/media".to_string())
            .await
            .unwrap();

        let result = storage.download("../../../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage
            .put_if_absent("/etc/cron.d/evil", "text/plain", b"x".to_vec())
            .await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }
}
