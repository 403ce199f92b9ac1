//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use async_trait::async_trait;
use propia_core::StorageBackend;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage abstraction trait
///
/// All storage backends (S3, local filesystem, in-memory) must implement this
/// trait. The pipeline works against `Arc<dyn Storage>` without coupling to a
/// specific provider.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Metadata-only existence lookup.
    ///
    /// Returns the public retrieval URL if an object exists under `key`,
    /// `None` otherwise. Never transfers object content.
    async fn head(&self, key: &str) -> StorageResult<Option<String>>;

    /// Upload `data` under `key` without overwriting existing content.
    ///
    /// If an object already exists under `key` (including a concurrent write
    /// that won the race), the call succeeds without replacing it. Returns
    /// the public retrieval URL.
    async fn put_if_absent(
        &self,
        key: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> StorageResult<String>;

    /// Download the object stored under `key`.
    async fn download(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Public retrieval URL for `key`, whether or not the object exists yet.
    fn url_for(&self, key: &str) -> String;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}

/// Reject keys that could escape the configured namespace.
pub(crate) fn validate_key(key: &str) -> StorageResult<()> {
    if key.contains("..") || key.starts_with('/') || key.is_empty() {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    Ok(())
}
