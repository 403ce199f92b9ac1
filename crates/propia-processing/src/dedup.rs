//! Content-addressed storage with upload deduplication.

use crate::error::PipelineError;
use crate::hash::content_digest;
use crate::types::{ProcessedImage, StoredObjectRef};
use propia_storage::Storage;
use std::sync::Arc;

/// Stores normalized images under their content digest.
///
/// Identical pixels always land on the same key, so re-uploading an image
/// that already exists costs one existence check and no transfer.
pub struct ContentStore {
    storage: Arc<dyn Storage>,
    prefix: String,
}

impl ContentStore {
    pub fn new(storage: Arc<dyn Storage>, prefix: impl Into<String>) -> Self {
        Self {
            storage,
            prefix: prefix.into(),
        }
    }

    /// Deterministic key for a digest: `{prefix}/{digest}.{ext}`.
    fn key_for(&self, digest: &str, image: &ProcessedImage) -> String {
        format!("{}/{}.{}", self.prefix, digest, image.codec.extension())
    }

    /// Store a normalized image, skipping the upload when the key exists.
    ///
    /// The digest covers the normalized bytes, so the same source uploaded
    /// twice (or two sources that normalize identically) store one object.
    pub async fn store(&self, image: &ProcessedImage) -> Result<StoredObjectRef, PipelineError> {
        let digest = content_digest(&image.data);
        let key = self.key_for(&digest, image);

        if let Some(url) = self.storage.head(&key).await? {
            tracing::debug!(key = %key, "Content already stored, skipping upload");
            return Ok(StoredObjectRef {
                key,
                url,
                deduplicated: true,
            });
        }

        let url = self
            .storage
            .put_if_absent(&key, image.codec.mime_type(), image.data.to_vec())
            .await?;

        tracing::debug!(key = %key, bytes = image.data.len(), "Uploaded new content");

        Ok(StoredObjectRef {
            key,
            url,
            deduplicated: false,
        })
    }
}
