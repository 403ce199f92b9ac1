//! In-memory storage backend.
//!
//! Used by tests and local development. Tracks how many writes actually
//! transferred content so dedup behavior can be asserted.

use crate::traits::{validate_key, Storage, StorageError, StorageResult};
use async_trait::async_trait;
use propia_core::StorageBackend;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// In-memory storage implementation
pub struct InMemoryStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    puts: AtomicUsize,
    base_url: String,
}

impl InMemoryStorage {
    pub fn new(base_url: impl Into<String>) -> Self {
        InMemoryStorage {
            objects: Mutex::new(HashMap::new()),
            puts: AtomicUsize::new(0),
            base_url: base_url.into(),
        }
    }

    /// Number of writes that transferred content (dedup hits don't count).
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Number of distinct objects stored.
    pub fn object_count(&self) -> usize {
        self.objects.lock().expect("storage lock poisoned").len()
    }

    fn generate_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new("memory://propia")
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn head(&self, key: &str) -> StorageResult<Option<String>> {
        validate_key(key)?;
        let objects = self.objects.lock().expect("storage lock poisoned");
        Ok(objects.contains_key(key).then(|| self.generate_url(key)))
    }

    async fn put_if_absent(
        &self,
        key: &str,
        _content_type: &str,
        data: Vec<u8>,
    ) -> StorageResult<String> {
        validate_key(key)?;
        let mut objects = self.objects.lock().expect("storage lock poisoned");
        if !objects.contains_key(key) {
            objects.insert(key.to_string(), data);
            self.puts.fetch_add(1, Ordering::SeqCst);
        }
        Ok(self.generate_url(key))
    }

    async fn download(&self, key: &str) -> StorageResult<Vec<u8>> {
        validate_key(key)?;
        let objects = self.objects.lock().expect("storage lock poisoned");
        objects
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    fn url_for(&self, key: &str) -> String {
        self.generate_url(key)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_once_per_key() {
        let storage = InMemoryStorage::default();

        storage
            .put_if_absent("properties/a.webp", "image/webp", b"one".to_vec())
            .await
            .unwrap();
        storage
            .put_if_absent("properties/a.webp", "image/webp", b"two".to_vec())
            .await
            .unwrap();

        assert_eq!(storage.put_count(), 1);
        assert_eq!(storage.object_count(), 1);
        assert_eq!(
            storage.download("properties/a.webp").await.unwrap(),
            b"one".to_vec()
        );
    }

    #[tokio::test]
    async fn test_head_and_url() {
        let storage = InMemoryStorage::new("memory://test");
        assert_eq!(storage.head("properties/x.avif").await.unwrap(), None);

        storage
            .put_if_absent("properties/x.avif", "image/avif", b"x".to_vec())
            .await
            .unwrap();

        assert_eq!(
            storage.head("properties/x.avif").await.unwrap(),
            Some("memory://test/properties/x.avif".to_string())
        );
    }
}
