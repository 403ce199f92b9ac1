//! End-to-end pipeline tests against an instrumented in-memory store.

use async_trait::async_trait;
use bytes::Bytes;
use propia_core::StorageBackend;
use propia_processing::{ImagePipeline, PipelineConfig, UploadItem};
use propia_storage::{InMemoryStorage, Storage, StorageResult};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Wraps a real backend and records the highest number of concurrently
/// in-flight storage calls.
struct GaugedStorage {
    inner: InMemoryStorage,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl GaugedStorage {
    fn new() -> Self {
        Self {
            inner: InMemoryStorage::default(),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    fn max_observed(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self) {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        // Hold the slot long enough for other workers to overlap
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    fn exit(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Storage for GaugedStorage {
    async fn head(&self, key: &str) -> StorageResult<Option<String>> {
        self.enter().await;
        let result = self.inner.head(key).await;
        self.exit();
        result
    }

    async fn put_if_absent(
        &self,
        key: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> StorageResult<String> {
        self.enter().await;
        let result = self.inner.put_if_absent(key, content_type, data).await;
        self.exit();
        result
    }

    async fn download(&self, key: &str) -> StorageResult<Vec<u8>> {
        self.inner.download(key).await
    }

    fn url_for(&self, key: &str) -> String {
        self.inner.url_for(key)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}

fn png_item(name: &str, shade: u8) -> UploadItem {
    let img = image::RgbaImage::from_pixel(24, 24, image::Rgba([shade, 0, 255 - shade, 255]));
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
        .unwrap();
    UploadItem {
        data: Bytes::from(buffer),
        media_type: "image/png".to_string(),
        original_filename: name.to_string(),
    }
}

#[tokio::test]
async fn concurrency_stays_within_worker_width() {
    let storage = Arc::new(GaugedStorage::new());
    let pipeline = Arc::new(ImagePipeline::new(
        storage.clone(),
        PipelineConfig::default(),
    ));

    // 20 distinct small images, each already within limits
    let items: Vec<_> = (0..20)
        .map(|i| png_item(&format!("img-{}.png", i), (i * 12) as u8))
        .collect();

    let result = pipeline.process_batch(items, CancellationToken::new()).await;

    assert_eq!(result.succeeded(), 20);
    assert!(storage.max_observed() >= 2, "workers never overlapped");
    assert!(
        storage.max_observed() <= 4,
        "worker width exceeded: {}",
        storage.max_observed()
    );
}

#[tokio::test]
async fn narrow_pool_is_respected() {
    let storage = Arc::new(GaugedStorage::new());
    let pipeline = Arc::new(ImagePipeline::new(
        storage.clone(),
        PipelineConfig {
            workers: 2,
            ..PipelineConfig::default()
        },
    ));

    let items: Vec<_> = (0..8)
        .map(|i| png_item(&format!("img-{}.png", i), (i * 30) as u8))
        .collect();

    let result = pipeline.process_batch(items, CancellationToken::new()).await;

    assert_eq!(result.succeeded(), 8);
    assert!(storage.max_observed() <= 2);
}

#[tokio::test]
async fn stored_urls_are_resolvable() {
    let storage = Arc::new(InMemoryStorage::default());
    let pipeline = Arc::new(ImagePipeline::new(
        storage.clone(),
        PipelineConfig::default(),
    ));

    let result = pipeline
        .process_batch(vec![png_item("kitchen.png", 80)], CancellationToken::new())
        .await;

    let stored = result.outcomes[0].result.as_ref().unwrap();
    assert!(stored.url.ends_with(&stored.key));

    let bytes = storage.download(&stored.key).await.unwrap();
    assert!(!bytes.is_empty());
}
