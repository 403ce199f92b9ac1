//! Batch orchestration: bounded-width worker pool over a shared queue.

use crate::dedup::ContentStore;
use crate::error::PipelineError;
use crate::image::normalizer::{normalize_async, Normalizer, NormalizerConfig};
use crate::types::{StoredObjectRef, UploadItem};
use propia_storage::Storage;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Default number of concurrent workers per batch.
pub const DEFAULT_WORKERS: usize = 4;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Upper bound on items processed concurrently within one batch.
    pub workers: usize,
    pub normalizer: NormalizerConfig,
    /// Key namespace for stored content, e.g. `properties`.
    pub media_prefix: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            normalizer: NormalizerConfig::default(),
            media_prefix: "properties".to_string(),
        }
    }
}

/// Result for one input item, tagged with its position in the input batch.
#[derive(Debug)]
pub struct ItemOutcome {
    pub index: usize,
    pub original_filename: String,
    pub result: Result<StoredObjectRef, PipelineError>,
}

/// All per-item outcomes, in input order.
#[derive(Debug)]
pub struct BatchResult {
    pub outcomes: Vec<ItemOutcome>,
}

impl BatchResult {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

/// End-to-end pipeline: normalize, dedupe, store.
///
/// One instance is shared across requests; each `process_batch` call runs
/// its own worker pool.
pub struct ImagePipeline {
    normalizer: Normalizer,
    store: Arc<ContentStore>,
    workers: usize,
}

impl ImagePipeline {
    pub fn new(storage: Arc<dyn Storage>, config: PipelineConfig) -> Self {
        Self {
            normalizer: Normalizer::new(config.normalizer),
            store: Arc::new(ContentStore::new(storage, config.media_prefix)),
            workers: config.workers.max(1),
        }
    }

    /// Process a batch of uploads with bounded concurrency.
    ///
    /// Every input item produces exactly one outcome, returned in input
    /// order. A failing item never aborts its siblings. Cancellation is
    /// observed at item boundaries: items not yet started are reported as
    /// cancelled, items in flight run to completion.
    pub async fn process_batch(
        self: &Arc<Self>,
        items: Vec<UploadItem>,
        cancel: CancellationToken,
    ) -> BatchResult {
        let total = items.len();
        if total == 0 {
            return BatchResult { outcomes: vec![] };
        }

        let queue: Arc<Mutex<VecDeque<(usize, UploadItem)>>> =
            Arc::new(Mutex::new(items.into_iter().enumerate().collect()));

        let width = self.workers.min(total);
        tracing::info!(items = total, workers = width, "Starting batch");

        let mut handles = Vec::with_capacity(width);
        for worker_id in 0..width {
            let pipeline = Arc::clone(self);
            let queue = Arc::clone(&queue);
            let cancel = cancel.clone();

            handles.push(tokio::spawn(async move {
                let mut outcomes = Vec::new();
                loop {
                    let next = {
                        let mut q = queue.lock().unwrap_or_else(|e| e.into_inner());
                        q.pop_front()
                    };
                    let Some((index, item)) = next else {
                        break;
                    };

                    if cancel.is_cancelled() {
                        outcomes.push(ItemOutcome {
                            index,
                            original_filename: item.original_filename,
                            result: Err(PipelineError::Cancelled),
                        });
                        continue;
                    }

                    let filename = item.original_filename.clone();
                    let result = pipeline.process_one(&item).await;

                    if let Err(ref e) = result {
                        tracing::warn!(
                            worker_id = worker_id,
                            index = index,
                            filename = %filename,
                            error = %e,
                            "Item failed"
                        );
                    }

                    outcomes.push(ItemOutcome {
                        index,
                        original_filename: filename,
                        result,
                    });
                }
                outcomes
            }));
        }

        let mut outcomes = Vec::with_capacity(total);
        for handle in handles {
            match handle.await {
                Ok(worker_outcomes) => outcomes.extend(worker_outcomes),
                Err(e) => {
                    // Worker panicked; its unfinished items are picked up by
                    // the surviving workers, so only log here.
                    tracing::error!(error = %e, "Batch worker terminated abnormally");
                }
            }
        }

        outcomes.sort_by_key(|o| o.index);

        let result = BatchResult { outcomes };
        tracing::info!(
            succeeded = result.succeeded(),
            failed = result.failed(),
            "Batch finished"
        );
        result
    }

    /// Normalize one item and store it under its content digest.
    pub async fn process_one(
        &self,
        item: &UploadItem,
    ) -> Result<StoredObjectRef, PipelineError> {
        let processed = normalize_async(&self.normalizer, item).await?;
        self.store.store(&processed).await
    }
}
