//! Shared application state.

use crate::services::rates::RateCache;
use propia_core::Config;
use propia_processing::{ImagePipeline, NormalizerConfig, PipelineConfig};
use propia_storage::{create_storage, Storage};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub storage: Arc<dyn Storage>,
    pub pipeline: Arc<ImagePipeline>,
    pub rates: Arc<RateCache>,
}

impl AppState {
    pub async fn build(config: Config) -> Result<Arc<Self>, anyhow::Error> {
        let storage = create_storage(&config).await?;

        let pipeline = Arc::new(ImagePipeline::new(
            storage.clone(),
            PipelineConfig {
                workers: config.pipeline_workers,
                normalizer: NormalizerConfig {
                    max_dimension: config.image_max_dimension,
                    small_file_bytes: config.image_small_file_bytes,
                },
                media_prefix: config.media_prefix.clone(),
            },
        ));

        let rates = Arc::new(RateCache::from_config(&config)?);

        Ok(Arc::new(Self {
            config,
            storage,
            pipeline,
            rates,
        }))
    }
}
