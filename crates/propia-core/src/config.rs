//! Configuration module
//!
//! Environment-driven configuration for the API and the image pipeline.
//! Defaults are chosen for development; production deployments override
//! them in the environment (or a `.env` file loaded via dotenvy).

use std::env;

use crate::storage_types::StorageBackend;

// Defaults
const MAX_FILE_SIZE_MB: usize = 15;
const MAX_FILES_PER_REQUEST: usize = 40;
const IMAGE_MAX_DIMENSION: u32 = 1920;
const IMAGE_SMALL_FILE_KIB: usize = 200;
const PIPELINE_WORKERS: usize = 4;
const UF_CACHE_MINUTES: u64 = 60;
const UF_SOURCE_URL: &str = "https://mindicador.cl/api/uf";
const MEDIA_PREFIX: &str = "properties";

/// Application configuration, shared across crates.
#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub environment: String,

    // Storage configuration
    pub storage_backend: StorageBackend,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    /// Custom endpoint for S3-compatible providers (MinIO, DigitalOcean Spaces, ...)
    pub s3_endpoint: Option<String>,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    /// Logical namespace (key prefix) for property images
    pub media_prefix: String,

    // Upload acceptance caps, enforced before the pipeline runs
    pub max_file_size_bytes: usize,
    pub max_files_per_request: usize,

    // Image pipeline configuration
    pub image_max_dimension: u32,
    pub image_small_file_bytes: usize,
    pub pipeline_workers: usize,

    // UF rate cache configuration
    pub uf_cache_minutes: u64,
    /// Fixed UF value override (Chilean locale accepted, e.g. "36.123,45")
    pub uf_fixed_value: Option<String>,
    pub uf_source_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let storage_backend = env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "local".to_string())
            .parse::<StorageBackend>()
            .map_err(|e| anyhow::anyhow!(e))?;

        let is_production =
            environment.to_lowercase() == "production" || environment.to_lowercase() == "prod";
        if is_production && storage_backend == StorageBackend::Memory {
            return Err(anyhow::anyhow!(
                "STORAGE_BACKEND cannot be 'memory' in production."
            ));
        }

        let max_file_size_mb = env::var("MAX_FILE_SIZE_MB")
            .unwrap_or_else(|_| MAX_FILE_SIZE_MB.to_string())
            .parse::<usize>()
            .unwrap_or(MAX_FILE_SIZE_MB);

        let image_small_file_kib = env::var("IMAGE_SMALL_FILE_KIB")
            .unwrap_or_else(|_| IMAGE_SMALL_FILE_KIB.to_string())
            .parse::<usize>()
            .unwrap_or(IMAGE_SMALL_FILE_KIB);

        Ok(Config {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| "4000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            environment,
            storage_backend,
            s3_bucket: env::var("S3_BUCKET").ok(),
            s3_region: env::var("S3_REGION").ok().or(env::var("AWS_REGION").ok()),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            local_storage_path: env::var("LOCAL_STORAGE_PATH").ok(),
            local_storage_base_url: env::var("LOCAL_STORAGE_BASE_URL").ok(),
            media_prefix: env::var("MEDIA_PREFIX").unwrap_or_else(|_| MEDIA_PREFIX.to_string()),
            max_file_size_bytes: max_file_size_mb * 1024 * 1024,
            max_files_per_request: env::var("MAX_FILES_PER_REQUEST")
                .unwrap_or_else(|_| MAX_FILES_PER_REQUEST.to_string())
                .parse()
                .unwrap_or(MAX_FILES_PER_REQUEST),
            image_max_dimension: env::var("IMAGE_MAX_DIMENSION")
                .unwrap_or_else(|_| IMAGE_MAX_DIMENSION.to_string())
                .parse()
                .unwrap_or(IMAGE_MAX_DIMENSION),
            image_small_file_bytes: image_small_file_kib * 1024,
            pipeline_workers: env::var("PIPELINE_WORKERS")
                .unwrap_or_else(|_| PIPELINE_WORKERS.to_string())
                .parse()
                .unwrap_or(PIPELINE_WORKERS)
                .max(1),
            uf_cache_minutes: env::var("UF_CACHE_MINUTES")
                .unwrap_or_else(|_| UF_CACHE_MINUTES.to_string())
                .parse()
                .unwrap_or(UF_CACHE_MINUTES),
            uf_fixed_value: env::var("UF_FIXED_VALUE").ok(),
            uf_source_url: env::var("UF_SOURCE_URL").unwrap_or_else(|_| UF_SOURCE_URL.to_string()),
        })
    }

    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }
}

impl Default for Config {
    /// Development defaults without touching the process environment; used by tests.
    fn default() -> Self {
        Config {
            server_port: 4000,
            environment: "development".to_string(),
            storage_backend: StorageBackend::Memory,
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
            local_storage_path: None,
            local_storage_base_url: None,
            media_prefix: MEDIA_PREFIX.to_string(),
            max_file_size_bytes: MAX_FILE_SIZE_MB * 1024 * 1024,
            max_files_per_request: MAX_FILES_PER_REQUEST,
            image_max_dimension: IMAGE_MAX_DIMENSION,
            image_small_file_bytes: IMAGE_SMALL_FILE_KIB * 1024,
            pipeline_workers: PIPELINE_WORKERS,
            uf_cache_minutes: UF_CACHE_MINUTES,
            uf_fixed_value: None,
            uf_source_url: UF_SOURCE_URL.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_caps() {
        let config = Config::default();
        assert_eq!(config.max_file_size_bytes, 15 * 1024 * 1024);
        assert_eq!(config.max_files_per_request, 40);
        assert_eq!(config.image_max_dimension, 1920);
        assert_eq!(config.image_small_file_bytes, 200 * 1024);
        assert_eq!(config.pipeline_workers, 4);
        assert_eq!(config.media_prefix, "properties");
    }

    #[test]
    fn test_is_production() {
        let mut config = Config::default();
        assert!(!config.is_production());
        config.environment = "Production".to_string();
        assert!(config.is_production());
    }
}
