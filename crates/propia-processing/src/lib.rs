//! Propia image ingestion pipeline
//!
//! Accepts a batch of raw uploaded images, normalizes each one (orientation,
//! maximum dimension, codec selection), deduplicates by content hash against
//! a remote object store, and uploads missing content under a deterministic
//! identifier with bounded concurrency.
//!
//! The pipeline is a library: the surrounding HTTP layer enforces per-request
//! caps and maps outcomes to responses.

pub mod batch;
pub mod dedup;
pub mod error;
pub mod hash;
pub mod image;
pub mod types;

// Re-export commonly used types
pub use batch::{BatchResult, ImagePipeline, ItemOutcome, PipelineConfig};
pub use dedup::ContentStore;
pub use error::PipelineError;
pub use self::image::normalizer::{Normalizer, NormalizerConfig};
pub use types::{ImageCodec, MediaType, ProcessedImage, StoredObjectRef, UploadItem};
