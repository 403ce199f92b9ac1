//! Pipeline error taxonomy.
//!
//! Failures are per-item: one item's error never aborts its siblings in a
//! batch. The orchestrator reports them in the batch outcome instead of
//! raising.

use propia_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Declared media type is not one the pipeline accepts.
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// Image data could not be decoded (corrupt or truncated input).
    #[error("Image decode failed: {0}")]
    Decode(String),

    /// Remote store fault during existence check or upload.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The batch was cancelled before this item was processed.
    #[error("Processing cancelled")]
    Cancelled,

    /// Encoder or task failure that is not attributable to the input.
    #[error("Internal pipeline error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Machine-readable code for per-item failure reporting.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::UnsupportedMediaType(_) => "UNSUPPORTED_MEDIA_TYPE",
            PipelineError::Decode(_) => "DECODE_ERROR",
            PipelineError::Storage(_) => "STORAGE_ERROR",
            PipelineError::Cancelled => "CANCELLED",
            PipelineError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
