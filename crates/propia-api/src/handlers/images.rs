//! Batch image upload handler.

use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use propia_core::AppError;
use propia_processing::UploadItem;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::HttpAppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UploadErrorEntry {
    pub code: String,
    pub message: String,
}

/// One entry per uploaded file, in the order the files were sent.
#[derive(Debug, Serialize)]
pub struct UploadResultEntry {
    pub filename: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deduplicated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<UploadErrorEntry>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub results: Vec<UploadResultEntry>,
    /// URLs of successfully stored images. When `main_image_name` matches one
    /// of them, that URL is moved to the front.
    pub urls: Vec<String>,
    pub succeeded: usize,
    pub failed: usize,
}

/// Upload property images
///
/// Accepts a multipart form with one or more image files plus an optional
/// `main_image_name` text field. Each file is normalized, deduplicated, and
/// stored; one file failing never fails the others.
///
/// # Returns
/// `200 OK` with per-item outcomes as long as at least one file stored.
/// When every file failed, the first failure decides the response status.
///
/// # Errors
/// - `AppError::BadRequest` - No files, or too many files
/// - `AppError::UnsupportedMediaType` - A part is not an image
/// - `AppError::PayloadTooLarge` - A file exceeds the size limit
#[tracing::instrument(skip(state, multipart), fields(operation = "upload_images"))]
pub async fn upload_images(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Response, HttpAppError> {
    let max_files = state.config.max_files_per_request;
    let max_bytes = state.config.max_file_size_bytes;

    let mut items: Vec<UploadItem> = Vec::new();
    let mut main_image_name: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Malformed multipart body: {}", e)))?
    {
        let field_name = field.name().unwrap_or_default().to_string();

        if field_name == "main_image_name" {
            let value = field
                .text()
                .await
                .map_err(|e| AppError::InvalidInput(format!("Invalid main_image_name: {}", e)))?;
            main_image_name = Some(value);
            continue;
        }

        let Some(filename) = field.file_name().map(ToString::to_string) else {
            // Unknown text fields are ignored
            continue;
        };

        if items.len() >= max_files {
            return Err(AppError::BadRequest(format!(
                "Too many files: at most {} per request",
                max_files
            ))
            .into());
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        if !content_type.starts_with("image/") {
            return Err(AppError::UnsupportedMediaType(format!(
                "{} ({})",
                filename,
                if content_type.is_empty() {
                    "missing content type"
                } else {
                    &content_type
                }
            ))
            .into());
        }

        let data = field.bytes().await.map_err(|e| {
            AppError::InvalidInput(format!("Failed to read file {}: {}", filename, e))
        })?;

        if data.len() > max_bytes {
            return Err(AppError::PayloadTooLarge(format!(
                "{} is {} bytes, limit is {}",
                filename,
                data.len(),
                max_bytes
            ))
            .into());
        }

        items.push(UploadItem {
            data,
            media_type: content_type,
            original_filename: filename,
        });
    }

    if items.is_empty() {
        return Err(AppError::BadRequest("No image files in request".to_string()).into());
    }

    tracing::info!(files = items.len(), "Accepted upload batch");

    let batch = state
        .pipeline
        .process_batch(items, CancellationToken::new())
        .await;

    // A batch with zero successes answers with the first item's error
    if batch.succeeded() == 0 {
        if let Some(first_err) = batch.outcomes.iter().find_map(|o| o.result.as_ref().err()) {
            return Err(pipeline_error_to_app(first_err).into());
        }
    }

    let mut results = Vec::with_capacity(batch.outcomes.len());
    let mut urls = Vec::new();

    for outcome in &batch.outcomes {
        match &outcome.result {
            Ok(stored) => {
                // Main image goes first in the URL list
                if main_image_name.as_deref() == Some(outcome.original_filename.as_str()) {
                    urls.insert(0, stored.url.clone());
                } else {
                    urls.push(stored.url.clone());
                }
                results.push(UploadResultEntry {
                    filename: outcome.original_filename.clone(),
                    status: "stored",
                    url: Some(stored.url.clone()),
                    key: Some(stored.key.clone()),
                    deduplicated: Some(stored.deduplicated),
                    error: None,
                });
            }
            Err(e) => {
                results.push(UploadResultEntry {
                    filename: outcome.original_filename.clone(),
                    status: "failed",
                    url: None,
                    key: None,
                    deduplicated: None,
                    error: Some(UploadErrorEntry {
                        code: e.code().to_string(),
                        message: e.to_string(),
                    }),
                });
            }
        }
    }

    let response = UploadResponse {
        succeeded: batch.succeeded(),
        failed: batch.failed(),
        results,
        urls,
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}

fn pipeline_error_to_app(err: &propia_processing::PipelineError) -> AppError {
    use propia_processing::PipelineError;
    match err {
        PipelineError::UnsupportedMediaType(t) => AppError::UnsupportedMediaType(t.clone()),
        PipelineError::Decode(msg) => AppError::ImageProcessing(msg.clone()),
        PipelineError::Storage(e) => AppError::Storage(e.to_string()),
        PipelineError::Cancelled => AppError::Internal("Processing cancelled".to_string()),
        PipelineError::Internal(msg) => AppError::Internal(msg.clone()),
    }
}
