//! Router assembly.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Json, Router,
};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    // Whole-request cap: every file at the limit plus form overhead
    let body_limit = state.config.max_file_size_bytes * state.config.max_files_per_request
        + 1024 * 1024;

    Router::new()
        .route("/health", get(health))
        .route("/api/v0/images", post(handlers::images::upload_images))
        .route("/api/v0/rates/uf", get(handlers::rates::current_uf))
        .route("/api/v0/rates/convert", get(handlers::rates::convert))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
