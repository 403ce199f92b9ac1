//! Propia API Library
//!
//! HTTP surface for the property image pipeline: multipart upload acceptance,
//! per-item result reporting, and the UF rate endpoints.

mod handlers;
pub mod error;
pub mod routes;
pub mod services;
pub mod state;
pub mod telemetry;

// Re-exports
pub use error::ErrorResponse;
pub use routes::build_router;
pub use state::AppState;
