//! HTTP API handlers for docscan-gateway
//!
//! - `GET /ws`: result channel (WebSocket)
//! - `POST /upload`: submit files for scanning
//! - `POST /pii`: PII scan bridge
//! - `GET /health`: health check

pub mod channel;
pub mod health;
pub mod pii;
pub mod upload;

pub use channel::channel_routes;
pub use health::health_routes;
pub use pii::pii_routes;
pub use upload::upload_routes;

use crate::error::ApiError;
use axum::http::Uri;

/// Fallback for unknown routes
pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(uri.path().to_string())
}
