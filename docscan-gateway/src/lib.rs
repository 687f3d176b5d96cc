//! docscan-gateway library interface
//!
//! Accepts file uploads, classifies them in batches through the
//! classification service and streams each batch's results to the client's
//! WebSocket channel as soon as the batch settles.

pub mod api;
pub mod error;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use crate::services::{
    BatchDispatcher, ChannelRegistry, Classifier, HttpClassifier, InMemoryChannelRegistry,
    PiiClient, UploadCoordinator, UploadStore,
};
use axum::Router;
use chrono::{DateTime, Utc};
use docscan_common::config::GatewayConfig;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Request id → channel mapping shared by channels and uploads
    pub registry: Arc<dyn ChannelRegistry>,
    /// Upload pipeline
    pub coordinator: UploadCoordinator,
    /// Temporary storage for uploaded files
    pub uploads: UploadStore,
    /// PII service client
    pub pii: PiiClient,
    /// Outbound messages buffered per channel
    pub channel_capacity: usize,
    /// Largest accepted upload body
    pub max_upload_bytes: usize,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Wire the state from its parts
    pub fn new(
        config: &GatewayConfig,
        registry: Arc<dyn ChannelRegistry>,
        classifier: Arc<dyn Classifier>,
        pii: PiiClient,
    ) -> Self {
        let dispatcher = BatchDispatcher::new(classifier, config.request_timeout());
        let coordinator =
            UploadCoordinator::new(Arc::clone(&registry), dispatcher, config.batch_size)
                .with_send_timeout(config.send_timeout());

        Self {
            registry,
            coordinator,
            uploads: UploadStore::new(&config.upload_dir),
            pii,
            channel_capacity: config.channel_capacity,
            max_upload_bytes: config.max_upload_bytes,
            startup_time: Utc::now(),
        }
    }

    /// Production wiring: in-memory registry and HTTP clients
    pub fn from_config(config: &GatewayConfig) -> anyhow::Result<Self> {
        let registry: Arc<dyn ChannelRegistry> = Arc::new(InMemoryChannelRegistry::new());
        let classifier: Arc<dyn Classifier> = Arc::new(HttpClassifier::new(&config.classifier_url)?);
        let pii = PiiClient::new(&config.pii_service_url, config.pii_timeout())?;
        Ok(Self::new(config, registry, classifier, pii))
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::channel_routes())
        .merge(api::upload_routes(state.max_upload_bytes))
        .merge(api::pii_routes())
        .merge(api::health_routes())
        .fallback(api::not_found)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
