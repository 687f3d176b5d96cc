//! Classification service client
//!
//! One call per uploaded file: `POST {base}/predict` for classify scans and
//! `POST {base}/metadata` for metadata scans, multipart body with the file as
//! the `image` part.

use crate::services::storage::FileItem;
use async_trait::async_trait;
use docscan_common::{ItemResult, ScanType};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("docscan-gateway/", env!("CARGO_PKG_VERSION"));

/// Classification call errors
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Service returned {0}: {1}")]
    Status(u16, String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Failed to read upload: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

/// Response body of the classification service
///
/// Only the fields the gateway forwards are modeled; the service sends more
/// (e.g. `model_based`) which are ignored. Values are kept as raw JSON and
/// forwarded unchanged, whatever their type. Absent fields are `null`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ClassifierResponse {
    /// Model label (classify endpoint)
    #[serde(default)]
    pub label: Value,

    /// Label inferred from the filename (metadata endpoint)
    #[serde(default)]
    pub file_based: Value,

    #[serde(default)]
    pub metadata: Value,
}

impl ClassifierResponse {
    /// The label relevant for `scan_type`
    pub fn label_for(&self, scan_type: ScanType) -> &Value {
        match scan_type {
            ScanType::Classify => &self.label,
            ScanType::Metadata => &self.file_based,
        }
    }

    /// Shape the response as the result row for `filename`
    ///
    /// A missing or `null` metadata becomes an empty object.
    pub fn into_item_result(self, scan_type: ScanType, filename: &str) -> ItemResult {
        let label = self.label_for(scan_type).clone();
        let metadata = match self.metadata {
            Value::Null => Value::Object(serde_json::Map::new()),
            other => other,
        };
        ItemResult::new(scan_type, filename, label, metadata)
    }
}

/// Classifies a single file
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(
        &self,
        scan_type: ScanType,
        item: &FileItem,
    ) -> Result<ClassifierResponse, ClassifierError>;
}

/// reqwest-backed [`Classifier`]
pub struct HttpClassifier {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpClassifier {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClassifierError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ClassifierError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self, scan_type: ScanType) -> String {
        format!("{}{}", self.base_url, scan_type.endpoint_path())
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(
        &self,
        scan_type: ScanType,
        item: &FileItem,
    ) -> Result<ClassifierResponse, ClassifierError> {
        let bytes = item.read().await?;

        let mut part = reqwest::multipart::Part::bytes(bytes).file_name(item.filename().to_string());
        if let Some(content_type) = item.content_type() {
            part = part
                .mime_str(content_type)
                .map_err(|e| ClassifierError::Decode(e.to_string()))?;
        }
        let form = reqwest::multipart::Form::new().part("image", part);

        let url = self.endpoint(scan_type);
        tracing::debug!(url = %url, filename = item.filename(), "Calling classification service");

        let response = self
            .http_client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ClassifierError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ClassifierError::Status(status.as_u16(), error_text));
        }

        response
            .json::<ClassifierResponse>()
            .await
            .map_err(|e| ClassifierError::Decode(e.to_string()))
    }
}
