//! PII scanning service client
//!
//! Forwards database scan requests to the PII service and hands its JSON back
//! unchanged.

use serde::Serialize;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// PII service errors
#[derive(Debug, Error)]
pub enum PiiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("PII service returned {0}: {1}")]
    Status(u16, String),

    #[error("Decode error: {0}")]
    Decode(String),
}

/// Kind of PII scan requested by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PiiScanKind {
    /// Classify column metadata only (`pii-meta`)
    Metadata,
    /// Scan every table (`pii-full`)
    Full,
    /// Scan a single table (`pii-table`)
    Table,
}

impl FromStr for PiiScanKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pii-meta" => Ok(PiiScanKind::Metadata),
            "pii-full" => Ok(PiiScanKind::Full),
            "pii-table" => Ok(PiiScanKind::Table),
            other => Err(format!("Invalid PII scan type '{}'", other)),
        }
    }
}

impl PiiScanKind {
    pub fn endpoint_path(&self) -> &'static str {
        match self {
            PiiScanKind::Metadata => "/metadata-classify",
            PiiScanKind::Full => "/full-pii-scan",
            PiiScanKind::Table => "/table-pii-scan",
        }
    }
}

/// Body sent to the PII service
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PiiServiceRequest {
    pub conn_string: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
}

/// reqwest-backed PII service client
#[derive(Clone)]
pub struct PiiClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl PiiClient {
    /// Client for `base_url`; `timeout` of `None` lets scans run as long as
    /// the service takes
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, PiiError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder
            .build()
            .map_err(|e| PiiError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub async fn scan(
        &self,
        kind: PiiScanKind,
        request: &PiiServiceRequest,
    ) -> Result<serde_json::Value, PiiError> {
        let url = format!("{}{}", self.base_url, kind.endpoint_path());
        tracing::debug!(url = %url, "Querying PII service");

        let response = self
            .http_client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| PiiError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PiiError::Status(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| PiiError::Decode(e.to_string()))
    }
}
