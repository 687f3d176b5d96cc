//! Message types exchanged over the result channel
//!
//! Shared between the gateway and its tests. Everything here serializes to the
//! JSON shapes the browser client expects:
//! - client → server: [`ChannelAnnouncement`]
//! - server → client: [`ServerMessage`] (a batch of results or the completion marker)

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Label substituted for an item whose classification call failed
pub const ERROR_LABEL: &str = "Error";

/// Client-chosen correlation token tying an upload session to a channel
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Which external scan a session runs
///
/// Fixed for the lifetime of one upload session. Selects both the outbound
/// endpoint and the shape of [`ItemResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanType {
    /// Model-based document classification
    Classify,
    /// Filename-inferred label plus file metadata
    Metadata,
}

impl ScanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanType::Classify => "classify",
            ScanType::Metadata => "metadata",
        }
    }

    /// Path of the classification service endpoint for this scan type
    pub fn endpoint_path(&self) -> &'static str {
        match self {
            ScanType::Classify => "/predict",
            ScanType::Metadata => "/metadata",
        }
    }
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "classify" => Ok(ScanType::Classify),
            "metadata" => Ok(ScanType::Metadata),
            other => Err(format!("unknown scan type '{}'", other)),
        }
    }
}

/// Result for one uploaded file, shaped by the session's scan type
///
/// `label` and `metadata` carry whatever JSON the classification service sent;
/// a missing label is `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ItemResult {
    Classify {
        filename: String,
        label: Value,
        metadata: Value,
    },
    Metadata {
        filename: String,
        inferred_label: Value,
        metadata: Value,
    },
}

impl ItemResult {
    /// Build a successful result for `scan_type`
    pub fn new(
        scan_type: ScanType,
        filename: impl Into<String>,
        label: Value,
        metadata: Value,
    ) -> Self {
        let filename = filename.into();
        match scan_type {
            ScanType::Classify => ItemResult::Classify {
                filename,
                label,
                metadata,
            },
            ScanType::Metadata => ItemResult::Metadata {
                filename,
                inferred_label: label,
                metadata,
            },
        }
    }

    /// Sentinel result standing in for a failed classification call
    pub fn error(scan_type: ScanType, filename: impl Into<String>) -> Self {
        Self::new(
            scan_type,
            filename,
            Value::from(ERROR_LABEL),
            Value::Object(serde_json::Map::new()),
        )
    }

    pub fn filename(&self) -> &str {
        match self {
            ItemResult::Classify { filename, .. } | ItemResult::Metadata { filename, .. } => {
                filename
            }
        }
    }

    /// `label` for classify results, `inferred_label` for metadata results
    pub fn label(&self) -> &Value {
        match self {
            ItemResult::Classify { label, .. } => label,
            ItemResult::Metadata { inferred_label, .. } => inferred_label,
        }
    }

    pub fn metadata(&self) -> &Value {
        match self {
            ItemResult::Classify { metadata, .. } | ItemResult::Metadata { metadata, .. } => {
                metadata
            }
        }
    }

    pub fn is_error(&self) -> bool {
        self.label().as_str() == Some(ERROR_LABEL)
    }
}

/// First message a client sends on a freshly opened channel
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ChannelAnnouncement {
    pub id: RequestId,
    #[serde(rename = "type")]
    pub scan_type: ScanType,
}

impl FromStr for ChannelAnnouncement {
    type Err = String;

    /// Parse an announcement payload, rejecting empty ids
    fn from_str(payload: &str) -> Result<Self, Self::Err> {
        let announcement: ChannelAnnouncement =
            serde_json::from_str(payload).map_err(|e| e.to_string())?;
        if announcement.id.is_empty() {
            return Err("request id must not be empty".to_string());
        }
        Ok(announcement)
    }
}

/// Results of one batch, pushed as soon as the batch settles
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchMessage {
    pub request_id: RequestId,
    #[serde(rename = "type")]
    pub scan_type: ScanType,
    pub batch: Vec<ItemResult>,
}

/// Terminal marker sent once after the last batch of a session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionMessage {
    pub request_id: RequestId,
    #[serde(rename = "type")]
    pub scan_type: ScanType,
    pub done: bool,
}

impl CompletionMessage {
    pub fn new(request_id: RequestId, scan_type: ScanType) -> Self {
        Self {
            request_id,
            scan_type,
            done: true,
        }
    }
}

/// Server → client channel message
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ServerMessage {
    Batch(BatchMessage),
    Completion(CompletionMessage),
}

impl ServerMessage {
    /// Short name used in log output
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Batch(_) => "batch",
            ServerMessage::Completion(_) => "completion",
        }
    }

    pub fn request_id(&self) -> &RequestId {
        match self {
            ServerMessage::Batch(m) => &m.request_id,
            ServerMessage::Completion(m) => &m.request_id,
        }
    }
}
