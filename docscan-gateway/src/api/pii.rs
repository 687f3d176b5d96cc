//! PII scan bridge
//!
//! `POST /pii` forwards a database scan to the PII service and wraps the
//! service's answer as `{"data": ...}`.

use crate::error::{ApiError, ApiResult};
use crate::services::{PiiScanKind, PiiServiceRequest};
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

/// Client request body
#[derive(Debug, Deserialize)]
pub struct PiiRequest {
    pub conn_string: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub table: Option<String>,
}

/// POST /pii
pub async fn pii_scan(
    State(state): State<AppState>,
    body: Result<Json<PiiRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let kind: PiiScanKind = request.kind.parse().map_err(ApiError::BadRequest)?;

    let table_name = match kind {
        PiiScanKind::Table => Some(
            request
                .table
                .filter(|t| !t.trim().is_empty())
                .ok_or_else(|| {
                    ApiError::BadRequest("'table' is required for pii-table scans".to_string())
                })?,
        ),
        PiiScanKind::Metadata | PiiScanKind::Full => None,
    };

    let service_request = PiiServiceRequest {
        conn_string: request.conn_string,
        table_name,
    };

    let data = state.pii.scan(kind, &service_request).await.map_err(|e| {
        warn!(error = %e, kind = %request.kind, "PII service request failed");
        ApiError::BadGateway(format!("Failed to query PII service: {}", e))
    })?;

    Ok(Json(json!({ "data": data })))
}

/// Build PII bridge routes
pub fn pii_routes() -> Router<AppState> {
    Router::new().route("/pii", post(pii_scan))
}
