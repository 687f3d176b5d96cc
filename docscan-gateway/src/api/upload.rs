//! Upload endpoint
//!
//! `POST /upload?id=<request id>&type=<classify|metadata>` with multipart file
//! parts named `images`. Answers once every batch has been processed; results
//! themselves travel over the channel announced under the same id.

use crate::error::{ApiError, ApiResult};
use crate::services::{FileItem, UploadAck, UploadStore};
use crate::AppState;
use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, Query, State},
    routing::post,
    Json, Router,
};
use docscan_common::{RequestId, ScanType};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Multipart field carrying the uploaded files
pub const UPLOAD_FIELD: &str = "images";

/// Query parameters of the upload call
#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub scan_type: Option<String>,
}

/// Upload response body
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub status: &'static str,
    #[serde(flatten)]
    pub ack: UploadAck,
}

/// POST /upload
pub async fn upload(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<UploadResponse>> {
    let request_id = params
        .id
        .map(RequestId::new)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing 'id' query parameter".to_string()))?;

    let scan_type: ScanType = params
        .scan_type
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("Missing 'type' query parameter".to_string()))?
        .parse()
        .map_err(ApiError::BadRequest)?;

    let mut multipart = multipart.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let files = receive_files(&state.uploads, &mut multipart).await?;

    debug!(
        request_id = %request_id,
        scan_type = %scan_type,
        files = files.len(),
        "Upload received"
    );

    let ack = state.coordinator.handle(request_id, scan_type, files).await?;

    Ok(Json(UploadResponse {
        status: "Uploaded",
        ack,
    }))
}

/// Store every `images` part as a temporary file
///
/// Parts with other names are skipped. On error the files stored so far are
/// removed when the returned items are dropped.
async fn receive_files(
    store: &UploadStore,
    multipart: &mut Multipart,
) -> ApiResult<Vec<FileItem>> {
    let mut files = Vec::new();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            debug!(field = ?field.name(), "Ignoring multipart field");
            continue;
        }

        let filename = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().map(str::to_string);
        let (item, mut file) = store
            .create(&filename, content_type)
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?;

        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| ApiError::Internal(format!("Failed to store {}: {}", filename, e)))?;
        }
        file.flush()
            .await
            .map_err(|e| ApiError::Internal(format!("Failed to store {}: {}", filename, e)))?;

        files.push(item);
    }

    Ok(files)
}

/// Build upload routes
pub fn upload_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/upload", post(upload))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}
