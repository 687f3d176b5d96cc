//! Shared helpers for docscan-gateway integration tests
//!
//! - stand-in classification and PII services served by axum on an ephemeral port
//! - multipart request construction
//! - gateway state wired against a temporary upload directory

#![allow(dead_code)]

use axum::body::Body;
use axum::extract::Multipart;
use axum::http::{Request, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use docscan_common::config::GatewayConfig;
use docscan_gateway::services::{
    ChannelRegistry, Classifier, HttpClassifier, InMemoryChannelRegistry, PiiClient,
};
use docscan_gateway::AppState;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

pub const BOUNDARY: &str = "docscan-test-boundary";

/// Serve `router` on 127.0.0.1 and return its base URL
pub async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Stand-in classification service
///
/// Behavior is chosen by filename prefix:
/// - `fail*`: 500
/// - `slow*`: answers after 30 seconds
/// - `nolabel*`: 200 without label fields or metadata
/// - `oddlabel*`: 200 with an object label and array metadata
/// - anything else: label "PAN" with metadata echoing the file
pub fn classifier_service() -> Router {
    Router::new()
        .route("/predict", post(classify_file))
        .route("/metadata", post(classify_file))
}

async fn classify_file(mut multipart: Multipart) -> axum::response::Response {
    let mut filename = String::new();
    let mut size = 0usize;
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("image") {
            filename = field.file_name().unwrap_or_default().to_string();
            size = field.bytes().await.map(|b| b.len()).unwrap_or(0);
        }
    }

    if filename.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "No image provided"})))
            .into_response();
    }
    if filename.starts_with("fail") {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "Model prediction failed"})),
        )
            .into_response();
    }
    if filename.starts_with("slow") {
        tokio::time::sleep(Duration::from_secs(30)).await;
    }
    if filename.starts_with("nolabel") {
        return Json(json!({"file_based": null})).into_response();
    }
    if filename.starts_with("oddlabel") {
        return Json(json!({
            "label": {"top": "PAN", "score": 0.91},
            "file_based": 7,
            "metadata": ["page-1", "page-2"]
        }))
        .into_response();
    }

    Json(json!({
        "file_based": "PAN",
        "model_based": "PAN",
        "label": "PAN",
        "metadata": {"name": filename, "size": size}
    }))
    .into_response()
}

/// Stand-in PII service echoing the endpoint and request body
///
/// A `conn_string` starting with `slow` answers after 600ms.
pub fn pii_service() -> Router {
    async fn echo(uri: axum::http::Uri, Json(body): Json<Value>) -> Json<Value> {
        let slow = body["conn_string"]
            .as_str()
            .is_some_and(|c| c.starts_with("slow"));
        if slow {
            tokio::time::sleep(Duration::from_millis(600)).await;
        }
        Json(json!({"endpoint": uri.path(), "request": body}))
    }

    Router::new()
        .route("/metadata-classify", post(echo))
        .route("/full-pii-scan", post(echo))
        .route("/table-pii-scan", post(echo))
}

/// Gateway config pointing at the given services
pub fn test_config(upload_dir: &std::path::Path, classifier_url: &str, pii_url: &str) -> GatewayConfig {
    GatewayConfig {
        classifier_url: classifier_url.to_string(),
        pii_service_url: pii_url.to_string(),
        upload_dir: upload_dir.to_path_buf(),
        request_timeout_ms: 2_000,
        ..Default::default()
    }
}

/// State with an in-memory registry and the given classifier
pub fn state_with_classifier(
    config: &GatewayConfig,
    classifier: Arc<dyn Classifier>,
) -> (AppState, Arc<InMemoryChannelRegistry>) {
    let registry = Arc::new(InMemoryChannelRegistry::new());
    let shared: Arc<dyn ChannelRegistry> = registry.clone();
    let pii = PiiClient::new(&config.pii_service_url, config.pii_timeout()).unwrap();
    (AppState::new(config, shared, classifier, pii), registry)
}

/// State with an HTTP classifier talking to `config.classifier_url`
pub fn http_state(config: &GatewayConfig) -> (AppState, Arc<InMemoryChannelRegistry>) {
    let classifier = Arc::new(HttpClassifier::new(&config.classifier_url).unwrap());
    state_with_classifier(config, classifier)
}

/// Multipart body with one `images` part per file, contents given as text
pub fn multipart_body(files: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, content) in files {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"images\"; filename=\"{}\"\r\n",
                name
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(content.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

/// POST /upload request for the given files
pub fn upload_request(query: &str, files: &[(&str, &str)]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/upload?{}", query))
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(files)))
        .unwrap()
}

/// Read a response body as JSON
pub async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Number of files left in a directory
pub fn file_count(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}
