#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use dropzone_api::config::ServerConfig;
use dropzone_api::router::build_app_router;
use dropzone_api::state::AppState;
use dropzone_cloud::{BlobConfig, BlobStore, LocalBlobStore, RetryPolicy};

pub const BOUNDARY: &str = "dropzone-test-boundary";

/// Build a test `ServerConfig` whose blob store, staging and download
/// directories all live under `root`.
pub fn test_config(root: &Path) -> ServerConfig {
    let mut blob = BlobConfig::local(root.join("store"));
    blob.chunk_size = 4;
    blob.staging_dir = root.join("staging");
    blob.download_dir = root.join("downloads");
    blob.retry = RetryPolicy::immediate(2);

    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 1,
        max_upload_bytes: 1024 * 1024,
        orchestration_retention_secs: 3600,
        orchestration_max_finished: 100,
        blob,
    }
}

/// Build the full application router over a local store in `root`.
///
/// Returns the store too so tests can seed and inspect blobs directly.
pub fn build_test_app(root: &Path) -> (Router, Arc<dyn BlobStore>) {
    let config = test_config(root);
    let store: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(root.join("store")));
    let state = AppState::new(config.clone(), Arc::clone(&store));
    let app = build_app_router(state, &config).unwrap();
    (app, store)
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_empty(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// POST a multipart body with one part per `(field_name, bytes)`.
pub async fn post_multipart(app: Router, uri: &str, parts: &[(&str, &[u8])]) -> Response<Body> {
    let mut body = Vec::new();
    for (name, data) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{name}\"; filename=\"{name}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
