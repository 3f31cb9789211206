//! Integration tests for the `/api/v1/orchestrations` routes.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use axum::Router;
use common::{body_json, get, post_empty};

/// Poll the status URL until the instance reaches a terminal state.
async fn wait_for_terminal(app: &Router, status_uri: &str) -> serde_json::Value {
    for _ in 0..200 {
        let json = body_json(get(app.clone(), status_uri).await).await;
        let status = json["data"]["runtime_status"].as_str().unwrap().to_string();
        if status == "completed" || status == "failed" {
            return json;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("orchestration at {status_uri} did not finish");
}

#[tokio::test]
async fn list_orchestration_accepts_and_completes() {
    let dir = tempfile::tempdir().unwrap();
    let (app, store) = common::build_test_app(dir.path());
    store.put("a.txt", b"a".to_vec()).await.unwrap();

    let response = post_empty(app.clone(), "/api/v1/orchestrations/blob_orchestrator?action=list").await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert!(response.headers().get("location").is_some());

    let json = body_json(response).await;
    assert_eq!(json["data"]["runtime_status"], "pending");
    let status_uri = json["data"]["status_query_get_uri"].as_str().unwrap().to_string();

    let status = wait_for_terminal(&app, &status_uri).await;
    assert_eq!(status["data"]["runtime_status"], "completed");
    assert_eq!(status["data"]["function_name"], "blob_orchestrator");
    assert_eq!(status["data"]["output"]["status"], "success");
    assert_eq!(status["data"]["output"]["result"][0]["file_name"], "a.txt");
}

#[tokio::test]
async fn download_orchestration_writes_to_download_dir() {
    let dir = tempfile::tempdir().unwrap();
    let (app, store) = common::build_test_app(dir.path());
    store.put("in/report.csv", b"x,y".to_vec()).await.unwrap();

    let response = post_empty(
        app.clone(),
        "/api/v1/orchestrations/blob_orchestrator?action=download&filepath=in/report.csv",
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    let status_uri = json["data"]["status_query_get_uri"].as_str().unwrap().to_string();

    let status = wait_for_terminal(&app, &status_uri).await;
    assert_eq!(status["data"]["runtime_status"], "completed");
    assert_eq!(
        std::fs::read(dir.path().join("downloads").join("report.csv")).unwrap(),
        b"x,y"
    );
}

#[tokio::test]
async fn upload_orchestration_defaults_to_base_name() {
    let dir = tempfile::tempdir().unwrap();
    let (app, store) = common::build_test_app(dir.path());
    let local = dir.path().join("outbound.a360");
    std::fs::write(&local, b"{}").unwrap();

    let uri = format!(
        "/api/v1/orchestrations/blob_orchestrator?filepath={}",
        local.display()
    );
    let response = post_empty(app.clone(), &uri).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    let status_uri = json["data"]["status_query_get_uri"].as_str().unwrap().to_string();

    let status = wait_for_terminal(&app, &status_uri).await;
    assert_eq!(status["data"]["runtime_status"], "completed");
    assert_eq!(store.get("outbound.a360").await.unwrap(), b"{}");
}

#[tokio::test]
async fn failed_activity_is_reported_in_status() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _) = common::build_test_app(dir.path());

    let response = post_empty(
        app.clone(),
        "/api/v1/orchestrations/blob_orchestrator?action=download&filepath=missing.txt",
    )
    .await;
    let json = body_json(response).await;
    let status_uri = json["data"]["status_query_get_uri"].as_str().unwrap().to_string();

    let status = wait_for_terminal(&app, &status_uri).await;
    assert_eq!(status["data"]["runtime_status"], "failed");
    assert_eq!(status["data"]["output"]["status"], "failed");
}

#[tokio::test]
async fn invalid_requests_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _) = common::build_test_app(dir.path());

    let response = post_empty(app.clone(), "/api/v1/orchestrations/f?action=download").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = post_empty(app.clone(), "/api/v1/orchestrations/f?action=delete").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = post_empty(app.clone(), "/api/v1/orchestrations/f").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_instance_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _) = common::build_test_app(dir.path());

    let response = get(
        app,
        "/api/v1/orchestrations/instances/00000000-0000-4000-8000-000000000000",
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
