//! The HTTP trigger endpoint, exercised over a real socket.

mod common;

use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use toolprobe::batch::BatchController;
use toolprobe::config::DetectorConfig;
use toolprobe::server::{serve, AppState};

async fn spawn_app(controller: BatchController) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = AppState {
        controller: Arc::new(controller),
        max_batches: 10,
    };
    tokio::spawn(async move {
        serve(listener, state).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn trigger_processes_a_batch_and_reports_results() {
    let mut upstream = mockito::Server::new_async().await;
    upstream
        .mock("GET", "/list_resources")
        .with_status(200)
        .with_body(
            json!({"tools": [{"name": "probe", "description": "Remote probe"}]}).to_string(),
        )
        .create_async()
        .await;

    let (_dir, store, detector) = common::pipeline("http://127.0.0.1:1").await;
    let server = common::api_server("s1", "triggered", &upstream.url());
    store.upsert_server(&server).await.unwrap();

    let controller = BatchController::new(store, Arc::new(detector), DetectorConfig::default());
    let base = spawn_app(controller).await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{base}/tools-detector"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["servers_processed"], json!(1));
    assert_eq!(body["tools_detected"], json!(1));
    assert_eq!(body["results"][0]["status"], json!("success"));
    assert_eq!(
        body["results"][0]["detection_method"],
        json!("standard_mcp_api")
    );
}

#[tokio::test]
async fn trigger_accepts_explicit_server_ids() {
    let mut upstream = mockito::Server::new_async().await;
    upstream
        .mock("GET", "/list_resources")
        .with_status(200)
        .with_body(json!({"tools": [{"name": "t", "description": "D"}]}).to_string())
        .create_async()
        .await;

    let (_dir, store, detector) = common::pipeline("http://127.0.0.1:1").await;
    let server = common::api_server("s1", "by-id", &upstream.url());
    store.upsert_server(&server).await.unwrap();
    store.mark_scanned("s1").await.unwrap();

    let controller = BatchController::new(store, Arc::new(detector), DetectorConfig::default());
    let base = spawn_app(controller).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/tools-detector"))
        .json(&json!({"server_ids": ["s1", "missing"]}))
        .send()
        .await
        .unwrap();

    let body: Value = response.json().await.unwrap();
    // Unknown ids are skipped, not errors
    assert_eq!(body["servers_processed"], json!(1));
    assert_eq!(body["results"][0]["server_id"], json!("s1"));
}

#[tokio::test]
async fn unparsable_request_body_is_rejected_not_reinterpreted() {
    let (_dir, store, detector) = common::pipeline("http://127.0.0.1:1").await;
    let server = common::api_server("s1", "untouched", "http://127.0.0.1:1");
    store.upsert_server(&server).await.unwrap();

    let controller = BatchController::new(store.clone(), Arc::new(detector), DetectorConfig::default());
    let base = spawn_app(controller).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/tools-detector"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], json!(false));
    assert!(body["error"].as_str().unwrap().contains("invalid request body"));

    // Wrongly typed fields are also the caller's error
    let response = client
        .post(format!("{base}/tools-detector"))
        .header("content-type", "application/json")
        .body(r#"{"server_ids": "s1"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    // Neither request reached the pipeline
    assert_eq!(store.select_pending(10).await.unwrap().len(), 1);
    assert_eq!(store.detection_log_count("s1").await.unwrap(), 0);
}

#[tokio::test]
async fn empty_queue_is_a_successful_noop() {
    let (_dir, store, detector) = common::pipeline("http://127.0.0.1:1").await;
    let controller = BatchController::new(store, Arc::new(detector), DetectorConfig::default());
    let base = spawn_app(controller).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/tools-detector"))
        .json(&json!({"run_mode": "full"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["servers_processed"], json!(0));
}
