//! Tier ordering and fall-through against mock live endpoints.

mod common;

use serde_json::json;
use toolprobe::detect::types::DetectionSource;

#[tokio::test]
async fn standard_endpoint_wins_and_later_tiers_never_run() {
    let mut upstream = mockito::Server::new_async().await;
    upstream
        .mock("GET", "/list_resources")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "tools": [
                    {"name": "search", "description": "Full text search"},
                    {"name": "fetch", "description": "Fetch one record"}
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;
    let alternative = upstream
        .mock("GET", "/tools")
        .expect(0)
        .create_async()
        .await;

    let (_dir, _store, detector) = common::pipeline("http://127.0.0.1:1").await;
    let server = common::api_server("s1", "primary", &upstream.url());

    let outcome = detector.detect(&server).await;
    assert_eq!(outcome.source, Some(DetectionSource::StandardMcpApi));
    assert_eq!(outcome.tools.len(), 2);
    assert!(
        outcome
            .tools
            .iter()
            .all(|t| t.detection_source == Some(DetectionSource::StandardMcpApi))
    );
    alternative.assert_async().await;
}

#[tokio::test]
async fn falls_through_to_alternative_endpoints_on_404() {
    let mut upstream = mockito::Server::new_async().await;
    upstream
        .mock("GET", "/list_resources")
        .with_status(404)
        .create_async()
        .await;
    upstream
        .mock("GET", "/tools")
        .with_status(200)
        .with_body(json!([{"name": "lookup", "description": "Lookup things"}]).to_string())
        .create_async()
        .await;

    let (_dir, _store, detector) = common::pipeline("http://127.0.0.1:1").await;
    let server = common::api_server("s1", "fallback", &upstream.url());

    let outcome = detector.detect(&server).await;
    assert_eq!(outcome.source, Some(DetectionSource::AlternativeApi));
    assert_eq!(outcome.tools.len(), 1);
    assert_eq!(outcome.tools[0].name, "lookup");
}

#[tokio::test]
async fn empty_tool_list_from_a_tier_is_not_a_win() {
    let mut upstream = mockito::Server::new_async().await;
    // Valid JSON, zero valid tools: tier 1 must not claim the result
    upstream
        .mock("GET", "/list_resources")
        .with_status(200)
        .with_body(json!({"tools": []}).to_string())
        .create_async()
        .await;
    upstream
        .mock("GET", "/tools")
        .with_status(200)
        .with_body(json!([{"name": "real", "description": "Actually here"}]).to_string())
        .create_async()
        .await;

    let (_dir, _store, detector) = common::pipeline("http://127.0.0.1:1").await;
    let server = common::api_server("s1", "empty-first", &upstream.url());

    let outcome = detector.detect(&server).await;
    assert_eq!(outcome.source, Some(DetectionSource::AlternativeApi));
}

#[tokio::test]
async fn no_usable_urls_yields_an_empty_success() {
    let (_dir, _store, detector) = common::pipeline("http://127.0.0.1:1").await;
    let server = toolprobe::store::Server::new("s1", "bare");

    let outcome = detector.detect(&server).await;
    assert!(outcome.tools.is_empty());
    assert!(outcome.source.is_none());
    assert!(outcome.error.is_none());
    assert_eq!(outcome.source_tag(), "failed");
}
