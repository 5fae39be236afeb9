#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use tempfile::TempDir;
use toolprobe::cache::RepoCache;
use toolprobe::detect::Detector;
use toolprobe::github::GithubClient;
use toolprobe::http::{HttpClient, RetryConfig};
use toolprobe::store::{Server, Store};

/// Millisecond-scale backoff so retry paths run fast under test.
pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        timeout: Duration::from_secs(5),
        initial_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(40),
        max_ratelimit_wait: Duration::from_millis(100),
    }
}

/// Fresh store + detector wired to a mock GitHub API base.
pub async fn pipeline(github_api_base: &str) -> (TempDir, Store, Detector) {
    let dir = TempDir::new().unwrap();
    let store = Store::open(&dir.path().join("catalog.sqlite")).await.unwrap();
    let cache = RepoCache::attach(store.pool().clone(), 24, 12).await.unwrap();
    let http = Arc::new(HttpClient::new(fast_retry()));
    let github = GithubClient::new(Arc::clone(&http), cache, github_api_base, None);
    let detector = Detector::new(http, github);
    (dir, store, detector)
}

pub fn api_server(id: &str, name: &str, api_url: &str) -> Server {
    let mut server = Server::new(id, name);
    server.api_url = Some(api_url.to_string());
    server
}

pub fn github_server(id: &str, name: &str, github_url: &str) -> Server {
    let mut server = Server::new(id, name);
    server.github_url = Some(github_url.to_string());
    server
}

/// Body of a GitHub contents API response for the given file content.
pub fn contents_payload(content: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(content);
    serde_json::json!({ "content": encoded, "encoding": "base64" }).to_string()
}
