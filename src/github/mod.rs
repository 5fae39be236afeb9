//! GitHub REST/Search client.
//!
//! Thin wrapper over the retry client for the two endpoints the repository
//! tier needs: file contents and filename search. Both read through the
//! repository cache; the API base is injectable so tests can point it at a
//! mock server.

use anyhow::{Context, Result};
use base64::Engine;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::RepoCache;
use crate::http::HttpClient;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";

lazy_static! {
    static ref GITHUB_URL: Regex = Regex::new(r"github\.com[/:]([\w.-]+)/([\w.-]+)")
        .expect("github url pattern is valid");
}

/// An owner/repo pair parsed from a GitHub URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

/// Parse `https://github.com/owner/repo[.git]` (or the SSH form) into a
/// [`RepoRef`]. Returns `None` for anything that isn't a GitHub repo URL.
#[must_use]
pub fn parse_github_url(url: &str) -> Option<RepoRef> {
    let captures = GITHUB_URL.captures(url)?;
    let owner = captures[1].to_string();
    let repo = captures[2].trim_end_matches(".git").to_string();
    if owner.is_empty() || repo.is_empty() {
        return None;
    }
    Some(RepoRef { owner, repo })
}

/// GitHub API client with caching. Constructed explicitly and passed where
/// needed; the token and API base come from configuration.
pub struct GithubClient {
    http: Arc<HttpClient>,
    cache: RepoCache,
    api_base: String,
    token: Option<String>,
}

impl GithubClient {
    #[must_use]
    pub fn new(
        http: Arc<HttpClient>,
        cache: RepoCache,
        api_base: impl Into<String>,
        token: Option<String>,
    ) -> Self {
        Self {
            http,
            cache,
            api_base: api_base.into(),
            token,
        }
    }

    fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            ("accept", "application/vnd.github+json".to_string()),
            ("user-agent", "toolprobe".to_string()),
        ];
        if let Some(token) = &self.token {
            headers.push(("authorization", format!("Bearer {token}")));
        }
        headers
    }

    /// Fetch a file's decoded content via the contents API, reading through
    /// the cache. `Ok(None)` means the file does not exist (or the response
    /// was unusable); hard transport failures propagate.
    pub async fn file_content(&self, repo: &RepoRef, path: &str) -> Result<Option<String>> {
        if let Some(cached) = self.cache.get(&repo.owner, &repo.repo, path).await {
            return Ok(Some(cached));
        }

        let url = format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_base, repo.owner, repo.repo, path
        );
        let response = self
            .http
            .get_with_retry(&url, &self.headers())
            .await
            .context("GitHub contents request failed")?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            warn!(
                "contents API returned HTTP {status} for {}/{}:{path}",
                repo.owner, repo.repo
            );
            return Ok(None);
        }

        let etag = header_string(&response, "etag");
        let last_modified = header_string(&response, "last-modified");

        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!("contents API body was not JSON for {path}: {e}");
                return Ok(None);
            }
        };

        let Some(content) = decode_contents_payload(&body) else {
            debug!("no decodable content for {}/{}:{path}", repo.owner, repo.repo);
            return Ok(None);
        };

        self.cache
            .put(
                &repo.owner,
                &repo.repo,
                path,
                &content,
                etag.as_deref(),
                last_modified.as_deref(),
            )
            .await;
        Ok(Some(content))
    }

    /// Search the repository for files with a given name fragment, returning
    /// matching paths. Search results are cached under their own namespace.
    /// A non-success search response (e.g. 403 without a token) yields an
    /// empty list rather than an error, so the tier can still try direct
    /// content fetches.
    pub async fn search_filenames(&self, repo: &RepoRef, filename: &str) -> Result<Vec<String>> {
        let query = format!("repo:{}/{} filename:{filename}", repo.owner, repo.repo);

        if let Some(cached) = self
            .cache
            .get_search(&repo.owner, &repo.repo, &query)
            .await
        {
            return Ok(serde_json::from_str(&cached).unwrap_or_default());
        }

        let url = format!(
            "{}/search/code?q={}",
            self.api_base,
            urlencoding::encode(&query)
        );
        let response = self
            .http
            .get_with_retry(&url, &self.headers())
            .await
            .context("GitHub search request failed")?;

        if !response.status().is_success() {
            debug!(
                "search API returned HTTP {} for {query}, skipping search results",
                response.status()
            );
            return Ok(Vec::new());
        }

        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!("search API body was not JSON: {e}");
                return Ok(Vec::new());
            }
        };

        let paths: Vec<String> = body
            .get("items")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.get("path").and_then(Value::as_str))
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default();

        if let Ok(serialized) = serde_json::to_string(&paths) {
            self.cache
                .put_search(&repo.owner, &repo.repo, &query, &serialized)
                .await;
        }
        Ok(paths)
    }
}

/// Decode the base64 `content` field of a contents API payload.
fn decode_contents_payload(body: &Value) -> Option<String> {
    let content = body.get("content").and_then(Value::as_str)?;
    // GitHub wraps base64 at 60 columns; strip the newlines before decoding
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact)
        .ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

fn header_string(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}
