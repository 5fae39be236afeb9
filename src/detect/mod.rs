//! Detection Tiers & Orchestrator
//!
//! Per-server driver that tries detection strategies in strict priority
//! order and stops at the first tier returning a non-empty tool list:
//!
//! 1. `standard_mcp_api`: GET `<base>/list_resources` on the server's
//!    declared live endpoint
//! 2. `alternative_api`: a fixed ordered list of conventional endpoint
//!    paths against the same base
//! 3. `github_repository`: static analysis of candidate files in the
//!    server's repository (lowest confidence, last resort)
//!
//! Tier errors are tier-local: a failing tier is treated as "no tools from
//! this source" and the next tier runs. Only the repository tier can raise
//! a hard failure (total API unavailability), which becomes a
//! `status: error` outcome. The server's scan marker still advances so it
//! is not retried forever.

pub mod types;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tracing::{debug, info};

use crate::extract;
use crate::github::{parse_github_url, GithubClient, RepoRef};
use crate::http::HttpClient;
use crate::store::Server;
use types::{tag_tools, DetectionOutcome, DetectionSource, Tool};

/// Alternative endpoint paths probed by tier 2, in order.
pub const ALTERNATIVE_ENDPOINTS: [&str; 9] = [
    "/tools",
    "/functions",
    "/api/tools",
    "/api/functions",
    "/schema",
    "/api/schema",
    "/resources",
    "/api/resources",
    "/api/v1/list_resources",
];

/// Manifest filenames searched for and fetched directly by tier 3.
pub const MANIFEST_FILENAMES: [&str; 9] = [
    "tools.json",
    "functions.json",
    "mcp.json",
    "mcp.config.json",
    "openapi.json",
    "openapi.yaml",
    "openapi.yml",
    "swagger.json",
    "swagger.yaml",
];

/// Conventionally-named source files scanned by tier 3's best-effort pass.
pub const SOURCE_FILES: [&str; 9] = [
    "index.ts",
    "index.js",
    "tools.ts",
    "tools.js",
    "server.ts",
    "server.js",
    "src/index.ts",
    "src/tools.ts",
    "src/server.ts",
];

/// Filename fragments fed to the code-search API to find candidates beyond
/// the fixed lists.
const SEARCH_PATTERNS: [&str; 5] = ["tools.json", "functions.json", "openapi", "swagger", "mcp"];

/// Runs the detection tiers for one server at a time.
pub struct Detector {
    http: Arc<HttpClient>,
    github: GithubClient,
}

impl Detector {
    #[must_use]
    pub fn new(http: Arc<HttpClient>, github: GithubClient) -> Self {
        Self { http, github }
    }

    /// Run the tiers for one server. Always returns an outcome; never
    /// panics or propagates tier-local failures.
    pub async fn detect(&self, server: &Server) -> DetectionOutcome {
        let start = Instant::now();

        if let Some(base) = server.endpoint_base() {
            match self.standard_api(&base).await {
                Ok(mut tools) if !tools.is_empty() => {
                    tag_tools(&mut tools, DetectionSource::StandardMcpApi);
                    info!(
                        "{}: {} tools via standard_mcp_api",
                        server.name,
                        tools.len()
                    );
                    return outcome(tools, DetectionSource::StandardMcpApi, start);
                }
                Ok(_) => debug!("{}: standard endpoint had no tools", server.name),
                Err(e) => debug!("{}: standard endpoint failed: {e}", server.name),
            }

            match self.alternative_api(&base).await {
                Ok(mut tools) if !tools.is_empty() => {
                    tag_tools(&mut tools, DetectionSource::AlternativeApi);
                    info!("{}: {} tools via alternative_api", server.name, tools.len());
                    return outcome(tools, DetectionSource::AlternativeApi, start);
                }
                Ok(_) => debug!("{}: no alternative endpoint had tools", server.name),
                Err(e) => debug!("{}: alternative endpoints failed: {e}", server.name),
            }
        }

        if let Some(repo) = server.github_url.as_deref().and_then(parse_github_url) {
            match self.scan_repository(&repo).await {
                Ok(mut tools) if !tools.is_empty() => {
                    tag_tools(&mut tools, DetectionSource::GithubRepository);
                    info!(
                        "{}: {} tools via github_repository",
                        server.name,
                        tools.len()
                    );
                    return outcome(tools, DetectionSource::GithubRepository, start);
                }
                Ok(_) => debug!("{}: repository scan found no tools", server.name),
                Err(e) => {
                    // The one hard failure path: repository tier blew up
                    return DetectionOutcome::failed(start.elapsed(), format!("{e:#}"));
                }
            }
        }

        DetectionOutcome::empty(start.elapsed())
    }

    /// Reference to the GitHub client, for install-instruction probing.
    #[must_use]
    pub fn github(&self) -> &GithubClient {
        &self.github
    }

    /// Tier 1: the standard `<base>/list_resources` endpoint.
    async fn standard_api(&self, base: &str) -> Result<Vec<Tool>> {
        let url = format!("{base}/list_resources");
        let Some(body) = self.http.get_json(&url, &[]).await? else {
            return Ok(Vec::new());
        };
        Ok(extract::extract_from_value(&body))
    }

    /// Tier 2: probe the fixed alternative paths, stopping at the first
    /// endpoint that yields at least one valid tool.
    async fn alternative_api(&self, base: &str) -> Result<Vec<Tool>> {
        for path in ALTERNATIVE_ENDPOINTS {
            let url = format!("{base}{path}");
            match self.http.get_json(&url, &[]).await {
                Ok(Some(body)) => {
                    let tools = extract::extract_from_value(&body);
                    if !tools.is_empty() {
                        debug!("alternative endpoint {path} yielded {} tools", tools.len());
                        return Ok(tools);
                    }
                }
                Ok(None) => {}
                Err(e) => debug!("alternative endpoint {path} failed: {e}"),
            }
        }
        Ok(Vec::new())
    }

    /// Tier 3: static repository analysis. Scans ALL candidate files, merges
    /// their tools, and dedups by name (first occurrence wins) rather than
    /// short-circuiting on the first productive file.
    async fn scan_repository(&self, repo: &RepoRef) -> Result<Vec<Tool>> {
        let mut candidates: Vec<String> = Vec::new();
        let mut seen = HashSet::new();

        for pattern in SEARCH_PATTERNS {
            for path in self.github.search_filenames(repo, pattern).await? {
                if seen.insert(path.clone()) {
                    candidates.push(path);
                }
            }
        }
        for path in MANIFEST_FILENAMES.into_iter().chain(SOURCE_FILES) {
            if seen.insert(path.to_string()) {
                candidates.push(path.to_string());
            }
        }

        let mut tools = Vec::new();
        for path in &candidates {
            if let Some(content) = self.github.file_content(repo, path).await? {
                let found = extract::extract_from_file(path, &content);
                if !found.is_empty() {
                    debug!("{path}: extracted {} tool candidates", found.len());
                }
                tools.extend(found);
            }
        }

        Ok(extract::dedup_by_name(tools))
    }
}

fn outcome(tools: Vec<Tool>, source: DetectionSource, start: Instant) -> DetectionOutcome {
    DetectionOutcome {
        tools,
        source: Some(source),
        duration: start.elapsed(),
        error: None,
    }
}
