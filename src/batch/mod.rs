//! Batch/Concurrency Controller
//!
//! Selects a bounded batch of unprocessed servers, fans the per-server
//! orchestrations out with bounded parallelism, and aggregates results.
//! The whole batch is awaited before a summary is returned; batches never
//! pipeline into each other.

use std::sync::Arc;

use anyhow::Result;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

use crate::config::DetectorConfig;
use crate::detect::types::{ProcessResult, ProcessStatus};
use crate::detect::Detector;
use crate::github::parse_github_url;
use crate::install;
use crate::store::{Server, Store};

/// Aggregate result of one batch.
#[derive(Debug, Default, Clone)]
pub struct BatchSummary {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub tools_detected: usize,
    pub results: Vec<ProcessResult>,
}

impl BatchSummary {
    fn from_results(results: Vec<ProcessResult>) -> Self {
        let processed = results.len();
        let succeeded = results
            .iter()
            .filter(|r| r.status == ProcessStatus::Success)
            .count();
        let tools_detected = results.iter().filter_map(|r| r.tools_detected).sum();
        Self {
            processed,
            succeeded,
            failed: processed - succeeded,
            tools_detected,
            results,
        }
    }
}

/// Drives batches of per-server detection runs.
pub struct BatchController {
    store: Store,
    detector: Arc<Detector>,
    config: DetectorConfig,
}

impl BatchController {
    #[must_use]
    pub fn new(store: Store, detector: Arc<Detector>, config: DetectorConfig) -> Self {
        Self {
            store,
            detector,
            config,
        }
    }

    /// Wire up the full pipeline from configuration: open the catalog
    /// database, attach the repository cache, and build the shared HTTP and
    /// GitHub clients.
    pub async fn from_config(config: DetectorConfig) -> Result<Self> {
        let store = Store::open(&config.database_path).await?;
        let cache = crate::cache::RepoCache::attach(
            store.pool().clone(),
            config.content_ttl_hours,
            config.search_ttl_hours,
        )
        .await?;
        let http = Arc::new(crate::http::HttpClient::new(config.retry.clone()));
        let github = crate::github::GithubClient::new(
            Arc::clone(&http),
            cache,
            config.github_api_base.clone(),
            config.github_token.clone(),
        );
        let detector = Arc::new(Detector::new(http, github));
        Ok(Self::new(store, detector, config))
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Select and process the next batch of pending servers. An empty
    /// summary (`processed == 0`) is the pipeline's terminal signal.
    pub async fn run_pending_batch(&self) -> Result<BatchSummary> {
        let servers = self.store.select_pending(self.config.batch_size).await?;
        self.run_servers(servers).await
    }

    /// Process exactly the given servers (explicit-id invocation).
    pub async fn run_ids(&self, ids: &[String]) -> Result<BatchSummary> {
        let servers = self.store.select_by_ids(ids).await?;
        self.run_servers(servers).await
    }

    async fn run_servers(&self, servers: Vec<Server>) -> Result<BatchSummary> {
        if servers.is_empty() {
            return Ok(BatchSummary::default());
        }

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        let mut tasks = FuturesUnordered::new();

        for server in servers {
            let semaphore = Arc::clone(&semaphore);
            let store = self.store.clone();
            let detector = Arc::clone(&self.detector);
            tasks.push(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        // Only possible if the semaphore were closed mid-batch
                        return ProcessResult {
                            server_id: server.id.clone(),
                            name: server.name.clone(),
                            status: ProcessStatus::Error,
                            tools_detected: None,
                            detection_method: None,
                            error: Some(format!("batch permit unavailable: {e}")),
                        };
                    }
                };
                process_server(&store, &detector, &server).await
            });
        }

        let mut results = Vec::new();
        while let Some(result) = tasks.next().await {
            results.push(result);
        }

        Ok(BatchSummary::from_results(results))
    }
}

/// Per-server orchestration: run the tiers, persist the outcome, always
/// advance the scan marker, and append an audit row. Every code path ends
/// in a [`ProcessResult`]; nothing escapes as an unattached error.
pub async fn process_server(store: &Store, detector: &Detector, server: &Server) -> ProcessResult {
    let outcome = detector.detect(server).await;
    let duration_ms = u64::try_from(outcome.duration.as_millis()).unwrap_or(u64::MAX);
    let tool_count = outcome.tools.len();

    let mut result = ProcessResult {
        server_id: server.id.clone(),
        name: server.name.clone(),
        status: ProcessStatus::Success,
        tools_detected: Some(tool_count),
        detection_method: outcome.source.map(|s| s.as_str().to_string()),
        error: outcome.error.clone(),
    };

    if outcome.error.is_some() {
        result.status = ProcessStatus::Error;
        result.tools_detected = None;
    } else {
        // Replace on every non-error outcome, zero tools included, so a
        // rescan clears tools the upstream no longer exposes
        match store.replace_server_tools(&server.id, &outcome.tools).await {
            Ok(storage) => debug!("{}: stored {tool_count} tools ({storage:?})", server.name),
            Err(e) => {
                error!("{}: failed to store tools: {e:#}", server.name);
                result.status = ProcessStatus::Error;
                result.error = Some(format!("{e:#}"));
            }
        }
    }

    // Install instructions ride along for any server with a repository;
    // failures here never affect detection status.
    if let Some(repo) = server.github_url.as_deref().and_then(parse_github_url) {
        match install::detect_install_instructions(detector.github(), &repo).await {
            Ok(instructions) if !instructions.is_empty() => {
                if let Err(e) = store
                    .upsert_install_instructions(&server.id, &instructions)
                    .await
                {
                    warn!("{}: failed to store install instructions: {e:#}", server.name);
                }
            }
            Ok(_) => {}
            Err(e) => warn!("{}: install probing failed: {e:#}", server.name),
        }
    }

    // Marker always advances, win or lose, to prevent poison-pill retries
    if let Err(e) = store.mark_scanned(&server.id).await {
        error!("{}: failed to advance scan marker: {e:#}", server.name);
    }

    store
        .log_detection(
            &server.id,
            outcome.source_tag(),
            tool_count,
            duration_ms,
            result.error.as_deref(),
        )
        .await;

    result
}
