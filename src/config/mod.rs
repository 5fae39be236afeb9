//! Configuration for the detection pipeline.
//!
//! All clients are constructed from an explicit [`DetectorConfig`] and
//! passed in; nothing in the crate reads configuration from module-scope
//! globals, so tests can substitute fakes freely.

use std::path::PathBuf;
use std::time::Duration;

use crate::github::DEFAULT_API_BASE;
use crate::http::RetryConfig;

/// Tunables for a detection run.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Path of the catalog SQLite database
    pub database_path: PathBuf,
    /// Bearer token for the GitHub API (`GITHUB_TOKEN`)
    pub github_token: Option<String>,
    /// GitHub API base, overridable for tests
    pub github_api_base: String,
    /// Servers selected per batch
    pub batch_size: usize,
    /// Concurrent per-server orchestrations within a batch
    pub max_concurrent: usize,
    /// Safety cap on consecutive batches in one driver run
    pub max_batches: usize,
    /// Fixed sleep between batches
    pub batch_delay: Duration,
    /// Retry/backoff tuning for all HTTP calls
    pub retry: RetryConfig,
    /// TTL for cached file contents
    pub content_ttl_hours: i64,
    /// TTL for cached search results (shorter; search indices go stale faster)
    pub search_ttl_hours: i64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("toolprobe.sqlite"),
            github_token: None,
            github_api_base: DEFAULT_API_BASE.to_string(),
            batch_size: 5,
            max_concurrent: 3,
            max_batches: 100,
            batch_delay: Duration::from_secs(3),
            retry: RetryConfig::default(),
            content_ttl_hours: 24,
            search_ttl_hours: 12,
        }
    }
}

impl DetectorConfig {
    /// Defaults overlaid with environment variables (`GITHUB_TOKEN`,
    /// `TOOLPROBE_DB`).
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(token) = std::env::var("GITHUB_TOKEN")
            && !token.is_empty()
        {
            config.github_token = Some(token);
        }
        if let Ok(db) = std::env::var("TOOLPROBE_DB")
            && !db.is_empty()
        {
            config.database_path = PathBuf::from(db);
        }
        config
    }

    #[must_use]
    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = path.into();
        self
    }

    #[must_use]
    pub fn with_github_api_base(mut self, base: impl Into<String>) -> Self {
        self.github_api_base = base.into();
        self
    }

    #[must_use]
    pub fn with_github_token(mut self, token: Option<String>) -> Self {
        self.github_token = token;
        self
    }

    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub const fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_observed_pipeline_settings() {
        let config = DetectorConfig::default();
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.max_concurrent, 3);
        assert_eq!(config.max_batches, 100);
        assert_eq!(config.batch_delay, Duration::from_secs(3));
        assert_eq!(config.content_ttl_hours, 24);
        assert_eq!(config.search_ttl_hours, 12);
    }

    #[test]
    fn builder_overrides() {
        let config = DetectorConfig::default()
            .with_batch_size(2)
            .with_max_concurrent(1)
            .with_github_api_base("http://localhost:9999");
        assert_eq!(config.batch_size, 2);
        assert_eq!(config.max_concurrent, 1);
        assert_eq!(config.github_api_base, "http://localhost:9999");
    }
}
