//! Repository Cache
//!
//! Persistence-backed cache for GitHub file contents and code-search results,
//! keyed by (owner, repo, path-or-query) with TTL expiry. Exists purely to
//! keep repeated detection runs from burning GitHub API quota on the same
//! repositories.
//!
//! Search results live under a `search:` path prefix so the two namespaces
//! never collide. Reads past `expires_at` are misses; writes are upserts that
//! refresh the TTL. Cache writes never fail the hot path: a failed write is
//! logged and the freshly fetched content still flows to the caller.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sqlx::SqlitePool;
use tracing::warn;

/// Idempotent schema for the cache table.
const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS github_cache (
    repo_owner TEXT NOT NULL,
    repo_name TEXT NOT NULL,
    repo_path TEXT NOT NULL,
    content TEXT NOT NULL,
    etag TEXT,
    last_modified TEXT,
    expires_at TEXT NOT NULL,
    PRIMARY KEY (repo_owner, repo_name, repo_path)
);
";

/// TTL-expiring cache over the `github_cache` table.
#[derive(Clone)]
pub struct RepoCache {
    pool: SqlitePool,
    content_ttl_hours: i64,
    search_ttl_hours: i64,
}

impl RepoCache {
    /// Attach to a pool, creating the cache table if needed.
    pub async fn attach(
        pool: SqlitePool,
        content_ttl_hours: i64,
        search_ttl_hours: i64,
    ) -> Result<Self> {
        sqlx::query(SCHEMA_SQL)
            .execute(&pool)
            .await
            .context("Failed to initialize github_cache schema")?;
        Ok(Self {
            pool,
            content_ttl_hours,
            search_ttl_hours,
        })
    }

    /// Fetch cached file content, treating expired entries as misses.
    pub async fn get(&self, owner: &str, repo: &str, path: &str) -> Option<String> {
        self.get_at(owner, repo, path, Utc::now()).await
    }

    /// Store file content with the configured content TTL.
    pub async fn put(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        content: &str,
        etag: Option<&str>,
        last_modified: Option<&str>,
    ) {
        self.put_at(
            owner,
            repo,
            path,
            content,
            etag,
            last_modified,
            self.content_ttl_hours,
            Utc::now(),
        )
        .await;
    }

    /// Fetch a cached search result for a query.
    pub async fn get_search(&self, owner: &str, repo: &str, query: &str) -> Option<String> {
        self.get_at(owner, repo, &search_key(query), Utc::now()).await
    }

    /// Store a search result. Search indices go stale faster than file
    /// contents, so these entries get the shorter TTL.
    pub async fn put_search(&self, owner: &str, repo: &str, query: &str, content: &str) {
        self.put_at(
            owner,
            repo,
            &search_key(query),
            content,
            None,
            None,
            self.search_ttl_hours,
            Utc::now(),
        )
        .await;
    }

    /// Read with an explicit clock, so tests can advance time.
    pub async fn get_at(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        now: DateTime<Utc>,
    ) -> Option<String> {
        let row: Option<(String, String)> = match sqlx::query_as(
            "SELECT content, expires_at FROM github_cache
             WHERE repo_owner = ? AND repo_name = ? AND repo_path = ?",
        )
        .bind(owner)
        .bind(repo)
        .bind(path)
        .fetch_optional(&self.pool)
        .await
        {
            Ok(row) => row,
            Err(e) => {
                warn!("cache read failed for {owner}/{repo}:{path}: {e}");
                return None;
            }
        };

        let (content, expires_at) = row?;
        let expires_at = DateTime::parse_from_rfc3339(&expires_at).ok()?;
        if now < expires_at {
            Some(content)
        } else {
            None
        }
    }

    /// Write with an explicit clock and TTL. Upsert semantics; failures are
    /// logged and swallowed.
    #[allow(clippy::too_many_arguments)]
    pub async fn put_at(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        content: &str,
        etag: Option<&str>,
        last_modified: Option<&str>,
        ttl_hours: i64,
        now: DateTime<Utc>,
    ) {
        let expires_at = (now + ChronoDuration::hours(ttl_hours)).to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO github_cache
                 (repo_owner, repo_name, repo_path, content, etag, last_modified, expires_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(repo_owner, repo_name, repo_path) DO UPDATE SET
                 content = excluded.content,
                 etag = excluded.etag,
                 last_modified = excluded.last_modified,
                 expires_at = excluded.expires_at",
        )
        .bind(owner)
        .bind(repo)
        .bind(path)
        .bind(content)
        .bind(etag)
        .bind(last_modified)
        .bind(expires_at)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            warn!("cache write failed for {owner}/{repo}:{path}: {e}");
        }
    }
}

/// Synthetic path for a search query, kept in its own namespace.
fn search_key(query: &str) -> String {
    let sanitized: String = query
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    format!("search:{sanitized}")
}
