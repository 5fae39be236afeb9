//! Persistence Layer
//!
//! SQLite-backed store for the catalog tables the detection pipeline reads
//! and writes: `servers`, `server_tools`, `tool_parameters`,
//! `server_install_instructions`, and the append-only `detection_log`.
//!
//! Uses WAL mode for concurrent reads during batch writes, idempotent
//! `CREATE TABLE IF NOT EXISTS` schema setup, and a single transaction for
//! the delete-then-insert tool replacement so a server's tool set is always
//! observed whole.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

use crate::detect::types::{Tool, ToolParameter};
use crate::install::InstallInstruction;

/// Tag prefix used by the degraded-mode fallback storage
const TOOL_TAG_PREFIX: &str = "tool:";
/// Marker tags recording that detection ran while normalized tables were absent
const TAG_SUCCESS: &str = "mcp_detection_success";
const TAG_FAILED: &str = "mcp_detection_failed";
/// At most this many tool names are encoded as tags in fallback mode
const MAX_FALLBACK_TAGS: usize = 10;

const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS servers (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    github_url TEXT,
    api_url TEXT,
    health_check_url TEXT,
    last_tools_scan TEXT,
    tags TEXT NOT NULL DEFAULT '[]',
    tools TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS server_tools (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    server_id TEXT NOT NULL REFERENCES servers(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    method TEXT NOT NULL DEFAULT 'POST',
    endpoint TEXT NOT NULL DEFAULT '',
    detection_source TEXT,
    UNIQUE(server_id, name)
);

CREATE TABLE IF NOT EXISTS tool_parameters (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tool_id INTEGER NOT NULL REFERENCES server_tools(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    type TEXT NOT NULL DEFAULT 'string',
    required INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS server_install_instructions (
    server_id TEXT NOT NULL REFERENCES servers(id) ON DELETE CASCADE,
    platform TEXT NOT NULL,
    install_command TEXT NOT NULL,
    icon_url TEXT,
    source_file TEXT,
    detected_at TEXT NOT NULL,
    UNIQUE(server_id, platform)
);

CREATE TABLE IF NOT EXISTS detection_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    server_id TEXT NOT NULL,
    source TEXT NOT NULL,
    tools_detected INTEGER NOT NULL,
    duration_ms INTEGER NOT NULL,
    error_message TEXT,
    timestamp TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_server_tools_server ON server_tools(server_id);
CREATE INDEX IF NOT EXISTS idx_tool_parameters_tool ON tool_parameters(tool_id);
CREATE INDEX IF NOT EXISTS idx_detection_log_server ON detection_log(server_id);
";

/// A catalog entry, created by the external crawler. The detection pipeline
/// only reads identity/URL fields and writes scan results back.
#[derive(Debug, Clone)]
pub struct Server {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub github_url: Option<String>,
    pub api_url: Option<String>,
    pub health_check_url: Option<String>,
    /// Null means "needs detection"; always set after a scan, win or lose
    pub last_tools_scan: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Server {
    /// New unscanned server row, as the crawler would create it.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            github_url: None,
            api_url: None,
            health_check_url: None,
            last_tools_scan: None,
            tags: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Candidate live-endpoint base URL: prefer `api_url`, fall back to the
    /// health-check URL with a trailing `/health` segment stripped.
    #[must_use]
    pub fn endpoint_base(&self) -> Option<String> {
        if let Some(api) = self.api_url.as_deref().filter(|u| !u.is_empty()) {
            return Some(api.trim_end_matches('/').to_string());
        }
        let health = self.health_check_url.as_deref().filter(|u| !u.is_empty())?;
        let base = health.trim_end_matches('/');
        Some(base.strip_suffix("/health").unwrap_or(base).to_string())
    }
}

/// How a detection result was persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOutcome {
    /// Rows written to `server_tools` + `tool_parameters`
    Normalized,
    /// Normalized tables unavailable; tool names encoded as server tags
    TagFallback,
}

/// Handle over the catalog database.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (or create) the catalog database and run schema setup.
    pub async fn open(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .context("Failed to open catalog database")?;

        sqlx::query(SCHEMA_SQL)
            .execute(&pool)
            .await
            .context("Failed to initialize catalog schema")?;

        Ok(Self { pool })
    }

    /// Shared pool, used to attach the repository cache.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert or update a server row (the crawler's write path; used by
    /// tests to seed the catalog).
    pub async fn upsert_server(&self, server: &Server) -> Result<()> {
        sqlx::query(
            "INSERT INTO servers
                 (id, name, description, github_url, api_url, health_check_url,
                  last_tools_scan, tags, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 description = excluded.description,
                 github_url = excluded.github_url,
                 api_url = excluded.api_url,
                 health_check_url = excluded.health_check_url",
        )
        .bind(&server.id)
        .bind(&server.name)
        .bind(&server.description)
        .bind(&server.github_url)
        .bind(&server.api_url)
        .bind(&server.health_check_url)
        .bind(server.last_tools_scan.map(|t| t.to_rfc3339()))
        .bind(serde_json::to_string(&server.tags)?)
        .bind(server.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to upsert server")?;
        Ok(())
    }

    pub async fn get_server(&self, id: &str) -> Result<Option<Server>> {
        let row: Option<ServerRow> = sqlx::query_as(
            "SELECT id, name, description, github_url, api_url, health_check_url,
                    last_tools_scan, tags, created_at
             FROM servers WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load server")?;
        row.map(server_from_row).transpose()
    }

    /// Servers eligible for detection: never scanned, with at least one
    /// usable source URL. Newest first.
    pub async fn select_pending(&self, limit: usize) -> Result<Vec<Server>> {
        let rows: Vec<ServerRow> = sqlx::query_as(
            "SELECT id, name, description, github_url, api_url, health_check_url,
                    last_tools_scan, tags, created_at
             FROM servers
             WHERE last_tools_scan IS NULL
               AND (github_url IS NOT NULL OR api_url IS NOT NULL
                    OR health_check_url IS NOT NULL)
             ORDER BY created_at DESC
             LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to select pending servers")?;
        rows.into_iter().map(server_from_row).collect()
    }

    /// Load an explicit set of servers, preserving no particular order.
    /// Unknown ids are skipped.
    pub async fn select_by_ids(&self, ids: &[String]) -> Result<Vec<Server>> {
        let mut servers = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(server) = self.get_server(id).await? {
                servers.push(server);
            } else {
                warn!("requested server {id} not found, skipping");
            }
        }
        Ok(servers)
    }

    /// Replace a server's tool set: delete all existing tool rows (parameters
    /// cascade), then insert the new tools and their parameters in one
    /// transaction. Falls back to tag encoding when the normalized tables
    /// are missing.
    pub async fn replace_server_tools(
        &self,
        server_id: &str,
        tools: &[Tool],
    ) -> Result<StorageOutcome> {
        match self.replace_normalized(server_id, tools).await {
            Ok(()) => {
                // Keep the denormalized tools column in step for catalog search
                let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
                sqlx::query("UPDATE servers SET tools = ? WHERE id = ?")
                    .bind(serde_json::to_string(&names)?)
                    .bind(server_id)
                    .execute(&self.pool)
                    .await
                    .context("Failed to update servers.tools")?;
                Ok(StorageOutcome::Normalized)
            }
            Err(e) if is_missing_table(&e) => {
                debug!("normalized tool tables unavailable, using tag fallback: {e}");
                self.apply_tag_fallback(server_id, tools).await?;
                Ok(StorageOutcome::TagFallback)
            }
            Err(e) => Err(e),
        }
    }

    async fn replace_normalized(&self, server_id: &str, tools: &[Tool]) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        sqlx::query("DELETE FROM server_tools WHERE server_id = ?")
            .bind(server_id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete existing tools")?;

        for tool in tools {
            let (tool_id,): (i64,) = sqlx::query_as(
                "INSERT INTO server_tools
                     (server_id, name, description, method, endpoint, detection_source)
                 VALUES (?, ?, ?, ?, ?, ?)
                 RETURNING id",
            )
            .bind(server_id)
            .bind(&tool.name)
            .bind(&tool.description)
            .bind(&tool.method)
            .bind(&tool.endpoint)
            .bind(tool.detection_source.map(|s| s.as_str()))
            .fetch_one(&mut *tx)
            .await
            .context("Failed to insert tool")?;

            for param in &tool.parameters {
                sqlx::query(
                    "INSERT INTO tool_parameters (tool_id, name, description, type, required)
                     VALUES (?, ?, ?, ?, ?)",
                )
                .bind(tool_id)
                .bind(&param.name)
                .bind(&param.description)
                .bind(&param.param_type)
                .bind(i64::from(param.required))
                .execute(&mut *tx)
                .await
                .context("Failed to insert tool parameter")?;
            }
        }

        tx.commit().await.context("Failed to commit tool replacement")?;
        Ok(())
    }

    /// Degraded-mode storage: encode up to the first ten tool names as
    /// `tool:<name>` tags plus a success/failure marker, preserving
    /// searchability without the richer schema.
    async fn apply_tag_fallback(&self, server_id: &str, tools: &[Tool]) -> Result<()> {
        let existing: Option<(String,)> =
            sqlx::query_as("SELECT tags FROM servers WHERE id = ?")
                .bind(server_id)
                .fetch_optional(&self.pool)
                .await
                .context("Failed to read server tags")?;

        let mut tags: Vec<String> = existing
            .and_then(|(raw,)| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        tags.retain(|tag| {
            !tag.starts_with(TOOL_TAG_PREFIX) && tag != TAG_SUCCESS && tag != TAG_FAILED
        });

        for tool in tools.iter().take(MAX_FALLBACK_TAGS) {
            tags.push(format!("{TOOL_TAG_PREFIX}{}", tool.name));
        }
        tags.push(if tools.is_empty() { TAG_FAILED } else { TAG_SUCCESS }.to_string());

        sqlx::query("UPDATE servers SET tags = ? WHERE id = ?")
            .bind(serde_json::to_string(&tags)?)
            .bind(server_id)
            .execute(&self.pool)
            .await
            .context("Failed to write fallback tags")?;
        Ok(())
    }

    /// Advance the scan marker. Called after every detection attempt, win or
    /// lose, so broken servers don't loop forever.
    pub async fn mark_scanned(&self, server_id: &str) -> Result<()> {
        sqlx::query("UPDATE servers SET last_tools_scan = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(server_id)
            .execute(&self.pool)
            .await
            .context("Failed to update scan marker")?;
        Ok(())
    }

    /// Clear all scan markers so every server is re-eligible. Destructive;
    /// gated behind `--reset --force` in the CLI.
    pub async fn reset_scan_markers(&self) -> Result<u64> {
        let result = sqlx::query("UPDATE servers SET last_tools_scan = NULL")
            .execute(&self.pool)
            .await
            .context("Failed to reset scan markers")?;
        Ok(result.rows_affected())
    }

    /// Append one immutable audit row. Logging failures never abort the
    /// detection flow.
    pub async fn log_detection(
        &self,
        server_id: &str,
        source: &str,
        tools_detected: usize,
        duration_ms: u64,
        error_message: Option<&str>,
    ) {
        let result = sqlx::query(
            "INSERT INTO detection_log
                 (server_id, source, tools_detected, duration_ms, error_message, timestamp)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(server_id)
        .bind(source)
        .bind(tools_detected as i64)
        .bind(duration_ms as i64)
        .bind(error_message)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            warn!("failed to write detection log for {server_id}: {e}");
        }
    }

    /// Upsert install instructions, one row per (server, platform).
    pub async fn upsert_install_instructions(
        &self,
        server_id: &str,
        instructions: &[InstallInstruction],
    ) -> Result<()> {
        for inst in instructions {
            sqlx::query(
                "INSERT INTO server_install_instructions
                     (server_id, platform, install_command, icon_url, source_file, detected_at)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(server_id, platform) DO UPDATE SET
                     install_command = excluded.install_command,
                     icon_url = excluded.icon_url,
                     source_file = excluded.source_file,
                     detected_at = excluded.detected_at",
            )
            .bind(server_id)
            .bind(&inst.platform)
            .bind(&inst.install_command)
            .bind(&inst.icon_url)
            .bind(&inst.source_file)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .context("Failed to upsert install instruction")?;
        }
        Ok(())
    }

    /// Tools currently stored for a server, with their parameters.
    pub async fn tools_for_server(&self, server_id: &str) -> Result<Vec<Tool>> {
        let rows: Vec<(i64, String, String, String, String, Option<String>)> = sqlx::query_as(
            "SELECT id, name, description, method, endpoint, detection_source
             FROM server_tools WHERE server_id = ? ORDER BY id",
        )
        .bind(server_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load server tools")?;

        let mut tools = Vec::with_capacity(rows.len());
        for (tool_id, name, description, method, endpoint, source) in rows {
            let params: Vec<(String, String, String, i64)> = sqlx::query_as(
                "SELECT name, description, type, required
                 FROM tool_parameters WHERE tool_id = ? ORDER BY id",
            )
            .bind(tool_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to load tool parameters")?;

            let mut tool = Tool::new(name, description);
            tool.method = method;
            tool.endpoint = endpoint;
            tool.detection_source = source.and_then(|s| parse_source(&s));
            tool.parameters = params
                .into_iter()
                .map(|(name, description, param_type, required)| ToolParameter {
                    name,
                    description,
                    param_type,
                    required: required != 0,
                })
                .collect();
            tools.push(tool);
        }
        Ok(tools)
    }

    /// Number of detection log rows for a server (test/observability helper).
    pub async fn detection_log_count(&self, server_id: &str) -> Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM detection_log WHERE server_id = ?")
                .bind(server_id)
                .fetch_one(&self.pool)
                .await
                .context("Failed to count detection log rows")?;
        Ok(count)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

type ServerRow = (
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    String,
    String,
);

fn server_from_row(row: ServerRow) -> Result<Server> {
    let (id, name, description, github_url, api_url, health_check_url, last_scan, tags, created) =
        row;
    Ok(Server {
        id,
        name,
        description,
        github_url,
        api_url,
        health_check_url,
        last_tools_scan: last_scan
            .as_deref()
            .map(DateTime::parse_from_rfc3339)
            .transpose()
            .context("Invalid last_tools_scan timestamp")?
            .map(|t| t.with_timezone(&Utc)),
        tags: serde_json::from_str(&tags).unwrap_or_default(),
        created_at: DateTime::parse_from_rfc3339(&created)
            .context("Invalid created_at timestamp")?
            .with_timezone(&Utc),
    })
}

fn parse_source(raw: &str) -> Option<crate::detect::types::DetectionSource> {
    serde_json::from_value(serde_json::Value::String(raw.to_string())).ok()
}

fn is_missing_table(error: &anyhow::Error) -> bool {
    error
        .chain()
        .any(|cause| cause.to_string().contains("no such table"))
}
