//! CLI driver for the tool detection pipeline.
//!
//! Default mode runs batches of pending servers until the queue is empty
//! (or the batch cap is hit). `--serve` exposes the same pipeline behind
//! `POST /tools-detector` instead.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use toolprobe::batch::BatchController;
use toolprobe::config::DetectorConfig;
use toolprobe::detect::types::ProcessStatus;
use toolprobe::server::{self, AppState};

#[derive(Parser, Debug)]
#[command(name = "toolprobe", about = "MCP server tool detection pipeline", version)]
struct Cli {
    /// Catalog database path (overrides TOOLPROBE_DB)
    #[arg(long)]
    db: Option<std::path::PathBuf>,

    /// Process only these server ids (comma separated), ignoring the queue
    #[arg(long, value_delimiter = ',')]
    server_ids: Option<Vec<String>>,

    /// Servers selected per batch
    #[arg(long)]
    batch_size: Option<usize>,

    /// Cap on consecutive batches in one run
    #[arg(long)]
    max_batches: Option<usize>,

    /// Clear all scan markers so every server is re-scanned
    #[arg(long)]
    reset: bool,

    /// Actually perform destructive operations (required by --reset)
    #[arg(long)]
    force: bool,

    /// Run the HTTP trigger endpoint instead of a one-shot batch run
    #[arg(long)]
    serve: bool,

    /// Listen address for --serve
    #[arg(long, default_value = "127.0.0.1:3000")]
    listen: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    let mut config = DetectorConfig::from_env();
    if let Some(db) = cli.db {
        config.database_path = db;
    }
    if let Some(batch_size) = cli.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(max_batches) = cli.max_batches {
        config.max_batches = max_batches;
    }

    let max_batches = config.max_batches;
    let batch_delay = config.batch_delay;
    let controller = Arc::new(BatchController::from_config(config).await?);

    if cli.reset {
        if !cli.force {
            warn!("--reset without --force is a dry run; no markers were cleared");
            return Ok(());
        }
        let cleared = controller.store().reset_scan_markers().await?;
        info!("cleared scan markers on {cleared} servers");
        return Ok(());
    }

    if cli.serve {
        let listener = TcpListener::bind(&cli.listen).await?;
        return server::serve(
            listener,
            AppState {
                controller,
                max_batches,
            },
        )
        .await;
    }

    if let Some(ids) = cli.server_ids {
        let summary = controller.run_ids(&ids).await?;
        report(&summary);
        return Ok(());
    }

    // Drain the pending queue batch by batch
    let mut batches = 0;
    loop {
        let summary = controller.run_pending_batch().await?;
        if summary.processed == 0 {
            info!("no pending servers left, done");
            break;
        }
        report(&summary);
        batches += 1;
        if batches >= max_batches {
            warn!("reached batch cap ({max_batches}), stopping");
            break;
        }
        tokio::time::sleep(batch_delay).await;
    }

    Ok(())
}

fn report(summary: &toolprobe::batch::BatchSummary) {
    for result in &summary.results {
        match result.status {
            ProcessStatus::Success => info!(
                "{}: {} tools ({})",
                result.name,
                result.tools_detected.unwrap_or(0),
                result.detection_method.as_deref().unwrap_or("none"),
            ),
            ProcessStatus::Error => warn!(
                "{}: failed: {}",
                result.name,
                result.error.as_deref().unwrap_or("unknown error"),
            ),
        }
    }
    info!(
        "batch done: {} processed, {} succeeded, {} failed, {} tools",
        summary.processed, summary.succeeded, summary.failed, summary.tools_detected
    );
}
