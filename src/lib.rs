//! Tool detection pipeline for an MCP server catalog.
//!
//! Given cataloged servers (crawled elsewhere), this crate discovers each
//! server's tools through a tiered strategy: live standard endpoint,
//! conventional alternative endpoints, then static GitHub repository
//! analysis. Results, install instructions, and an audit log are persisted
//! to the catalog database.
//!
//! Entry points:
//! - [`batch::BatchController`] drives batches of per-server detections
//! - [`server`] exposes the same pipeline behind `POST /tools-detector`
//! - the `toolprobe` binary wraps both behind a CLI

pub mod batch;
pub mod cache;
pub mod config;
pub mod detect;
pub mod extract;
pub mod github;
pub mod http;
pub mod install;
pub mod server;
pub mod store;

pub use batch::{BatchController, BatchSummary};
pub use config::DetectorConfig;
pub use detect::types::{DetectionSource, ProcessResult, ProcessStatus, Tool, ToolParameter};
pub use detect::Detector;
pub use store::{Server, Store};
