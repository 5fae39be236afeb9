//! HTTP trigger surface.
//!
//! A single `POST /tools-detector` endpoint that kicks off a detection run
//! and reports per-server results, mirroring what the CLI driver does. The
//! handler never panics; internal failures come back as a JSON error body
//! with a 500 status.

use std::sync::Arc;

use anyhow::Result;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::batch::BatchController;
use crate::detect::types::ProcessResult;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<BatchController>,
    /// Cap on consecutive batches for `run_mode: "full"`
    pub max_batches: usize,
}

#[derive(Debug, Deserialize, Default)]
pub struct DetectRequest {
    /// Process exactly these servers instead of the pending queue
    #[serde(default)]
    pub server_ids: Option<Vec<String>>,
    /// `"single"` (default) runs one batch; `"full"` drains the queue
    #[serde(default)]
    pub run_mode: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DetectResponse {
    pub success: bool,
    pub servers_processed: usize,
    pub tools_detected: usize,
    pub results: Vec<ProcessResult>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/tools-detector", post(detect_handler))
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn detect_handler(
    State(state): State<AppState>,
    body: Result<Json<DetectRequest>, JsonRejection>,
) -> Response {
    // An absent body means "run one batch of pending servers"; a body that
    // was sent but does not parse is the caller's error and gets a 400
    let request = match body {
        Ok(Json(request)) => request,
        Err(JsonRejection::MissingJsonContentType(_)) => DetectRequest::default(),
        Err(rejection) => {
            let response = ErrorResponse {
                success: false,
                error: format!("invalid request body: {rejection}"),
            };
            return (StatusCode::BAD_REQUEST, Json(response)).into_response();
        }
    };

    let run = run_detection(&state, &request).await;
    match run {
        Ok(results) => {
            let tools_detected = results.iter().filter_map(|r| r.tools_detected).sum();
            let response = DetectResponse {
                success: true,
                servers_processed: results.len(),
                tools_detected,
                results,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            error!("detection run failed: {e:#}");
            let response = ErrorResponse {
                success: false,
                error: format!("{e:#}"),
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(response)).into_response()
        }
    }
}

async fn run_detection(state: &AppState, request: &DetectRequest) -> Result<Vec<ProcessResult>> {
    if let Some(ids) = &request.server_ids {
        let summary = state.controller.run_ids(ids).await?;
        return Ok(summary.results);
    }

    let drain = request.run_mode.as_deref() == Some("full");
    let mut results = Vec::new();
    let mut batches = 0;
    loop {
        let summary = state.controller.run_pending_batch().await?;
        let processed = summary.processed;
        results.extend(summary.results);
        batches += 1;
        if !drain || processed == 0 || batches >= state.max_batches {
            break;
        }
    }
    Ok(results)
}
