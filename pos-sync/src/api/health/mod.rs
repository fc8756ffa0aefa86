//! Health check
//!
//! | Path | Method | Description |
//! |------|--------|-------------|
//! | /health | GET | liveness and connectivity |

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use std::sync::OnceLock;
use std::time::Instant;

use crate::core::AppContext;

static START_TIME: OnceLock<Instant> = OnceLock::new();

pub fn router() -> Router<AppContext> {
    START_TIME.get_or_init(Instant::now);
    Router::new().route("/health", get(health))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_seconds: u64,
    is_online: bool,
    is_syncing: bool,
    queue_depth: usize,
}

pub async fn health(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: START_TIME.get_or_init(Instant::now).elapsed().as_secs(),
        is_online: ctx.monitor.is_online(),
        is_syncing: ctx.orchestrator.is_syncing(),
        queue_depth: ctx.queue.len(),
    })
}
