//! Unauthenticated health-check endpoint.

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// `GET /health` — liveness probe.
///
/// Returns status, uptime, version, and fleet counters. No authentication
/// required, suitable for load-balancer health checks.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let uptime = state.start_time.elapsed().as_secs();
    let devices = state.registry.count().await;
    let pending_uploads = state.schemas.pending_tokens().await;

    Json(json!({
        "status": "ok",
        "service": "swctl",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": uptime,
        "devices": devices,
        "pending_uploads": pending_uploads,
    }))
}
