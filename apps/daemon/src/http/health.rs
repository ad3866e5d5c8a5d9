// SPDX-FileCopyrightText: © 2026 OpenCLI Daemon Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! `GET /health` and `GET /api/v1/status` — the two unauthenticated
//! liveness endpoints on the main HTTP port. Distinct from the detailed
//! status document the standalone port 9875 listener returns (see
//! [`crate::status`]): these stay a one-line shape so a load balancer's
//! health check parses them trivially.

use axum::extract::State;
use axum::response::Json;
use serde_json::{json, Value};

use crate::state::AppState;

const DAEMON_VERSION: &str = env!("CARGO_PKG_VERSION");

pub async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

pub async fn status(State(state): State<AppState>) -> Json<Value> {
    state.record_request();
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0);
    Json(json!({"status": "ok", "version": DAEMON_VERSION, "timestamp": timestamp}))
}
