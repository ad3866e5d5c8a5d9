// SPDX-FileCopyrightText: © 2026 OpenCLI Daemon Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The lightweight status listener (port 9875): a single unauthenticated
//! GET endpoint returning daemon liveness and mobile-session counts, kept
//! separate from the main HTTP port so a health-checking process (or a
//! load balancer) never has to speak the `/api/v1` surface.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::State;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use opencli_api::protocol::{DaemonStatus, MobileStatus, StatusResponse};
use sysinfo::System;

use crate::state::AppState;

const DAEMON_VERSION: &str = env!("CARGO_PKG_VERSION");

async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    let memory_mb = process_memory_mb();
    let sessions = state.sessions.lock().await;
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0);

    Json(StatusResponse {
        daemon: DaemonStatus {
            version: DAEMON_VERSION.to_string(),
            uptime_seconds: state.uptime_seconds(),
            memory_mb,
            total_requests: state.request_count.load(std::sync::atomic::Ordering::Relaxed),
        },
        mobile: MobileStatus {
            connected_clients: sessions.connection_count(),
            client_ids: sessions.connected_device_ids(),
        },
        timestamp,
    })
}

fn process_memory_mb() -> f64 {
    let Ok(pid) = sysinfo::get_current_pid() else {
        return 0.0;
    };
    let mut system = System::new();
    system.refresh_processes(sysinfo::ProcessesToUpdate::Some(&[pid]), true);
    system.process(pid).map_or(0.0, |process| {
        #[allow(clippy::cast_precision_loss)]
        let bytes = process.memory() as f64;
        bytes / (1024.0 * 1024.0)
    })
}

/// Builds the standalone status router, bound independently of the main
/// HTTP+WS listener.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new().route("/api/v1/status", get(status_handler)).with_state(state)
}

/// Runs the status listener until the process exits. Logs and returns
/// `Ok(())` on a bind failure rather than propagating it, so a port
/// collision on this listener alone does not bring down the other two.
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<(), Infallible> {
    match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => {
            tracing::info!(%addr, "status listener bound");
            if let Err(err) = axum::serve(listener, router(state)).await {
                tracing::error!(%addr, error = %err, "status listener exited with an error");
            }
        }
        Err(err) => {
            tracing::error!(%addr, error = %err, "failed to bind status listener");
        }
    }
    Ok(())
}
