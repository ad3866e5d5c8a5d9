// SPDX-FileCopyrightText: © 2026 OpenCLI Daemon Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The OpenCLI automation daemon: a local HTTP/WebSocket service that
//! runs pipelines of pluggable "domain" task executors, compiles
//! generated episode scripts into those pipelines, and drives them for
//! desktop and mobile clients over three independently-bindable
//! listeners (HTTP+WS, standalone WS, status).

pub mod cli;
pub mod config;
pub mod error;
pub mod file_security;
pub mod http;
pub mod logging;
pub mod server;
pub mod session;
pub mod state;
pub mod status;
pub mod store;
pub mod websocket;

pub use config::Config;
pub use error::DaemonError;
pub use state::AppState;

use std::net::SocketAddr;
use std::sync::Arc;

/// Builds the domain registry and store from `config` and runs the
/// three listeners concurrently until the process is killed.
///
/// Grounded in `examples/original_source/daemon-py/opencli_daemon/daemon.py`'s
/// `asyncio.gather` of its HTTP, WS, and status coroutines: each listener
/// here (see [`server::serve_http`], [`server::serve_ws`],
/// [`status::serve`]) already swallows its own bind failure and logs it
/// rather than propagating, so `tokio::join!` never short-circuits the
/// other two on one listener's failure — it only returns once all three
/// tasks have themselves returned, which in practice is "never" for a
/// long-running daemon.
///
/// # Errors
///
/// Returns an error if the domain registry or persistence store cannot
/// be constructed before any listener starts.
pub async fn run_daemon(config: Config) -> Result<(), DaemonError> {
    let mut registry = opencli_core::registry::DomainRegistry::new();
    opencli_domains::register_builtin_domains(&mut registry)
        .map_err(|e| DaemonError::Config(format!("failed to register builtin domains: {e}")))?;
    registry.initialize_all().await;
    let registry: opencli_core::registry::SharedRegistry = Arc::new(registry);

    let store = store::Store::open(std::path::Path::new(&config.persistence.db_path))?;

    let config = Arc::new(config);
    let state = state::AppState::new(registry, Arc::clone(&config), store);

    let http_addr = SocketAddr::new(
        config.server.bind_address.parse().map_err(|e| {
            DaemonError::Config(format!("invalid server.bind_address '{}': {e}", config.server.bind_address))
        })?,
        config.server.http_port,
    );
    let ws_addr = SocketAddr::new(http_addr.ip(), config.server.ws_port);
    let status_addr = SocketAddr::new(http_addr.ip(), config.server.status_port);

    let (_, _, _) = tokio::join!(
        server::serve_http(http_addr, state.clone()),
        server::serve_ws(ws_addr, state.clone()),
        status::serve(status_addr, state),
    );

    Ok(())
}
