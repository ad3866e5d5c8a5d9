// SPDX-FileCopyrightText: © 2026 OpenCLI Daemon Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Shared daemon state, threaded through every axum handler and both
//! WebSocket listeners. Grounded in the teacher's `state.rs`: a small
//! `Clone`-able struct of `Arc`s, constructed once in `main.rs`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use opencli_core::registry::SharedRegistry;

use crate::config::Config;
use crate::session::SharedSessionManager;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub registry: SharedRegistry,
    pub sessions: SharedSessionManager,
    pub config: Arc<Config>,
    pub store: Store,
    pub started_at: Instant,
    pub request_count: Arc<AtomicU64>,
}

impl AppState {
    #[must_use]
    pub fn new(registry: SharedRegistry, config: Arc<Config>, store: Store) -> Self {
        Self {
            registry,
            sessions: Arc::new(tokio::sync::Mutex::new(crate::session::SessionManager::new())),
            config,
            store,
            started_at: Instant::now(),
            request_count: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn record_request(&self) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
