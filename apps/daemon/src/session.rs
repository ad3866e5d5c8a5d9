// SPDX-FileCopyrightText: © 2026 OpenCLI Daemon Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Mobile/desktop session bookkeeping shared by both WebSocket listeners
//! (the `/ws` upgrade on the HTTP port and the standalone port).
//!
//! Grounded in `websocket_manager.py`'s `_connections`/`_ws_connections`
//! maps: one session per authenticated `device_id`, a broadcast fan-out
//! that evicts dead senders as it goes, and a cancellation flag set so a
//! `cancel_task` frame can reach an in-flight pipeline run.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

/// A single authenticated connection's outgoing half. Writes are never
/// performed directly against the socket from a handler; they go through
/// this channel so the connection's writer task can serialize them.
#[derive(Clone)]
pub struct SessionHandle {
    pub device_id: String,
    sender: mpsc::UnboundedSender<String>,
}

impl SessionHandle {
    /// Queues `text` for delivery on this session. Returns `false` if the
    /// session's writer task has already gone away (the session is dead).
    pub fn send(&self, text: String) -> bool {
        self.sender.send(text).is_ok()
    }
}

#[derive(Default)]
pub struct SessionManager {
    sessions: HashMap<String, SessionHandle>,
    cancelled: HashSet<String>,
}

impl SessionManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a newly authenticated session, replacing any prior
    /// session for the same `device_id` (a fresh auth handshake for a
    /// known device supersedes its old connection, per the original's
    /// 1:1 device-to-connection mapping).
    pub fn register(&mut self, device_id: String, sender: mpsc::UnboundedSender<String>) {
        self.sessions.insert(device_id.clone(), SessionHandle { device_id, sender });
    }

    pub fn unregister(&mut self, device_id: &str) {
        self.sessions.remove(device_id);
        self.cancelled.remove(device_id);
    }

    #[must_use]
    pub fn get(&self, device_id: &str) -> Option<SessionHandle> {
        self.sessions.get(device_id).cloned()
    }

    #[must_use]
    pub fn connected_device_ids(&self) -> Vec<String> {
        self.sessions.keys().cloned().collect()
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.sessions.len()
    }

    /// Sends `text` to every registered session, dropping any whose
    /// writer task has already exited.
    pub fn broadcast(&mut self, text: &str) {
        self.sessions.retain(|_, handle| handle.send(text.to_string()));
    }

    /// Marks a task cancelled for a device. Idempotent: cancelling an
    /// already-cancelled or unknown task id is not an error.
    pub fn mark_cancelled(&mut self, task_id: &str) {
        self.cancelled.insert(task_id.to_string());
    }

    #[must_use]
    pub fn is_cancelled(&self, task_id: &str) -> bool {
        self.cancelled.contains(task_id)
    }

    pub fn clear_cancelled(&mut self, task_id: &str) {
        self.cancelled.remove(task_id);
    }
}

pub type SharedSessionManager = Arc<Mutex<SessionManager>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn registering_a_known_device_replaces_its_prior_session() {
        let mut manager = SessionManager::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        manager.register("device-1".to_string(), tx1);
        manager.register("device-1".to_string(), tx2);

        assert_eq!(manager.connection_count(), 1);
        manager.broadcast("hello");
        assert!(rx2.try_recv().is_ok());
        drop(rx1.try_recv());
    }

    #[tokio::test]
    async fn broadcast_evicts_dead_sessions() {
        let mut manager = SessionManager::new();
        let (tx, rx) = mpsc::unbounded_channel();
        manager.register("device-1".to_string(), tx);
        drop(rx);

        manager.broadcast("hello");
        assert_eq!(manager.connection_count(), 0);
    }

    #[test]
    fn cancellation_is_idempotent() {
        let mut manager = SessionManager::new();
        manager.mark_cancelled("task-1");
        manager.mark_cancelled("task-1");
        assert!(manager.is_cancelled("task-1"));
        manager.clear_cancelled("task-1");
        assert!(!manager.is_cancelled("task-1"));
    }
}
