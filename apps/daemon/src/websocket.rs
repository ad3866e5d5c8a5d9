// SPDX-FileCopyrightText: © 2026 OpenCLI Daemon Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The per-connection WebSocket session protocol, shared verbatim by the
//! axum `/ws` upgrade (port 9529) and the standalone `tokio-tungstenite`
//! listener (port 9876).
//!
//! Grounded in `websocket_manager.py`'s dispatch loop, with one frame type
//! (`auth`) gating the rest: every connection runs a single message loop,
//! not a separate handshake phase followed by a steady-state loop. An
//! `auth` frame is tried and may succeed or fail at any point in the
//! connection's life; until one succeeds, every other frame type gets back
//! `{type:"error", message:"Not authenticated"}` rather than being acted
//! on, and a failed `auth` attempt leaves the connection open for a retry
//! rather than closing it.
//!
//! Writes are never performed directly against the socket — they go
//! through an `mpsc::UnboundedSender<String>` drained by a dedicated
//! writer task, so a slow or wedged client can never block this
//! connection's read loop, and `submit_task` spawns its own task so a
//! long-running pipeline leaves the read loop free to service
//! `heartbeat`/`cancel_task` concurrently.

use std::time::{SystemTime, UNIX_EPOCH};

use futures::{Sink, SinkExt, Stream, StreamExt};
use opencli_api::protocol::{
    auth_failed_frame, auth_success_frame, chat_chunk_frame, chat_done_frame, error_frame,
    heartbeat_ack_frame, task_cancelled_frame, task_submitted_frame, task_update_frame,
};
use opencli_core::task::TaskData;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::state::AppState;

fn now_ms() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX)).unwrap_or(0)
}

/// Drives one connection's message loop to completion, returning only
/// once the client disconnects. Registers and unregisters this
/// connection's device id with `state.sessions` as auth succeeds and as
/// the connection closes.
///
/// `incoming` abstracts over axum's `WebSocket` and
/// `tokio_tungstenite`'s `WebSocketStream` alike: both split into a
/// `Stream<Item = Result<String, E>>`-shaped read half at their call
/// sites. `tx` is the same channel handed to a [`run_writer`] task
/// driving the connection's write half — the caller owns both ends so it
/// can spawn the writer task before this one starts.
pub async fn run_session<S, E>(mut incoming: S, tx: mpsc::UnboundedSender<String>, state: AppState)
where
    S: Stream<Item = Result<String, E>> + Unpin + Send + 'static,
{
    let mut device_id: Option<String> = None;

    while let Some(Ok(frame)) = incoming.next().await {
        let Ok(parsed) = serde_json::from_str::<Value>(&frame) else {
            let _ = tx.send(error_frame("malformed JSON frame").to_string());
            continue;
        };
        let Some(message_type) = parsed.get("type").and_then(Value::as_str).map(str::to_string) else {
            let _ = tx.send(error_frame("missing 'type' field").to_string());
            continue;
        };

        if message_type == "auth" {
            handle_auth(&state, &tx, &mut device_id, &parsed).await;
            continue;
        }

        let Some(authed_device) = device_id.clone() else {
            let _ = tx.send(error_frame("Not authenticated").to_string());
            continue;
        };

        match message_type.as_str() {
            "heartbeat" => {
                let _ = tx.send(heartbeat_ack_frame().to_string());
            }
            "submit_task" => {
                handle_submit_task(&state, &authed_device, &parsed).await;
            }
            "cancel_task" => {
                handle_cancel_task(&state, &authed_device, &parsed).await;
            }
            "chat" => {
                handle_chat(&tx, &parsed);
            }
            other => {
                let _ = tx.send(error_frame(format!("unknown message type: {other}")).to_string());
            }
        }
    }

    if let Some(device_id) = device_id {
        let mut sessions = state.sessions.lock().await;
        sessions.unregister(&device_id);
        tracing::info!(device_id = %device_id, "mobile session closed");
    }
}

/// Pumps `rx` into `sink`, serializing every write for one connection.
/// Run as its own task so a handler never awaits a socket write directly.
pub async fn run_writer<T, E>(mut rx: mpsc::UnboundedReceiver<String>, mut sink: T)
where
    T: Sink<String, Error = E> + Unpin,
{
    while let Some(text) = rx.recv().await {
        if sink.send(text).await.is_err() {
            break;
        }
    }
}

async fn handle_auth(
    state: &AppState,
    tx: &mpsc::UnboundedSender<String>,
    device_id: &mut Option<String>,
    parsed: &Value,
) {
    let candidate = parsed.get("device_id").and_then(Value::as_str);
    let timestamp = parsed.get("timestamp").and_then(Value::as_i64);
    let token = parsed.get("token").and_then(Value::as_str);

    let (Some(candidate), Some(timestamp), Some(token)) = (candidate, timestamp, token) else {
        let _ = tx.send(error_frame("Missing authentication fields").to_string());
        return;
    };

    if !opencli_core::auth::verify_token(candidate, timestamp, token, &state.config.auth.shared_secret, now_ms()) {
        let _ = tx.send(auth_failed_frame("Invalid authentication token").to_string());
        return;
    }

    if let Some(previous) = device_id.take() {
        if previous != candidate {
            state.sessions.lock().await.unregister(&previous);
        }
    }
    state.sessions.lock().await.register(candidate.to_string(), tx.clone());
    *device_id = Some(candidate.to_string());
    tracing::info!(device_id = %candidate, "mobile session authenticated");

    let _ = tx.send(auth_success_frame(candidate, now_ms()).to_string());
}

async fn send_to(state: &AppState, device_id: &str, frame: Value) {
    let handle = { state.sessions.lock().await.get(device_id) };
    if let Some(handle) = handle {
        let _ = handle.send(frame.to_string());
    }
}

async fn broadcast(state: &AppState, frame: Value) {
    let mut sessions = state.sessions.lock().await;
    sessions.broadcast(&frame.to_string());
}

async fn handle_submit_task(state: &AppState, device_id: &str, parsed: &Value) {
    let task_id = parsed
        .get("task_id")
        .and_then(Value::as_str)
        .map_or_else(|| format!("task_{}", now_ms()), ToString::to_string);
    let Some(task_type) = parsed.get("task_type").and_then(Value::as_str).map(ToString::to_string) else {
        send_to(state, device_id, error_frame("submit_task requires a 'task_type' field")).await;
        return;
    };
    let task_data = parsed.get("task_data").cloned().unwrap_or(Value::Object(serde_json::Map::new()));

    broadcast(state, task_submitted_frame(&task_data, device_id, &task_id)).await;
    send_to(state, device_id, task_update_frame(&task_id, &task_type, "running", serde_json::Map::new())).await;

    let state = state.clone();
    let device_id = device_id.to_string();
    tokio::spawn(async move {
        run_submitted_task(&state, &device_id, &task_id, &task_type, task_data).await;
    });
}

async fn run_submitted_task(
    state: &AppState,
    device_id: &str,
    task_id: &str,
    task_type: &str,
    task_data: Value,
) {
    let Value::Object(map) = task_data else {
        send_fail(state, device_id, task_id, task_type, "task_data must be a JSON object").await;
        return;
    };
    let data: TaskData = map;

    let progress_task_id = task_id.to_string();
    let progress_task_type = task_type.to_string();
    let progress_device_id = device_id.to_string();
    let progress_state = state.clone();
    let on_progress: opencli_core::domain::ProgressCallback = std::sync::Arc::new(move |progress| {
        let state = progress_state.clone();
        let device_id = progress_device_id.clone();
        let task_id = progress_task_id.clone();
        let task_type = progress_task_type.clone();
        Box::pin(async move {
            if { state.sessions.lock().await.is_cancelled(&task_id) } {
                return;
            }
            send_to(&state, &device_id, task_update_frame(&task_id, &task_type, "running", progress)).await;
        })
    });

    if state.sessions.lock().await.is_cancelled(task_id) {
        state.sessions.lock().await.clear_cancelled(task_id);
        send_to(state, device_id, task_cancelled_frame(task_id)).await;
        return;
    }

    let result = state.registry.execute_task_with_progress(task_type, &data, on_progress).await;

    let already_cancelled = {
        let mut sessions = state.sessions.lock().await;
        let cancelled = sessions.is_cancelled(task_id);
        sessions.clear_cancelled(task_id);
        cancelled
    };
    if already_cancelled {
        send_to(state, device_id, task_cancelled_frame(task_id)).await;
        return;
    }

    match result {
        Ok(task_result) => {
            let status = if task_result.is_success() { "completed" } else { "failed" };
            let mut extra = serde_json::Map::new();
            extra.insert("result".to_string(), Value::Object(task_result.into_map()));
            send_to(state, device_id, task_update_frame(task_id, task_type, status, extra)).await;
        }
        Err(err) => {
            send_fail(state, device_id, task_id, task_type, &err.to_string()).await;
        }
    }
}

async fn send_fail(state: &AppState, device_id: &str, task_id: &str, task_type: &str, message: &str) {
    let mut extra = serde_json::Map::new();
    extra.insert("result".to_string(), serde_json::json!({"success": false, "error": message}));
    send_to(state, device_id, task_update_frame(task_id, task_type, "failed", extra)).await;
}

async fn handle_cancel_task(state: &AppState, device_id: &str, parsed: &Value) {
    let Some(task_id) = parsed.get("task_id").and_then(Value::as_str) else {
        send_to(state, device_id, error_frame("cancel_task requires a 'task_id' field")).await;
        return;
    };
    {
        let mut sessions = state.sessions.lock().await;
        sessions.mark_cancelled(task_id);
    }
    send_to(state, device_id, task_cancelled_frame(task_id)).await;
}

fn handle_chat(tx: &mpsc::UnboundedSender<String>, parsed: &Value) {
    let content = parsed.get("content").and_then(Value::as_str).unwrap_or_default();
    let _ = tx.send(chat_chunk_frame(content).to_string());
    let _ = tx.send(chat_done_frame().to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::store::Store;
    use futures::stream;
    use std::convert::Infallible;
    use std::sync::Arc;

    fn test_state() -> AppState {
        let registry = Arc::new(opencli_core::registry::DomainRegistry::new());
        let config = Arc::new(Config::default());
        let store = Store::open_in_memory().unwrap();
        AppState::new(registry, config, store)
    }

    fn auth_frame(state: &AppState, device_id: &str, timestamp: i64) -> String {
        let token = opencli_core::auth::generate_sha256_token(device_id, timestamp, &state.config.auth.shared_secret);
        serde_json::json!({"type": "auth", "device_id": device_id, "timestamp": timestamp, "token": token}).to_string()
    }

    fn frames(values: Vec<String>) -> impl Stream<Item = Result<String, Infallible>> + Unpin {
        stream::iter(values.into_iter().map(Ok))
    }

    #[tokio::test]
    async fn unauthenticated_heartbeat_is_rejected() {
        let state = test_state();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let incoming = frames(vec![serde_json::json!({"type": "heartbeat"}).to_string()]);
        run_session(incoming, tx, state).await;

        let received = rx.recv().await.unwrap();
        assert!(received.contains("Not authenticated"));
    }

    #[tokio::test]
    async fn invalid_token_sends_auth_failed_but_keeps_the_connection_open() {
        let state = test_state();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let bad_auth = serde_json::json!({"type": "auth", "device_id": "d1", "timestamp": now_ms(), "token": "bogus"}).to_string();
        let good_auth = auth_frame(&state, "d1", now_ms());
        let incoming = frames(vec![bad_auth, good_auth]);
        run_session(incoming, tx, state.clone()).await;

        let failed = rx.recv().await.unwrap();
        assert!(failed.contains("auth_failed"));
        assert!(failed.contains("Invalid authentication token"));
        assert!(rx.recv().await.unwrap().contains("auth_success"));
        // after the stream drains, the session (authenticated on the second frame) unregisters on close
        assert_eq!(state.sessions.lock().await.connection_count(), 0);
    }

    #[tokio::test]
    async fn missing_auth_fields_sends_a_plain_error_not_auth_failed() {
        let state = test_state();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let incomplete_auth = serde_json::json!({"type": "auth", "device_id": "d1"}).to_string();
        let incoming = frames(vec![incomplete_auth]);
        run_session(incoming, tx, state).await;

        let received = rx.recv().await.unwrap();
        assert!(received.contains("\"type\":\"error\""));
        assert!(received.contains("Missing authentication fields"));
    }

    #[tokio::test]
    async fn valid_auth_registers_then_unregisters_the_session_on_close() {
        let state = test_state();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let auth = auth_frame(&state, "device-1", now_ms());
        let incoming = frames(vec![auth]);
        run_session(incoming, tx, state.clone()).await;

        assert!(rx.recv().await.unwrap().contains("auth_success"));
        assert_eq!(state.sessions.lock().await.connection_count(), 0);
    }

    #[tokio::test]
    async fn heartbeat_after_auth_gets_acked() {
        let state = test_state();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let auth = auth_frame(&state, "device-1", now_ms());
        let heartbeat = serde_json::json!({"type": "heartbeat"}).to_string();
        let incoming = frames(vec![auth, heartbeat]);
        run_session(incoming, tx, state).await;

        assert!(rx.recv().await.unwrap().contains("auth_success"));
        assert!(rx.recv().await.unwrap().contains("heartbeat_ack"));
    }

    #[tokio::test]
    async fn cancel_task_is_idempotent_and_always_acked() {
        let state = test_state();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let auth = auth_frame(&state, "device-1", now_ms());
        let cancel = serde_json::json!({"type": "cancel_task", "task_id": "t1"}).to_string();
        let incoming = frames(vec![auth, cancel.clone(), cancel]);
        run_session(incoming, tx, state).await;

        assert!(rx.recv().await.unwrap().contains("auth_success"));
        assert!(rx.recv().await.unwrap().contains("task_cancelled"));
        assert!(rx.recv().await.unwrap().contains("task_cancelled"));
    }
}
