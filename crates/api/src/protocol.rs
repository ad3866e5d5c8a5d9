// SPDX-FileCopyrightText: © 2026 OpenCLI Daemon Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! WebSocket wire messages exchanged on the `/ws` (port 9529) and plain-WS
//! (port 9876) endpoints. Both endpoints speak the exact same JSON frame
//! protocol, so both live atop this one module.
//!
//! Frames are untagged on the wire (a bare `type` string field), not a
//! Rust `enum` with `#[serde(tag = "type")]`: client frames carry ad-hoc
//! extra fields the server doesn't validate (`submit_task`'s full task
//! payload, for one), and server replies are built incrementally as a
//! `serde_json::Map` rather than matched structurally. Each message shape
//! below is a plain struct for documentation, schema export, and
//! TypeScript bindings; construction and parsing happens by hand in the
//! session layer, the same way the daemon's original WebSocket handler
//! worked directly with JSON objects rather than a typed envelope.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

/// Client → server. First frame on every connection.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, TS)]
#[ts(export)]
pub struct AuthRequest {
    #[serde(rename = "type")]
    pub message_type: String,
    pub device_id: String,
    pub timestamp: i64,
    pub token: String,
}

/// Server → client, on successful authentication.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, TS)]
#[ts(export)]
pub struct AuthSuccess {
    #[serde(rename = "type")]
    pub message_type: String,
    pub device_id: String,
    pub server_time: i64,
}

/// Server → client, on an invalid token.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, TS)]
#[ts(export)]
pub struct AuthFailed {
    #[serde(rename = "type")]
    pub message_type: String,
    pub message: String,
}

/// Client → server keepalive.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, TS)]
#[ts(export)]
pub struct Heartbeat {
    #[serde(rename = "type")]
    pub message_type: String,
}

/// Server → client, reply to [`Heartbeat`].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, TS)]
#[ts(export)]
pub struct HeartbeatAck {
    #[serde(rename = "type")]
    pub message_type: String,
}

/// Client → server, a single-task (non-pipeline) submission. `task_data`
/// holds the domain-specific parameters verbatim; the daemon does not
/// interpret its shape beyond handing it to the registry.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, TS)]
#[ts(export)]
pub struct SubmitTask {
    #[serde(rename = "type")]
    pub message_type: String,
    pub task_id: String,
    pub task_type: String,
    #[serde(default)]
    pub task_data: Value,
}

/// Server → client (and, for the `task_submitted` variant, every other
/// session), the recurring status frame. `status` is one of `"running"`,
/// `"completed"`, or `"failed"`; `result` and the flattened progress
/// fields are only present on the corresponding status.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, TS)]
#[ts(export)]
pub struct TaskUpdate {
    #[serde(rename = "type")]
    pub message_type: String,
    pub task_id: String,
    pub task_type: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(flatten)]
    pub progress: serde_json::Map<String, Value>,
}

/// Server → all sessions, emitted whenever any session submits a task —
/// lets other devices belonging to the same user observe activity.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, TS)]
#[ts(export)]
pub struct TaskSubmitted {
    #[serde(rename = "type")]
    pub message_type: String,
    pub task_data: Value,
    pub device_id: String,
    pub task_id: String,
}

/// Client → server, marks a task (running or not yet started) cancelled.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, TS)]
#[ts(export)]
pub struct CancelTask {
    #[serde(rename = "type")]
    pub message_type: String,
    pub task_id: String,
}

/// Server → client, acknowledges a [`CancelTask`]. Sent unconditionally;
/// cancellation is idempotent and makes no claim about whether the task
/// existed.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, TS)]
#[ts(export)]
pub struct TaskCancelled {
    #[serde(rename = "type")]
    pub message_type: String,
    pub task_id: String,
}

/// Client → server, placeholder conversational input.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, TS)]
#[ts(export)]
pub struct ChatMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    pub content: String,
}

/// Server → client, one chunk of a (currently echoed) chat reply.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, TS)]
#[ts(export)]
pub struct ChatChunk {
    #[serde(rename = "type")]
    pub message_type: String,
    pub content: String,
}

/// Server → client, terminates a chat reply's chunk sequence.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, TS)]
#[ts(export)]
pub struct ChatDone {
    #[serde(rename = "type")]
    pub message_type: String,
}

/// Server → client, a validation-level or authentication-level failure
/// that does not close the connection.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, TS)]
#[ts(export)]
pub struct ErrorMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    pub message: String,
}

/// Response body of the lightweight status endpoint (port 9875).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, TS)]
#[ts(export)]
pub struct StatusResponse {
    pub daemon: DaemonStatus,
    pub mobile: MobileStatus,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, TS)]
#[ts(export)]
pub struct DaemonStatus {
    pub version: String,
    pub uptime_seconds: u64,
    pub memory_mb: f64,
    pub total_requests: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, TS)]
#[ts(export)]
pub struct MobileStatus {
    pub connected_clients: usize,
    pub client_ids: Vec<String>,
}

/// Builds `{type: "error", message}`.
#[must_use]
pub fn error_frame(message: impl Into<String>) -> Value {
    serde_json::json!({"type": "error", "message": message.into()})
}

/// Builds `{type: "auth_failed", message}`.
#[must_use]
pub fn auth_failed_frame(message: impl Into<String>) -> Value {
    serde_json::json!({"type": "auth_failed", "message": message.into()})
}

/// Builds `{type: "auth_success", device_id, server_time}`.
#[must_use]
pub fn auth_success_frame(device_id: &str, server_time: i64) -> Value {
    serde_json::json!({"type": "auth_success", "device_id": device_id, "server_time": server_time})
}

/// Builds `{type: "heartbeat_ack"}`.
#[must_use]
pub fn heartbeat_ack_frame() -> Value {
    serde_json::json!({"type": "heartbeat_ack"})
}

/// Builds `{type: "task_cancelled", task_id}`.
#[must_use]
pub fn task_cancelled_frame(task_id: &str) -> Value {
    serde_json::json!({"type": "task_cancelled", "task_id": task_id})
}

/// Builds the `task_submitted` broadcast frame.
#[must_use]
pub fn task_submitted_frame(task_data: &Value, device_id: &str, task_id: &str) -> Value {
    serde_json::json!({
        "type": "task_submitted",
        "task_data": task_data,
        "device_id": device_id,
        "task_id": task_id,
    })
}

/// Builds a `task_update` frame. `extra` is merged in (flattened progress
/// data for `running`, or `{"result": ...}` for `completed`/`failed`).
#[must_use]
pub fn task_update_frame(
    task_id: &str,
    task_type: &str,
    status: &str,
    extra: serde_json::Map<String, Value>,
) -> Value {
    let mut map = serde_json::Map::new();
    map.insert("type".to_string(), Value::String("task_update".to_string()));
    map.insert("task_id".to_string(), Value::String(task_id.to_string()));
    map.insert("task_type".to_string(), Value::String(task_type.to_string()));
    map.insert("status".to_string(), Value::String(status.to_string()));
    map.extend(extra);
    Value::Object(map)
}

/// Builds `{type: "chunk", content}`.
#[must_use]
pub fn chat_chunk_frame(content: &str) -> Value {
    serde_json::json!({"type": "chunk", "content": content})
}

/// Builds `{type: "done"}`.
#[must_use]
pub fn chat_done_frame() -> Value {
    serde_json::json!({"type": "done"})
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_update_frame_merges_extra_fields() {
        let mut extra = serde_json::Map::new();
        extra.insert("progress".to_string(), Value::from(42));
        let frame = task_update_frame("t1", "calculator_eval", "running", extra);
        assert_eq!(frame["type"], Value::String("task_update".to_string()));
        assert_eq!(frame["progress"], Value::from(42));
    }

    #[test]
    fn auth_success_frame_has_expected_shape() {
        let frame = auth_success_frame("device-1", 1_700_000_000);
        assert_eq!(frame["type"], Value::String("auth_success".to_string()));
        assert_eq!(frame["device_id"], Value::String("device-1".to_string()));
    }
}
