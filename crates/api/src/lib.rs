// SPDX-FileCopyrightText: © 2026 OpenCLI Daemon Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Wire-format and persisted-data types shared between the pipeline
//! engine and the daemon's HTTP/WebSocket surface.
//!
//! - [`model`]: `Pipeline`, its nodes/edges/params, and `EpisodeScript`.
//! - [`protocol`]: the WebSocket JSON frame shapes of `/ws` and the
//!   plain-WS port, plus the status endpoint's response shape.
//!
//! Every exported type derives [`schemars::JsonSchema`] and [`ts_rs::TS`]
//! so the desktop UI's TypeScript client can be generated straight from
//! this crate rather than hand-kept in sync.

pub mod model;
pub mod protocol;

pub use model::{Character, DialogueLine, EpisodeScript, Pipeline, PipelineEdge, PipelineNode, PipelineParam, Position, Scene};
pub use protocol::{
    auth_failed_frame, auth_success_frame, chat_chunk_frame, chat_done_frame, error_frame,
    heartbeat_ack_frame, task_cancelled_frame, task_submitted_frame, task_update_frame,
    AuthFailed, AuthRequest, AuthSuccess, CancelTask, ChatChunk, ChatDone, ChatMessage,
    DaemonStatus, ErrorMessage, Heartbeat, HeartbeatAck, MobileStatus, StatusResponse, SubmitTask,
    TaskCancelled, TaskSubmitted, TaskUpdate,
};
