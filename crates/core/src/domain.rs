// SPDX-FileCopyrightText: © 2026 OpenCLI Daemon Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Core domain abstraction and progress-reporting contract.
//!
//! A [`Domain`] is a plugin that claims a disjoint set of `task_type`
//! strings and knows how to execute them. Domains are represented as a
//! capability-based trait object rather than an enum so that new domains
//! (calculator, weather, files, app-scripting, media generation, TTS, ...)
//! can be added without touching the registry or the pipeline engine.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::CoreError;
use crate::task::{TaskData, TaskResult};

/// Display metadata for a single `task_type`, used by clients to render a
/// card for a submitted or completed task without hardcoding per-domain UI.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DisplayConfig {
    pub card_type: String,
    pub title_template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle_template: Option<String>,
    #[serde(default)]
    pub icon: String,
    /// Accent color as `0xAARRGGBB`.
    #[serde(default)]
    pub color_hex: u32,
}

/// A snapshot of in-progress work, forwarded verbatim into the WebSocket
/// `task_update` event alongside `status: "running"`. Domains choose
/// whatever fields make sense (e.g. `{"percent": 40, "stage": "encoding"}`).
pub type ProgressData = serde_json::Map<String, serde_json::Value>;

/// A callback a domain invokes zero or more times while executing a task
/// with progress reporting. Boxed so it can cross the async boundary into
/// whatever executor (WebSocket session, pipeline engine) is driving the
/// task; cloneable so a single callback can be shared across concurrent
/// sub-steps.
pub type ProgressCallback =
    Arc<dyn Fn(ProgressData) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// The fundamental trait for any task domain.
///
/// Implementors own a disjoint slice of `task_type` strings; the
/// [`crate::registry::DomainRegistry`] enforces disjointness at
/// registration time. Every domain must implement [`Domain::execute_task`];
/// progress reporting, display metadata, and the init/dispose lifecycle
/// hooks all have no-op defaults.
#[async_trait]
pub trait Domain: Send + Sync {
    /// Stable identity for this domain, e.g. `"calculator"`.
    fn id(&self) -> &str;

    /// Human-readable name, e.g. `"Calculator & Conversions"`.
    fn name(&self) -> &str;

    /// The `task_type` strings this domain claims. Must be disjoint from
    /// every other registered domain's task types.
    fn task_types(&self) -> Vec<String>;

    /// Executes a single task and returns its result. Domains should never
    /// panic; I/O and validation failures should be converted into
    /// `TaskResult::err(..)` rather than propagated as an `Err`. The `Err`
    /// path exists for truly exceptional conditions (e.g. a poisoned
    /// internal lock) and is treated identically to a `success: false`
    /// result by callers.
    async fn execute_task(
        &self,
        task_type: &str,
        task_data: &TaskData,
    ) -> Result<TaskResult, CoreError>;

    /// Executes a task while streaming progress snapshots through
    /// `on_progress`. The default implementation delegates to
    /// [`Domain::execute_task`] and emits no progress, which is the correct
    /// behavior for domains whose tasks complete fast enough that progress
    /// reporting wouldn't be observed.
    async fn execute_task_with_progress(
        &self,
        task_type: &str,
        task_data: &TaskData,
        _on_progress: ProgressCallback,
    ) -> Result<TaskResult, CoreError> {
        self.execute_task(task_type, task_data).await
    }

    /// Per-task-type display metadata. Empty by default.
    fn display_configs(&self) -> HashMap<String, DisplayConfig> {
        HashMap::new()
    }

    /// Called once, after registration, before the domain serves any task.
    /// A failure here is logged by the registry and does not prevent the
    /// rest of the registry from becoming usable.
    async fn initialize(&self) -> Result<(), CoreError> {
        Ok(())
    }

    /// Called once at daemon shutdown to release any held resources.
    async fn dispose(&self) {}
}

/// Shared, cloneable handle to a registered domain.
pub type DomainHandle = Arc<dyn Domain>;
