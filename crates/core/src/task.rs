// SPDX-FileCopyrightText: © 2026 OpenCLI Daemon Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Task input/output types.
//!
//! A [`Task`] is transient: identified by a `task_type` string plus a
//! free-form `task_data` mapping. It is never persisted. A domain consumes a
//! task and produces a [`TaskResult`], an opaque mapping callers only rely on
//! for its `success` flag and whatever fields downstream pipeline nodes
//! reference by name.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;

/// Free-form task parameters. Keys are domain-defined; values may be any
/// JSON type, including template strings resolved by the pipeline engine.
pub type TaskData = Map<String, Value>;

/// The result of executing a task. Wraps an arbitrary JSON object so that
/// domains can return whatever fields make sense for them, while the
/// dispatcher and pipeline engine only ever inspect `success` and
/// `error`, plus whatever fields a downstream node's template references.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(transparent)]
pub struct TaskResult(pub Map<String, Value>);

impl TaskResult {
    /// Builds a successful result from a set of domain-specific fields.
    /// `success: true` is inserted automatically; an explicit `success` key
    /// in `fields` is overwritten.
    pub fn ok(mut fields: Map<String, Value>) -> Self {
        fields.insert("success".to_string(), Value::Bool(true));
        Self(fields)
    }

    /// Builds a successful result with no additional fields.
    pub fn ok_empty() -> Self {
        Self::ok(Map::new())
    }

    /// Builds a failed result carrying a human-readable error message.
    pub fn err(message: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert("success".to_string(), Value::Bool(false));
        map.insert("error".to_string(), Value::String(message.into()));
        Self(map)
    }

    /// A failed result additionally flagged `skipped: true`, used by the
    /// pipeline engine for skip-on-upstream-failure and partial
    /// re-execution bookkeeping. Never produced by a domain itself.
    pub fn skipped(success: bool) -> Self {
        let mut map = Map::new();
        map.insert("success".to_string(), Value::Bool(success));
        map.insert("skipped".to_string(), Value::Bool(true));
        Self(map)
    }

    /// Whether this result represents success, per the `success` field.
    /// Absent or non-boolean `success` is treated as failure.
    pub fn is_success(&self) -> bool {
        matches!(self.0.get("success"), Some(Value::Bool(true)))
    }

    /// The `error` field, if present and a string.
    pub fn error(&self) -> Option<&str> {
        self.0.get("error").and_then(Value::as_str)
    }

    /// Looks up an arbitrary field by name, as referenced by
    /// `{{node_id.field}}` template expressions.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Borrows the underlying JSON object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consumes this result, returning the underlying JSON object.
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for TaskResult {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_sets_success_true() {
        let mut fields = Map::new();
        fields.insert("result".to_string(), Value::from(4));
        let r = TaskResult::ok(fields);
        assert!(r.is_success());
        assert_eq!(r.field("result"), Some(&Value::from(4)));
    }

    #[test]
    fn err_carries_message_and_fails() {
        let r = TaskResult::err("boom");
        assert!(!r.is_success());
        assert_eq!(r.error(), Some("boom"));
    }

    #[test]
    fn missing_success_field_is_failure() {
        let r = TaskResult(Map::new());
        assert!(!r.is_success());
    }
}
