// SPDX-FileCopyrightText: © 2026 OpenCLI Daemon Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Persisted data model shapes: pipelines, their nodes/edges/params, and
//! episode scripts. These are plain data — the pipeline engine and the
//! episode compiler operate on them, and the HTTP layer serializes them
//! directly to/from JSON for the desktop UI's CRUD endpoints.

use std::collections::HashMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

/// 2D canvas position, used only for UI layout — never consulted by the
/// execution engine.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema, TS)]
#[ts(export)]
pub struct Position {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

/// A single node in a pipeline DAG. `node_type` is a `task_type` string
/// routed by the domain registry; `params` values may be literals or
/// template strings containing `{{source_id.field}}` / `{{params.name}}`
/// references, resolved by the engine immediately before execution.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, TS)]
#[ts(export)]
pub struct PipelineNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub params: HashMap<String, Value>,
}

/// A dependency edge between two pipeline nodes. Ports exist for UI layout
/// and do not gate execution: any edge establishes a `target` depends-on
/// `source` relationship regardless of port names.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, TS)]
#[ts(export)]
pub struct PipelineEdge {
    pub id: String,
    pub source_node: String,
    #[serde(default = "default_port")]
    pub source_port: String,
    pub target_node: String,
    #[serde(default = "default_target_port")]
    pub target_port: String,
}

fn default_port() -> String {
    "output".to_string()
}

fn default_target_port() -> String {
    "input".to_string()
}

/// A pipeline-level parameter, referenceable from any node's params via
/// `{{params.name}}` and overridable per execution via `override_params`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, TS)]
#[ts(export)]
pub struct PipelineParam {
    pub name: String,
    #[serde(default = "default_param_type")]
    #[serde(rename = "type")]
    pub param_type: String,
    #[serde(default)]
    pub default: Value,
    #[serde(default)]
    pub description: String,
}

fn default_param_type() -> String {
    "string".to_string()
}

/// A persisted pipeline: a DAG of task nodes and the edges between them.
///
/// Invariants enforced at load time by the engine, not by this type:
/// every edge's endpoints reference an existing node id, node ids are
/// unique within the pipeline, and the edge graph is acyclic.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, TS)]
#[ts(export)]
pub struct Pipeline {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub nodes: Vec<PipelineNode>,
    #[serde(default)]
    pub edges: Vec<PipelineEdge>,
    #[serde(default)]
    pub parameters: Vec<PipelineParam>,
    #[serde(default = "now_iso")]
    pub created_at: String,
    #[serde(default = "now_iso")]
    pub updated_at: String,
}

fn now_iso() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}

impl Pipeline {
    /// Checks the three structural invariants a pipeline must satisfy
    /// before it can be executed: unique node ids, edges that reference
    /// real nodes, and (left to the engine's own cycle check) acyclicity.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violation found.
    pub fn validate_structure(&self) -> Result<(), String> {
        let mut seen = std::collections::HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node.id.as_str()) {
                return Err(format!("duplicate node id: {}", node.id));
            }
        }
        for edge in &self.edges {
            if !seen.contains(edge.source_node.as_str()) {
                return Err(format!("edge '{}' references unknown source node '{}'", edge.id, edge.source_node));
            }
            if !seen.contains(edge.target_node.as_str()) {
                return Err(format!("edge '{}' references unknown target node '{}'", edge.id, edge.target_node));
            }
        }
        Ok(())
    }
}

/// A single line of spoken dialogue within a [`Scene`].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, TS)]
#[ts(export)]
pub struct DialogueLine {
    pub character_id: String,
    pub text: String,
    #[serde(default)]
    pub emotion: String,
    #[serde(default)]
    pub voice: String,
}

/// One scene of an [`EpisodeScript`]. Never executed directly; the episode
/// compiler lowers it into a subgraph of pipeline nodes.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, TS)]
#[ts(export)]
pub struct Scene {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub visual_prompt: String,
    #[serde(default)]
    pub dialogue: Vec<DialogueLine>,
    #[serde(default)]
    pub duration_seconds: f64,
    #[serde(default)]
    pub shot_type: String,
    #[serde(default)]
    pub transition: String,
}

/// A character appearing in an [`EpisodeScript`].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, TS)]
#[ts(export)]
pub struct Character {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub voice: String,
    #[serde(default)]
    pub description: String,
}

/// A narrative script: the episode compiler's input. Compiles to a
/// [`Pipeline`] via `opencli_engine::episode::compile_episode`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, TS)]
#[ts(export)]
pub struct EpisodeScript {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub synopsis: String,
    #[serde(default)]
    pub characters: Vec<Character>,
    #[serde(default)]
    pub scenes: Vec<Scene>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str) -> PipelineNode {
        PipelineNode {
            id: id.to_string(),
            node_type: "calculator_eval".to_string(),
            domain: None,
            label: None,
            position: Position::default(),
            params: HashMap::new(),
        }
    }

    fn edge(id: &str, source: &str, target: &str) -> PipelineEdge {
        PipelineEdge {
            id: id.to_string(),
            source_node: source.to_string(),
            source_port: default_port(),
            target_node: target.to_string(),
            target_port: default_target_port(),
        }
    }

    #[test]
    fn validate_structure_rejects_duplicate_node_ids() {
        let pipeline = Pipeline {
            id: "p1".to_string(),
            name: "test".to_string(),
            description: String::new(),
            nodes: vec![node("a"), node("a")],
            edges: vec![],
            parameters: vec![],
            created_at: now_iso(),
            updated_at: now_iso(),
        };
        assert!(pipeline.validate_structure().is_err());
    }

    #[test]
    fn validate_structure_rejects_dangling_edge() {
        let pipeline = Pipeline {
            id: "p1".to_string(),
            name: "test".to_string(),
            description: String::new(),
            nodes: vec![node("a")],
            edges: vec![edge("e1", "a", "missing")],
            parameters: vec![],
            created_at: now_iso(),
            updated_at: now_iso(),
        };
        assert!(pipeline.validate_structure().is_err());
    }

    #[test]
    fn validate_structure_accepts_well_formed_pipeline() {
        let pipeline = Pipeline {
            id: "p1".to_string(),
            name: "test".to_string(),
            description: String::new(),
            nodes: vec![node("a"), node("b")],
            edges: vec![edge("e1", "a", "b")],
            parameters: vec![],
            created_at: now_iso(),
            updated_at: now_iso(),
        };
        assert!(pipeline.validate_structure().is_ok());
    }
}
