// SPDX-FileCopyrightText: © 2026 OpenCLI Daemon Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The pipeline executor: layered (Kahn's algorithm) execution of a
//! [`Pipeline`] DAG with intra-wave parallelism, skip-on-upstream-failure
//! propagation, partial re-execution, and cooperative cancellation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use opencli_api::{Pipeline, PipelineNode};
use opencli_core::{DomainRegistry, TaskData, TaskResult};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::graph::{find_upstream_nodes, has_cycle, Graph};
use crate::template::{split_identifier, Template};

/// The lifecycle state of one pipeline node across a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl NodeStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

/// One wave-completion event, emitted after each executed node settles.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub pipeline_id: String,
    pub node_id: String,
    pub node_status: String,
    pub progress: u32,
}

/// Called synchronously from within the execution loop; implementations
/// that need to await (e.g. a WebSocket send) should hop onto a channel
/// rather than block here.
pub type ProgressFn = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Cooperative cancellation predicate, polled between waves.
pub type CancelledFn = Arc<dyn Fn() -> bool + Send + Sync>;

/// Tunables for a single [`execute_pipeline`] call.
#[derive(Default, Clone)]
pub struct ExecutionOptions {
    pub override_params: HashMap<String, Value>,
    pub on_progress: Option<ProgressFn>,
    pub start_from_node: Option<String>,
    pub previous_results: HashMap<String, TaskResult>,
    pub is_cancelled: Option<CancelledFn>,
}

/// The outcome of a full pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineExecutionResult {
    pub success: bool,
    pub pipeline_id: String,
    pub node_results: HashMap<String, TaskResult>,
    pub node_statuses: HashMap<String, NodeStatus>,
    pub failed_nodes: Vec<String>,
    pub skipped_nodes: Vec<String>,
    pub duration_ms: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Executes `pipeline` to completion (or until a cycle is detected, or
/// cancellation is observed), per §4.D of the design: parameter
/// resolution, graph construction, cycle check, skip-set precomputation,
/// then layered execution with intra-level parallelism.
pub async fn execute_pipeline(
    pipeline: &Pipeline,
    registry: &DomainRegistry,
    options: ExecutionOptions,
) -> PipelineExecutionResult {
    let start = Instant::now();

    let mut merged_params: HashMap<String, Value> =
        pipeline.parameters.iter().map(|p| (p.name.clone(), p.default.clone())).collect();
    merged_params.extend(options.override_params);
    let merged_params = Arc::new(merged_params);

    let node_ids: Vec<String> = pipeline.nodes.iter().map(|n| n.id.clone()).collect();
    let node_map: HashMap<&str, &PipelineNode> =
        pipeline.nodes.iter().map(|n| (n.id.as_str(), n)).collect();

    let graph = Graph::build(&node_ids, &pipeline.edges);

    if has_cycle(&node_ids, &graph.dependents) {
        return PipelineExecutionResult {
            success: false,
            pipeline_id: pipeline.id.clone(),
            node_results: HashMap::new(),
            node_statuses: HashMap::new(),
            failed_nodes: Vec::new(),
            skipped_nodes: Vec::new(),
            duration_ms: start.elapsed().as_millis(),
            error: Some("Pipeline contains a cycle".to_string()),
        };
    }

    let mut node_results: HashMap<String, TaskResult> = HashMap::new();
    let mut node_statuses: HashMap<String, NodeStatus> =
        node_ids.iter().map(|id| (id.clone(), NodeStatus::Pending)).collect();

    let mut skip_nodes: HashSet<String> = HashSet::new();
    if let Some(start_from) = &options.start_from_node {
        skip_nodes = find_upstream_nodes(start_from, &graph.sources);
        for (nid, result) in &options.previous_results {
            node_results.insert(nid.clone(), result.clone());
            node_statuses.insert(nid.clone(), NodeStatus::Completed);
        }
        for nid in &skip_nodes {
            if !node_results.contains_key(nid) {
                node_statuses.insert(nid.clone(), NodeStatus::Skipped);
                node_results.insert(nid.clone(), TaskResult::skipped(true));
            }
        }
    }

    let node_results = Arc::new(RwLock::new(node_results));
    let node_statuses = Arc::new(RwLock::new(node_statuses));

    let mut in_degree = graph.in_degree;
    let dependents = graph.dependents;
    let sources = graph.sources;

    let mut queue: Vec<String> =
        in_degree.iter().filter(|(_, &deg)| deg == 0).map(|(id, _)| id.clone()).collect();
    let mut completed_count: u64 = 0;
    let total = node_ids.iter().filter(|id| !skip_nodes.contains(*id)).count().max(1) as u64;

    let mut run_error: Option<String> = None;

    while !queue.is_empty() {
        if let Some(is_cancelled) = &options.is_cancelled {
            if is_cancelled() {
                let mut statuses = node_statuses.write().await;
                let mut results = node_results.write().await;
                for id in &node_ids {
                    if statuses.get(id.as_str()) == Some(&NodeStatus::Pending) {
                        statuses.insert(id.clone(), NodeStatus::Skipped);
                        results.entry(id.clone()).or_insert_with(|| TaskResult::skipped(false));
                    }
                }
                run_error = Some("Cancelled".to_string());
                break;
            }
        }

        let current_level = std::mem::take(&mut queue);
        let (to_skip, to_execute): (Vec<String>, Vec<String>) =
            current_level.into_iter().partition(|id| skip_nodes.contains(id));

        for nid in &to_skip {
            for dep in dependents.get(nid).into_iter().flatten() {
                let Some(count) = in_degree.get_mut(dep) else { continue };
                *count = count.saturating_sub(1);
                if *count != 0 {
                    continue;
                }
                let dep_sources = sources.get(dep).cloned().unwrap_or_default();
                if any_dependency_failed(&dep_sources, &node_statuses, &node_results).await {
                    node_statuses.write().await.insert(dep.clone(), NodeStatus::Skipped);
                    node_results.write().await.insert(dep.clone(), TaskResult::skipped(false));
                    skip_nodes.insert(dep.clone());
                }
                queue.push(dep.clone());
            }
        }

        if to_execute.is_empty() {
            continue;
        }

        let futures = to_execute.iter().map(|nid| {
            let node = (*node_map.get(nid.as_str()).expect("node id drawn from pipeline.nodes")).clone();
            execute_node(node, registry, Arc::clone(&merged_params), Arc::clone(&node_results), Arc::clone(&node_statuses))
        });
        futures::future::join_all(futures).await;

        for nid in &to_execute {
            completed_count += 1;
            let status = *node_statuses.read().await.get(nid).unwrap_or(&NodeStatus::Failed);

            if let Some(on_progress) = &options.on_progress {
                let progress = u32::try_from(completed_count * 100 / total).unwrap_or(100);
                on_progress(ProgressEvent {
                    pipeline_id: pipeline.id.clone(),
                    node_id: nid.clone(),
                    node_status: status.as_str().to_string(),
                    progress,
                });
            }

            for dep in dependents.get(nid).into_iter().flatten() {
                let Some(count) = in_degree.get_mut(dep) else { continue };
                *count = count.saturating_sub(1);
                if *count != 0 {
                    continue;
                }
                let dep_sources = sources.get(dep).cloned().unwrap_or_default();
                if any_dependency_failed(&dep_sources, &node_statuses, &node_results).await {
                    node_statuses.write().await.insert(dep.clone(), NodeStatus::Skipped);
                    node_results.write().await.insert(dep.clone(), TaskResult::skipped(false));
                    skip_nodes.insert(dep.clone());
                }
                queue.push(dep.clone());
            }
        }
    }

    let duration_ms = start.elapsed().as_millis();
    let node_results = Arc::try_unwrap(node_results).map_or_else(|arc| arc.blocking_read().clone(), RwLock::into_inner);
    let node_statuses = Arc::try_unwrap(node_statuses).map_or_else(|arc| arc.blocking_read().clone(), RwLock::into_inner);

    let failed_nodes: Vec<String> = node_statuses
        .iter()
        .filter(|(_, status)| **status == NodeStatus::Failed)
        .map(|(id, _)| id.clone())
        .collect();
    let skipped_nodes: Vec<String> = node_statuses
        .iter()
        .filter(|(_, status)| **status == NodeStatus::Skipped)
        .map(|(id, _)| id.clone())
        .collect();

    PipelineExecutionResult {
        success: run_error.is_none() && failed_nodes.is_empty(),
        pipeline_id: pipeline.id.clone(),
        node_results,
        node_statuses,
        failed_nodes,
        skipped_nodes,
        duration_ms,
        error: run_error,
    }
}

/// True if any of `dep_sources` signals an upstream failure that must
/// propagate: either it failed outright, or it was itself skipped because
/// of a failure further upstream. A node skipped only because it sits
/// behind a `start_from_node` partial re-execution boundary carries a
/// successful placeholder result (`TaskResult::skipped(true)`) and must
/// not be mistaken for a failure here, so skip alone isn't enough — the
/// stored result's `success` flag disambiguates the two.
async fn any_dependency_failed(
    dep_sources: &[String],
    node_statuses: &Arc<RwLock<HashMap<String, NodeStatus>>>,
    node_results: &Arc<RwLock<HashMap<String, TaskResult>>>,
) -> bool {
    for source in dep_sources {
        let status = *node_statuses.read().await.get(source).unwrap_or(&NodeStatus::Pending);
        let failed = match status {
            NodeStatus::Failed => true,
            NodeStatus::Skipped => {
                !node_results.read().await.get(source).is_some_and(TaskResult::is_success)
            }
            _ => false,
        };
        if failed {
            return true;
        }
    }
    false
}

async fn execute_node(
    node: PipelineNode,
    registry: &DomainRegistry,
    params: Arc<HashMap<String, Value>>,
    node_results: Arc<RwLock<HashMap<String, TaskResult>>>,
    node_statuses: Arc<RwLock<HashMap<String, NodeStatus>>>,
) {
    node_statuses.write().await.insert(node.id.clone(), NodeStatus::Running);

    let resolved_params: TaskData = {
        let results = node_results.read().await;
        node.params
            .iter()
            .map(|(key, value)| (key.clone(), resolve_value(value, &params, &results)))
            .collect()
    };

    let result = match registry.execute_task(&node.node_type, &resolved_params).await {
        Ok(result) => result,
        Err(err) => TaskResult::err(err.to_string()),
    };

    let status = if result.is_success() { NodeStatus::Completed } else { NodeStatus::Failed };
    node_statuses.write().await.insert(node.id.clone(), status);
    node_results.write().await.insert(node.id, result);
}

fn resolve_one(
    raw: &str,
    params: &HashMap<String, Value>,
    node_results: &HashMap<String, TaskResult>,
) -> Value {
    Template::parse(raw).resolve(|identifier| {
        let (prefix, field) = split_identifier(identifier)?;
        if prefix == "params" {
            params.get(field).cloned()
        } else {
            node_results.get(prefix).and_then(|result| result.field(field).cloned())
        }
    })
}

/// Resolves a param value for node execution. Strings go through the
/// template resolver; arrays resolve element-wise (list parameters, e.g.
/// the episode compiler's `clips`, are built from per-element `{{ref}}`
/// strings that must still reach their typed values). Any other JSON type
/// passes through unchanged, per the single-node contract.
fn resolve_value(
    value: &Value,
    params: &HashMap<String, Value>,
    node_results: &HashMap<String, TaskResult>,
) -> Value {
    match value {
        Value::String(s) => resolve_one(s, params, node_results),
        Value::Array(items) => {
            Value::Array(items.iter().map(|item| resolve_value(item, params, node_results)).collect())
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use opencli_core::domain::ProgressCallback;
    use opencli_core::{CoreError, Domain};
    use opencli_api::{PipelineEdge, PipelineParam, Position};
    use std::sync::Mutex as StdMutex;

    struct EchoDomain;

    #[async_trait]
    impl Domain for EchoDomain {
        fn id(&self) -> &str {
            "echo"
        }
        fn name(&self) -> &str {
            "Echo"
        }
        fn task_types(&self) -> Vec<String> {
            vec!["echo_ok".to_string(), "echo_fail".to_string()]
        }
        async fn execute_task(&self, task_type: &str, task_data: &TaskData) -> Result<TaskResult, CoreError> {
            match task_type {
                "echo_fail" => Ok(TaskResult::err("boom")),
                _ => {
                    let mut fields = serde_json::Map::new();
                    if let Some(value) = task_data.get("value") {
                        fields.insert("value".to_string(), value.clone());
                    }
                    Ok(TaskResult::ok(fields))
                }
            }
        }
    }

    fn registry() -> DomainRegistry {
        let mut registry = DomainRegistry::new();
        registry.register(Arc::new(EchoDomain)).unwrap();
        registry
    }

    fn node(id: &str, node_type: &str, params: HashMap<String, Value>) -> PipelineNode {
        PipelineNode {
            id: id.to_string(),
            node_type: node_type.to_string(),
            domain: None,
            label: None,
            position: Position::default(),
            params,
        }
    }

    fn edge(id: &str, source: &str, target: &str) -> PipelineEdge {
        PipelineEdge {
            id: id.to_string(),
            source_node: source.to_string(),
            source_port: "output".to_string(),
            target_node: target.to_string(),
            target_port: "input".to_string(),
        }
    }

    fn pipeline(nodes: Vec<PipelineNode>, edges: Vec<PipelineEdge>) -> Pipeline {
        Pipeline {
            id: "pipe".to_string(),
            name: "test".to_string(),
            description: String::new(),
            nodes,
            edges,
            parameters: vec![PipelineParam {
                name: "greeting".to_string(),
                param_type: "string".to_string(),
                default: Value::String("hi".to_string()),
                description: String::new(),
            }],
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[tokio::test]
    async fn linear_pipeline_completes_and_resolves_params() {
        let mut p_a = HashMap::new();
        p_a.insert("value".to_string(), Value::String("{{params.greeting}}".to_string()));
        let mut p_b = HashMap::new();
        p_b.insert("value".to_string(), Value::String("{{a.value}}".to_string()));

        let nodes = vec![node("a", "echo_ok", p_a), node("b", "echo_ok", p_b)];
        let edges = vec![edge("e1", "a", "b")];
        let pipeline = pipeline(nodes, edges);
        let registry = registry();

        let result = execute_pipeline(&pipeline, &registry, ExecutionOptions::default()).await;

        assert!(result.success);
        assert_eq!(result.node_statuses["a"], NodeStatus::Completed);
        assert_eq!(result.node_statuses["b"], NodeStatus::Completed);
        assert_eq!(result.node_results["b"].field("value"), Some(&Value::String("hi".to_string())));
    }

    #[tokio::test]
    async fn diamond_pipeline_skips_downstream_of_failed_node() {
        let nodes = vec![
            node("root", "echo_ok", HashMap::new()),
            node("left", "echo_fail", HashMap::new()),
            node("right", "echo_ok", HashMap::new()),
            node("join", "echo_ok", HashMap::new()),
        ];
        let edges = vec![
            edge("e1", "root", "left"),
            edge("e2", "root", "right"),
            edge("e3", "left", "join"),
            edge("e4", "right", "join"),
        ];
        let pipeline = pipeline(nodes, edges);
        let registry = registry();

        let result = execute_pipeline(&pipeline, &registry, ExecutionOptions::default()).await;

        assert!(!result.success);
        assert_eq!(result.node_statuses["left"], NodeStatus::Failed);
        assert_eq!(result.node_statuses["right"], NodeStatus::Completed);
        assert_eq!(result.node_statuses["join"], NodeStatus::Skipped);
        assert!(result.skipped_nodes.contains(&"join".to_string()));
        assert!(result.failed_nodes.contains(&"left".to_string()));
    }

    #[tokio::test]
    async fn failure_propagates_transitively_through_a_multi_hop_chain() {
        let nodes = vec![
            node("a", "echo_fail", HashMap::new()),
            node("b", "echo_ok", HashMap::new()),
            node("c", "echo_ok", HashMap::new()),
        ];
        let edges = vec![edge("e1", "a", "b"), edge("e2", "b", "c")];
        let pipeline = pipeline(nodes, edges);
        let registry = registry();

        let result = execute_pipeline(&pipeline, &registry, ExecutionOptions::default()).await;

        assert!(!result.success);
        assert_eq!(result.node_statuses["a"], NodeStatus::Failed);
        assert_eq!(result.node_statuses["b"], NodeStatus::Skipped);
        assert_eq!(result.node_statuses["c"], NodeStatus::Skipped);
        assert!(result.skipped_nodes.contains(&"b".to_string()));
        assert!(result.skipped_nodes.contains(&"c".to_string()));
    }

    #[tokio::test]
    async fn cycle_is_detected_before_any_execution() {
        let nodes = vec![node("a", "echo_ok", HashMap::new()), node("b", "echo_ok", HashMap::new())];
        let edges = vec![edge("e1", "a", "b"), edge("e2", "b", "a")];
        let pipeline = pipeline(nodes, edges);
        let registry = registry();

        let result = execute_pipeline(&pipeline, &registry, ExecutionOptions::default()).await;

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Pipeline contains a cycle"));
        assert!(result.node_results.is_empty());
    }

    #[tokio::test]
    async fn partial_reexecution_reuses_previous_results_for_ancestors() {
        let nodes = vec![node("a", "echo_ok", HashMap::new()), node("b", "echo_ok", HashMap::new())];
        let edges = vec![edge("e1", "a", "b")];
        let pipeline = pipeline(nodes, edges);
        let registry = registry();

        let mut previous_results = HashMap::new();
        previous_results.insert("a".to_string(), TaskResult::ok(serde_json::Map::new()));

        let options = ExecutionOptions {
            start_from_node: Some("b".to_string()),
            previous_results,
            ..Default::default()
        };

        let result = execute_pipeline(&pipeline, &registry, options).await;

        assert!(result.success);
        assert_eq!(result.node_statuses["a"], NodeStatus::Completed);
        assert_eq!(result.node_statuses["b"], NodeStatus::Completed);
    }

    #[tokio::test]
    async fn cancellation_marks_pending_nodes_skipped() {
        let nodes = vec![node("a", "echo_ok", HashMap::new()), node("b", "echo_ok", HashMap::new())];
        let edges = vec![edge("e1", "a", "b")];
        let pipeline = pipeline(nodes, edges);
        let registry = registry();

        let cancelled_flag = Arc::new(StdMutex::new(true));
        let flag_clone = Arc::clone(&cancelled_flag);
        let options = ExecutionOptions {
            is_cancelled: Some(Arc::new(move || *flag_clone.lock().unwrap())),
            ..Default::default()
        };

        let result = execute_pipeline(&pipeline, &registry, options).await;

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Cancelled"));
        assert_eq!(result.node_statuses["a"], NodeStatus::Skipped);
        assert_eq!(result.node_statuses["b"], NodeStatus::Skipped);
    }

    #[tokio::test]
    async fn list_parameters_resolve_each_element() {
        let mut p_a = HashMap::new();
        p_a.insert("value".to_string(), Value::from(7));
        let mut p_b = HashMap::new();
        p_b.insert(
            "values".to_string(),
            Value::Array(vec![Value::String("{{a.value}}".to_string()), Value::String("literal".to_string())]),
        );

        let nodes = vec![node("a", "echo_ok", p_a), node("b", "echo_ok", p_b)];
        let edges = vec![edge("e1", "a", "b")];
        let pipeline = pipeline(nodes, edges);
        let registry = registry();

        let resolved_params: TaskData = {
            let mut results = HashMap::new();
            results.insert("a".to_string(), registry.execute_task("echo_ok", &TaskData::new()).await.unwrap());
            results.get_mut("a").unwrap().0.insert("value".to_string(), Value::from(7));
            let params = HashMap::new();
            pipeline.nodes[1]
                .params
                .iter()
                .map(|(k, v)| (k.clone(), resolve_value(v, &params, &results)))
                .collect()
        };

        assert_eq!(
            resolved_params.get("values"),
            Some(&Value::Array(vec![Value::from(7), Value::String("literal".to_string())]))
        );
    }

    #[allow(dead_code)]
    fn _unused_progress_type(_: ProgressCallback) {}
}
