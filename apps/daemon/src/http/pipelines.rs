// SPDX-FileCopyrightText: © 2026 OpenCLI Daemon Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! `/api/v1/pipelines` CRUD plus the two execution endpoints: `run` (a
//! fresh execution) and `run-from/{nodeId}` (partial re-execution seeded
//! with a caller-supplied `previous_results`).

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::response::Json;
use opencli_api::Pipeline;
use opencli_engine::{execute_pipeline, ExecutionOptions, PipelineExecutionResult};
use serde::Deserialize;
use serde_json::Value;

use crate::error::DaemonError;
use crate::state::AppState;

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Pipeline>>, DaemonError> {
    state.record_request();
    Ok(Json(state.store.list_pipelines().await?))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Pipeline>, DaemonError> {
    state.record_request();
    state
        .store
        .get_pipeline(&id)
        .await?
        .map(Json)
        .ok_or_else(|| DaemonError::NotFound(format!("pipeline '{id}' not found")))
}

pub async fn create(
    State(state): State<AppState>,
    Json(pipeline): Json<Pipeline>,
) -> Result<Json<Pipeline>, DaemonError> {
    state.record_request();
    pipeline.validate_structure().map_err(DaemonError::BadRequest)?;
    state.store.put_pipeline(pipeline.clone()).await?;
    Ok(Json(pipeline))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut pipeline): Json<Pipeline>,
) -> Result<Json<Pipeline>, DaemonError> {
    state.record_request();
    pipeline.id = id;
    pipeline.validate_structure().map_err(DaemonError::BadRequest)?;
    state.store.put_pipeline(pipeline.clone()).await?;
    Ok(Json(pipeline))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, DaemonError> {
    state.record_request();
    let existed = state.store.delete_pipeline(&id).await?;
    if existed {
        Ok(Json(serde_json::json!({"success": true})))
    } else {
        Err(DaemonError::NotFound(format!("pipeline '{id}' not found")))
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct RunBody {
    #[serde(default)]
    pub parameters: HashMap<String, Value>,
}

pub async fn run(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<RunBody>>,
) -> Result<Json<PipelineExecutionResult>, DaemonError> {
    state.record_request();
    let pipeline = state
        .store
        .get_pipeline(&id)
        .await?
        .ok_or_else(|| DaemonError::NotFound(format!("pipeline '{id}' not found")))?;

    let options = ExecutionOptions {
        override_params: body.map(|Json(b)| b.parameters).unwrap_or_default(),
        ..Default::default()
    };
    let result = execute_pipeline(&pipeline, &state.registry, options).await;
    Ok(Json(result))
}

#[derive(Debug, Deserialize, Default)]
pub struct RunFromBody {
    #[serde(default)]
    pub previous_results: HashMap<String, opencli_core::TaskResult>,
    #[serde(default)]
    pub parameters: HashMap<String, Value>,
}

pub async fn run_from(
    State(state): State<AppState>,
    Path((id, node_id)): Path<(String, String)>,
    body: Option<Json<RunFromBody>>,
) -> Result<Json<PipelineExecutionResult>, DaemonError> {
    state.record_request();
    let pipeline = state
        .store
        .get_pipeline(&id)
        .await?
        .ok_or_else(|| DaemonError::NotFound(format!("pipeline '{id}' not found")))?;

    let Json(body) = body.unwrap_or_default();
    let options = ExecutionOptions {
        override_params: body.parameters,
        start_from_node: Some(node_id),
        previous_results: body.previous_results,
        ..Default::default()
    };
    let result = execute_pipeline(&pipeline, &state.registry, options).await;
    Ok(Json(result))
}
