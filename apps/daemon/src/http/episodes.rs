// SPDX-FileCopyrightText: © 2026 OpenCLI Daemon Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! `/api/v1/episodes` CRUD plus the two compiler-facing endpoints:
//! `generate` (compile, save, and run the resulting pipeline in the
//! background, streaming progress over the broadcast WebSocket channel)
//! and `build-pipeline` (compile and save without running).

use axum::extract::{Path, State};
use axum::response::Json;
use opencli_api::EpisodeScript;
use opencli_engine::{compile_episode, EpisodeSettings, ExecutionOptions};
use serde_json::Value;
use uuid::Uuid;

use crate::error::DaemonError;
use crate::state::AppState;
use crate::store::episode_to_value;

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Value>>, DaemonError> {
    state.record_request();
    let rows = state.store.list_episodes().await?;
    Ok(Json(
        rows.into_iter()
            .map(|(id, (script, pipeline_id))| episode_to_value(&id, &script, pipeline_id.as_deref()))
            .collect(),
    ))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>, DaemonError> {
    state.record_request();
    let (script, pipeline_id) = state
        .store
        .get_episode(&id)
        .await?
        .ok_or_else(|| DaemonError::NotFound(format!("episode '{id}' not found")))?;
    Ok(Json(episode_to_value(&id, &script, pipeline_id.as_deref())))
}

pub async fn create(
    State(state): State<AppState>,
    Json(script): Json<EpisodeScript>,
) -> Result<Json<Value>, DaemonError> {
    state.record_request();
    let id = Uuid::new_v4().to_string();
    state.store.put_episode(id.clone(), script.clone(), None).await?;
    Ok(Json(episode_to_value(&id, &script, None)))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(script): Json<EpisodeScript>,
) -> Result<Json<Value>, DaemonError> {
    state.record_request();
    let pipeline_id = state.store.get_episode(&id).await?.and_then(|(_, p)| p);
    state.store.put_episode(id.clone(), script.clone(), pipeline_id.clone()).await?;
    Ok(Json(episode_to_value(&id, &script, pipeline_id.as_deref())))
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>, DaemonError> {
    state.record_request();
    let existed = state.store.delete_episode(&id).await?;
    if existed {
        Ok(Json(serde_json::json!({"success": true})))
    } else {
        Err(DaemonError::NotFound(format!("episode '{id}' not found")))
    }
}

pub async fn build_pipeline(
    State(state): State<AppState>,
    Path(id): Path<String>,
    settings: Option<Json<EpisodeSettings>>,
) -> Result<Json<Value>, DaemonError> {
    state.record_request();
    let (script, _) = state
        .store
        .get_episode(&id)
        .await?
        .ok_or_else(|| DaemonError::NotFound(format!("episode '{id}' not found")))?;

    let settings = settings.map_or_else(EpisodeSettings::default, |Json(s)| s);
    let pipeline = compile_episode(&id, &script, &settings);
    let pipeline_id = pipeline.id.clone();
    state.store.put_pipeline(pipeline).await?;
    state.store.put_episode(id.clone(), script.clone(), Some(pipeline_id.clone())).await?;

    Ok(Json(episode_to_value(&id, &script, Some(&pipeline_id))))
}

pub async fn generate(
    State(state): State<AppState>,
    Path(id): Path<String>,
    settings: Option<Json<EpisodeSettings>>,
) -> Result<Json<Value>, DaemonError> {
    state.record_request();
    let (script, _) = state
        .store
        .get_episode(&id)
        .await?
        .ok_or_else(|| DaemonError::NotFound(format!("episode '{id}' not found")))?;

    let settings = settings.map_or_else(EpisodeSettings::default, |Json(s)| s);
    let pipeline = compile_episode(&id, &script, &settings);
    let pipeline_id = pipeline.id.clone();
    state.store.put_pipeline(pipeline.clone()).await?;
    state.store.put_episode(id.clone(), script, Some(pipeline_id.clone())).await?;

    let progress_state = state.clone();
    let progress_pipeline_id = pipeline_id.clone();
    let on_progress: opencli_engine::ProgressFn = std::sync::Arc::new(move |event| {
        let frame = serde_json::json!({
            "type": "task_update",
            "task_id": progress_pipeline_id,
            "task_type": "episode_generate",
            "status": "running",
            "node_id": event.node_id,
            "node_status": event.node_status,
            "progress": event.progress,
        });
        let state = progress_state.clone();
        tokio::spawn(async move {
            let mut sessions = state.sessions.lock().await;
            sessions.broadcast(&frame.to_string());
        });
    });

    tokio::spawn(async move {
        let options = ExecutionOptions { on_progress: Some(on_progress), ..Default::default() };
        let result = execute_pipeline_owned(state, pipeline, options).await;
        tracing::info!(episode_id = %id, success = result.success, "episode generation finished");
    });

    Ok(Json(serde_json::json!({"status": "started", "pipeline_id": pipeline_id})))
}

async fn execute_pipeline_owned(
    state: AppState,
    pipeline: opencli_api::Pipeline,
    options: ExecutionOptions,
) -> opencli_engine::PipelineExecutionResult {
    let result = opencli_engine::execute_pipeline(&pipeline, &state.registry, options).await;
    let frame = serde_json::json!({
        "type": "task_update",
        "task_id": pipeline.id,
        "task_type": "episode_generate",
        "status": if result.success { "completed" } else { "failed" },
        "result": result,
    });
    let mut sessions = state.sessions.lock().await;
    sessions.broadcast(&frame.to_string());
    drop(sessions);
    result
}
