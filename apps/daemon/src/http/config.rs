// SPDX-FileCopyrightText: © 2026 OpenCLI Daemon Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! `GET`/`POST /api/v1/config` — the live-config endpoint. `GET` returns
//! the daemon's current configuration with every `api_key`/`api_keys`
//! field masked; `POST` deep-merges the posted document onto the
//! currently running configuration, persists the result to the
//! on-disk TOML file, and returns the newly masked configuration.

use axum::extract::State;
use axum::response::Json;
use serde_json::Value;

use crate::config::{self, Config};
use crate::error::DaemonError;
use crate::state::AppState;

pub async fn get_config(State(state): State<AppState>) -> Result<Json<Value>, DaemonError> {
    state.record_request();
    let value = serde_json::to_value(state.config.as_ref()).map_err(|e| DaemonError::BadRequest(e.to_string()))?;
    Ok(Json(config::mask_api_keys(value)))
}

pub async fn update_config(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, DaemonError> {
    state.record_request();
    let current = serde_json::to_value(state.config.as_ref())
        .map_err(|e| DaemonError::BadRequest(e.to_string()))?;
    let merged = config::deep_merge(current, body);
    let updated: Config = serde_json::from_value(merged)
        .map_err(|e| DaemonError::BadRequest(format!("invalid configuration: {e}")))?;

    let toml_text = toml::to_string_pretty(&updated).map_err(|e| DaemonError::BadRequest(e.to_string()))?;
    let path = config::default_config_path();
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, toml_text).await?;

    let masked = config::mask_api_keys(serde_json::to_value(&updated).map_err(|e| DaemonError::BadRequest(e.to_string()))?);
    Ok(Json(masked))
}
