// SPDX-FileCopyrightText: © 2026 OpenCLI Daemon Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! `POST /api/v1/execute` — the generic task router. `method` names what
//! to run, in one of four shapes: a bare `task_type` (dispatched through
//! the registry's disjoint claim, same as any pipeline node), a
//! `domain.task_type` pair (dispatched straight to that domain, bypassing
//! the claim lookup), or one of the two introspection namespaces
//! `system.*` / `domains.*`.

use axum::extract::State;
use axum::response::Json;
use opencli_core::TaskData;
use serde::Deserialize;
use serde_json::Value;

use crate::error::DaemonError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

const DAEMON_VERSION: &str = env!("CARGO_PKG_VERSION");

pub async fn execute(
    State(state): State<AppState>,
    Json(request): Json<ExecuteRequest>,
) -> Result<Json<Value>, DaemonError> {
    state.record_request();

    let params = match request.params {
        Value::Object(map) => map,
        Value::Null => serde_json::Map::new(),
        other => {
            return Err(DaemonError::BadRequest(format!(
                "params must be a JSON object, got {other}"
            )))
        }
    };

    match request.method.as_str() {
        "system.info" => Ok(Json(serde_json::json!({
            "version": DAEMON_VERSION,
            "uptime_seconds": state.uptime_seconds(),
        }))),
        "system.ping" => Ok(Json(serde_json::json!({"pong": true}))),
        "domains.list" => {
            let domains: Vec<Value> = state
                .registry
                .domains()
                .map(|d| serde_json::json!({"id": d.id(), "name": d.name()}))
                .collect();
            Ok(Json(serde_json::json!({"domains": domains})))
        }
        "domains.task_types" => Ok(Json(serde_json::json!({"task_types": state.registry.all_task_types()}))),
        method if method.contains('.') => {
            let (domain_id, task_type) = method.split_once('.').expect("checked contains '.' above");
            let domain = state
                .registry
                .get_domain(domain_id)
                .ok_or_else(|| DaemonError::NotFound(format!("no domain named '{domain_id}'")))?;
            let result = domain.execute_task(task_type, &params).await?;
            Ok(Json(Value::Object(result.into_map())))
        }
        task_type => {
            let data: TaskData = params;
            let result = state.registry.execute_task(task_type, &data).await?;
            Ok(Json(Value::Object(result.into_map())))
        }
    }
}
