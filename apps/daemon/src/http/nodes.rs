// SPDX-FileCopyrightText: © 2026 OpenCLI Daemon Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! `GET /api/v1/nodes/catalog` — the pipeline editor's palette, generated
//! directly from every registered domain's [`opencli_core::DisplayConfig`]
//! rather than hand-maintained, so adding a domain automatically extends
//! the catalog.

use axum::extract::State;
use axum::response::Json;
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn catalog(State(state): State<AppState>) -> Json<Value> {
    state.record_request();
    let mut entries = Vec::new();
    for domain in state.registry.domains() {
        for (task_type, display) in domain.display_configs() {
            entries.push(json!({
                "task_type": task_type,
                "domain_id": domain.id(),
                "domain_name": domain.name(),
                "card_type": display.card_type,
                "title_template": display.title_template,
                "subtitle_template": display.subtitle_template,
                "icon": display.icon,
                "color_hex": display.color_hex,
            }));
        }
    }
    entries.sort_by(|a, b| a["task_type"].as_str().cmp(&b["task_type"].as_str()));
    Json(json!({"nodes": entries}))
}
