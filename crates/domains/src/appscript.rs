// SPDX-FileCopyrightText: © 2026 OpenCLI Daemon Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! OS-app scripting domain: drives macOS apps (Notes, Reminders, ...) via
//! AppleScript, exactly as the original daemon's per-app domains did. This
//! Rust port collapses those per-app domains into one, since their task
//! types are already disjoint strings and the dispatch pattern (build an
//! AppleScript string, run it, parse line-delimited stdout) is identical
//! across every one of them.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use opencli_core::domain::DisplayConfig;
use opencli_core::{CoreError, Domain, TaskData, TaskResult};
use serde_json::{Map, Value};

use crate::subprocess::run_osascript;

const COLOR_HEX: u32 = 0xFFFF_C107;
const SCRIPT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Default)]
pub struct AppScriptDomain;

fn escape_applescript_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[async_trait]
impl Domain for AppScriptDomain {
    fn id(&self) -> &str {
        "appscript"
    }

    fn name(&self) -> &str {
        "Notes"
    }

    fn task_types(&self) -> Vec<String> {
        vec!["notes_create".to_string(), "notes_search".to_string(), "notes_list".to_string()]
    }

    fn display_configs(&self) -> HashMap<String, DisplayConfig> {
        let mut map = HashMap::new();
        map.insert(
            "notes_create".to_string(),
            DisplayConfig {
                card_type: "notes".to_string(),
                title_template: "Note Created".to_string(),
                subtitle_template: None,
                icon: "note_add".to_string(),
                color_hex: COLOR_HEX,
            },
        );
        map.insert(
            "notes_search".to_string(),
            DisplayConfig {
                card_type: "notes".to_string(),
                title_template: "Notes Search".to_string(),
                subtitle_template: None,
                icon: "search".to_string(),
                color_hex: COLOR_HEX,
            },
        );
        map.insert(
            "notes_list".to_string(),
            DisplayConfig {
                card_type: "notes".to_string(),
                title_template: "Notes".to_string(),
                subtitle_template: None,
                icon: "note".to_string(),
                color_hex: COLOR_HEX,
            },
        );
        map
    }

    async fn execute_task(
        &self,
        task_type: &str,
        task_data: &TaskData,
    ) -> Result<TaskResult, CoreError> {
        let result = match task_type {
            "notes_create" => create_note(task_data).await,
            "notes_search" => search_notes(task_data).await,
            "notes_list" => list_notes().await,
            other => TaskResult::err(format!("Unknown task: {other}")),
        };
        Ok(with_domain(result))
    }
}

fn with_domain(mut result: TaskResult) -> TaskResult {
    result.0.insert("domain".to_string(), Value::String("notes".to_string()));
    result
}

async fn create_note(data: &TaskData) -> TaskResult {
    let title = data.get("title").and_then(Value::as_str).unwrap_or("Untitled");
    let body = data.get("body").and_then(Value::as_str).unwrap_or("");
    let script = format!(
        "tell application \"Notes\"\n  make new note at folder \"Notes\" with properties {{name:\"{}\", body:\"{}\"}}\nend tell",
        escape_applescript_string(title),
        escape_applescript_string(body),
    );

    match run_osascript(&script, SCRIPT_TIMEOUT).await {
        Ok(_) => {
            let mut fields = Map::new();
            fields.insert("title".to_string(), Value::String(title.to_string()));
            fields.insert("card_type".to_string(), Value::String("notes".to_string()));
            TaskResult::ok(fields)
        }
        Err(err) => TaskResult::err(err),
    }
}

async fn search_notes(data: &TaskData) -> TaskResult {
    let query = data.get("query").and_then(Value::as_str).unwrap_or("");
    let script = format!(
        "tell application \"Notes\"\n  set output to \"\"\n  set matchedNotes to every note of folder \"Notes\" whose name contains \"{query}\" or body contains \"{query}\"\n  set maxN to 10\n  set i to 0\n  repeat with n in matchedNotes\n    if i >= maxN then exit repeat\n    set output to output & name of n & \"\\n\"\n    set i to i + 1\n  end repeat\n  return output\nend tell",
        query = escape_applescript_string(query),
    );

    match run_osascript(&script, SCRIPT_TIMEOUT).await {
        Ok(output) => notes_list_result(&output),
        Err(err) => TaskResult::err(err),
    }
}

async fn list_notes() -> TaskResult {
    let script = "tell application \"Notes\"\n  set output to \"\"\n  set allNotes to every note of folder \"Notes\"\n  set maxN to 10\n  set i to 0\n  repeat with n in allNotes\n    if i >= maxN then exit repeat\n    set output to output & name of n & \"\\n\"\n    set i to i + 1\n  end repeat\n  return output\nend tell";

    match run_osascript(script, SCRIPT_TIMEOUT).await {
        Ok(output) => notes_list_result(&output),
        Err(err) => TaskResult::err(err),
    }
}

fn notes_list_result(raw: &str) -> TaskResult {
    let notes: Vec<Value> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| Value::String(line.to_string()))
        .collect();
    let mut fields = Map::new();
    fields.insert("count".to_string(), Value::from(notes.len()));
    fields.insert("notes".to_string(), Value::Array(notes));
    fields.insert("card_type".to_string(), Value::String("notes".to_string()));
    TaskResult::ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_quotes_and_backslashes() {
        assert_eq!(escape_applescript_string(r#"say "hi""#), r#"say \"hi\""#);
    }

    #[test]
    fn notes_list_result_splits_and_trims_lines() {
        let result = notes_list_result("Groceries\n  Trip Plan  \n\n");
        assert_eq!(result.field("count"), Some(&Value::from(2)));
    }
}
