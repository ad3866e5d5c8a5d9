// SPDX-FileCopyrightText: © 2026 OpenCLI Daemon Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Files & Media domain: compress, convert, and organize files on disk.
//! Compression and format conversion shell out to external tools (`zip`,
//! `sips`) exactly as the original daemon did; organizing sorts files by
//! extension using native filesystem calls rather than a generated shell
//! script, since that part needs no external tool.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use opencli_core::domain::DisplayConfig;
use opencli_core::{CoreError, Domain, TaskData, TaskResult};
use serde_json::{Map, Value};

use crate::subprocess::run_command;

const COLOR_HEX: u32 = 0xFF79_5548;
const COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Default)]
pub struct FilesDomain;

fn home_dir() -> String {
    std::env::var("HOME").unwrap_or_else(|_| ".".to_string())
}

fn expand_home(path: &str) -> String {
    if let Some(rest) = path.strip_prefix('~') {
        format!("{}{rest}", home_dir())
    } else {
        path.to_string()
    }
}

fn resolve_dir(name: &str) -> String {
    let home = home_dir();
    match name.to_lowercase().as_str() {
        "downloads" => format!("{home}/Downloads"),
        "desktop" => format!("{home}/Desktop"),
        "documents" => format!("{home}/Documents"),
        "pictures" => format!("{home}/Pictures"),
        "movies" => format!("{home}/Movies"),
        "music" => format!("{home}/Music"),
        _ => expand_home(name),
    }
}

#[async_trait]
impl Domain for FilesDomain {
    fn id(&self) -> &str {
        "files"
    }

    fn name(&self) -> &str {
        "Files & Media"
    }

    fn task_types(&self) -> Vec<String> {
        vec![
            "files_compress".to_string(),
            "files_convert".to_string(),
            "files_organize".to_string(),
        ]
    }

    fn display_configs(&self) -> HashMap<String, DisplayConfig> {
        let mut map = HashMap::new();
        map.insert(
            "files_compress".to_string(),
            DisplayConfig {
                card_type: "files".to_string(),
                title_template: "Files Compressed".to_string(),
                subtitle_template: None,
                icon: "archive".to_string(),
                color_hex: COLOR_HEX,
            },
        );
        map.insert(
            "files_convert".to_string(),
            DisplayConfig {
                card_type: "files".to_string(),
                title_template: "Files Converted".to_string(),
                subtitle_template: None,
                icon: "transform".to_string(),
                color_hex: COLOR_HEX,
            },
        );
        map.insert(
            "files_organize".to_string(),
            DisplayConfig {
                card_type: "files".to_string(),
                title_template: "Files Organized".to_string(),
                subtitle_template: None,
                icon: "folder_open".to_string(),
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
            "files_compress" => compress(task_data).await,
            "files_convert" => convert(task_data).await,
            "files_organize" => organize(task_data).await,
            other => TaskResult::err(format!("Unknown task: {other}")),
        };
        Ok(with_domain(result))
    }
}

fn with_domain(mut result: TaskResult) -> TaskResult {
    result.0.insert("domain".to_string(), Value::String("files".to_string()));
    result
}

async fn compress(data: &TaskData) -> TaskResult {
    let path = resolve_dir(data.get("path").and_then(Value::as_str).unwrap_or("downloads"));
    let archive_name = data.get("name").and_then(Value::as_str).unwrap_or("archive.zip");
    let archive_path = format!("{path}/{archive_name}");

    let cmd = format!(r#"cd "{path}" && zip -r "{archive_path}" . -x ".*" -x "__MACOSX/*""#);
    match run_command("bash", &["-c", &cmd], COMMAND_TIMEOUT).await {
        Ok(output) if output.status_code == 0 => {
            let mut fields = Map::new();
            fields.insert("archive".to_string(), Value::String(archive_path));
            fields.insert("card_type".to_string(), Value::String("files".to_string()));
            TaskResult::ok(fields)
        }
        Ok(output) => TaskResult::err(output.stderr.trim().to_string()),
        Err(err) => TaskResult::err(err),
    }
}

async fn convert(data: &TaskData) -> TaskResult {
    let path = resolve_dir(data.get("path").and_then(Value::as_str).unwrap_or("."));
    let from_fmt = data
        .get("from_format")
        .or_else(|| data.get("from"))
        .and_then(Value::as_str)
        .unwrap_or("");
    let to_fmt =
        data.get("to_format").or_else(|| data.get("to")).and_then(Value::as_str).unwrap_or("");

    if from_fmt.is_empty() || to_fmt.is_empty() {
        return TaskResult::err("Missing from/to format");
    }

    let cmd = format!(
        r#"for f in "{path}"/*.{from_fmt}; do [ -f "$f" ] && sips -s format {to_fmt} "$f" --out "${{f%.{from_fmt}}}.{to_fmt}"; done"#
    );
    match run_command("bash", &["-c", &cmd], COMMAND_TIMEOUT).await {
        Ok(output) if output.status_code == 0 => {
            let mut fields = Map::new();
            fields.insert("from".to_string(), Value::String(from_fmt.to_string()));
            fields.insert("to".to_string(), Value::String(to_fmt.to_string()));
            fields.insert("path".to_string(), Value::String(path));
            fields.insert("card_type".to_string(), Value::String("files".to_string()));
            TaskResult::ok(fields)
        }
        Ok(output) => TaskResult::err(output.stderr.trim().to_string()),
        Err(err) => TaskResult::err(err),
    }
}

async fn organize(data: &TaskData) -> TaskResult {
    let path = resolve_dir(data.get("path").and_then(Value::as_str).unwrap_or("downloads"));
    match organize_dir(&path) {
        Ok(()) => {
            let mut fields = Map::new();
            fields.insert("path".to_string(), Value::String(path));
            fields.insert("card_type".to_string(), Value::String("files".to_string()));
            TaskResult::ok(fields)
        }
        Err(err) => TaskResult::err(err),
    }
}

fn category_for_extension(ext: &str) -> &'static str {
    match ext {
        "jpg" | "jpeg" | "png" | "gif" | "bmp" | "svg" | "webp" | "heic" => "Images",
        "pdf" | "doc" | "docx" | "txt" | "rtf" | "xls" | "xlsx" | "csv" | "ppt" | "pptx" => {
            "Documents"
        }
        "mp4" | "mov" | "avi" | "mkv" | "wmv" | "flv" | "webm" => "Videos",
        "mp3" | "wav" | "flac" | "aac" | "ogg" | "m4a" | "wma" => "Music",
        "zip" | "tar" | "gz" | "rar" | "7z" | "bz2" | "xz" => "Archives",
        _ => "Others",
    }
}

fn organize_dir(path: &str) -> Result<(), String> {
    let base = PathBuf::from(path);
    let categories = ["Images", "Documents", "Videos", "Music", "Archives", "Others"];
    for category in categories {
        std::fs::create_dir_all(base.join(category)).map_err(|e| e.to_string())?;
    }

    let entries = std::fs::read_dir(&base).map_err(|e| e.to_string())?;
    for entry in entries {
        let entry = entry.map_err(|e| e.to_string())?;
        let file_path = entry.path();
        if !file_path.is_file() {
            continue;
        }
        let ext = file_path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        let category = category_for_extension(&ext);
        let dest = base.join(category).join(entry.file_name());
        let _ = std::fs::rename(&file_path, &dest);
    }

    for category in categories {
        let dir = base.join(category);
        if matches!(std::fs::read_dir(&dir), Ok(mut iter) if iter.next().is_none()) {
            let _ = std::fs::remove_dir(&dir);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_friendly_directory_names() {
        assert_eq!(resolve_dir("downloads"), format!("{}/Downloads", home_dir()));
        assert_eq!(resolve_dir("DOWNLOADS"), format!("{}/Downloads", home_dir()));
    }

    #[test]
    fn category_assignment_covers_common_extensions() {
        assert_eq!(category_for_extension("png"), "Images");
        assert_eq!(category_for_extension("mp4"), "Videos");
        assert_eq!(category_for_extension("xyz"), "Others");
    }

    #[test]
    fn organize_sorts_files_into_category_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("photo.png"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        organize_dir(dir.path().to_str().unwrap()).unwrap();
        assert!(dir.path().join("Images/photo.png").exists());
        assert!(dir.path().join("Documents/notes.txt").exists());
    }
}
