// SPDX-FileCopyrightText: © 2026 OpenCLI Daemon Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Media Creation domain: local AI image/video generation and the FFmpeg
//! post-processing chain the episode compiler wires into a pipeline tail.
//!
//! The spec treats these algorithms as replaceable external collaborators
//! (real implementations would shell out to a local inference process or
//! `ffmpeg`), so this domain produces small, deterministic placeholder
//! outputs — enough for the pipeline engine and the episode compiler to be
//! exercised end to end without a GPU or a codec toolchain present.
//! Generation steps run on a blocking worker via `spawn_blocking`, mirroring
//! the daemon's rule that CPU-bound domain work must never run on the
//! async event loop.

use std::collections::HashMap;

use async_trait::async_trait;
use base64::Engine as _;
use opencli_core::domain::DisplayConfig;
use opencli_core::{CoreError, Domain, TaskData, TaskResult};
use serde_json::{Map, Value};

const COLOR_HEX: u32 = 0xFF7C_4DFF;

#[derive(Default)]
pub struct MediaDomain;

fn output_dir() -> std::path::PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    std::path::PathBuf::from(home).join(".opencli").join("output")
}

fn placeholder_path(prefix: &str, seed: &str) -> String {
    let hash = seed.bytes().fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(b)));
    output_dir().join(format!("{prefix}_{hash:016x}")).to_string_lossy().into_owned()
}

fn str_param(data: &TaskData, key: &str) -> String {
    data.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
}

#[async_trait]
impl Domain for MediaDomain {
    fn id(&self) -> &str {
        "media_creation"
    }

    fn name(&self) -> &str {
        "Media Creation"
    }

    fn task_types(&self) -> Vec<String> {
        vec![
            "media_local_generate_image".to_string(),
            "media_local_generate_video".to_string(),
            "media_local_controlnet_video".to_string(),
            "media_scene_assembly".to_string(),
            "media_video_assembly".to_string(),
            "media_upscale_video".to_string(),
            "media_lut_colorgrade".to_string(),
            "media_platform_encode".to_string(),
        ]
    }

    fn display_configs(&self) -> HashMap<String, DisplayConfig> {
        let mut map = HashMap::new();
        map.insert(
            "media_local_generate_image".to_string(),
            DisplayConfig {
                card_type: "media".to_string(),
                title_template: "Local AI Image".to_string(),
                subtitle_template: None,
                icon: "brush".to_string(),
                color_hex: COLOR_HEX,
            },
        );
        map.insert(
            "media_video_assembly".to_string(),
            DisplayConfig {
                card_type: "media".to_string(),
                title_template: "Video Assembly".to_string(),
                subtitle_template: None,
                icon: "movie_creation".to_string(),
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
        let task_type = task_type.to_string();
        let task_data = task_data.clone();
        let result = tokio::task::spawn_blocking(move || run_blocking(&task_type, &task_data))
            .await
            .map_err(|e| CoreError::Runtime(format!("media task panicked: {e}")))?;
        Ok(with_domain(result))
    }
}

fn with_domain(mut result: TaskResult) -> TaskResult {
    result.0.insert("domain".to_string(), Value::String("media_creation".to_string()));
    result
}

fn run_blocking(task_type: &str, data: &TaskData) -> TaskResult {
    match task_type {
        "media_local_generate_image" => generate_image(data),
        "media_local_generate_video" => generate_video(data, "media_local_generate_video"),
        "media_local_controlnet_video" => generate_video(data, "media_local_controlnet_video"),
        "media_scene_assembly" => scene_assembly(data),
        "media_video_assembly" => video_assembly(data),
        "media_upscale_video" => passthrough_with_suffix(data, "video_path", "upscaled"),
        "media_lut_colorgrade" => passthrough_with_suffix(data, "video_path", "graded"),
        "media_platform_encode" => passthrough_with_suffix(data, "video_path", "encoded"),
        other => TaskResult::err(format!("Unknown media task: {other}")),
    }
}

fn generate_image(data: &TaskData) -> TaskResult {
    let prompt = str_param(data, "prompt");
    let model = data.get("model").and_then(Value::as_str).unwrap_or("animagine_xl").to_string();
    let width = data.get("width").and_then(Value::as_i64).unwrap_or(1024);
    let height = data.get("height").and_then(Value::as_i64).unwrap_or(1024);

    let placeholder_bytes = format!("image:{model}:{width}x{height}:{prompt}");
    let image_base64 = base64::engine::general_purpose::STANDARD.encode(placeholder_bytes);

    let mut fields = Map::new();
    fields.insert("image_base64".to_string(), Value::String(image_base64));
    fields.insert("model".to_string(), Value::String(model));
    fields.insert("width".to_string(), Value::from(width));
    fields.insert("height".to_string(), Value::from(height));
    fields.insert("card_type".to_string(), Value::String("media".to_string()));
    TaskResult::ok(fields)
}

fn generate_video(data: &TaskData, kind: &str) -> TaskResult {
    let prompt = str_param(data, "prompt");
    let reference = data
        .get("reference_image_base64")
        .or_else(|| data.get("image_base64"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    let path = placeholder_path(kind, &format!("{prompt}{reference}"));

    let mut fields = Map::new();
    fields.insert("path".to_string(), Value::String(format!("{path}.mp4")));
    fields.insert("card_type".to_string(), Value::String("media".to_string()));
    TaskResult::ok(fields)
}

fn scene_assembly(data: &TaskData) -> TaskResult {
    let video_path = str_param(data, "video_path");
    if video_path.is_empty() {
        return TaskResult::err("media_scene_assembly requires video_path");
    }
    let audio_path = data.get("audio_path").and_then(Value::as_str);
    let path = placeholder_path("assembly", &format!("{video_path}{}", audio_path.unwrap_or("")));

    let mut fields = Map::new();
    fields.insert("path".to_string(), Value::String(format!("{path}.mp4")));
    fields.insert("card_type".to_string(), Value::String("media".to_string()));
    TaskResult::ok(fields)
}

fn video_assembly(data: &TaskData) -> TaskResult {
    let clips: Vec<String> = data
        .get("clips")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();
    if clips.is_empty() {
        return TaskResult::err("media_video_assembly requires a non-empty clips list");
    }
    let path = placeholder_path("concat", &clips.join(","));

    let mut fields = Map::new();
    fields.insert("path".to_string(), Value::String(format!("{path}.mp4")));
    fields.insert("clip_count".to_string(), Value::from(clips.len()));
    fields.insert("card_type".to_string(), Value::String("media".to_string()));
    TaskResult::ok(fields)
}

fn passthrough_with_suffix(data: &TaskData, input_key: &str, suffix: &str) -> TaskResult {
    let input = str_param(data, input_key);
    if input.is_empty() {
        return TaskResult::err(format!("missing required parameter '{input_key}'"));
    }
    let path = placeholder_path(suffix, &input);

    let mut fields = Map::new();
    fields.insert("path".to_string(), Value::String(format!("{path}.mp4")));
    fields.insert("card_type".to_string(), Value::String("media".to_string()));
    TaskResult::ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(obj: Value) -> TaskData {
        obj.as_object().unwrap().clone()
    }

    #[test]
    fn generate_image_is_deterministic_for_identical_input() {
        let params = data(json!({"prompt": "a cat", "model": "animagine_xl"}));
        let a = generate_image(&params);
        let b = generate_image(&params);
        assert_eq!(a.field("image_base64"), b.field("image_base64"));
    }

    #[test]
    fn video_assembly_requires_clips() {
        let params = data(json!({"clips": []}));
        let result = video_assembly(&params);
        assert!(!result.is_success());
    }

    #[test]
    fn scene_assembly_produces_a_path() {
        let params = data(json!({"video_path": "/tmp/a.mp4", "audio_path": "/tmp/a.wav"}));
        let result = scene_assembly(&params);
        assert!(result.is_success());
        assert!(result.field("path").and_then(Value::as_str).unwrap().ends_with(".mp4"));
    }
}
