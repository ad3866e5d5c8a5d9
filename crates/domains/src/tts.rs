// SPDX-FileCopyrightText: © 2026 OpenCLI Daemon Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! TTS synthesis domain, fronting whichever provider is configured
//! (`edge_tts`, `elevenlabs`, ...). Kept as a separate domain from
//! [`crate::media::MediaDomain`] despite the original bundling both under
//! one class: `media_tts_synthesize` and `media_tts_list_voices` depend on
//! neither image generation nor FFmpeg, and splitting them keeps each
//! domain's `task_types` claim narrow. As with [`crate::media`], real
//! synthesis is out of scope; this produces a deterministic placeholder
//! audio payload sufficient to exercise the episode pipeline end to end.

use std::collections::HashMap;

use async_trait::async_trait;
use base64::Engine as _;
use opencli_core::domain::DisplayConfig;
use opencli_core::{CoreError, Domain, TaskData, TaskResult};
use serde_json::{Map, Value};

const COLOR_HEX: u32 = 0xFF7C_4DFF;
const DEFAULT_VOICE: &str = "zh-CN-XiaoxiaoNeural";

const KNOWN_VOICES: &[&str] = &[
    "zh-CN-XiaoxiaoNeural",
    "en-US-JennyNeural",
    "en-US-GuyNeural",
    "en-GB-SoniaNeural",
    "ja-JP-NanamiNeural",
];

#[derive(Default)]
pub struct TtsDomain;

#[async_trait]
impl Domain for TtsDomain {
    fn id(&self) -> &str {
        "tts"
    }

    fn name(&self) -> &str {
        "Text to Speech"
    }

    fn task_types(&self) -> Vec<String> {
        vec!["media_tts_synthesize".to_string(), "media_tts_list_voices".to_string()]
    }

    fn display_configs(&self) -> HashMap<String, DisplayConfig> {
        let mut map = HashMap::new();
        map.insert(
            "media_tts_synthesize".to_string(),
            DisplayConfig {
                card_type: "media".to_string(),
                title_template: "TTS".to_string(),
                subtitle_template: None,
                icon: "record_voice_over".to_string(),
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
            "media_tts_synthesize" => synthesize(task_data),
            "media_tts_list_voices" => list_voices(),
            other => TaskResult::err(format!("Unknown tts task: {other}")),
        };
        Ok(with_domain(result))
    }
}

fn with_domain(mut result: TaskResult) -> TaskResult {
    result.0.insert("domain".to_string(), Value::String("tts".to_string()));
    result
}

fn synthesize(data: &TaskData) -> TaskResult {
    let text = data.get("text").and_then(Value::as_str).unwrap_or("").to_string();
    if text.is_empty() {
        return TaskResult::err("media_tts_synthesize requires non-empty text");
    }
    let voice = data.get("voice").and_then(Value::as_str).unwrap_or(DEFAULT_VOICE).to_string();
    let provider = data.get("provider").and_then(Value::as_str).unwrap_or("edge_tts").to_string();

    let hash = text.bytes().fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(b)));
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let path = format!("{home}/.opencli/output/tts_{hash:016x}.mp3");
    let audio_base64 =
        base64::engine::general_purpose::STANDARD.encode(format!("audio:{provider}:{voice}:{text}"));

    let mut fields = Map::new();
    fields.insert("audio_base64".to_string(), Value::String(audio_base64));
    fields.insert("path".to_string(), Value::String(path));
    fields.insert("voice".to_string(), Value::String(voice));
    fields.insert("format".to_string(), Value::String("mp3".to_string()));
    fields.insert("card_type".to_string(), Value::String("media".to_string()));
    TaskResult::ok(fields)
}

fn list_voices() -> TaskResult {
    let voices: Vec<Value> =
        KNOWN_VOICES.iter().map(|v| Value::String((*v).to_string())).collect();
    let mut fields = Map::new();
    fields.insert("voices".to_string(), Value::Array(voices));
    fields.insert("card_type".to_string(), Value::String("media".to_string()));
    TaskResult::ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn synthesize_requires_text() {
        let domain = TtsDomain;
        let task_data = json!({}).as_object().unwrap().clone();
        let result = domain.execute_task("media_tts_synthesize", &task_data).await.unwrap();
        assert!(!result.is_success());
    }

    #[tokio::test]
    async fn synthesize_produces_audio_and_path() {
        let domain = TtsDomain;
        let task_data = json!({"text": "hello there", "voice": "en-US-JennyNeural"})
            .as_object()
            .unwrap()
            .clone();
        let result = domain.execute_task("media_tts_synthesize", &task_data).await.unwrap();
        assert!(result.is_success());
        assert_eq!(result.field("voice"), Some(&Value::String("en-US-JennyNeural".to_string())));
    }

    #[tokio::test]
    async fn list_voices_returns_known_voices() {
        let domain = TtsDomain;
        let task_data = TaskData::new();
        let result = domain.execute_task("media_tts_list_voices", &task_data).await.unwrap();
        assert!(result.is_success());
    }
}
