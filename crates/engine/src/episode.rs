// SPDX-FileCopyrightText: © 2026 OpenCLI Daemon Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Episode → Pipeline compiler.
//!
//! Lowers an [`EpisodeScript`] (scenes with dialogue) into a concrete
//! [`Pipeline`] DAG: one keyframe/video/(optional tts)/assembly group per
//! scene, followed by a single post-processing tail that concatenates
//! every scene's assembled clip and optionally upscales, colour-grades,
//! and platform-encodes the result.
//!
//! The pipeline id is derived deterministically from the episode id so a
//! caller can recompile the same episode repeatedly and reuse one
//! persisted pipeline row rather than accumulating one per run.

use opencli_api::{EpisodeScript, Pipeline, PipelineEdge, PipelineNode, Position};
use serde::Deserialize;
use serde_json::Value;

use crate::constants::{
    DEFAULT_CONTROLNET_SCALE, DEFAULT_CONTROLNET_TYPE, DEFAULT_IMAGE_MODEL, DEFAULT_QUALITY,
    DEFAULT_VIDEO_MODEL, DEFAULT_VOICE, DRAFT_IMAGE_HEIGHT, DRAFT_IMAGE_WIDTH,
    STANDARD_IMAGE_HEIGHT, STANDARD_IMAGE_WIDTH,
};

/// Per-generation knobs for [`compile_episode`]. Every field has a sensible
/// default so an episode can be compiled with `EpisodeSettings::default()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EpisodeSettings {
    pub image_model: String,
    pub video_model: String,
    /// `"draft"` drops resolution and skips ControlNet/upscale by default;
    /// any other value (conventionally `"standard"`) renders at full size.
    pub quality: String,
    /// Overrides the quality-derived ControlNet default when set.
    pub use_controlnet: Option<bool>,
    /// LUT name/path for the colour-grade tail stage; absent skips it.
    pub color_grade: Option<String>,
    /// Target platform for the final encode tail stage; absent skips it.
    pub export_platform: Option<String>,
    pub default_voice: String,
}

impl Default for EpisodeSettings {
    fn default() -> Self {
        Self {
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            video_model: DEFAULT_VIDEO_MODEL.to_string(),
            quality: DEFAULT_QUALITY.to_string(),
            use_controlnet: None,
            color_grade: None,
            export_platform: None,
            default_voice: DEFAULT_VOICE.to_string(),
        }
    }
}

impl EpisodeSettings {
    fn is_draft(&self) -> bool {
        self.quality == "draft"
    }

    fn resolved_use_controlnet(&self) -> bool {
        self.use_controlnet.unwrap_or(!self.is_draft())
    }
}

fn node(id: impl Into<String>, node_type: impl Into<String>, params: Vec<(&str, Value)>) -> PipelineNode {
    PipelineNode {
        id: id.into(),
        node_type: node_type.into(),
        domain: None,
        label: None,
        position: Position::default(),
        params: params.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
    }
}

fn edge(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> PipelineEdge {
    PipelineEdge {
        id: id.into(),
        source_node: source.into(),
        source_port: "output".to_string(),
        target_node: target.into(),
        target_port: "input".to_string(),
    }
}

fn template_ref(node_id: &str, field: &str) -> Value {
    Value::String(format!("{{{{{node_id}.{field}}}}}"))
}

/// Deterministic pipeline id for `episode_id`, stable across recompilations
/// so a caller can persist at most one pipeline per episode.
#[must_use]
pub fn pipeline_id_for_episode(episode_id: &str) -> String {
    format!("episode-pipeline-{episode_id}")
}

/// Compiles `script` into a concrete [`Pipeline`] for `episode_id`.
#[must_use]
pub fn compile_episode(episode_id: &str, script: &EpisodeScript, settings: &EpisodeSettings) -> Pipeline {
    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    let mut edge_seq: u32 = 0;
    let mut next_edge_id = || {
        edge_seq += 1;
        format!("e{edge_seq}")
    };

    let (width, height) = if settings.is_draft() {
        (DRAFT_IMAGE_WIDTH, DRAFT_IMAGE_HEIGHT)
    } else {
        (STANDARD_IMAGE_WIDTH, STANDARD_IMAGE_HEIGHT)
    };

    let mut assembly_ids = Vec::with_capacity(script.scenes.len());

    for (i, scene) in script.scenes.iter().enumerate() {
        let keyframe_id = format!("scene_{i}_keyframe");
        let video_id = format!("scene_{i}_video");
        let assembly_id = format!("assembly_{i}");

        let prompt = if scene.visual_prompt.is_empty() { scene.description.clone() } else { scene.visual_prompt.clone() };

        nodes.push(node(
            &keyframe_id,
            "media_local_generate_image",
            vec![
                ("prompt", Value::String(prompt.clone())),
                ("model", Value::String(settings.image_model.clone())),
                ("width", Value::from(width)),
                ("height", Value::from(height)),
            ],
        ));

        let use_controlnet = settings.resolved_use_controlnet();
        let video_type = if use_controlnet { "media_local_controlnet_video" } else { "media_local_generate_video" };
        let mut video_params = vec![
            ("prompt", Value::String(prompt)),
            ("model", Value::String(settings.video_model.clone())),
            ("reference_image_base64", template_ref(&keyframe_id, "image_base64")),
        ];
        if use_controlnet {
            video_params.push(("controlnet_type", Value::String(DEFAULT_CONTROLNET_TYPE.to_string())));
            video_params.push(("controlnet_scale", Value::from(DEFAULT_CONTROLNET_SCALE)));
        }
        nodes.push(node(&video_id, video_type, video_params));
        edges.push(edge(next_edge_id(), &keyframe_id, &video_id));

        let has_dialogue = !scene.dialogue.is_empty();
        let tts_id = format!("scene_{i}_tts");
        if has_dialogue {
            let text = scene
                .dialogue
                .iter()
                .map(|line| line.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            let voice = scene
                .dialogue
                .iter()
                .map(|line| line.voice.as_str())
                .find(|v| !v.is_empty())
                .unwrap_or(&settings.default_voice)
                .to_string();

            nodes.push(node(
                &tts_id,
                "media_tts_synthesize",
                vec![
                    ("text", Value::String(text)),
                    ("voice", Value::String(voice)),
                    ("provider", Value::String("edge_tts".to_string())),
                ],
            ));
        }

        let mut assembly_params = vec![("video_path", template_ref(&video_id, "path"))];
        if has_dialogue {
            assembly_params.push(("audio_path", template_ref(&tts_id, "path")));
        }
        nodes.push(node(&assembly_id, "media_scene_assembly", assembly_params));
        edges.push(edge(next_edge_id(), &video_id, &assembly_id));
        if has_dialogue {
            edges.push(edge(next_edge_id(), &tts_id, &assembly_id));
        }

        assembly_ids.push(assembly_id);
    }

    let clips: Vec<Value> = assembly_ids.iter().map(|id| template_ref(id, "path")).collect();
    nodes.push(node("post_concat", "media_video_assembly", vec![("clips", Value::Array(clips))]));
    for assembly_id in &assembly_ids {
        edges.push(edge(next_edge_id(), assembly_id, "post_concat"));
    }

    let mut tail: String = "post_concat".to_string();

    if !settings.is_draft() {
        nodes.push(node(
            "post_upscale",
            "media_upscale_video",
            vec![("video_path", template_ref(&tail, "path"))],
        ));
        edges.push(edge(next_edge_id(), &tail, "post_upscale"));
        tail = "post_upscale".to_string();
    }

    if let Some(color_grade) = &settings.color_grade {
        nodes.push(node(
            "post_colorgrade",
            "media_lut_colorgrade",
            vec![
                ("video_path", template_ref(&tail, "path")),
                ("lut", Value::String(color_grade.clone())),
            ],
        ));
        edges.push(edge(next_edge_id(), &tail, "post_colorgrade"));
        tail = "post_colorgrade".to_string();
    }

    if let Some(export_platform) = &settings.export_platform {
        nodes.push(node(
            "post_encode",
            "media_platform_encode",
            vec![
                ("video_path", template_ref(&tail, "path")),
                ("platform", Value::String(export_platform.clone())),
            ],
        ));
        edges.push(edge(next_edge_id(), &tail, "post_encode"));
    }

    Pipeline {
        id: pipeline_id_for_episode(episode_id),
        name: format!("Episode: {}", script.title),
        description: script.synopsis.clone(),
        nodes,
        edges,
        parameters: Vec::new(),
        created_at: now_iso(),
        updated_at: now_iso(),
    }
}

fn now_iso() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencli_api::{Character, DialogueLine, Scene};

    fn script_with_one_scene(dialogue: Vec<DialogueLine>) -> EpisodeScript {
        EpisodeScript {
            title: "Pilot".to_string(),
            synopsis: "A beginning.".to_string(),
            characters: vec![Character { id: "c1".to_string(), name: "Ann".to_string(), voice: String::new(), description: String::new() }],
            scenes: vec![Scene {
                id: "s1".to_string(),
                description: "An empty room".to_string(),
                visual_prompt: "a dim empty room, cinematic".to_string(),
                dialogue,
                duration_seconds: 4.0,
                shot_type: "wide".to_string(),
                transition: "cut".to_string(),
            }],
        }
    }

    #[test]
    fn pipeline_id_is_deterministic() {
        assert_eq!(pipeline_id_for_episode("ep-1"), pipeline_id_for_episode("ep-1"));
    }

    #[test]
    fn scene_without_dialogue_skips_tts_node() {
        let script = script_with_one_scene(vec![]);
        let pipeline = compile_episode("ep-1", &script, &EpisodeSettings::default());
        assert!(!pipeline.nodes.iter().any(|n| n.id == "scene_0_tts"));
        let assembly = pipeline.nodes.iter().find(|n| n.id == "assembly_0").unwrap();
        assert!(!assembly.params.contains_key("audio_path"));
    }

    #[test]
    fn scene_with_dialogue_adds_parallel_tts_node() {
        let script = script_with_one_scene(vec![DialogueLine {
            character_id: "c1".to_string(),
            text: "Hello there.".to_string(),
            emotion: "neutral".to_string(),
            voice: "en-US-JennyNeural".to_string(),
        }]);
        let pipeline = compile_episode("ep-1", &script, &EpisodeSettings::default());
        assert!(pipeline.nodes.iter().any(|n| n.id == "scene_0_tts"));
        // TTS runs in parallel with the video node: no edge targets it.
        assert!(!pipeline.edges.iter().any(|e| e.target_node == "scene_0_tts"));
        let assembly = pipeline.nodes.iter().find(|n| n.id == "assembly_0").unwrap();
        assert_eq!(assembly.params.get("audio_path"), Some(&template_ref("scene_0_tts", "path")));
    }

    #[test]
    fn draft_quality_uses_low_resolution_and_skips_upscale() {
        let script = script_with_one_scene(vec![]);
        let mut settings = EpisodeSettings::default();
        settings.quality = "draft".to_string();
        let pipeline = compile_episode("ep-1", &script, &settings);
        let keyframe = pipeline.nodes.iter().find(|n| n.id == "scene_0_keyframe").unwrap();
        assert_eq!(keyframe.params.get("width"), Some(&Value::from(DRAFT_IMAGE_WIDTH)));
        assert!(!pipeline.nodes.iter().any(|n| n.id == "post_upscale"));
        let video = pipeline.nodes.iter().find(|n| n.id == "scene_0_video").unwrap();
        assert_eq!(video.node_type, "media_local_generate_video");
    }

    #[test]
    fn post_tail_is_wired_in_order_when_fully_configured() {
        let script = script_with_one_scene(vec![]);
        let settings = EpisodeSettings {
            color_grade: Some("teal_orange".to_string()),
            export_platform: Some("youtube_shorts".to_string()),
            ..EpisodeSettings::default()
        };
        let pipeline = compile_episode("ep-1", &script, &settings);
        let ids: Vec<&str> = pipeline.nodes.iter().map(|n| n.id.as_str()).collect();
        assert!(ids.contains(&"post_upscale"));
        assert!(ids.contains(&"post_colorgrade"));
        assert!(ids.contains(&"post_encode"));
        let encode = pipeline.nodes.iter().find(|n| n.id == "post_encode").unwrap();
        assert_eq!(encode.params.get("video_path"), Some(&template_ref("post_colorgrade", "path")));
    }

    #[test]
    fn pipeline_name_includes_episode_title() {
        let script = script_with_one_scene(vec![]);
        let pipeline = compile_episode("ep-1", &script, &EpisodeSettings::default());
        assert_eq!(pipeline.name, "Episode: Pilot");
    }
}
