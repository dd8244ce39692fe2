//! Test doubles shared by unit and integration tests.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::time::Instant;

use vsim_media::{MediaError, MediaPayload, MediaResult, MediaSource};
use vsim_models::{ContentAnalysis, Persona, SimulationEvent, ViralityMetrics};

use crate::backend::{GenerateRequest, GenerateResponse, GenerativeBackend, RequestKind};
use crate::error::ModelError;
use crate::logging::EventSink;

type Script =
    dyn Fn(&str, &GenerateRequest, u32) -> Result<GenerateResponse, ModelError> + Send + Sync;
type Latency = dyn Fn(&GenerateRequest) -> Duration + Send + Sync;

/// A request the scripted backend received.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model: String,
    pub kind: RequestKind,
    pub prompt: String,
    pub media_count: usize,
    /// When the request arrived (tokio clock, so paused time works)
    pub at: Instant,
}

/// Backend whose answers come from a closure.
///
/// The closure receives the model, the request, and the 0-based index of
/// the call across the backend's lifetime.
pub struct ScriptedBackend {
    script: Box<Script>,
    latency: Option<Box<Latency>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedBackend {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&str, &GenerateRequest, u32) -> Result<GenerateResponse, ModelError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            script: Box::new(script),
            latency: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Backend that answers every request with `text`.
    pub fn always_text(text: &'static str) -> Self {
        Self::new(move |_, _, _| Ok(GenerateResponse::text(text)))
    }

    /// Backend that answers per request kind: the given analysis and panel,
    /// and a comment naming the persona it was written for.
    pub fn happy_path(analysis: ContentAnalysis, personas: Vec<Persona>) -> Self {
        Self::new(move |_, request, _| match request.kind {
            RequestKind::Analysis => Ok(GenerateResponse::text(
                serde_json::to_string(&analysis).unwrap_or_default(),
            )),
            RequestKind::Personas => Ok(GenerateResponse::text(
                serde_json::to_string(&personas).unwrap_or_default(),
            )),
            RequestKind::Comment => Ok(GenerateResponse::text(format!(
                "comment for {}",
                persona_name_in(&request.prompt_text()).unwrap_or("?")
            ))),
        })
    }

    /// Simulated network latency per request.
    pub fn with_latency<F>(mut self, latency: F) -> Self
    where
        F: Fn(&GenerateRequest) -> Duration + Send + Sync + 'static,
    {
        self.latency = Some(Box::new(latency));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn calls_of(&self, kind: RequestKind) -> Vec<RecordedCall> {
        self.calls().into_iter().filter(|c| c.kind == kind).collect()
    }

    pub fn models_called(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.model).collect()
    }
}

#[async_trait]
impl GenerativeBackend for ScriptedBackend {
    async fn generate(
        &self,
        model: &str,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, ModelError> {
        let index = {
            let mut calls = self.calls.lock().unwrap_or_else(|p| p.into_inner());
            calls.push(RecordedCall {
                model: model.to_string(),
                kind: request.kind,
                prompt: request.prompt_text(),
                media_count: request.media_count(),
                at: Instant::now(),
            });
            (calls.len() - 1) as u32
        };

        if let Some(latency) = &self.latency {
            tokio::time::sleep(latency(request)).await;
        }

        (self.script)(model, request, index)
    }
}

/// Sink that keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SimulationEvent>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<SimulationEvent> {
        self.events.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Log messages in emission order.
    pub fn messages(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SimulationEvent::Log(entry) => Some(entry.message),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: SimulationEvent) {
        self.events
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(event);
    }
}

/// Media source that returns canned payloads without touching FFmpeg.
#[derive(Debug, Clone, Copy)]
pub struct StaticMediaSource {
    frames: usize,
    fail: bool,
}

impl StaticMediaSource {
    /// Source yielding `frames` keyframes per extraction.
    pub fn new(frames: usize) -> Self {
        Self { frames, fail: false }
    }

    /// Source whose every read fails as if the file were missing.
    pub fn failing() -> Self {
        Self {
            frames: 0,
            fail: true,
        }
    }

    fn check(&self, path: &Path) -> MediaResult<()> {
        if self.fail {
            return Err(MediaError::FileNotFound(PathBuf::from(path)));
        }
        Ok(())
    }
}

#[async_trait]
impl MediaSource for StaticMediaSource {
    async fn extract_frames(&self, video: &Path, count: usize) -> MediaResult<Vec<MediaPayload>> {
        self.check(video)?;
        Ok(vec![MediaPayload::jpeg(vec![0xFF, 0xD8]); self.frames.min(count)])
    }

    async fn read_full_video(&self, video: &Path) -> MediaResult<MediaPayload> {
        self.check(video)?;
        Ok(MediaPayload::new("video/mp4", vec![0; 16]))
    }

    async fn read_image(&self, image: &Path) -> MediaResult<MediaPayload> {
        self.check(image)?;
        Ok(MediaPayload::new("image/png", vec![0x89, 0x50]))
    }
}

/// Extract the persona name from a comment instruction.
pub fn persona_name_in(prompt: &str) -> Option<&str> {
    prompt
        .lines()
        .find_map(|line| line.trim().strip_prefix("CHARACTER NAME: "))
        .and_then(|rest| rest.split(" (").next())
}

/// A plausible analysis.
pub fn sample_analysis() -> ContentAnalysis {
    ContentAnalysis {
        summary: "A woodworker restores a rusty hand plane in a sunlit shop".to_string(),
        tone: "calm".to_string(),
        suggested_persona_hints: vec![
            "hobby woodworker".to_string(),
            "tool collector".to_string(),
            "restoration skeptic".to_string(),
        ],
        virality: ViralityMetrics {
            score: 64,
            hook_score: 6,
            pacing_score: 5,
            visual_score: 8,
            audio_score: 6,
            feedback: "Show the finished plane in the first second.".to_string(),
        },
    }
}

/// `count` distinct personas, some with a stray "@" on the handle.
pub fn sample_personas(count: usize) -> Vec<Persona> {
    (0..count)
        .map(|i| Persona {
            id: format!("p{}", i),
            name: format!("Viewer {}", i),
            handle: if i % 2 == 0 {
                format!("@viewer_{}", i)
            } else {
                format!("viewer_{}", i)
            },
            trait_label: "Curious".to_string(),
            bio: "Watches restoration videos at 2x speed.".to_string(),
            avatar_seed: format!("seed{}", i),
        })
        .collect()
}

/// Analysis JSON as a model would return it.
pub fn analysis_json() -> String {
    json!({
        "summary": "A woodworker restores a rusty hand plane",
        "tone": "calm",
        "suggestedPersonas": ["hobby woodworker"],
        "virality": {
            "score": 64.4, "hookScore": 6, "pacingScore": 5,
            "visualScore": 8, "audioScore": 6,
            "feedback": "Show the finished plane first."
        }
    })
    .to_string()
}
