//! Event stream surfaced to simulation consumers.
//!
//! Modeled as a tagged envelope so the same stream can be printed, forwarded
//! over a socket or recorded in tests.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CommentResult, ContentAnalysis, Persona, RunEpoch, RunState};

/// Pipeline stage a log line originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogStage {
    /// Input acquisition
    Ingestion,
    /// Keyframe sampling
    FrameExtractor,
    /// Vision-language analysis
    GeminiVlm,
    /// Persona retrieval
    AgentOrchestrator,
    /// Per-persona comment pipeline
    ReactionEngine,
    /// State machine transitions
    State,
    Error,
}

impl LogStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogStage::Ingestion => "INGESTION",
            LogStage::FrameExtractor => "FRAME_EXTRACTOR",
            LogStage::GeminiVlm => "GEMINI_VLM",
            LogStage::AgentOrchestrator => "AGENT_ORCHESTRATOR",
            LogStage::ReactionEngine => "REACTION_ENGINE",
            LogStage::State => "STATE",
            LogStage::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for LogStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single structured log line.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LogEntry {
    pub id: String,
    pub epoch: RunEpoch,
    pub stage: LogStage,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    /// Create a log entry stamped with the current time.
    pub fn new(epoch: RunEpoch, stage: LogStage, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            epoch,
            stage,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A persona's comment, emitted in persona index order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CommentEvent {
    pub epoch: RunEpoch,
    /// Position of the persona in its batch
    pub index: usize,
    pub result: CommentResult,
}

/// Event envelope.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimulationEvent {
    /// Structured log line
    Log(LogEntry),

    /// Run state transition
    StateChanged {
        epoch: RunEpoch,
        from: RunState,
        to: RunState,
    },

    /// Analysis stage finished
    Analysis {
        epoch: RunEpoch,
        analysis: ContentAnalysis,
    },

    /// Persona batch retrieved (possibly empty)
    Personas {
        epoch: RunEpoch,
        personas: Vec<Persona>,
    },

    /// One persona's comment
    Comment(CommentEvent),
}

impl SimulationEvent {
    /// Epoch of the run that produced this event.
    pub fn epoch(&self) -> RunEpoch {
        match self {
            SimulationEvent::Log(entry) => entry.epoch,
            SimulationEvent::StateChanged { epoch, .. }
            | SimulationEvent::Analysis { epoch, .. }
            | SimulationEvent::Personas { epoch, .. } => *epoch,
            SimulationEvent::Comment(event) => event.epoch,
        }
    }

    /// Returns the comment payload, if this is a comment event.
    pub fn as_comment(&self) -> Option<&CommentEvent> {
        match self {
            SimulationEvent::Comment(event) => Some(event),
            _ => None,
        }
    }
}
