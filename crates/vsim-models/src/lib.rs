//! Shared data models for the ViralSim audience simulator.
//!
//! This crate provides Serde-serializable types for:
//! - Content analysis and virality scoring
//! - Persona panels and simulation modes
//! - Per-persona comment results
//! - Run state machine and run epochs
//! - The event stream surfaced to callers

pub mod analysis;
pub mod comment;
pub mod event;
pub mod persona;
pub mod run;

// Re-export common types
pub use analysis::{ContentAnalysis, ViralityMetrics};
pub use comment::{Comment, CommentResult};
pub use event::{CommentEvent, LogEntry, LogStage, SimulationEvent};
pub use persona::{Persona, SimulationMode};
pub use run::{RunEpoch, RunState};
