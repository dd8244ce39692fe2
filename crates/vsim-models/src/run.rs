//! Run state machine and run epochs.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Processing state of a simulation run.
///
/// Strictly linear: `Idle -> ExtractingInput -> Analyzing -> RetrievingPersonas
/// -> GeneratingComments -> Complete`, with `Error` reachable from any
/// non-terminal state. A mode change re-enters `RetrievingPersonas` from
/// `Complete`, and a new upload returns either terminal state to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Idle,
    /// Sampling frames or reading the raw input
    ExtractingInput,
    /// Waiting on the content analysis
    Analyzing,
    /// Building the persona panel
    RetrievingPersonas,
    /// Per-persona comment pipeline running
    GeneratingComments,
    Complete,
    Error,
}

impl RunState {
    /// Get string representation of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::ExtractingInput => "extracting_input",
            RunState::Analyzing => "analyzing",
            RunState::RetrievingPersonas => "retrieving_personas",
            RunState::GeneratingComments => "generating_comments",
            RunState::Complete => "complete",
            RunState::Error => "error",
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Complete | RunState::Error)
    }

    /// Whether `next` is a legal successor of this state.
    pub fn can_transition_to(&self, next: RunState) -> bool {
        use RunState::*;

        match (*self, next) {
            (Idle, ExtractingInput)
            | (ExtractingInput, Analyzing)
            | (Analyzing, RetrievingPersonas)
            | (RetrievingPersonas, GeneratingComments)
            | (GeneratingComments, Complete) => true,
            // mode change
            (Complete, RetrievingPersonas) => true,
            // new upload
            (Complete | Error, Idle) => true,
            (from, Error) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Generation marker for a simulation invocation.
///
/// Every upload and every mode change starts a new epoch. Events carry the
/// epoch that produced them so late arrivals from a superseded run can be
/// dropped by the consumer.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
    Default,
)]
#[serde(transparent)]
pub struct RunEpoch(pub u64);

impl RunEpoch {
    /// The epoch following this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RunEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
