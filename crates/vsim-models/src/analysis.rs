//! Content analysis data models.
//!
//! These are the structured outputs of the analysis stage. Field names on the
//! wire are camelCase because the same shape is requested from the model as a
//! response schema.

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

/// Structured understanding of a video, produced once per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContentAnalysis {
    /// What happens in the video: topic, objects, actions
    pub summary: String,

    /// Visual/emotional tone
    pub tone: String,

    /// Free-text hints describing viewer types who would care
    #[serde(rename = "suggestedPersonas")]
    pub suggested_persona_hints: Vec<String>,

    /// Virality score breakdown
    pub virality: ViralityMetrics,
}

/// Virality score breakdown.
///
/// Models frequently answer with fractional numbers, so scores are rounded
/// and clamped into range on deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ViralityMetrics {
    /// Total virality score (0-100)
    #[serde(deserialize_with = "total_score")]
    #[schemars(with = "u8")]
    pub score: u8,

    /// How grabbing the opening is (0-10)
    #[serde(deserialize_with = "sub_score")]
    #[schemars(with = "u8")]
    pub hook_score: u8,

    /// Visual variety and speed (0-10)
    #[serde(deserialize_with = "sub_score")]
    #[schemars(with = "u8")]
    pub pacing_score: u8,

    /// Clarity and aesthetic (0-10)
    #[serde(deserialize_with = "sub_score")]
    #[schemars(with = "u8")]
    pub visual_score: u8,

    /// Implied audio interest (0-10)
    #[serde(deserialize_with = "sub_score")]
    #[schemars(with = "u8")]
    pub audio_score: u8,

    /// One sentence of constructive feedback
    pub feedback: String,
}

/// Upper bound of the total virality score.
pub const MAX_TOTAL_SCORE: u8 = 100;

/// Upper bound of each virality sub-score.
pub const MAX_SUB_SCORE: u8 = 10;

impl ContentAnalysis {
    /// Short human-readable description used in log lines.
    pub fn headline(&self) -> String {
        format!("{} tone, virality {}/100", self.tone, self.virality.score)
    }
}

fn clamp_score<'de, D>(deserializer: D, max: u8) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    if !raw.is_finite() {
        return Err(serde::de::Error::custom("score must be a finite number"));
    }
    Ok(raw.round().clamp(0.0, f64::from(max)) as u8)
}

fn total_score<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    clamp_score(deserializer, MAX_TOTAL_SCORE)
}

fn sub_score<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    clamp_score(deserializer, MAX_SUB_SCORE)
}
