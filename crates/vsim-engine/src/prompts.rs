//! Instruction builders and response schemas.
//!
//! Schemas use the Gemini `Schema` dialect (upper-case type names).

use rand::Rng;
use serde_json::{json, Value};
use vsim_models::{ContentAnalysis, Persona, SimulationMode};

pub const ANALYSIS_TEMPERATURE: f32 = 0.4;
pub const PERSONA_TEMPERATURE: f32 = 0.85;
pub const ADVERSARIAL_PERSONA_TEMPERATURE: f32 = 0.95;
pub const COMMENT_TEMPERATURE: f32 = 1.0;
pub const COMMENT_MAX_OUTPUT_TOKENS: u32 = 2048;

/// How the visual input reached the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFraming {
    /// `n` keyframes in timeline order
    Keyframes(usize),
    /// A single still image
    Still,
    /// The whole clip
    FullVideo,
}

pub fn persona_temperature(mode: SimulationMode) -> f32 {
    match mode {
        SimulationMode::Standard => PERSONA_TEMPERATURE,
        SimulationMode::Troll => ADVERSARIAL_PERSONA_TEMPERATURE,
    }
}

pub fn analysis_instruction(framing: InputFraming) -> String {
    let framing_text = match framing {
        InputFraming::Keyframes(n) => format!(
            "You are given {} keyframes sampled in order across a short-form video. \
             Treat them as one continuous clip.",
            n
        ),
        InputFraming::Still => {
            "You are given a single still frame captured from a short-form video.".to_string()
        }
        InputFraming::FullVideo => {
            "You are given a complete short-form video. Use its motion, cuts and audio."
                .to_string()
        }
    };

    format!(
        "{framing_text}\n\
         Act as a social media strategist. Describe what happens in the content, \
         its overall tone, and which kinds of viewers it would attract.\n\
         Score its viral potential from 0 to 100, and rate hook, pacing, visuals \
         and audio from 0 to 10 each. Give one concrete piece of feedback that \
         would raise retention.\n\
         Return JSON only."
    )
}

pub fn analysis_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "summary": {"type": "STRING"},
            "tone": {"type": "STRING"},
            "suggestedPersonas": {"type": "ARRAY", "items": {"type": "STRING"}},
            "virality": {
                "type": "OBJECT",
                "properties": {
                    "score": {"type": "INTEGER"},
                    "hookScore": {"type": "INTEGER"},
                    "pacingScore": {"type": "INTEGER"},
                    "visualScore": {"type": "INTEGER"},
                    "audioScore": {"type": "INTEGER"},
                    "feedback": {"type": "STRING"}
                },
                "required": [
                    "score",
                    "hookScore",
                    "pacingScore",
                    "visualScore",
                    "audioScore",
                    "feedback"
                ]
            }
        },
        "required": ["summary", "tone", "suggestedPersonas", "virality"]
    })
}

pub fn persona_instruction(
    analysis: &ContentAnalysis,
    mode: SimulationMode,
    count: usize,
) -> String {
    let audience = match mode {
        SimulationMode::Standard => {
            let hints = if analysis.suggested_persona_hints.is_empty() {
                "general short-form viewers".to_string()
            } else {
                analysis.suggested_persona_hints.join(", ")
            };
            format!(
                "Build a realistic audience: a mix of fans, neutral viewers, casual \
                 scrollers and domain experts. Draw on these audience hints: {hints}."
            )
        }
        SimulationMode::Troll => "Build a hostile audience: nitpickers, contrarians, \
             jaded experts and bored doom-scrollers who look for flaws. \
             Every one of them is looking for something to criticise."
            .to_string(),
    };

    format!(
        "Content summary: {summary}\n\
         Tone: {tone}\n\
         {audience}\n\
         Create exactly {count} distinct viewer personas. Each needs a unique id, \
         a display name, a handle without a leading @, a short trait label, a \
         one-sentence bio and an avatar seed word.\n\
         Return a JSON array only.",
        summary = analysis.summary,
        tone = analysis.tone,
    )
}

pub fn persona_schema(count: usize) -> Value {
    json!({
        "type": "ARRAY",
        "minItems": count,
        "maxItems": count,
        "items": {
            "type": "OBJECT",
            "properties": {
                "id": {"type": "STRING"},
                "name": {"type": "STRING"},
                "handle": {"type": "STRING"},
                "trait": {"type": "STRING"},
                "bio": {"type": "STRING"},
                "avatarSeed": {"type": "STRING"}
            },
            "required": ["id", "name", "handle", "trait", "bio", "avatarSeed"]
        }
    })
}

/// Per-persona comment instruction.
///
/// Carries a random seed line so identical personas still get varied output.
pub fn comment_instruction(
    persona: &Persona,
    analysis: &ContentAnalysis,
    mode: SimulationMode,
) -> String {
    let stance = match mode {
        SimulationMode::Standard => {
            "Write as a genuine viewer. Be specific about something you noticed; \
             praise and constructive critique are both fine."
        }
        SimulationMode::Troll => {
            "Write as a harsh critic. Pick apart one specific flaw in the video; \
             stay on the content, no slurs or personal attacks."
        }
    };
    let seed: u32 = rand::rng().random_range(0..1_000_000);

    format!(
        "CHARACTER NAME: {name} (Handle: {handle})\n\
         TRAIT: {trait_label}\n\
         BIO: {bio}\n\
         VIDEO: {summary}\n\
         VIDEO TONE: {tone}\n\
         {stance}\n\
         Reply with the comment text only, two to four sentences, in character.\n\
         VARIATION SEED: {seed}",
        name = persona.name,
        handle = persona.display_handle(),
        trait_label = persona.trait_label,
        bio = persona.bio,
        summary = analysis.summary,
        tone = analysis.tone,
    )
}
