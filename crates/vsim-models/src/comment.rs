//! Comment data models.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of comment generation for a single persona.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommentResult {
    /// Persona this comment belongs to (back-reference)
    pub persona_id: String,
    /// Comment text
    pub text: String,
    /// True if produced by the model, false if taken from the fallback pool
    pub is_generated: bool,
    /// Why live generation was abandoned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
}

impl CommentResult {
    /// A comment produced by the model.
    pub fn generated(persona_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            persona_id: persona_id.into(),
            text: text.into(),
            is_generated: true,
            error_reason: None,
        }
    }

    /// A comment substituted from the fallback pool.
    pub fn fallback(
        persona_id: impl Into<String>,
        text: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            persona_id: persona_id.into(),
            text: text.into(),
            is_generated: false,
            error_reason: Some(reason.into()),
        }
    }
}

/// Presentation-facing comment.
///
/// Lifted from a [`CommentResult`] with cosmetic fields; not part of the
/// simulation contract.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub persona_id: String,
    pub text: String,
    /// Relative display timestamp (e.g. "Just now")
    pub timestamp: String,
    pub likes: u32,
    pub is_generated: bool,
}

impl Comment {
    /// Lift a result into a displayable comment.
    pub fn from_result(result: &CommentResult, likes: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            persona_id: result.persona_id.clone(),
            text: result.text.clone(),
            timestamp: "Just now".to_string(),
            likes,
            is_generated: result.is_generated,
        }
    }
}
