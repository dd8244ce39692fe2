//! Generative backend abstraction.
//!
//! The stages build a [`GenerateRequest`] and hand it to a
//! [`GenerativeBackend`]; the Gemini REST client is one implementation, the
//! scripted fake in [`crate::testing`] is another.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use vsim_media::MediaPayload;

use crate::error::ModelError;

/// Which pipeline stage issued a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Analysis,
    Personas,
    Comment,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Analysis => "analysis",
            RequestKind::Personas => "personas",
            RequestKind::Comment => "comment",
        }
    }
}

/// One part of the request content.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    Text(String),
    InlineData { mime_type: String, data: Vec<u8> },
}

impl From<&MediaPayload> for ContentPart {
    fn from(payload: &MediaPayload) -> Self {
        ContentPart::InlineData {
            mime_type: payload.mime_type.clone(),
            data: payload.data.clone(),
        }
    }
}

/// Model-independent request payload.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub kind: RequestKind,
    pub parts: Vec<ContentPart>,
    /// JSON schema the response must follow; `None` for free text
    pub response_schema: Option<Value>,
    pub temperature: f32,
    pub max_output_tokens: Option<u32>,
}

impl GenerateRequest {
    /// Free-text request built from a single instruction.
    pub fn text(kind: RequestKind, instruction: impl Into<String>, temperature: f32) -> Self {
        Self {
            kind,
            parts: vec![ContentPart::Text(instruction.into())],
            response_schema: None,
            temperature,
            max_output_tokens: None,
        }
    }

    /// Ask for JSON following `schema`.
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.response_schema = Some(schema);
        self
    }

    pub fn with_max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = Some(tokens);
        self
    }

    /// Prepend media parts ahead of the instruction.
    pub fn with_media<'a>(mut self, media: impl IntoIterator<Item = &'a MediaPayload>) -> Self {
        let mut parts: Vec<ContentPart> = media.into_iter().map(ContentPart::from).collect();
        parts.append(&mut self.parts);
        self.parts = parts;
        self
    }

    /// All text parts joined, for logging and test inspection.
    pub fn prompt_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text(t) => Some(t.as_str()),
                ContentPart::InlineData { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Number of inline media parts.
    pub fn media_count(&self) -> usize {
        self.parts
            .iter()
            .filter(|p| matches!(p, ContentPart::InlineData { .. }))
            .count()
    }
}

/// What came back from the backend, before interpretation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateResponse {
    /// Concatenated text of the first candidate
    pub text: Option<String>,
    /// Candidate finish reason (`STOP`, `MAX_TOKENS`, `SAFETY`, ...)
    pub finish_reason: Option<String>,
    /// Prompt-level block reason
    pub block_reason: Option<String>,
}

impl GenerateResponse {
    /// A normal, complete text answer.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            finish_reason: Some("STOP".to_string()),
            block_reason: None,
        }
    }

    /// A response stopped for `reason` without any text.
    pub fn stopped(reason: impl Into<String>) -> Self {
        Self {
            text: None,
            finish_reason: Some(reason.into()),
            block_reason: None,
        }
    }

    /// Interpret the response as usable text.
    ///
    /// Any non-blank text wins, including a `MAX_TOKENS` truncation. Without
    /// text, a block or a non-`STOP` finish is a refusal.
    pub fn into_text(self) -> Result<String, ModelError> {
        if let Some(text) = self.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            return Ok(text.to_string());
        }
        if let Some(reason) = self.block_reason {
            return Err(ModelError::refused(reason));
        }
        match self.finish_reason.as_deref() {
            Some(reason) if reason != "STOP" => Err(ModelError::refused(reason)),
            _ => Err(ModelError::empty()),
        }
    }

    /// Interpret the response as JSON of type `T`.
    pub fn into_json<T: DeserializeOwned>(self) -> Result<T, ModelError> {
        parse_json(&self.into_text()?)
    }
}

/// Parse a JSON body, tolerating a surrounding markdown code fence.
pub fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T, ModelError> {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    let text = text.strip_suffix("```").unwrap_or(text);

    serde_json::from_str(text.trim())
        .map_err(|e| ModelError::malformed(format!("Failed to parse model JSON: {}", e)))
}

/// A generative model endpoint.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Issue one request against `model`. No retries happen here.
    async fn generate(
        &self,
        model: &str,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, ModelError>;
}
