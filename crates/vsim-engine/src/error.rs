//! Engine error types.

use thiserror::Error;
use vsim_models::RunState;

pub type SimResult<T> = Result<T, SimError>;

/// Category of a single backend failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelErrorKind {
    /// Request never produced an HTTP response
    Transport,
    /// Backend answered with a non-success status
    Http,
    /// Model refused, was blocked, or stopped for a non-normal reason
    Refused,
    /// Body was not the JSON shape that was asked for
    Malformed,
    /// Backend answered without any text
    Empty,
    /// No credentials available
    Auth,
}

/// A failed generative backend request.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ModelError {
    pub kind: ModelErrorKind,
    /// HTTP-equivalent status, when the backend reported one
    pub status: Option<u16>,
    pub message: String,
}

impl ModelError {
    fn new(kind: ModelErrorKind, status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            kind,
            status,
            message: message.into(),
        }
    }

    /// Error from a non-success HTTP response.
    pub fn from_http_status(status: u16, body: impl AsRef<str>) -> Self {
        let body = body.as_ref().trim();
        let message = if body.is_empty() {
            format!("Gemini API returned {}", status)
        } else {
            format!("Gemini API returned {}: {}", status, body)
        };
        Self::new(ModelErrorKind::Http, Some(status), message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ModelErrorKind::Transport, None, message)
    }

    pub fn refused(reason: impl AsRef<str>) -> Self {
        Self::new(
            ModelErrorKind::Refused,
            None,
            format!("Model Refusal: {}", reason.as_ref()),
        )
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ModelErrorKind::Malformed, None, message)
    }

    pub fn empty() -> Self {
        Self::new(ModelErrorKind::Empty, None, "Empty response text")
    }

    pub fn missing_key() -> Self {
        Self::new(ModelErrorKind::Auth, None, "API key missing")
    }

    /// Check if the error is transient (rate limited or overloaded).
    ///
    /// Refusals are never retried, whatever their message says.
    pub fn is_retryable(&self) -> bool {
        if self.kind == ModelErrorKind::Refused || self.kind == ModelErrorKind::Auth {
            return false;
        }
        if matches!(self.status, Some(429) | Some(503)) {
            return true;
        }
        let msg = self.message.to_lowercase();
        msg.contains("429") || msg.contains("503") || msg.contains("overloaded")
    }
}

#[derive(Debug, Error)]
pub enum SimError {
    #[error("API key missing")]
    MissingApiKey,

    #[error("Analysis failed: {0}")]
    Analysis(String),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: RunState, to: RunState },

    #[error("Mode change rejected while {0}")]
    ModeChangeRejected(RunState),

    #[error("No analysis available for this run")]
    NoAnalysis,

    #[error("Media error: {0}")]
    Media(#[from] vsim_media::MediaError),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl SimError {
    pub fn analysis_failed(msg: impl Into<String>) -> Self {
        Self::Analysis(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
