//! Engine configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// How visual input is prepared for the analysis stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalysisMode {
    /// Sample a handful of keyframes
    #[default]
    Fast,
    /// Send the whole video for temporal understanding
    Deep,
}

impl AnalysisMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisMode::Fast => "fast",
            AnalysisMode::Deep => "deep",
        }
    }
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AnalysisMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fast" | "frames" => Ok(AnalysisMode::Fast),
            "deep" | "full" => Ok(AnalysisMode::Deep),
            other => Err(format!("unknown analysis mode: {other}")),
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Model tried first by every stage
    pub primary_model: String,
    /// Model tried once the primary is exhausted
    pub secondary_model: String,
    /// Retries beyond the first attempt, per model
    pub max_retries: u32,
    /// Fixed part of the backoff delay
    pub backoff_base: Duration,
    /// Upper bound of the uniform random part of the backoff delay
    pub backoff_jitter: Duration,
    /// Start offset between consecutive persona tasks
    pub stagger: Duration,
    /// Presentation pacing window before each emitted comment
    pub pacing_min: Duration,
    pub pacing_max: Duration,
    /// Keyframes sampled in fast mode
    pub frame_count: usize,
    pub analysis_mode: AnalysisMode,
    /// Personas per batch
    pub persona_count: usize,
    /// HTTP timeout for a single model request
    pub request_timeout: Duration,
    /// Generative API base URL
    pub api_base: String,
}

/// Default Gemini REST endpoint.
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            primary_model: "gemini-3-pro-preview".to_string(),
            secondary_model: "gemini-2.5-flash".to_string(),
            max_retries: 3,
            backoff_base: Duration::from_millis(2000),
            backoff_jitter: Duration::from_millis(2000),
            stagger: Duration::from_millis(800),
            pacing_min: Duration::from_millis(400),
            pacing_max: Duration::from_millis(1200),
            frame_count: vsim_media::DEFAULT_FRAME_COUNT,
            analysis_mode: AnalysisMode::Fast,
            persona_count: 6,
            request_timeout: Duration::from_secs(120),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_millis(key: &str, default: Duration) -> Duration {
    Duration::from_millis(env_or(key, default.as_millis() as u64))
}

impl EngineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let pacing_min = env_millis("SIM_PACING_MIN_MS", defaults.pacing_min);
        let pacing_max = env_millis("SIM_PACING_MAX_MS", defaults.pacing_max).max(pacing_min);

        Self {
            primary_model: std::env::var("SIM_PRIMARY_MODEL").unwrap_or(defaults.primary_model),
            secondary_model: std::env::var("SIM_SECONDARY_MODEL")
                .unwrap_or(defaults.secondary_model),
            max_retries: env_or("SIM_MAX_RETRIES", defaults.max_retries),
            backoff_base: env_millis("SIM_BACKOFF_BASE_MS", defaults.backoff_base),
            backoff_jitter: env_millis("SIM_BACKOFF_JITTER_MS", defaults.backoff_jitter),
            stagger: env_millis("SIM_STAGGER_MS", defaults.stagger),
            pacing_min,
            pacing_max,
            frame_count: env_or("SIM_FRAME_COUNT", defaults.frame_count).max(1),
            analysis_mode: env_or("SIM_ANALYSIS_MODE", defaults.analysis_mode),
            persona_count: env_or("SIM_PERSONA_COUNT", defaults.persona_count).max(1),
            request_timeout: Duration::from_secs(env_or(
                "SIM_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )),
            api_base: std::env::var("GEMINI_API_BASE").unwrap_or(defaults.api_base),
        }
    }

    /// Config with every delay zeroed, for deterministic tests.
    pub fn without_delays() -> Self {
        Self {
            backoff_base: Duration::ZERO,
            backoff_jitter: Duration::ZERO,
            stagger: Duration::ZERO,
            pacing_min: Duration::ZERO,
            pacing_max: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Models in the order stages try them.
    pub fn model_chain(&self) -> [&str; 2] {
        [self.primary_model.as_str(), self.secondary_model.as_str()]
    }
}
