//! Audience simulation engine.
//!
//! This crate provides:
//! - Retrying model caller with primary/secondary model fallback
//! - Gemini REST backend
//! - Analysis and persona retrieval stages
//! - Staggered, order-preserving reaction engine with deduplicated fallbacks
//! - Orchestration controller with run state machine and run epochs

pub mod analysis;
pub mod backend;
pub mod config;
pub mod error;
pub mod fallback;
pub mod gemini;
pub mod keys;
pub mod logging;
pub mod orchestrator;
pub mod personas;
pub mod prompts;
pub mod reactions;
pub mod retry;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use analysis::{Analyzer, VisualInput};
pub use backend::{ContentPart, GenerateRequest, GenerateResponse, GenerativeBackend, RequestKind};
pub use config::{AnalysisMode, EngineConfig};
pub use error::{ModelError, ModelErrorKind, SimError, SimResult};
pub use fallback::{FallbackPool, FallbackRegistry};
pub use gemini::GeminiBackend;
pub use keys::{EnvKeyStore, KeyStore, MemoryKeyStore};
pub use logging::{EventSink, NullSink, RunLogger};
pub use orchestrator::{EpochTracker, Orchestrator, RunReport};
pub use personas::PersonaRetriever;
pub use reactions::{ReactionEngine, ReactionSummary};
pub use retry::{retry_async, ModelCaller, RetryConfig};
