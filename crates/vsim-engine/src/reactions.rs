//! Reaction engine: one comment per persona, emitted in persona order.
//!
//! Every persona gets its own tokio task. Task `i` waits until
//! `start + i * stagger` before its first request, then tries the primary
//! and secondary model and falls back to the pool. For each index in turn the
//! engine sleeps a random pacing delay, awaits that task's handle and emits
//! the result, so the consumer sees index order whatever the completion order.
//! Pacing overlaps generation: a comment appears after whichever of the two
//! finishes last.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, Instrument};
use vsim_models::{
    CommentEvent, CommentResult, ContentAnalysis, LogStage, Persona, SimulationEvent,
    SimulationMode,
};

use crate::backend::{GenerateRequest, GenerateResponse, RequestKind};
use crate::config::EngineConfig;
use crate::error::SimResult;
use crate::fallback::{FallbackPool, FallbackRegistry};
use crate::logging::RunLogger;
use crate::prompts;
use crate::retry::ModelCaller;

/// Registry shared between the engine and its persona tasks.
pub type SharedRegistry = Arc<Mutex<FallbackRegistry>>;

/// Counts for one engine run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReactionSummary {
    pub emitted: usize,
    pub generated: usize,
    pub fallbacks: usize,
}

pub struct ReactionEngine {
    caller: Arc<ModelCaller>,
    config: Arc<EngineConfig>,
    registry: SharedRegistry,
}

impl ReactionEngine {
    pub fn new(caller: Arc<ModelCaller>, config: Arc<EngineConfig>) -> Self {
        Self {
            caller,
            config,
            registry: Arc::new(Mutex::new(FallbackRegistry::new())),
        }
    }

    /// The fallback registry this engine resets at the start of every run.
    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    /// Generate and emit one [`CommentEvent`] per persona, in persona order.
    ///
    /// Per-persona failures never escape: they become fallback comments.
    pub async fn run(
        &self,
        personas: &[Persona],
        analysis: &ContentAnalysis,
        mode: SimulationMode,
        logger: &RunLogger,
    ) -> SimResult<ReactionSummary> {
        self.caller.require_key()?;
        lock(&self.registry).reset();

        let mut summary = ReactionSummary::default();
        if personas.is_empty() {
            logger.info(LogStage::ReactionEngine, "No personas to react.");
            return Ok(summary);
        }

        logger.info(
            LogStage::ReactionEngine,
            format!("Spawning {} reaction agents ({} mode)...", personas.len(), mode),
        );

        let start = Instant::now();
        let analysis = Arc::new(analysis.clone());
        let handles: Vec<JoinHandle<CommentResult>> = personas
            .iter()
            .enumerate()
            .map(|(index, persona)| {
                let task = PersonaTask {
                    caller: self.caller.clone(),
                    config: self.config.clone(),
                    registry: self.registry.clone(),
                    persona: persona.clone(),
                    analysis: analysis.clone(),
                    mode,
                    start_at: start + self.config.stagger * index as u32,
                };
                let span = tracing::info_span!(
                    "persona",
                    epoch = %logger.epoch(),
                    index,
                    persona = %persona.handle
                );
                tokio::spawn(task.run().instrument(span))
            })
            .collect();

        for (index, (persona, handle)) in personas.iter().zip(handles).enumerate() {
            tokio::time::sleep(pacing_delay(&self.config)).await;

            let result = match handle.await {
                Ok(result) => result,
                Err(e) => CommentResult::fallback(
                    persona.id.clone(),
                    FallbackPool::pick(mode, &mut lock(&self.registry)),
                    format!("Task failed: {}", e),
                ),
            };

            if result.is_generated {
                summary.generated += 1;
                logger.info(
                    LogStage::ReactionEngine,
                    format!("[GEMINI_API] Success: {}", persona.display_handle()),
                );
            } else {
                summary.fallbacks += 1;
                logger.warn(
                    LogStage::ReactionEngine,
                    format!(
                        "[FALLBACK] {} ({})",
                        persona.display_handle(),
                        result.error_reason.as_deref().unwrap_or("unknown")
                    ),
                );
            }

            logger.emit(SimulationEvent::Comment(CommentEvent {
                epoch: logger.epoch(),
                index,
                result,
            }));
            summary.emitted += 1;
        }

        logger.info(
            LogStage::ReactionEngine,
            format!(
                "Simulation complete: {} generated, {} fallback",
                summary.generated, summary.fallbacks
            ),
        );
        Ok(summary)
    }
}

struct PersonaTask {
    caller: Arc<ModelCaller>,
    config: Arc<EngineConfig>,
    registry: SharedRegistry,
    persona: Persona,
    analysis: Arc<ContentAnalysis>,
    mode: SimulationMode,
    start_at: Instant,
}

impl PersonaTask {
    async fn run(self) -> CommentResult {
        tokio::time::sleep_until(self.start_at).await;

        let request = GenerateRequest::text(
            RequestKind::Comment,
            prompts::comment_instruction(&self.persona, &self.analysis, self.mode),
            prompts::COMMENT_TEMPERATURE,
        )
        .with_max_output_tokens(prompts::COMMENT_MAX_OUTPUT_TOKENS);

        match self
            .caller
            .call_with_fallback(&self.config.model_chain(), &request, GenerateResponse::into_text)
            .await
        {
            Ok(text) => CommentResult::generated(self.persona.id, text),
            Err(e) => {
                debug!("Both models failed, using fallback: {}", e);
                let text = FallbackPool::pick(self.mode, &mut lock(&self.registry));
                CommentResult::fallback(self.persona.id, text, e.message)
            }
        }
    }
}

fn lock(registry: &SharedRegistry) -> MutexGuard<'_, FallbackRegistry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Uniform presentation delay in `[pacing_min, pacing_max]`.
fn pacing_delay(config: &EngineConfig) -> Duration {
    let min = config.pacing_min.as_millis() as u64;
    let max = config.pacing_max.as_millis() as u64;
    if max <= min {
        return config.pacing_min;
    }
    Duration::from_millis(rand::rng().random_range(min..=max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::MemoryKeyStore;
    use crate::testing::{sample_analysis, sample_personas, RecordingSink, ScriptedBackend};
    use vsim_models::RunEpoch;

    fn engine(backend: Arc<ScriptedBackend>, config: EngineConfig) -> ReactionEngine {
        let config = Arc::new(config);
        let caller = Arc::new(ModelCaller::new(
            backend,
            Arc::new(MemoryKeyStore::with_key("k")),
            &config,
        ));
        ReactionEngine::new(caller, config)
    }

    #[test]
    fn test_pacing_delay_window() {
        let config = EngineConfig::default();
        for _ in 0..100 {
            let delay = pacing_delay(&config);
            assert!(delay >= Duration::from_millis(400));
            assert!(delay <= Duration::from_millis(1200));
        }
        assert_eq!(pacing_delay(&EngineConfig::without_delays()), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacing_overlaps_generation() {
        let backend =
            Arc::new(ScriptedBackend::always_text("slow").with_latency(|_| Duration::from_secs(5)));
        let config = EngineConfig {
            pacing_min: Duration::from_millis(1000),
            pacing_max: Duration::from_millis(1000),
            ..EngineConfig::without_delays()
        };
        let logger = RunLogger::new(RunEpoch(1), RecordingSink::new());

        let start = Instant::now();
        engine(backend, config)
            .run(&sample_personas(1), &sample_analysis(), SimulationMode::Standard, &logger)
            .await
            .unwrap();

        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacing_holds_back_fast_comments() {
        let latency = Duration::from_millis(100);
        let backend = ScriptedBackend::always_text("quick").with_latency(move |_| latency);
        let backend = Arc::new(backend);
        let config = EngineConfig {
            pacing_min: Duration::from_millis(1000),
            pacing_max: Duration::from_millis(1000),
            ..EngineConfig::without_delays()
        };
        let logger = RunLogger::new(RunEpoch(1), RecordingSink::new());

        let start = Instant::now();
        engine(backend, config)
            .run(&sample_personas(2), &sample_analysis(), SimulationMode::Standard, &logger)
            .await
            .unwrap();

        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_empty_panel_completes_without_requests() {
        let backend = Arc::new(ScriptedBackend::always_text("unused"));
        let sink = RecordingSink::new();
        let logger = RunLogger::new(RunEpoch(1), sink.clone());

        let summary = engine(backend.clone(), EngineConfig::default())
            .run(&[], &sample_analysis(), SimulationMode::Standard, &logger)
            .await
            .unwrap();

        assert_eq!(summary, ReactionSummary::default());
        assert_eq!(backend.call_count(), 0);
        assert!(sink.events().iter().all(|e| e.as_comment().is_none()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_resets_registry() {
        let backend = Arc::new(ScriptedBackend::always_text("nice"));
        let engine = engine(backend, EngineConfig::without_delays());
        FallbackPool::pick(SimulationMode::Standard, &mut lock(&engine.registry()));
        assert_eq!(lock(&engine.registry()).len(), 1);

        let logger = RunLogger::new(RunEpoch(1), RecordingSink::new());
        engine
            .run(&sample_personas(2), &sample_analysis(), SimulationMode::Standard, &logger)
            .await
            .unwrap();

        assert!(lock(&engine.registry()).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_carry_run_epoch() {
        let backend = Arc::new(ScriptedBackend::always_text("nice"));
        let sink = RecordingSink::new();
        let logger = RunLogger::new(RunEpoch(9), sink.clone());

        engine(backend, EngineConfig::without_delays())
            .run(&sample_personas(3), &sample_analysis(), SimulationMode::Troll, &logger)
            .await
            .unwrap();

        let comments: Vec<_> = sink
            .events()
            .into_iter()
            .filter_map(|e| e.as_comment().cloned())
            .collect();
        assert_eq!(comments.len(), 3);
        assert!(comments.iter().all(|c| c.epoch == RunEpoch(9)));
        assert!(sink
            .messages()
            .contains(&"[GEMINI_API] Success: @viewer_1".to_string()));
    }
}
