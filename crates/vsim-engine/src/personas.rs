//! Persona retrieval stage.

use std::collections::HashSet;
use std::sync::Arc;

use uuid::Uuid;
use vsim_models::{ContentAnalysis, LogStage, Persona, SimulationMode};

use crate::backend::{GenerateRequest, RequestKind};
use crate::config::EngineConfig;
use crate::error::{ModelError, SimResult};
use crate::logging::RunLogger;
use crate::prompts;
use crate::retry::ModelCaller;

pub struct PersonaRetriever {
    caller: Arc<ModelCaller>,
    config: Arc<EngineConfig>,
}

impl PersonaRetriever {
    pub fn new(caller: Arc<ModelCaller>, config: Arc<EngineConfig>) -> Self {
        Self { caller, config }
    }

    /// Build a persona panel for `analysis` under `mode`.
    ///
    /// Only a missing API key is an error. When both models fail the failure
    /// is logged and an empty panel is returned.
    pub async fn retrieve(
        &self,
        analysis: &ContentAnalysis,
        mode: SimulationMode,
        logger: &RunLogger,
    ) -> SimResult<Vec<Persona>> {
        self.caller.require_key()?;

        let count = self.config.persona_count;
        logger.info(
            LogStage::AgentOrchestrator,
            format!("Retrieving {} personas ({} mode)...", count, mode),
        );

        let request = GenerateRequest::text(
            RequestKind::Personas,
            prompts::persona_instruction(analysis, mode, count),
            prompts::persona_temperature(mode),
        )
        .with_schema(prompts::persona_schema(count));

        let outcome = self
            .caller
            .call_with_fallback(&self.config.model_chain(), &request, |response| {
                response
                    .into_json::<Vec<Persona>>()
                    .and_then(|batch| finalize_batch(batch, count))
            })
            .await;

        match outcome {
            Ok(personas) => Ok(personas),
            Err(e) => {
                logger.warn(
                    LogStage::AgentOrchestrator,
                    format!("Persona retrieval failed: {}", e),
                );
                Ok(Vec::new())
            }
        }
    }
}

/// Shape a raw model batch into exactly `count` usable personas.
///
/// Short batches are rejected so the next model gets a chance; long ones are
/// truncated. Handles are normalized, blank or repeated ids are replaced and
/// blank handles or avatar seeds are filled in.
pub fn finalize_batch(batch: Vec<Persona>, count: usize) -> Result<Vec<Persona>, ModelError> {
    if batch.len() < count {
        return Err(ModelError::malformed(format!(
            "Expected {} personas, got {}",
            count,
            batch.len()
        )));
    }

    let mut seen_ids = HashSet::new();
    let personas = batch
        .into_iter()
        .take(count)
        .enumerate()
        .map(|(i, persona)| {
            let mut persona = persona.normalized();
            if persona.id.trim().is_empty() || seen_ids.contains(&persona.id) {
                persona.id = Uuid::new_v4().to_string();
            }
            seen_ids.insert(persona.id.clone());

            if persona.handle.is_empty() {
                persona.handle = format!("viewer{}", i + 1);
            }
            if persona.avatar_seed.trim().is_empty() {
                persona.avatar_seed = persona.handle.clone();
            }
            persona
        })
        .collect();

    Ok(personas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::GenerateResponse;
    use crate::error::SimError;
    use crate::keys::MemoryKeyStore;
    use crate::testing::{sample_analysis, sample_personas, RecordingSink, ScriptedBackend};
    use vsim_models::RunEpoch;

    fn retriever(backend: Arc<ScriptedBackend>) -> PersonaRetriever {
        let config = Arc::new(EngineConfig::without_delays());
        let caller = Arc::new(ModelCaller::new(
            backend,
            Arc::new(MemoryKeyStore::with_key("k")),
            &config,
        ));
        PersonaRetriever::new(caller, config)
    }

    fn batch_json(n: usize) -> String {
        serde_json::to_string(&sample_personas(n)).unwrap()
    }

    #[test]
    fn test_finalize_truncates_and_normalizes() {
        let personas = finalize_batch(sample_personas(8), 6).unwrap();
        assert_eq!(personas.len(), 6);
        assert!(personas.iter().all(|p| !p.handle.starts_with('@')));
    }

    #[test]
    fn test_finalize_rejects_short_batch() {
        let err = finalize_batch(sample_personas(4), 6).unwrap_err();
        assert_eq!(err.message, "Expected 6 personas, got 4");
    }

    #[test]
    fn test_finalize_repairs_ids_and_seeds() {
        let mut batch = sample_personas(3);
        batch[1].id = batch[0].id.clone();
        batch[2].id = "  ".to_string();
        batch[2].avatar_seed = String::new();

        let personas = finalize_batch(batch, 3).unwrap();
        let ids: HashSet<_> = personas.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids.len(), 3);
        assert_eq!(personas[0].id, "p0");
        assert_eq!(personas[2].avatar_seed, "viewer_2");
    }

    #[tokio::test]
    async fn test_retrieve_exact_batch() {
        let backend = Arc::new(ScriptedBackend::new(|_, _, _| {
            Ok(GenerateResponse::text(batch_json(6)))
        }));
        let sink = RecordingSink::new();
        let logger = RunLogger::new(RunEpoch(1), sink);

        let personas = retriever(backend)
            .retrieve(&sample_analysis(), SimulationMode::Standard, &logger)
            .await
            .unwrap();
        assert_eq!(personas.len(), 6);
        assert_eq!(personas[0].handle, "viewer_0");
    }

    #[tokio::test]
    async fn test_short_primary_batch_uses_secondary() {
        let backend = Arc::new(ScriptedBackend::new(|model, _, _| {
            let n = if model == "gemini-3-pro-preview" { 2 } else { 6 };
            Ok(GenerateResponse::text(batch_json(n)))
        }));
        let logger = RunLogger::new(RunEpoch(1), RecordingSink::new());

        let personas = retriever(backend.clone())
            .retrieve(&sample_analysis(), SimulationMode::Troll, &logger)
            .await
            .unwrap();
        assert_eq!(personas.len(), 6);
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn test_total_failure_degrades_to_empty() {
        let backend = Arc::new(ScriptedBackend::always_text("not json"));
        let sink = RecordingSink::new();
        let logger = RunLogger::new(RunEpoch(1), sink.clone());

        let personas = retriever(backend)
            .retrieve(&sample_analysis(), SimulationMode::Standard, &logger)
            .await
            .unwrap();
        assert!(personas.is_empty());
        assert!(sink
            .messages()
            .iter()
            .any(|m| m.starts_with("Persona retrieval failed")));
    }

    #[tokio::test]
    async fn test_missing_key_is_an_error() {
        let config = Arc::new(EngineConfig::without_delays());
        let caller = Arc::new(ModelCaller::new(
            Arc::new(ScriptedBackend::always_text("[]")),
            Arc::new(MemoryKeyStore::new()),
            &config,
        ));
        let logger = RunLogger::new(RunEpoch(1), RecordingSink::new());

        let result = PersonaRetriever::new(caller, config)
            .retrieve(&sample_analysis(), SimulationMode::Standard, &logger)
            .await;
        assert!(matches!(result, Err(SimError::MissingApiKey)));
    }
}
