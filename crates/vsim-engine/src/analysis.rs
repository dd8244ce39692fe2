//! Analysis stage: visual input to [`ContentAnalysis`].

use std::sync::Arc;

use vsim_media::MediaPayload;
use vsim_models::{ContentAnalysis, LogStage};

use crate::backend::{GenerateRequest, RequestKind};
use crate::config::EngineConfig;
use crate::error::{SimError, SimResult};
use crate::logging::RunLogger;
use crate::prompts::{self, InputFraming};
use crate::retry::ModelCaller;

/// Visual input handed to the analysis stage.
#[derive(Debug, Clone)]
pub enum VisualInput {
    /// Keyframes in timeline order; one frame means a still image
    Frames(Vec<MediaPayload>),
    /// The whole video
    Video(MediaPayload),
}

impl VisualInput {
    pub fn framing(&self) -> InputFraming {
        match self {
            VisualInput::Frames(frames) if frames.len() == 1 => InputFraming::Still,
            VisualInput::Frames(frames) => InputFraming::Keyframes(frames.len()),
            VisualInput::Video(_) => InputFraming::FullVideo,
        }
    }

    pub fn payloads(&self) -> Vec<&MediaPayload> {
        match self {
            VisualInput::Frames(frames) => frames.iter().collect(),
            VisualInput::Video(video) => vec![video],
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            VisualInput::Frames(frames) => frames.is_empty(),
            VisualInput::Video(video) => video.is_empty(),
        }
    }

    fn describe(&self) -> String {
        match self.framing() {
            InputFraming::Keyframes(n) => format!("{} keyframes", n),
            InputFraming::Still => "1 still frame".to_string(),
            InputFraming::FullVideo => "full video".to_string(),
        }
    }
}

pub struct Analyzer {
    caller: Arc<ModelCaller>,
    config: Arc<EngineConfig>,
}

impl Analyzer {
    pub fn new(caller: Arc<ModelCaller>, config: Arc<EngineConfig>) -> Self {
        Self { caller, config }
    }

    /// Analyze `input` with the primary model, then the secondary one.
    ///
    /// Fails only when both models fail; there is no further degradation.
    pub async fn analyze(
        &self,
        input: &VisualInput,
        logger: &RunLogger,
    ) -> SimResult<ContentAnalysis> {
        self.caller.require_key()?;

        if input.is_empty() {
            return Err(SimError::analysis_failed("No visual input to analyze"));
        }

        let [primary, _] = self.config.model_chain();
        logger.info(
            LogStage::GeminiVlm,
            format!("Sending {} to {}...", input.describe(), primary),
        );

        let request = GenerateRequest::text(
            RequestKind::Analysis,
            prompts::analysis_instruction(input.framing()),
            prompts::ANALYSIS_TEMPERATURE,
        )
        .with_schema(prompts::analysis_schema())
        .with_media(input.payloads());

        self.caller
            .call_with_fallback(&self.config.model_chain(), &request, |response| {
                response.into_json::<ContentAnalysis>()
            })
            .await
            .map_err(|e| SimError::analysis_failed(e.message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::GenerateResponse;
    use crate::error::ModelError;
    use crate::keys::MemoryKeyStore;
    use crate::logging::NullSink;
    use crate::testing::{analysis_json, ScriptedBackend};
    use vsim_models::RunEpoch;

    fn analyzer(backend: Arc<ScriptedBackend>, keys: MemoryKeyStore) -> Analyzer {
        let config = Arc::new(EngineConfig::without_delays());
        let caller = Arc::new(ModelCaller::new(backend, Arc::new(keys), &config));
        Analyzer::new(caller, config)
    }

    fn logger() -> RunLogger {
        RunLogger::new(RunEpoch(1), Arc::new(NullSink))
    }

    fn frames(n: usize) -> VisualInput {
        VisualInput::Frames(vec![MediaPayload::jpeg(vec![1, 2, 3]); n])
    }

    #[tokio::test]
    async fn test_primary_success() {
        let backend = Arc::new(ScriptedBackend::new(|_, _, _| {
            Ok(GenerateResponse::text(analysis_json()))
        }));
        let analyzer = analyzer(backend.clone(), MemoryKeyStore::with_key("k"));

        let analysis = analyzer.analyze(&frames(10), &logger()).await.unwrap();
        assert_eq!(analysis.tone, "calm");
        assert_eq!(analysis.virality.score, 64);
        let calls = backend.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].media_count, 10);
        assert_eq!(calls[0].model, "gemini-3-pro-preview");
    }

    #[tokio::test]
    async fn test_missing_field_falls_back_to_secondary() {
        let backend = Arc::new(ScriptedBackend::new(|model, _, _| {
            if model == "gemini-3-pro-preview" {
                Ok(GenerateResponse::text(r#"{"summary": "x", "tone": "y"}"#))
            } else {
                Ok(GenerateResponse::text(analysis_json()))
            }
        }));
        let analyzer = analyzer(backend.clone(), MemoryKeyStore::with_key("k"));

        let analysis = analyzer.analyze(&frames(3), &logger()).await.unwrap();
        assert_eq!(analysis.suggested_persona_hints, vec!["hobby woodworker"]);
        assert_eq!(
            backend.models_called(),
            vec!["gemini-3-pro-preview", "gemini-2.5-flash"]
        );
    }

    #[tokio::test]
    async fn test_both_models_fail() {
        let backend = Arc::new(ScriptedBackend::new(|_, _, _| {
            Err(ModelError::from_http_status(500, "internal"))
        }));
        let analyzer = analyzer(backend.clone(), MemoryKeyStore::with_key("k"));

        let err = analyzer.analyze(&frames(2), &logger()).await.unwrap_err();
        assert!(matches!(err, SimError::Analysis(ref m) if m.contains("500")));
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn test_missing_key_issues_no_request() {
        let backend = Arc::new(ScriptedBackend::always_text("{}"));
        let analyzer = analyzer(backend.clone(), MemoryKeyStore::new());

        let err = analyzer.analyze(&frames(1), &logger()).await.unwrap_err();
        assert!(matches!(err, SimError::MissingApiKey));
        assert_eq!(backend.call_count(), 0);
    }

    #[test]
    fn test_framing() {
        assert_eq!(frames(1).framing(), InputFraming::Still);
        assert_eq!(frames(4).framing(), InputFraming::Keyframes(4));
        let video = VisualInput::Video(MediaPayload::new("video/mp4", vec![0; 8]));
        assert_eq!(video.framing(), InputFraming::FullVideo);
        assert_eq!(video.payloads().len(), 1);
    }
}
