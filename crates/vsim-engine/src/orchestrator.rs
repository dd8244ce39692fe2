//! Orchestration controller.
//!
//! Sequences ingestion, analysis, persona retrieval and the reaction engine,
//! owns the [`RunState`] machine and tags every event with the run's
//! [`RunEpoch`]. A new upload or a mode change starts a new epoch; callers
//! drop events whose epoch is no longer current.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::Instrument;
use vsim_media::MediaSource;
use vsim_models::{
    ContentAnalysis, LogStage, Persona, RunEpoch, RunState, SimulationEvent, SimulationMode,
};

use crate::analysis::{Analyzer, VisualInput};
use crate::backend::GenerativeBackend;
use crate::config::{AnalysisMode, EngineConfig};
use crate::error::{SimError, SimResult};
use crate::keys::KeyStore;
use crate::logging::{EventSink, RunLogger};
use crate::personas::PersonaRetriever;
use crate::reactions::{ReactionEngine, ReactionSummary};
use crate::retry::ModelCaller;

/// Shared view of the current run epoch.
///
/// Cheap to clone; hand one to whatever consumes the event stream.
#[derive(Debug, Clone, Default)]
pub struct EpochTracker(Arc<AtomicU64>);

impl EpochTracker {
    pub fn current(&self) -> RunEpoch {
        RunEpoch(self.0.load(Ordering::SeqCst))
    }

    /// Start a new epoch and return it.
    pub fn advance(&self) -> RunEpoch {
        RunEpoch(self.0.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, epoch: RunEpoch) -> bool {
        self.current() == epoch
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub epoch: RunEpoch,
    pub state: RunState,
    pub mode: SimulationMode,
    pub analysis: ContentAnalysis,
    pub personas: Vec<Persona>,
    pub summary: ReactionSummary,
}

pub struct Orchestrator {
    config: Arc<EngineConfig>,
    caller: Arc<ModelCaller>,
    media: Arc<dyn MediaSource>,
    sink: Arc<dyn EventSink>,
    analyzer: Analyzer,
    retriever: PersonaRetriever,
    engine: ReactionEngine,
    epochs: EpochTracker,
    state: RunState,
    mode: SimulationMode,
    analysis: Option<ContentAnalysis>,
    personas: Vec<Persona>,
}

impl Orchestrator {
    pub fn new(
        config: EngineConfig,
        backend: Arc<dyn GenerativeBackend>,
        keys: Arc<dyn KeyStore>,
        media: Arc<dyn MediaSource>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let config = Arc::new(config);
        let caller = Arc::new(ModelCaller::new(backend, keys, &config));

        Self {
            analyzer: Analyzer::new(caller.clone(), config.clone()),
            retriever: PersonaRetriever::new(caller.clone(), config.clone()),
            engine: ReactionEngine::new(caller.clone(), config.clone()),
            config,
            caller,
            media,
            sink,
            epochs: EpochTracker::default(),
            state: RunState::Idle,
            mode: SimulationMode::default(),
            analysis: None,
            personas: Vec::new(),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn mode(&self) -> SimulationMode {
        self.mode
    }

    pub fn analysis(&self) -> Option<&ContentAnalysis> {
        self.analysis.as_ref()
    }

    pub fn personas(&self) -> &[Persona] {
        &self.personas
    }

    pub fn epoch(&self) -> RunEpoch {
        self.epochs.current()
    }

    /// Whether events tagged with `epoch` belong to the latest run.
    pub fn is_current(&self, epoch: RunEpoch) -> bool {
        self.epochs.is_current(epoch)
    }

    pub fn epoch_tracker(&self) -> EpochTracker {
        self.epochs.clone()
    }

    /// Full pipeline for an uploaded video.
    ///
    /// Fast analysis samples keyframes; deep analysis sends the whole file.
    pub async fn run_video(&mut self, video: &Path, mode: SimulationMode) -> SimResult<RunReport> {
        let logger = self.begin_run(mode)?;
        let span = logger.create_span();

        async {
            self.transition(&logger, RunState::ExtractingInput)?;
            logger.info(
                LogStage::Ingestion,
                format!("Processing {} ({} analysis)", video.display(), self.config.analysis_mode),
            );

            let input = match self.load_video(video, &logger).await {
                Ok(input) => input,
                Err(e) => return self.fail(&logger, e),
            };

            self.analyze_and_react(input, &logger).await
        }
        .instrument(span)
        .await
    }

    /// Full pipeline for a single still image.
    pub async fn run_image(&mut self, image: &Path, mode: SimulationMode) -> SimResult<RunReport> {
        let logger = self.begin_run(mode)?;
        let span = logger.create_span();

        async {
            self.transition(&logger, RunState::ExtractingInput)?;
            logger.info(
                LogStage::Ingestion,
                format!("Analyzing snapshot {}", image.display()),
            );

            let frame = match self.media.read_image(image).await {
                Ok(frame) => frame,
                Err(e) => return self.fail(&logger, e.into()),
            };

            self.analyze_and_react(VisualInput::Frames(vec![frame]), &logger)
                .await
        }
        .instrument(span)
        .await
    }

    /// Re-run personas and comments against the held analysis.
    ///
    /// Only accepted once the current run is `Complete`.
    pub async fn change_mode(&mut self, mode: SimulationMode) -> SimResult<RunReport> {
        if self.state != RunState::Complete {
            return Err(SimError::ModeChangeRejected(self.state));
        }
        self.caller.require_key()?;
        let analysis = self.analysis.clone().ok_or(SimError::NoAnalysis)?;

        let logger = RunLogger::new(self.epochs.advance(), self.sink.clone());
        let span = logger.create_span();

        async {
            self.mode = mode;
            self.personas.clear();
            logger.info(
                LogStage::AgentOrchestrator,
                format!("Mode switched to {}. Regenerating audience...", mode),
            );
            self.react(analysis, &logger).await
        }
        .instrument(span)
        .await
    }

    /// Reset to `Idle` under a fresh epoch.
    ///
    /// A run whose future was dropped mid-stage is abandoned here as well.
    fn begin_run(&mut self, mode: SimulationMode) -> SimResult<RunLogger> {
        self.caller.require_key()?;

        let logger = RunLogger::new(self.epochs.advance(), self.sink.clone());
        let from = self.state;
        if from != RunState::Idle {
            if !from.can_transition_to(RunState::Idle) {
                logger.warn(LogStage::State, format!("Abandoning run stuck in {}", from));
            }
            self.record_transition(&logger, from, RunState::Idle);
        }
        self.mode = mode;
        self.analysis = None;
        self.personas.clear();
        Ok(logger)
    }

    async fn load_video(&self, video: &Path, logger: &RunLogger) -> SimResult<VisualInput> {
        match self.config.analysis_mode {
            AnalysisMode::Fast => {
                let frames = self
                    .media
                    .extract_frames(video, self.config.frame_count)
                    .await?;
                logger.info(
                    LogStage::FrameExtractor,
                    format!("Extracted {} keyframes", frames.len()),
                );
                Ok(VisualInput::Frames(frames))
            }
            AnalysisMode::Deep => {
                let payload = self.media.read_full_video(video).await?;
                logger.info(
                    LogStage::FrameExtractor,
                    format!("Loaded full video ({} bytes)", payload.len()),
                );
                Ok(VisualInput::Video(payload))
            }
        }
    }

    async fn analyze_and_react(
        &mut self,
        input: VisualInput,
        logger: &RunLogger,
    ) -> SimResult<RunReport> {
        self.transition(logger, RunState::Analyzing)?;

        let analysis = match self.analyzer.analyze(&input, logger).await {
            Ok(analysis) => analysis,
            Err(e) => return self.fail(logger, e),
        };

        logger.info(
            LogStage::GeminiVlm,
            format!("Detected {} tone.", analysis.tone),
        );
        logger.info(
            LogStage::GeminiVlm,
            format!("Virality Score: {}/100", analysis.virality.score),
        );
        logger.emit(SimulationEvent::Analysis {
            epoch: logger.epoch(),
            analysis: analysis.clone(),
        });
        self.analysis = Some(analysis.clone());

        self.transition(logger, RunState::RetrievingPersonas)?;
        self.react(analysis, logger).await
    }

    /// Persona retrieval and reaction engine; expects `RetrievingPersonas`.
    async fn react(
        &mut self,
        analysis: ContentAnalysis,
        logger: &RunLogger,
    ) -> SimResult<RunReport> {
        if self.state != RunState::RetrievingPersonas {
            self.transition(logger, RunState::RetrievingPersonas)?;
        }

        let personas = match self.retriever.retrieve(&analysis, self.mode, logger).await {
            Ok(personas) => personas,
            Err(e) => return self.fail(logger, e),
        };
        if personas.is_empty() {
            logger.warn(
                LogStage::AgentOrchestrator,
                "No personas retrieved. Continuing with an empty audience.",
            );
        } else {
            logger.info(
                LogStage::AgentOrchestrator,
                format!("Retrieved {} personas", personas.len()),
            );
        }
        logger.emit(SimulationEvent::Personas {
            epoch: logger.epoch(),
            personas: personas.clone(),
        });
        self.personas = personas;

        self.transition(logger, RunState::GeneratingComments)?;
        let summary = match self
            .engine
            .run(&self.personas, &analysis, self.mode, logger)
            .await
        {
            Ok(summary) => summary,
            Err(e) => return self.fail(logger, e),
        };

        self.transition(logger, RunState::Complete)?;
        Ok(RunReport {
            epoch: logger.epoch(),
            state: self.state,
            mode: self.mode,
            analysis,
            personas: self.personas.clone(),
            summary,
        })
    }

    fn transition(&mut self, logger: &RunLogger, next: RunState) -> SimResult<()> {
        let from = self.state;
        if !from.can_transition_to(next) {
            return Err(SimError::InvalidTransition { from, to: next });
        }
        self.record_transition(logger, from, next);
        Ok(())
    }

    fn record_transition(&mut self, logger: &RunLogger, from: RunState, next: RunState) {
        self.state = next;
        logger.emit(SimulationEvent::StateChanged {
            epoch: logger.epoch(),
            from,
            to: next,
        });
        logger.info(LogStage::State, format!("{} -> {}", from, next));
    }

    fn fail<T>(&mut self, logger: &RunLogger, error: SimError) -> SimResult<T> {
        logger.error(error.to_string());
        if self.state.can_transition_to(RunState::Error) {
            // transition cannot fail once can_transition_to holds
            let _ = self.transition(logger, RunState::Error);
        }
        Err(error)
    }
}
