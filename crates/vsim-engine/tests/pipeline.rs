//! End-to-end pipeline behavior through the public API.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use vsim_engine::testing::{
    persona_name_in, sample_analysis, sample_personas, RecordingSink, ScriptedBackend,
    StaticMediaSource,
};
use vsim_engine::{
    EngineConfig, GenerateResponse, MemoryKeyStore, ModelCaller, ModelError, Orchestrator,
    ReactionEngine, RequestKind, RunLogger, SimError,
};
use vsim_models::{CommentEvent, RunEpoch, RunState, SimulationEvent, SimulationMode};

fn comments(sink: &RecordingSink) -> Vec<CommentEvent> {
    sink.events()
        .into_iter()
        .filter_map(|e| e.as_comment().cloned())
        .collect()
}

fn orchestrator(
    config: EngineConfig,
    backend: Arc<ScriptedBackend>,
    sink: Arc<RecordingSink>,
) -> Orchestrator {
    Orchestrator::new(
        config,
        backend,
        Arc::new(MemoryKeyStore::with_key("test-key")),
        Arc::new(StaticMediaSource::new(10)),
        sink,
    )
}

fn engine(config: EngineConfig, backend: Arc<ScriptedBackend>) -> ReactionEngine {
    let config = Arc::new(config);
    let caller = Arc::new(ModelCaller::new(
        backend,
        Arc::new(MemoryKeyStore::with_key("test-key")),
        &config,
    ));
    ReactionEngine::new(caller, config)
}

fn persona_index(prompt: &str) -> usize {
    persona_name_in(prompt)
        .and_then(|name| name.strip_prefix("Viewer "))
        .and_then(|i| i.parse().ok())
        .expect("comment prompt names a sample persona")
}

/// Comments fail permanently; analysis and personas succeed.
fn failing_comments(persona_count: usize) -> ScriptedBackend {
    let analysis = serde_json::to_string(&sample_analysis()).unwrap();
    let personas = serde_json::to_string(&sample_personas(persona_count)).unwrap();
    ScriptedBackend::new(move |_, request, _| match request.kind {
        RequestKind::Analysis => Ok(GenerateResponse::text(analysis.clone())),
        RequestKind::Personas => Ok(GenerateResponse::text(personas.clone())),
        RequestKind::Comment => Err(ModelError::refused("SAFETY")),
    })
}

#[tokio::test(start_paused = true)]
async fn scenario_a_all_comment_calls_fail() {
    let backend = Arc::new(failing_comments(3));
    let sink = RecordingSink::new();
    let config = EngineConfig {
        persona_count: 3,
        ..EngineConfig::default()
    };
    let mut orchestrator = orchestrator(config, backend.clone(), sink.clone());

    let report = orchestrator
        .run_video(Path::new("clip.mp4"), SimulationMode::Standard)
        .await
        .unwrap();
    assert_eq!(report.state, RunState::Complete);

    let emitted = comments(&sink);
    assert_eq!(emitted.iter().map(|c| c.index).collect::<Vec<_>>(), vec![0, 1, 2]);
    assert!(emitted.iter().all(|c| !c.result.is_generated));

    let texts: HashSet<_> = emitted.iter().map(|c| c.result.text.as_str()).collect();
    assert_eq!(texts.len(), 3);

    // refusals are not retried: one primary and one secondary attempt each
    assert_eq!(backend.calls_of(RequestKind::Comment).len(), 6);
    assert!(sink
        .messages()
        .contains(&"[FALLBACK] @viewer_1 (Model Refusal: SAFETY)".to_string()));
}

#[tokio::test(start_paused = true)]
async fn scenario_b_analysis_failure_aborts_run() {
    let backend = Arc::new(ScriptedBackend::new(|_, _, _| {
        Err(ModelError::malformed("Failed to parse model JSON"))
    }));
    let sink = RecordingSink::new();
    let mut orchestrator = orchestrator(EngineConfig::default(), backend.clone(), sink.clone());

    let err = orchestrator
        .run_video(Path::new("clip.mp4"), SimulationMode::Standard)
        .await
        .unwrap_err();

    assert!(matches!(err, SimError::Analysis(_)));
    assert_eq!(orchestrator.state(), RunState::Error);
    assert!(orchestrator.analysis().is_none());
    assert_eq!(backend.calls_of(RequestKind::Analysis).len(), 2);
    assert!(backend.calls_of(RequestKind::Personas).is_empty());
    assert!(backend.calls_of(RequestKind::Comment).is_empty());
    assert!(comments(&sink).is_empty());
}

#[tokio::test(start_paused = true)]
async fn scenario_c_persona_failure_degrades_to_empty_panel() {
    let analysis = serde_json::to_string(&sample_analysis()).unwrap();
    let backend = Arc::new(ScriptedBackend::new(move |_, request, _| match request.kind {
        RequestKind::Analysis => Ok(GenerateResponse::text(analysis.clone())),
        _ => Err(ModelError::from_http_status(500, "internal")),
    }));
    let sink = RecordingSink::new();
    let mut orchestrator = orchestrator(EngineConfig::default(), backend.clone(), sink.clone());

    let report = orchestrator
        .run_video(Path::new("clip.mp4"), SimulationMode::Troll)
        .await
        .unwrap();

    assert_eq!(report.state, RunState::Complete);
    assert!(report.personas.is_empty());
    assert_eq!(report.summary.emitted, 0);
    assert!(comments(&sink).is_empty());
    assert!(backend.calls_of(RequestKind::Comment).is_empty());
}

#[tokio::test(start_paused = true)]
async fn results_follow_persona_order_when_first_persona_is_slowest() {
    let personas = sample_personas(6);
    let backend = Arc::new(
        ScriptedBackend::happy_path(sample_analysis(), personas.clone()).with_latency(|request| {
            match request.kind {
                RequestKind::Comment if persona_index(&request.prompt_text()) == 0 => {
                    Duration::from_secs(30)
                }
                _ => Duration::from_millis(50),
            }
        }),
    );
    let sink = RecordingSink::new();
    let logger = RunLogger::new(RunEpoch(1), sink.clone());

    engine(EngineConfig::default(), backend)
        .run(&personas, &sample_analysis(), SimulationMode::Standard, &logger)
        .await
        .unwrap();

    let emitted = comments(&sink);
    let ids: Vec<_> = emitted.iter().map(|c| c.result.persona_id.as_str()).collect();
    assert_eq!(ids, vec!["p0", "p1", "p2", "p3", "p4", "p5"]);
    assert_eq!(emitted[0].result.text, "comment for Viewer 0");
    assert!(emitted.iter().all(|c| c.result.is_generated));
}

#[tokio::test(start_paused = true)]
async fn requests_are_staggered_by_index() {
    let personas = sample_personas(6);
    let backend = Arc::new(ScriptedBackend::happy_path(sample_analysis(), personas.clone()));
    let logger = RunLogger::new(RunEpoch(1), RecordingSink::new());
    let config = EngineConfig::default();
    let stagger = config.stagger;

    let start = Instant::now();
    engine(config, backend.clone())
        .run(&personas, &sample_analysis(), SimulationMode::Standard, &logger)
        .await
        .unwrap();

    let calls = backend.calls_of(RequestKind::Comment);
    assert_eq!(calls.len(), 6);
    for call in calls {
        let index = persona_index(&call.prompt);
        assert!(
            call.at.duration_since(start) >= stagger * index as u32,
            "persona {} requested after {:?}",
            index,
            call.at.duration_since(start)
        );
    }
}

#[tokio::test(start_paused = true)]
async fn total_failure_yields_fallback_with_reason() {
    let backend = Arc::new(ScriptedBackend::new(|model, _, _| {
        Err(ModelError::from_http_status(400, format!("{model} rejected the request")))
    }));
    let sink = RecordingSink::new();
    let logger = RunLogger::new(RunEpoch(1), sink.clone());
    let personas = sample_personas(2);

    let summary = engine(EngineConfig::default(), backend.clone())
        .run(&personas, &sample_analysis(), SimulationMode::Troll, &logger)
        .await
        .unwrap();

    assert_eq!(summary.fallbacks, 2);
    for comment in comments(&sink) {
        assert!(!comment.result.is_generated);
        assert!(!comment.result.text.is_empty());
        let reason = comment.result.error_reason.unwrap();
        assert!(reason.contains("gemini-2.5-flash rejected"), "last error wins: {reason}");
    }
    let models: HashSet<_> = backend.models_called().into_iter().collect();
    assert_eq!(models.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn transient_errors_are_retried_before_fallback() {
    let backend = Arc::new(ScriptedBackend::new(|_, _, _| {
        Err(ModelError::from_http_status(503, "The model is overloaded"))
    }));
    let logger = RunLogger::new(RunEpoch(1), RecordingSink::new());

    let summary = engine(EngineConfig::default(), backend.clone())
        .run(&sample_personas(1), &sample_analysis(), SimulationMode::Standard, &logger)
        .await
        .unwrap();

    assert_eq!(summary.fallbacks, 1);
    // 1 + 3 retries on each model
    assert_eq!(backend.call_count(), 8);
}

#[tokio::test(start_paused = true)]
async fn persona_batch_is_trimmed_and_handles_normalized() {
    let backend = Arc::new(ScriptedBackend::happy_path(sample_analysis(), sample_personas(9)));
    let mut orchestrator = orchestrator(
        EngineConfig::without_delays(),
        backend,
        RecordingSink::new(),
    );

    let report = orchestrator
        .run_video(Path::new("clip.mp4"), SimulationMode::Standard)
        .await
        .unwrap();

    assert_eq!(report.personas.len(), 6);
    assert!(report.personas.iter().all(|p| !p.handle.starts_with('@')));
    assert_eq!(orchestrator.personas(), report.personas.as_slice());
}

#[tokio::test(start_paused = true)]
async fn fallback_dedup_window_resets_between_runs() {
    // one persona per supportive text, so a run exhausts the pool exactly
    let pool_size = vsim_engine::fallback::SUPPORTIVE_COMMENTS.len();
    let backend = Arc::new(ScriptedBackend::new(|_, _, _| Err(ModelError::refused("SAFETY"))));
    let engine = engine(EngineConfig::without_delays(), backend);
    let personas = sample_personas(pool_size);

    for run in 1..=2u64 {
        let sink = RecordingSink::new();
        let logger = RunLogger::new(RunEpoch(run), sink.clone());
        engine
            .run(&personas, &sample_analysis(), SimulationMode::Standard, &logger)
            .await
            .unwrap();

        let texts: HashSet<_> = comments(&sink).into_iter().map(|c| c.result.text).collect();
        assert_eq!(texts.len(), pool_size, "run {run} repeated a fallback");
    }
}

#[tokio::test(start_paused = true)]
async fn mode_change_supersedes_previous_epoch() {
    let backend = Arc::new(ScriptedBackend::happy_path(sample_analysis(), sample_personas(6)));
    let sink = RecordingSink::new();
    let mut orchestrator = orchestrator(EngineConfig::without_delays(), backend, sink.clone());

    let first = orchestrator
        .run_video(Path::new("clip.mp4"), SimulationMode::Standard)
        .await
        .unwrap();
    let second = orchestrator.change_mode(SimulationMode::Troll).await.unwrap();

    let current: Vec<SimulationEvent> = sink
        .events()
        .into_iter()
        .filter(|e| orchestrator.is_current(e.epoch()))
        .collect();
    assert!(current.iter().all(|e| e.epoch() == second.epoch));
    assert_eq!(current.iter().filter(|e| e.as_comment().is_some()).count(), 6);
    assert!(!orchestrator.is_current(first.epoch));
}

#[test]
fn missing_key_is_reported_before_any_request() {
    let backend = Arc::new(ScriptedBackend::always_text("unused"));
    let sink = RecordingSink::new();
    let mut orchestrator = Orchestrator::new(
        EngineConfig::without_delays(),
        backend.clone(),
        Arc::new(MemoryKeyStore::new()),
        Arc::new(StaticMediaSource::new(10)),
        sink.clone(),
    );

    let result = tokio_test::block_on(
        orchestrator.run_image(Path::new("still.png"), SimulationMode::Standard),
    );

    assert!(matches!(result, Err(SimError::MissingApiKey)));
    assert_eq!(backend.call_count(), 0);
    assert!(sink.events().is_empty());
}
