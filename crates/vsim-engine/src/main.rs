//! Audience simulator CLI.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use rand::Rng;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vsim_engine::{
    AnalysisMode, EngineConfig, EnvKeyStore, EpochTracker, EventSink, GeminiBackend, KeyStore,
    Orchestrator,
};
use vsim_media::FfmpegMediaSource;
use vsim_models::{Comment, SimulationEvent, SimulationMode};

#[derive(Parser, Debug)]
#[command(name = "vsim")]
#[command(about = "Simulate an audience reacting to a short video")]
struct Args {
    /// Video (or image, with --image) to analyze
    input: PathBuf,

    /// Audience mode: standard or troll
    #[arg(long, default_value = "standard")]
    mode: SimulationMode,

    /// Send the whole video instead of sampled keyframes
    #[arg(long)]
    deep: bool,

    /// Treat the input as a single still image
    #[arg(long)]
    image: bool,

    /// Keyframes to sample in fast mode
    #[arg(long)]
    frames: Option<usize>,

    /// Print events as JSON lines
    #[arg(long)]
    json: bool,
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vsim=warn,warn"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .with(env_filter)
            .init();
    }
}

fn print_event(event: &SimulationEvent, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }

    match event {
        SimulationEvent::Log(entry) => {
            println!(
                "{} [{}] {}",
                entry.timestamp.format("%H:%M:%S"),
                entry.stage,
                entry.message
            );
        }
        SimulationEvent::Analysis { analysis, .. } => {
            println!("  {}", analysis.summary);
            println!("  {}", analysis.headline());
            println!("  Tip: {}", analysis.virality.feedback);
        }
        SimulationEvent::Comment(event) => {
            let likes = rand::rng().random_range(0..100);
            let comment = Comment::from_result(&event.result, likes);
            let marker = if comment.is_generated { "" } else { " (fallback)" };
            println!(
                "  #{} {}{} [{} likes]\n    {}",
                event.index + 1,
                comment.persona_id,
                marker,
                comment.likes,
                comment.text
            );
        }
        SimulationEvent::StateChanged { .. } | SimulationEvent::Personas { .. } => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    dotenvy::dotenv().ok();
    init_tracing();

    let args = Args::parse();

    let mut config = EngineConfig::from_env();
    if args.deep {
        config.analysis_mode = AnalysisMode::Deep;
    }
    if let Some(frames) = args.frames {
        config.frame_count = frames.max(1);
    }
    info!("Engine config: {:?}", config);

    let keys: Arc<dyn KeyStore> = Arc::new(EnvKeyStore::from_env());
    let backend = Arc::new(GeminiBackend::new(&config, keys.clone())?);

    let (tx, mut rx) = mpsc::unbounded_channel::<SimulationEvent>();
    let sink: Arc<dyn EventSink> = Arc::new(tx);

    let mut orchestrator = Orchestrator::new(
        config,
        backend,
        keys,
        Arc::new(FfmpegMediaSource::new()),
        sink,
    );

    let epochs: EpochTracker = orchestrator.epoch_tracker();
    let json = args.json;
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if !epochs.is_current(event.epoch()) {
                continue;
            }
            if let Err(e) = print_event(&event, json) {
                error!("Failed to print event: {}", e);
            }
        }
    });

    let outcome = if args.image {
        orchestrator.run_image(&args.input, args.mode).await
    } else {
        orchestrator.run_video(&args.input, args.mode).await
    };

    // closing the sink ends the printer loop
    drop(orchestrator);
    printer.await.context("event printer panicked")?;

    let report = outcome.with_context(|| format!("simulation of {} failed", args.input.display()))?;
    info!(
        epoch = %report.epoch,
        generated = report.summary.generated,
        fallbacks = report.summary.fallbacks,
        "Run finished"
    );
    Ok(())
}
