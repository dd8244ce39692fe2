//! Structured run logging.
//!
//! Every user-visible line goes two ways: into `tracing` with the run epoch
//! and stage as fields, and into the caller's [`EventSink`] as a
//! [`SimulationEvent::Log`].

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, warn, Span};
use vsim_models::{LogEntry, LogStage, RunEpoch, SimulationEvent};

/// Receiver of simulation events, in emission order.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: SimulationEvent);
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: SimulationEvent) {}
}

impl EventSink for UnboundedSender<SimulationEvent> {
    fn emit(&self, event: SimulationEvent) {
        // receiver gone means nobody is listening anymore
        let _ = self.send(event);
    }
}

/// Run logger bound to one epoch.
#[derive(Clone)]
pub struct RunLogger {
    epoch: RunEpoch,
    sink: Arc<dyn EventSink>,
}

impl RunLogger {
    pub fn new(epoch: RunEpoch, sink: Arc<dyn EventSink>) -> Self {
        Self { epoch, sink }
    }

    /// Log a progress line.
    pub fn info(&self, stage: LogStage, message: impl Into<String>) {
        let message = message.into();
        info!(epoch = %self.epoch, stage = %stage, "{}", message);
        self.push(stage, message);
    }

    /// Log an absorbed failure.
    pub fn warn(&self, stage: LogStage, message: impl Into<String>) {
        let message = message.into();
        warn!(epoch = %self.epoch, stage = %stage, "{}", message);
        self.push(stage, message);
    }

    /// Log a run-level failure under the `ERROR` stage.
    pub fn error(&self, message: impl Into<String>) {
        let message = message.into();
        error!(epoch = %self.epoch, stage = %LogStage::Error, "{}", message);
        self.push(LogStage::Error, message);
    }

    /// Forward a non-log event to the sink.
    pub fn emit(&self, event: SimulationEvent) {
        self.sink.emit(event);
    }

    pub fn epoch(&self) -> RunEpoch {
        self.epoch
    }

    /// Create a tracing span for this run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("run", epoch = %self.epoch)
    }

    fn push(&self, stage: LogStage, message: String) {
        self.sink
            .emit(SimulationEvent::Log(LogEntry::new(self.epoch, stage, message)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingSink;

    #[test]
    fn test_lines_reach_sink_in_order() {
        let sink = RecordingSink::new();
        let logger = RunLogger::new(RunEpoch(4), sink.clone());

        logger.info(LogStage::Ingestion, "first");
        logger.warn(LogStage::ReactionEngine, "second");
        logger.error("third");

        let events = sink.events();
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| e.epoch() == RunEpoch(4)));
        match &events[2] {
            SimulationEvent::Log(entry) => {
                assert_eq!(entry.stage, LogStage::Error);
                assert_eq!(entry.message, "third");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_channel_sink() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let logger = RunLogger::new(RunEpoch(1), Arc::new(tx));
        logger.info(LogStage::State, "hello");
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, SimulationEvent::Log(ref e) if e.message == "hello"));
    }
}
