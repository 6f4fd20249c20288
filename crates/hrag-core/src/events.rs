//! Progress events emitted during a run.
//!
//! The orchestrator never prints. Callers that want narration plug in a
//! [`ProgressSink`]; the CLI uses [`TracingSink`].

use std::sync::Mutex;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::model::{EvidenceStatus, Source};
use crate::report::Confidence;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    RunStarted {
        query: String,
    },
    AttemptStarted {
        source: Source,
        attempt: u32,
    },
    Retrying {
        source: Source,
        attempt: u32,
        reason: String,
    },
    SourceFinished {
        source: Source,
        status: EvidenceStatus,
        elapsed: Duration,
    },
    RunFinished {
        confidence: Confidence,
    },
}

pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: &ProgressEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn on_event(&self, _event: &ProgressEvent) {}
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn on_event(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::RunStarted { query } => {
                info!(query_len = query.len(), "report run started");
            }
            ProgressEvent::AttemptStarted { source, attempt } => {
                debug!(%source, attempt, "retrieval attempt started");
            }
            ProgressEvent::Retrying {
                source,
                attempt,
                reason,
            } => {
                warn!(%source, attempt, "retrying retrieval after transient failure: {reason}");
            }
            ProgressEvent::SourceFinished {
                source,
                status,
                elapsed,
            } => {
                let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
                if *status == EvidenceStatus::Failed || *status == EvidenceStatus::TimedOut {
                    warn!(%source, %status, elapsed_ms, "retrieval finished without evidence");
                } else {
                    info!(%source, %status, elapsed_ms, "retrieval finished");
                }
            }
            ProgressEvent::RunFinished { confidence } => {
                info!(confidence = confidence.label(), "report run finished");
            }
        }
    }
}

/// Keeps every event in order. Handy for tests and for callers that render
/// their own progress view.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events seen so far.
    #[must_use]
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl ProgressSink for RecordingSink {
    fn on_event(&self, event: &ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
