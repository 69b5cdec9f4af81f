//! `DecisionSink` implementations: newline-delimited JSON to stdout (the
//! audit-log format spec.md §6 mandates) and an in-memory sink for tests.
//! A Unix-socket sink is accepted by the CLI parser but not implemented
//! here — the wire protocol is an external-collaborator concern (spec.md
//! §1, §6).

use std::io::Write;
use std::sync::Mutex;

use event_engine::EventRecord;
use tracing::warn;

use crate::api::{DecisionSink, PredictionRecord};

/// Writes each Prediction/Event Record as one JSON line to stdout.
pub struct StdoutSink {
    writer: Mutex<std::io::Stdout>,
}

impl StdoutSink {
    pub fn new() -> Self {
        StdoutSink { writer: Mutex::new(std::io::stdout()) }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        StdoutSink::new()
    }
}

impl DecisionSink for StdoutSink {
    fn on_prediction(&self, record: &PredictionRecord) {
        let mut out = self.writer.lock().expect("stdout sink mutex poisoned");
        if let Err(e) = serde_json::to_writer(&mut *out, record) {
            warn!("failed to write prediction record: {e}");
            return;
        }
        let _ = writeln!(out);
    }

    fn on_event(&self, record: &EventRecord) {
        let mut out = self.writer.lock().expect("stdout sink mutex poisoned");
        if let Err(e) = serde_json::to_writer(&mut *out, record) {
            warn!("failed to write event record: {e}");
            return;
        }
        let _ = writeln!(out);
    }
}

/// Captures every record in memory. Used by `ntn-core`'s own tests and by
/// anyone embedding `Core` who wants deterministic assertions.
#[derive(Default)]
pub struct InMemorySink {
    pub predictions: Mutex<Vec<PredictionRecord>>,
    pub events: Mutex<Vec<EventRecord>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        InMemorySink::default()
    }
}

impl DecisionSink for InMemorySink {
    fn on_prediction(&self, record: &PredictionRecord) {
        self.predictions.lock().expect("in-memory sink mutex poisoned").push(record.clone());
    }

    fn on_event(&self, record: &EventRecord) {
        self.events.lock().expect("in-memory sink mutex poisoned").push(record.clone());
    }
}
