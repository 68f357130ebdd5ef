//! Provided FusionConsumer / Notifier implementations

use std::sync::Mutex;

use contracts::{FusionConsumer, KeyValueMap, Notifier, SensorSample, Slot};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Logs every batch instead of fusing it
#[derive(Debug, Default)]
pub struct LogFusionConsumer;

impl FusionConsumer for LogFusionConsumer {
    fn on_batch(&self, slot: Slot, samples: Vec<SensorSample>) {
        let first = samples.first().map(|s| s.timestamp);
        let last = samples.last().map(|s| s.timestamp);
        info!(slot = %slot, count = samples.len(), ?first, ?last, "fusion batch");
    }

    fn on_status(&self, payload: KeyValueMap) {
        info!(keys = ?payload.keys().collect::<Vec<_>>(), "fusion status");
    }
}

/// Event delivered by [`ChannelFusionConsumer`]
#[derive(Debug, Clone, PartialEq)]
pub enum FusionEvent {
    Batch {
        slot: Slot,
        samples: Vec<SensorSample>,
    },
    Status(KeyValueMap),
}

/// Queues every callback onto an unbounded channel
///
/// The ingestion path never blocks on a slow consumer.
#[derive(Debug, Clone)]
pub struct ChannelFusionConsumer {
    tx: mpsc::UnboundedSender<FusionEvent>,
}

impl ChannelFusionConsumer {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<FusionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: FusionEvent) {
        if self.tx.send(event).is_err() {
            warn!("fusion receiver dropped, event discarded");
        }
    }
}

impl FusionConsumer for ChannelFusionConsumer {
    fn on_batch(&self, slot: Slot, samples: Vec<SensorSample>) {
        self.send(FusionEvent::Batch { slot, samples });
    }

    fn on_status(&self, payload: KeyValueMap) {
        self.send(FusionEvent::Status(payload));
    }
}

/// Routes notices to the log
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn emit(&self, message: &str) {
        warn!(notice = message, "user notice");
    }
}

/// Keeps every notice in memory
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emitted notices, oldest first
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn emit(&self, message: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message.to_string());
        }
    }
}
