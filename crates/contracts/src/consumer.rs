//! External collaborator seams
//!
//! The hub is the sole writer to both; implementations are expected to be
//! non-blocking or internally queued, since they are invoked from the
//! ingestion path.

use crate::{KeyValueMap, SensorSample, Slot};

/// Downstream sensor-fusion consumer
pub trait FusionConsumer: Send + Sync {
    /// Ordered batch of samples decoded from one inbound message of `slot`
    fn on_batch(&self, slot: Slot, samples: Vec<SensorSample>);

    /// Companion-reported status payload
    fn on_status(&self, payload: KeyValueMap);
}

/// User-facing advisory surface (toast / notification)
pub trait Notifier: Send + Sync {
    fn emit(&self, message: &str);
}
