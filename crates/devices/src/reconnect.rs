//! Bounded reconnection polling
//!
//! A poller owns the not-yet-bound device for its whole lifetime and hands
//! it back together with the outcome. Cancellation is dropping (aborting) the
//! task running [`reconnect`].

use std::sync::Arc;

use contracts::{Notifier, ReconnectPolicy, Slot};
use tracing::{debug, info, instrument, warn};

use crate::device::Device;

/// Result of a bounded polling run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectOutcome {
    /// Connected on attempt `attempts`
    Connected { attempts: u32 },
    /// Every attempt failed
    Exhausted { attempts: u32 },
}

impl ReconnectOutcome {
    pub fn is_connected(&self) -> bool {
        matches!(self, ReconnectOutcome::Connected { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            ReconnectOutcome::Connected { attempts } | ReconnectOutcome::Exhausted { attempts } => {
                *attempts
            }
        }
    }
}

/// Device handed back by a finished poller
pub struct ReconnectResult {
    pub slot: Slot,
    pub device: Box<dyn Device>,
    pub outcome: ReconnectOutcome,
}

/// Poll `device.try_connect()` every `policy.interval()`, at most
/// `policy.max_attempts` times (minimum 1)
pub async fn poll_connect(device: &mut dyn Device, policy: &ReconnectPolicy) -> ReconnectOutcome {
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        match device.try_connect() {
            Ok(()) => return ReconnectOutcome::Connected { attempts: attempt },
            Err(e) => debug!(attempt, max_attempts, error = %e, "connect attempt failed"),
        }

        if attempt < max_attempts {
            tokio::time::sleep(policy.interval()).await;
        }
    }

    ReconnectOutcome::Exhausted {
        attempts: max_attempts,
    }
}

/// Poll until connected or exhausted; on exhaustion emit a notice
#[instrument(
    name = "reconnect",
    skip(device, policy, notifier),
    fields(slot = %slot, device_id = %device.device_id())
)]
pub async fn reconnect(
    mut device: Box<dyn Device>,
    slot: Slot,
    policy: ReconnectPolicy,
    notifier: Arc<dyn Notifier>,
) -> ReconnectResult {
    let outcome = poll_connect(device.as_mut(), &policy).await;
    observability::record_reconnect_finished(slot, outcome.attempts(), outcome.is_connected());

    match outcome {
        ReconnectOutcome::Connected { attempts } => {
            info!(attempts, "device reachable");
        }
        ReconnectOutcome::Exhausted { attempts } => {
            warn!(attempts, "giving up on device");
            notifier.emit(&exhausted_notice(device.device_name(), attempts));
        }
    }

    ReconnectResult {
        slot,
        device,
        outcome,
    }
}

/// Notice text for an exhausted poller
pub fn exhausted_notice(device_name: &str, attempts: u32) -> String {
    format!("Could not connect to {device_name} after {attempts} attempts.")
}

/// Notice text for a reconnected device rejected by the exclusivity rule
pub fn exclusive_conflict_notice(device_name: &str, bound: Slot) -> String {
    format!("{device_name} is already bound to {bound}.")
}
