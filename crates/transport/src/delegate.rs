//! DelegateSlot - current owner of the companion channel
//!
//! The platform session has a single inbound delegate. Instead of pointing it
//! at a driver object, the adapter records which [`Slot`] owns the channel and
//! routes every inbound message to that slot. Only the device registry claims
//! and releases ownership, always from the hub's main context.

use std::sync::RwLock;

use contracts::{CompanionMessage, Slot};
use tracing::debug;

/// Inbound message routed to the slot owning the companion channel
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedMessage {
    pub slot: Slot,
    pub message: CompanionMessage,
}

/// Process-wide delegate owner
#[derive(Debug, Default)]
pub struct DelegateSlot {
    owner: RwLock<Option<Slot>>,
}

impl DelegateSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current owner, `None` when the default handler is installed
    pub fn current(&self) -> Option<Slot> {
        match self.owner.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Hand the delegate to `slot`, returning the previous owner
    pub fn claim(&self, slot: Slot) -> Option<Slot> {
        let previous = self.write(Some(slot));
        debug!(slot = %slot, previous = ?previous, "companion delegate claimed");
        previous
    }

    /// Restore the default handler if `slot` is the current owner
    ///
    /// Returns `true` when ownership was released.
    pub fn release(&self, slot: Slot) -> bool {
        if self.current() != Some(slot) {
            return false;
        }
        self.write(None);
        debug!(slot = %slot, "companion delegate returned to default handler");
        true
    }

    fn write(&self, value: Option<Slot>) -> Option<Slot> {
        let mut guard = match self.owner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::replace(&mut *guard, value)
    }
}
