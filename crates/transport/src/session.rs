//! Companion session abstraction
//!
//! Defines the trait for the platform's bidirectional session, supporting
//! real implementations and mock testing.

use contracts::{CollectionRequest, KeyValueMap};

use crate::error::Result;

/// Session activation state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActivationState {
    #[default]
    NotActivated,
    Activating,
    Activated,
    /// Companion-initiated; the adapter may re-activate
    Deactivated,
}

/// Platform session trait
///
/// Calls may be serviced on any thread. Asynchronous state changes and
/// inbound messages are reported back through
/// [`SessionAdapter::on_activation_changed`](crate::SessionAdapter::on_activation_changed)
/// and [`SessionAdapter::on_inbound`](crate::SessionAdapter::on_inbound).
pub trait SessionTransport: Send + Sync {
    /// Companion device is paired with the host
    fn is_paired(&self) -> bool;

    /// Companion application is installed on the paired device
    fn is_companion_app_installed(&self) -> bool;

    /// Request activation
    ///
    /// # Returns
    /// State reached synchronously (`Activating` when completion is reported later)
    fn activate(&self) -> Result<ActivationState>;

    /// One-shot message, no acknowledgment
    fn send_message(&self, payload: &KeyValueMap) -> Result<()>;

    /// Replace the shared application context (latest wins)
    fn update_application_context(&self, payload: &KeyValueMap) -> Result<()>;

    /// Ask the platform to launch the companion app for a session
    fn wake_companion(&self, request: &CollectionRequest) -> Result<()>;
}
