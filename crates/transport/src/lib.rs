//! # Transport
//!
//! Companion session adapter.
//!
//! Responsibilities:
//! - Session activation state machine with automatic re-activation
//! - Ordered readiness checks (paired → app installed → activated)
//! - Best-effort, last-write-wins context sync
//! - Fire-and-forget `SessionAdapter::send_message`, an application-level API
//!   that no driver calls
//! - Inbound delegate: parse and route companion messages to the slot that
//!   owns the channel, for processing on the hub's main context
//! - `MockSession` for development without a paired device

mod adapter;
mod delegate;
mod error;
mod mock;
mod session;

pub use adapter::SessionAdapter;
pub use delegate::{DelegateSlot, RoutedMessage};
pub use error::{ReadinessError, Result, TransportError};
pub use mock::MockSession;
pub use session::{ActivationState, SessionTransport};
