//! # Hub
//!
//! Device registry and the main context that owns it.
//!
//! ## Architecture
//!
//! ```text
//! HubHandle ──commands──┐
//! SessionAdapter ──────►  DeviceHub (one task) ──► DeviceRegistry ──► Device
//! SimulatedDevice ─────►        ▲
//! reconnect pollers ────────────┘
//! ```
//!
//! All registry and driver state is touched only from the hub task.

mod command;
mod error;
mod factory;
mod handle;
mod hub;
mod registry;

pub use command::DeviceSummary;
pub use error::{HubError, Result};
pub use factory::DeviceFactory;
pub use handle::HubHandle;
pub use hub::{DeviceHub, HubBuilder};
pub use registry::DeviceRegistry;
