//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the hub: slots,
//! samples, wire payloads, collaborator traits and configuration.
//! Business crates depend on this crate only, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Sample timestamps are seconds (f64) on the *source* device clock
//! - Clocks of different devices are not synchronized; skew between slots is unmeasured

mod config;
mod consumer;
mod device;
mod error;
mod sample;
mod slot;
mod store;
mod wire;

pub use config::*;
pub use consumer::{FusionConsumer, Notifier};
pub use device::DeviceKind;
pub use error::*;
pub use sample::{SensorSample, Vector3};
pub use slot::{Slot, SlotMask, SlotParseError};
pub use store::*;
pub use wire::*;
