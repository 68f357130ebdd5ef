//! # Devices
//!
//! Device capability interface and drivers.
//!
//! Responsibilities:
//! - `Device` trait every bindable device implements
//! - `WatchDriver`: companion watch over the shared `SessionAdapter`
//! - `SimulatedDevice`: in-process generator for demos and tests
//! - Shared ingestion path: decode, forward, buffer and flush
//! - Bounded reconnection polling
//! - Provided fusion consumers and notifiers

mod collector;
mod consumers;
mod device;
mod error;
mod reconnect;
mod simulated;
mod stats;
mod watch;

pub use collector::SampleCollector;
pub use consumers::{
    ChannelFusionConsumer, FusionEvent, LogFusionConsumer, LogNotifier, RecordingNotifier,
};
pub use device::{Device, DriverContext};
pub use error::{DeviceError, Result};
pub use reconnect::{
    exclusive_conflict_notice, exhausted_notice, poll_connect, reconnect, ReconnectOutcome, ReconnectResult,
};
pub use simulated::{InboundCallback, SimulatedConfig, SimulatedDevice};
pub use stats::IngestionStats;
pub use watch::{WatchDriver, WAKE_FAILED_NOTICE};
