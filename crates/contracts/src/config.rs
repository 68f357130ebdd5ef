//! HubConfig - Config Loader output
//!
//! Session, persistence, reconnection and slot-requirement settings. Every
//! section has defaults so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::{Slot, SlotMask};

/// Config version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete hub configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    #[serde(default)]
    pub version: ConfigVersion,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub persistence: PersistenceConfig,

    #[serde(default)]
    pub reconnect: ReconnectPolicy,

    /// Slots a higher-level feature needs before it may start
    #[serde(default)]
    pub requirements: Option<SlotRequirements>,

    /// Device names of which only one unit may be bound across all slots
    #[serde(default = "default_exclusive_devices")]
    pub exclusive_devices: Vec<String>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            version: ConfigVersion::default(),
            session: SessionConfig::default(),
            persistence: PersistenceConfig::default(),
            reconnect: ReconnectPolicy::default(),
            requirements: None,
            exclusive_devices: default_exclusive_devices(),
        }
    }
}

fn default_exclusive_devices() -> Vec<String> {
    vec!["Apple Watch".to_string()]
}

/// Companion session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Re-activate automatically when the companion deactivates the session
    #[serde(default = "default_true")]
    pub auto_reactivate: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auto_reactivate: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Local persistence settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Persist ingested samples at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Buffer length that triggers a flush
    #[serde(default = "default_flush_threshold")]
    pub flush_threshold: usize,

    /// Capacity of the store worker queue (in batches)
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Directory receiving one CSV file per device class
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            flush_threshold: default_flush_threshold(),
            queue_capacity: default_queue_capacity(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_flush_threshold() -> usize {
    500
}

fn default_queue_capacity() -> usize {
    16
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./recordings")
}

/// Bounded reconnection polling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    /// Delay between attempts (milliseconds)
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Attempts before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval_ms: interval.as_millis() as u64,
            max_attempts,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_max_attempts() -> u32 {
    10
}

/// Slots that must be bound, and which device names may fill them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotRequirements {
    pub slots: Vec<Slot>,

    pub allowed_devices: Vec<String>,
}

impl SlotRequirements {
    pub fn mask(&self) -> SlotMask {
        self.slots.iter().copied().collect()
    }
}
