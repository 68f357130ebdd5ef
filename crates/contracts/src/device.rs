//! DeviceKind - supported hardware classes

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of supported hardware classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    /// Companion smartwatch reached through the paired session
    Watch,

    /// In-process generator without hardware
    Simulated,
}

impl DeviceKind {
    /// Stable class name, also the persistence file stem
    pub const fn as_str(self) -> &'static str {
        match self {
            DeviceKind::Watch => "watch",
            DeviceKind::Simulated => "simulated",
        }
    }

    /// Whether only one physical unit of this class can be paired with the host
    pub const fn is_exclusive(self) -> bool {
        matches!(self, DeviceKind::Watch)
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
