//! Wire payloads exchanged with the companion
//!
//! Inbound (companion -> hub): `imu_batch` and `status` messages.
//! Outbound (hub -> companion): best-effort [`ContextPayload`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use crate::{SensorSample, Vector3};

/// Untyped key-value payload as carried by the session
pub type KeyValueMap = serde_json::Map<String, Value>;

/// Decode failure for a single inbound message or batch entry
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Message has no `type` key or it is not a string
    #[error("message has no 'type' field")]
    MissingType,

    /// Message `type` is not one we handle
    #[error("unknown message type '{0}'")]
    UnknownType(String),

    /// `imu_batch` without a `samples` array
    #[error("imu_batch has no 'samples' array")]
    MissingSamples,

    /// Entry is missing a field or carries a non-numeric value
    #[error("malformed sample entry: {0}")]
    MalformedEntry(#[from] serde_json::Error),
}

/// Inbound message from the companion
#[derive(Debug, Clone, PartialEq)]
pub enum CompanionMessage {
    /// Batch of raw entries; each entry is decoded independently
    ImuBatch(Vec<Value>),

    /// Companion-reported status, forwarded untouched
    Status(KeyValueMap),
}

impl CompanionMessage {
    /// Classify a raw session payload
    pub fn from_map(mut map: KeyValueMap) -> Result<Self, DecodeError> {
        let kind = match map.get("type") {
            Some(Value::String(kind)) => kind.clone(),
            _ => return Err(DecodeError::MissingType),
        };

        match kind.as_str() {
            "imu_batch" => match map.remove("samples") {
                Some(Value::Array(entries)) => Ok(Self::ImuBatch(entries)),
                _ => Err(DecodeError::MissingSamples),
            },
            "status" => {
                map.remove("type");
                Ok(Self::Status(map))
            }
            _ => Err(DecodeError::UnknownType(kind)),
        }
    }

    /// Encode samples as the entries of an `imu_batch`
    pub fn imu_batch(samples: &[SensorSample]) -> Self {
        let entries = samples
            .iter()
            .map(|s| serde_json::to_value(WireSample::from(s)).unwrap_or(Value::Null))
            .collect();
        Self::ImuBatch(entries)
    }

    /// Build an `imu_batch` session payload (used by simulators and tests)
    pub fn imu_batch_payload(samples: &[SensorSample]) -> KeyValueMap {
        let entries = match Self::imu_batch(samples) {
            Self::ImuBatch(entries) => entries,
            Self::Status(_) => Vec::new(),
        };

        let mut map = KeyValueMap::new();
        map.insert("type".into(), Value::String("imu_batch".into()));
        map.insert("samples".into(), Value::Array(entries));
        map
    }

    /// Message kind as carried in the `type` key
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ImuBatch(_) => "imu_batch",
            Self::Status(_) => "status",
        }
    }
}

/// Flat wire representation of one batch entry
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WireSample {
    pub timestamp: f64,
    pub acc_x: f64,
    pub acc_y: f64,
    pub acc_z: f64,
    pub gyro_x: f64,
    pub gyro_y: f64,
    pub gyro_z: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mag_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mag_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mag_z: Option<f64>,
}

impl WireSample {
    /// Decode one entry of an `imu_batch`
    pub fn decode(entry: &Value) -> Result<SensorSample, DecodeError> {
        let wire = WireSample::deserialize(entry)?;
        Ok(wire.into())
    }
}

impl From<WireSample> for SensorSample {
    fn from(w: WireSample) -> Self {
        let mag = match (w.mag_x, w.mag_y, w.mag_z) {
            (Some(x), Some(y), Some(z)) => Some(Vector3::new(x, y, z)),
            _ => None,
        };

        SensorSample {
            timestamp: w.timestamp,
            acc: Vector3::new(w.acc_x, w.acc_y, w.acc_z),
            gyro: Vector3::new(w.gyro_x, w.gyro_y, w.gyro_z),
            mag,
        }
    }
}

impl From<&SensorSample> for WireSample {
    fn from(s: &SensorSample) -> Self {
        WireSample {
            timestamp: s.timestamp,
            acc_x: s.acc.x,
            acc_y: s.acc.y,
            acc_z: s.acc.z,
            gyro_x: s.gyro.x,
            gyro_y: s.gyro.y,
            gyro_z: s.gyro.z,
            mag_x: s.mag.map(|m| m.x),
            mag_y: s.mag.map(|m| m.y),
            mag_z: s.mag.map(|m| m.z),
        }
    }
}

/// Where the collection session takes place
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    #[default]
    Indoor,
    Outdoor,
}

impl LocationKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            LocationKind::Indoor => "indoor",
            LocationKind::Outdoor => "outdoor",
        }
    }
}

impl fmt::Display for LocationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of a collection session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionRequest {
    /// Activity label, e.g. "running"
    pub activity: String,

    pub location: LocationKind,
}

impl CollectionRequest {
    pub fn new(activity: impl Into<String>, location: LocationKind) -> Self {
        Self {
            activity: activity.into(),
            location,
        }
    }
}

/// Command carried by a context update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextCommand {
    StartCollection,
    StopCollection,
}

impl ContextCommand {
    pub const fn as_str(self) -> &'static str {
        match self {
            ContextCommand::StartCollection => "start_collection",
            ContextCommand::StopCollection => "stop_collection",
        }
    }
}

/// Best-effort, last-write-wins context pushed to the companion
///
/// The companion must ignore a context whose `timestamp` is older than the
/// last one it applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextPayload {
    pub command: ContextCommand,
    pub enable_imu: bool,
    pub activity: String,
    pub location: String,
    pub timestamp: f64,
}

impl ContextPayload {
    /// Flatten into the session's key-value representation
    pub fn to_map(&self) -> KeyValueMap {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => KeyValueMap::new(),
        }
    }
}
