//! SensorSample - decoded inertial reading
//!
//! Produced by the driver when a wire entry decodes, consumed by fusion and persistence.

use serde::{Deserialize, Serialize};

/// 3D vector
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Timestamped IMU sample
///
/// Only meaningful together with the [`Slot`](crate::Slot) it was routed from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorSample {
    /// Source device clock (seconds)
    pub timestamp: f64,

    /// Accelerometer
    pub acc: Vector3,

    /// Gyroscope
    pub gyro: Vector3,

    /// Magnetometer, absent on devices that do not stream it
    #[serde(default)]
    pub mag: Option<Vector3>,
}
