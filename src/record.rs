// Sensor Align - Time-ordered alignment of wearable sensor logs
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Decoded sensor records
//!
//! A [`Record`] is produced once by a [`RecordSource`](crate::RecordSource)
//! and never mutated afterwards. Its `epoch` is the only ordering key used
//! by the merge, aligner and segmenter.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SensorAlignError;

/// Record discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    DeviceMotion,
    Accelerometer,
    Location,
    Battery,
    Response,
}

impl RecordType {
    /// All record types, in wire enumeration order
    pub const ALL: [RecordType; 5] = [
        RecordType::DeviceMotion,
        RecordType::Accelerometer,
        RecordType::Location,
        RecordType::Battery,
        RecordType::Response,
    ];

    /// Canonical lowercase name, as used in CSV logs and stream names
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::DeviceMotion => "device_motion",
            RecordType::Accelerometer => "accelerometer",
            RecordType::Location => "location",
            RecordType::Battery => "battery",
            RecordType::Response => "response",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = SensorAlignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        RecordType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| SensorAlignError::UnsupportedRecordType(s.trim().to_string()))
    }
}

/// Three-axis reading
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Orientation in radians
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Attitude {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

/// Fused device-motion sample
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceMotion {
    pub attitude: Attitude,
    pub rotation_rate: Vector3,
    pub user_acceleration: Vector3,
    pub gravity: Vector3,
    /// Not reported by every device
    pub heading: Option<f64>,
}

/// Position fix. Coordinates and altitude are reported as groups: either
/// every field of a group is present or none is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub horizontal_accuracy: Option<f64>,
    pub altitude: Option<f64>,
    pub vertical_accuracy: Option<f64>,
    pub course: Option<f64>,
    pub speed: Option<f64>,
    pub floor: Option<i32>,
}

/// Charging state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatteryState {
    #[default]
    Unknown,
    Unplugged,
    Charging,
    Full,
}

impl FromStr for BatteryState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "unknown" => Ok(BatteryState::Unknown),
            "unplugged" => Ok(BatteryState::Unplugged),
            "charging" => Ok(BatteryState::Charging),
            "full" => Ok(BatteryState::Full),
            other => Err(format!("unknown battery state '{}'", other)),
        }
    }
}

/// Battery reading
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Battery {
    /// Charge level in `[0, 1]`
    pub level: f64,
    pub state: BatteryState,
}

/// Labelled response to an activity prompt
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub label: String,
}

/// Type-specific record content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    DeviceMotion(DeviceMotion),
    Accelerometer(Vector3),
    Location(Location),
    Battery(Battery),
    Response(Response),
}

impl Payload {
    pub fn record_type(&self) -> RecordType {
        match self {
            Payload::DeviceMotion(_) => RecordType::DeviceMotion,
            Payload::Accelerometer(_) => RecordType::Accelerometer,
            Payload::Location(_) => RecordType::Location,
            Payload::Battery(_) => RecordType::Battery,
            Payload::Response(_) => RecordType::Response,
        }
    }
}

/// One decoded record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Seconds since the Unix epoch
    pub epoch: f64,
    #[serde(flatten)]
    pub payload: Payload,
}

impl Record {
    pub fn new(epoch: f64, payload: Payload) -> Self {
        Self { epoch, payload }
    }

    pub fn device_motion(epoch: f64, motion: DeviceMotion) -> Self {
        Self::new(epoch, Payload::DeviceMotion(motion))
    }

    pub fn accelerometer(epoch: f64, acceleration: Vector3) -> Self {
        Self::new(epoch, Payload::Accelerometer(acceleration))
    }

    pub fn location(epoch: f64, location: Location) -> Self {
        Self::new(epoch, Payload::Location(location))
    }

    pub fn battery(epoch: f64, battery: Battery) -> Self {
        Self::new(epoch, Payload::Battery(battery))
    }

    pub fn response(epoch: f64, label: impl Into<String>) -> Self {
        Self::new(
            epoch,
            Payload::Response(Response {
                label: label.into(),
            }),
        )
    }

    pub fn record_type(&self) -> RecordType {
        self.payload.record_type()
    }

    /// Activity label, for response records
    pub fn label(&self) -> Option<&str> {
        match &self.payload {
            Payload::Response(r) => Some(r.label.as_str()),
            _ => None,
        }
    }
}
