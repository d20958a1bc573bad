//! Sensor readings and device status updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{IngestError, IngestResult};

/// Pump relay state as reported by the device.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PumpStatus {
    On,
    #[default]
    Off,
}

impl PumpStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PumpStatus::On => "on",
            PumpStatus::Off => "off",
        }
    }
}

/// Wire shape of a telemetry message. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct TelemetryPayload {
    moisture: f64,
    temperature: f64,
    air_humidity: f64,
    #[serde(default)]
    pump_status: Option<PumpStatus>,
    #[serde(default)]
    auto_mode: Option<bool>,
}

/// One ingested soil/environment reading.
///
/// Immutable once recorded; histories only ever append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Soil moisture in percent, within `[0, 100]`.
    pub moisture: f64,
    /// Air temperature in °C.
    pub temperature: f64,
    /// Relative air humidity in percent.
    pub air_humidity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pump_status: Option<PumpStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_mode: Option<bool>,
    #[serde(rename = "timestamp")]
    pub observed_at: DateTime<Utc>,
}

impl SensorReading {
    /// Parse a telemetry JSON object received at `observed_at`.
    ///
    /// `moisture`, `temperature` and `air_humidity` are required; anything
    /// missing, non-finite or out of range is rejected.
    pub fn from_json(payload: &JsonValue, observed_at: DateTime<Utc>) -> IngestResult<Self> {
        let raw: TelemetryPayload = serde_json::from_value(payload.clone())?;
        Self::validated(raw, observed_at)
    }

    /// Parse raw payload bytes (as delivered by the broker).
    pub fn from_slice(bytes: &[u8], observed_at: DateTime<Utc>) -> IngestResult<Self> {
        let raw: TelemetryPayload = serde_json::from_slice(bytes)?;
        Self::validated(raw, observed_at)
    }

    fn validated(raw: TelemetryPayload, observed_at: DateTime<Utc>) -> IngestResult<Self> {
        if !raw.moisture.is_finite() || !(0.0..=100.0).contains(&raw.moisture) {
            return Err(IngestError::OutOfRange {
                field: "moisture",
                value: raw.moisture,
            });
        }
        if !raw.temperature.is_finite() {
            return Err(IngestError::OutOfRange {
                field: "temperature",
                value: raw.temperature,
            });
        }
        if !raw.air_humidity.is_finite() {
            return Err(IngestError::OutOfRange {
                field: "air_humidity",
                value: raw.air_humidity,
            });
        }

        Ok(Self {
            moisture: raw.moisture,
            temperature: raw.temperature,
            air_humidity: raw.air_humidity,
            pump_status: raw.pump_status,
            auto_mode: raw.auto_mode,
            observed_at,
        })
    }
}

/// Device status message (`plant/status`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    #[serde(default)]
    pub pump: Option<String>,
}

impl StatusUpdate {
    pub fn from_json(payload: &JsonValue) -> IngestResult<Self> {
        if !payload.is_object() {
            return Err(IngestError::malformed("status payload must be a JSON object"));
        }
        Ok(serde_json::from_value(payload.clone())?)
    }

    /// A status of `pump: "on"` marks the start of a watering action.
    pub fn signals_watering(&self) -> bool {
        self.pump.as_deref() == Some("on")
    }
}
