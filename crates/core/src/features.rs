//! Model input features.

use chrono::{DateTime, Local, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::sensor::SensorReading;

/// Number of features the watering model consumes.
pub const FEATURE_COUNT: usize = 5;

const MS_PER_DAY: f64 = 86_400_000.0;

/// The five features fed to the model, in model order.
///
/// Serialized with camelCase keys to stay compatible with existing dashboards.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureVector {
    pub moisture: f64,
    /// Hour of day (0-23) in the plant's local time.
    pub hour: f64,
    pub days_since_water: f64,
    pub temperature: f64,
    pub air_humidity: f64,
}

impl FeatureVector {
    /// Build features for `reading`, using the host's local time zone for the hour.
    pub fn from_reading(reading: &SensorReading, last_watering: DateTime<Utc>) -> Self {
        Self::from_reading_in(reading, last_watering, &Local)
    }

    /// Build features for `reading`, taking the hour of day in `tz`.
    pub fn from_reading_in<Tz: TimeZone>(
        reading: &SensorReading,
        last_watering: DateTime<Utc>,
        tz: &Tz,
    ) -> Self {
        let hour = reading.observed_at.with_timezone(tz).hour();
        Self {
            moisture: reading.moisture,
            hour: f64::from(hour),
            days_since_water: days_between(last_watering, reading.observed_at),
            temperature: reading.temperature,
            air_humidity: reading.air_humidity,
        }
    }

    pub fn as_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.moisture,
            self.hour,
            self.days_since_water,
            self.temperature,
            self.air_humidity,
        ]
    }
}

/// Fractional days from `earlier` to `later`, never negative.
pub fn days_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    let ms = (later - earlier).num_milliseconds().max(0) as f64;
    ms / MS_PER_DAY
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn features_follow_model_order() {
        let reading = SensorReading {
            moisture: 31.0,
            temperature: 29.5,
            air_humidity: 58.0,
            pump_status: None,
            auto_mode: None,
            observed_at: utc("2026-03-03T14:30:00Z"),
        };

        let f = FeatureVector::from_reading_in(&reading, utc("2026-03-01T14:30:00Z"), &Utc);

        assert_eq!(f.as_array(), [31.0, 14.0, 2.0, 29.5, 58.0]);
    }

    #[test]
    fn watering_in_the_future_clamps_to_zero_days() {
        assert_eq!(
            days_between(utc("2026-03-02T00:00:00Z"), utc("2026-03-01T00:00:00Z")),
            0.0
        );
    }

    #[test]
    fn serializes_camel_case_keys() {
        let f = FeatureVector {
            moisture: 1.0,
            hour: 2.0,
            days_since_water: 3.0,
            temperature: 4.0,
            air_humidity: 5.0,
        };
        let v = serde_json::to_value(f).unwrap();
        assert_eq!(v["daysSinceWater"], 3.0);
        assert_eq!(v["airHumidity"], 5.0);
    }
}
