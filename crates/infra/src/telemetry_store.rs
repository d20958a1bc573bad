//! In-memory rolling state of recent telemetry.

use std::sync::{PoisonError, RwLock};

use plantcare_ai::{AdvisoryResult, ModelPrediction};
use plantcare_core::{RollingBuffer, SensorReading};

pub const READING_CAPACITY: usize = 1000;
pub const PREDICTION_CAPACITY: usize = 100;
pub const ADVISORY_CAPACITY: usize = 50;

/// Bounded buffers of recent readings, predictions and advisories.
///
/// Every operation is total: a poisoned lock is recovered rather than
/// reported, since the buffers hold no invariant a panic could break.
#[derive(Debug)]
pub struct TelemetryStore {
    readings: RwLock<RollingBuffer<SensorReading>>,
    predictions: RwLock<RollingBuffer<ModelPrediction>>,
    advisories: RwLock<RollingBuffer<AdvisoryResult>>,
}

impl Default for TelemetryStore {
    fn default() -> Self {
        Self::with_capacities(READING_CAPACITY, PREDICTION_CAPACITY, ADVISORY_CAPACITY)
    }
}

impl TelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacities(readings: usize, predictions: usize, advisories: usize) -> Self {
        Self {
            readings: RwLock::new(RollingBuffer::new(readings)),
            predictions: RwLock::new(RollingBuffer::new(predictions)),
            advisories: RwLock::new(RollingBuffer::new(advisories)),
        }
    }

    pub fn record(&self, reading: SensorReading) {
        self.readings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(reading);
    }

    pub fn record_prediction(&self, prediction: ModelPrediction) {
        self.predictions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prediction);
    }

    pub fn record_advisory(&self, advisory: AdvisoryResult) {
        self.advisories
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(advisory);
    }

    pub fn latest(&self) -> Option<SensorReading> {
        self.readings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .latest()
            .cloned()
    }

    /// Up to the last `n` readings, oldest first.
    pub fn recent(&self, n: usize) -> Vec<SensorReading> {
        self.readings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .recent_cloned(n)
    }

    /// Moisture of up to the last `n` readings, oldest first.
    pub fn recent_moisture(&self, n: usize) -> Vec<f64> {
        self.readings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .recent(n)
            .map(|r| r.moisture)
            .collect()
    }

    pub fn reading_count(&self) -> usize {
        self.readings.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn latest_prediction(&self) -> Option<ModelPrediction> {
        self.predictions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .latest()
            .cloned()
    }

    pub fn recent_predictions(&self, n: usize) -> Vec<ModelPrediction> {
        self.predictions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .recent_cloned(n)
    }

    pub fn latest_advisory(&self) -> Option<AdvisoryResult> {
        self.advisories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .latest()
            .cloned()
    }

    pub fn advisory_count(&self) -> usize {
        self.advisories.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}
