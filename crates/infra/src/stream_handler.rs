//! Telemetry and device-status handling.
//!
//! Every telemetry event is recorded, scored and (when a model is loaded)
//! turned into a published watering decision. Advisory refreshes run as
//! detached tasks; a decision never waits for one.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use plantcare_ai::hybrid;
use plantcare_ai::{
    AdvisoryClient, AdvisoryResult, AiError, HybridDecision, HybridWeights, interpret_advisory,
};
use plantcare_core::{FeatureVector, IngestError, PumpStatus, SensorReading, StatusUpdate};
use plantcare_events::{BrokerMessage, EventBus, topic};

use crate::advisory_trigger::{AdvisoryTrigger, TriggerReason};
use crate::config::{SystemConfig, SystemConfigPatch};
use crate::model_handle::ModelHandle;
use crate::storage::{TrainingDataFile, TrainingRow, WateringStore};
use crate::telemetry_store::TelemetryStore;

/// Moisture points handed to the advisory service.
pub const ADVISORY_HISTORY_POINTS: usize = 24;

/// A decision as it goes out on the prediction topic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishedDecision {
    #[serde(flatten)]
    pub decision: HybridDecision,
    pub timestamp: DateTime<Utc>,
    /// `true` for decisions made on telemetry, `false` for on-demand ones.
    pub auto: bool,
}

/// Where decisions go.
pub trait DecisionSink: Send + Sync + 'static {
    fn publish(&self, decision: &PublishedDecision);
}

/// Publishes decisions onto an event bus under [`topic::PREDICTION`].
pub struct BusDecisionSink<B> {
    bus: B,
}

impl<B> BusDecisionSink<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }
}

impl<B> DecisionSink for BusDecisionSink<B>
where
    B: EventBus<BrokerMessage> + 'static,
{
    fn publish(&self, decision: &PublishedDecision) {
        let message = match BrokerMessage::json(topic::PREDICTION, decision) {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "failed to encode decision");
                return;
            }
        };
        if let Err(e) = self.bus.publish(message) {
            warn!(error = ?e, "failed to publish decision");
        }
    }
}

/// Last known device state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceStatus {
    pub pump_status: Option<PumpStatus>,
    pub auto_mode: Option<bool>,
    pub last_watering: DateTime<Utc>,
    pub days_since_watering: f64,
    pub last_seen: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
struct DeviceState {
    pump_status: Option<PumpStatus>,
    auto_mode: Option<bool>,
    last_watering: DateTime<Utc>,
    last_seen: Option<DateTime<Utc>>,
}

/// What handling one telemetry event produced.
#[derive(Debug, Default)]
pub struct TelemetryOutcome {
    pub decision: Option<HybridDecision>,
    /// Set when this event started an advisory refresh.
    pub advisory: Option<(TriggerReason, JoinHandle<()>)>,
}

pub struct StreamHandler {
    store: Arc<TelemetryStore>,
    model: Arc<ModelHandle>,
    sink: Arc<dyn DecisionSink>,
    advisory: Option<Arc<dyn AdvisoryClient>>,
    weights: HybridWeights,
    config: RwLock<SystemConfig>,
    trigger: Mutex<AdvisoryTrigger>,
    device: RwLock<DeviceState>,
    watering: WateringStore,
    training_data: TrainingDataFile,
}

impl StreamHandler {
    pub fn new(
        config: SystemConfig,
        store: Arc<TelemetryStore>,
        model: Arc<ModelHandle>,
        sink: Arc<dyn DecisionSink>,
        watering: WateringStore,
        training_data: TrainingDataFile,
    ) -> Self {
        let last_watering = watering.load_or(Utc::now());
        Self {
            store,
            model,
            sink,
            advisory: None,
            weights: HybridWeights::default(),
            config: RwLock::new(config),
            trigger: Mutex::new(AdvisoryTrigger::new()),
            device: RwLock::new(DeviceState {
                pump_status: None,
                auto_mode: None,
                last_watering,
                last_seen: None,
            }),
            watering,
            training_data,
        }
    }

    pub fn with_advisory(mut self, client: Arc<dyn AdvisoryClient>) -> Self {
        self.advisory = Some(client);
        self
    }

    pub fn with_weights(mut self, weights: HybridWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn store(&self) -> &Arc<TelemetryStore> {
        &self.store
    }

    pub fn model(&self) -> &Arc<ModelHandle> {
        &self.model
    }

    pub fn has_advisory_client(&self) -> bool {
        self.advisory.is_some()
    }

    pub fn config(&self) -> SystemConfig {
        self.config.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn update_config(&self, patch: SystemConfigPatch) -> SystemConfig {
        let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
        config.apply(patch);
        info!(config = ?*config, "system config updated");
        config.clone()
    }

    pub fn device_status(&self) -> DeviceStatus {
        let device = self.device.read().unwrap_or_else(PoisonError::into_inner);
        DeviceStatus {
            pump_status: device.pump_status,
            auto_mode: device.auto_mode,
            last_watering: device.last_watering,
            days_since_watering: plantcare_core::features::days_between(
                device.last_watering,
                Utc::now(),
            ),
            last_seen: device.last_seen,
        }
    }

    /// Dispatch one broker message by topic. Failures are logged, never returned.
    pub fn handle(&self, message: &BrokerMessage) {
        match message.topic() {
            topic::SENSOR => {
                if let Err(e) = self.handle_telemetry(message.payload(), message.received_at()) {
                    warn!(error = %e, topic = topic::SENSOR, "dropping malformed telemetry");
                }
            }
            topic::STATUS => {
                if let Err(e) = self.handle_status(message.payload()) {
                    warn!(error = %e, topic = topic::STATUS, "dropping malformed status");
                }
            }
            other => debug!(topic = other, "ignoring message"),
        }
    }

    pub fn handle_telemetry(
        &self,
        payload: &JsonValue,
        received_at: DateTime<Utc>,
    ) -> Result<TelemetryOutcome, IngestError> {
        let reading = SensorReading::from_json(payload, received_at)?;
        debug!(
            moisture = reading.moisture,
            temperature = reading.temperature,
            air_humidity = reading.air_humidity,
            "telemetry received"
        );

        self.store.record(reading.clone());
        let last_watering = self.note_device(&reading);
        let config = self.config();

        let mut outcome = TelemetryOutcome::default();
        if config.ml_auto_predict {
            let features = FeatureVector::from_reading(&reading, last_watering);
            outcome.decision = match self.decide(features, config.ai_auto_analysis, true) {
                Ok(published) => Some(published.decision),
                Err(AiError::ModelNotLoaded) => {
                    debug!("no model loaded; skipping prediction");
                    None
                }
                Err(e) => {
                    warn!(error = %e, "prediction failed");
                    None
                }
            };
        }

        if config.advisory_enabled() {
            if let Some(client) = &self.advisory {
                let due = self
                    .trigger
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .on_event(
                        reading.observed_at,
                        reading.moisture,
                        config.ai_analysis_interval(),
                        config.ai_analysis_threshold,
                    );
                if let Some(reason) = due {
                    info!(?reason, moisture = reading.moisture, "requesting advisory");
                    let task =
                        self.spawn_advisory(Arc::clone(client), &reading, last_watering, &config);
                    outcome.advisory = Some((reason, task));
                }
            }
        }

        Ok(outcome)
    }

    /// Returns whether the update marked a watering.
    pub fn handle_status(&self, payload: &JsonValue) -> Result<bool, IngestError> {
        let update = StatusUpdate::from_json(payload)?;
        let pump = match update.pump.as_deref() {
            Some("on") => Some(PumpStatus::On),
            Some("off") => Some(PumpStatus::Off),
            _ => None,
        };

        let mut device = self.device.write().unwrap_or_else(PoisonError::into_inner);
        if pump.is_some() {
            device.pump_status = pump;
        }
        if !update.signals_watering() {
            return Ok(false);
        }

        let now = Utc::now();
        device.last_watering = now;
        drop(device);

        info!(at = %now, "watering recorded");
        if let Err(e) = self.watering.save(now) {
            warn!(error = %e, "failed to persist last watering time");
        }
        Ok(true)
    }

    /// Decide for the latest reading now, outside the telemetry flow.
    pub fn predict_on_demand(&self) -> Result<PublishedDecision, AiError> {
        let reading = self
            .store
            .latest()
            .ok_or_else(|| AiError::InvalidInput("no sensor data received yet".to_string()))?;
        let features = FeatureVector::from_reading(&reading, self.last_watering());
        self.decide(features, self.config().ai_auto_analysis, false)
    }

    /// Ask the advisory service now and wait for the answer.
    pub async fn request_advisory(
        &self,
        plant_name: Option<&str>,
    ) -> Result<AdvisoryResult, AiError> {
        let client = self
            .advisory
            .as_ref()
            .ok_or_else(|| AiError::Advisory("no advisory service configured".to_string()))?;
        let reading = self
            .store
            .latest()
            .ok_or_else(|| AiError::InvalidInput("no sensor data received yet".to_string()))?;
        let config = self.config();
        let plant_name = plant_name
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(config.plant_name.as_str());
        let history = self.store.recent_moisture(ADVISORY_HISTORY_POINTS);
        let last_watering = self.last_watering();

        let result = client.analyze(reading.moisture, &history, plant_name).await?;
        AdvisoryCompletion {
            store: Arc::clone(&self.store),
            training_data: self.training_data.clone(),
            feedback: config.ai_to_ml_feedback,
            features: FeatureVector::from_reading(&reading, last_watering),
        }
        .complete(&result);
        Ok(result)
    }

    fn note_device(&self, reading: &SensorReading) -> DateTime<Utc> {
        let mut device = self.device.write().unwrap_or_else(PoisonError::into_inner);
        if reading.pump_status.is_some() {
            device.pump_status = reading.pump_status;
        }
        if reading.auto_mode.is_some() {
            device.auto_mode = reading.auto_mode;
        }
        device.last_seen = Some(reading.observed_at);
        device.last_watering
    }

    fn last_watering(&self) -> DateTime<Utc> {
        self.device.read().unwrap_or_else(PoisonError::into_inner).last_watering
    }

    /// Predict, blend, log and publish. Shared by telemetry and on-demand requests.
    fn decide(
        &self,
        features: FeatureVector,
        blend_advisory: bool,
        auto: bool,
    ) -> Result<PublishedDecision, AiError> {
        let prediction = self.model.predict(features)?;
        self.store.record_prediction(prediction.clone());

        let advisory = blend_advisory.then(|| self.store.latest_advisory()).flatten();
        let decision = hybrid::score_with(&prediction, advisory.as_ref(), self.weights);
        info!(
            score = decision.score,
            needs_water = decision.needs_water,
            method = ?decision.method,
            auto,
            "watering decision"
        );

        let published = PublishedDecision {
            decision,
            timestamp: Utc::now(),
            auto,
        };
        self.sink.publish(&published);
        Ok(published)
    }

    fn spawn_advisory(
        &self,
        client: Arc<dyn AdvisoryClient>,
        reading: &SensorReading,
        last_watering: DateTime<Utc>,
        config: &SystemConfig,
    ) -> JoinHandle<()> {
        let completion = AdvisoryCompletion {
            store: Arc::clone(&self.store),
            training_data: self.training_data.clone(),
            feedback: config.ai_to_ml_feedback,
            features: FeatureVector::from_reading(reading, last_watering),
        };
        let moisture = reading.moisture;
        let history = self.store.recent_moisture(ADVISORY_HISTORY_POINTS);
        let plant_name = config.plant_name.clone();

        tokio::spawn(async move {
            match client.analyze(moisture, &history, &plant_name).await {
                Ok(result) => completion.complete(&result),
                Err(e) => warn!(error = %e, "advisory refresh failed"),
            }
        })
    }
}

/// Bookkeeping once an advisory has arrived.
struct AdvisoryCompletion {
    store: Arc<TelemetryStore>,
    training_data: TrainingDataFile,
    feedback: bool,
    /// Features at request time; labelled with the advisory's verdict.
    features: FeatureVector,
}

impl AdvisoryCompletion {
    fn complete(self, result: &AdvisoryResult) {
        self.store.record_advisory(result.clone());
        let signal = interpret_advisory(result);
        info!(
            needs_water = signal.needs_water,
            confidence = signal.confidence,
            "advisory received"
        );

        if !self.feedback {
            return;
        }
        let row = TrainingRow {
            features: self.features,
            needs_water: signal.needs_water,
        };
        match self.training_data.append(&row) {
            Ok(()) => debug!(needs_water = row.needs_water, "training sample appended"),
            Err(e) => warn!(error = %e, "failed to append training sample"),
        }
    }
}
