//! `plantcare-infra`
//!
//! **Responsibility:** everything stateful around the decision loop.
//!
//! - `config`: environment configuration
//! - `storage`: flat files shared with the training script
//! - `telemetry_store`: rolling in-memory history
//! - `model_handle`: the hot-swappable model
//! - `advisory_trigger` / `stream_handler`: per-event decision flow
//! - `retrain`: guarded retraining and its history
//! - `workers`: background tasks (telemetry drain, retrain schedule)
//! - `mqtt_bridge`: broker relay (feature `mqtt`)

pub mod advisory_trigger;
pub mod config;
pub mod model_handle;
#[cfg(feature = "mqtt")]
pub mod mqtt_bridge;
pub mod retrain;
pub mod storage;
pub mod stream_handler;
pub mod telemetry_store;
pub mod workers;

pub use advisory_trigger::{AdvisoryTrigger, TriggerReason};
pub use config::{AppConfig, ConfigError, RetrainConfig, SystemConfig, SystemConfigPatch};
pub use model_handle::{ModelHandle, ModelInfo, ModelReloader};
pub use retrain::{ReloadHandler, RetrainOrchestrator, RetrainOutcome, Trigger};
pub use stream_handler::{
    BusDecisionSink, DecisionSink, DeviceStatus, PublishedDecision, StreamHandler,
};
pub use telemetry_store::TelemetryStore;
pub use workers::{RetrainScheduler, TelemetryWorker, WorkerHandle};
