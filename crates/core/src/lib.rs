//! `plantcare-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! sensor readings, the model feature vector, and the bounded rolling buffer
//! that backs every in-memory history in the system.

pub mod error;
pub mod features;
pub mod rolling;
pub mod sensor;

pub use error::{IngestError, IngestResult};
pub use features::{FEATURE_COUNT, FeatureVector};
pub use rolling::RollingBuffer;
pub use sensor::{PumpStatus, SensorReading, StatusUpdate};
