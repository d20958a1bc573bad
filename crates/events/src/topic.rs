//! Broker topic names.

/// Telemetry ingress (one reading per message).
pub const SENSOR: &str = "plant/sensor";

/// Device status ingress (pump on/off).
pub const STATUS: &str = "plant/status";

/// Decision egress.
pub const PREDICTION: &str = "plant/ml/prediction";

/// Topics the device publishes and this service consumes.
pub const INGRESS: [&str; 2] = [SENSOR, STATUS];
