//! Configuration loading and representation.
//!
//! Everything is read from environment variables once at startup. Unset
//! variables fall back to defaults; set-but-unparseable ones are an error.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::retrain::CronSchedule;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Runtime-tunable behaviour of the decision loop.
///
/// Can be patched while running (see [`SystemConfigPatch`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Run the model on every telemetry event.
    pub ml_auto_predict: bool,
    /// Request advisories automatically and blend them into decisions.
    pub ai_auto_analysis: bool,
    /// Minimum time between automatic advisories, in milliseconds.
    pub ai_analysis_interval_ms: u64,
    /// Moisture (percent) at or below which an advisory is requested immediately.
    pub ai_analysis_threshold: f64,
    pub plant_name: String,
    /// Append a labelled training row for every completed advisory.
    pub ai_to_ml_feedback: bool,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            ml_auto_predict: true,
            ai_auto_analysis: false,
            ai_analysis_interval_ms: 30 * 60 * 1000,
            ai_analysis_threshold: 20.0,
            plant_name: String::new(),
            ai_to_ml_feedback: true,
        }
    }
}

impl SystemConfig {
    pub fn ai_analysis_interval(&self) -> Duration {
        Duration::from_millis(self.ai_analysis_interval_ms)
    }

    /// Automatic advisories need both the switch and a plant to ask about.
    pub fn advisory_enabled(&self) -> bool {
        self.ai_auto_analysis && !self.plant_name.trim().is_empty()
    }

    pub fn apply(&mut self, patch: SystemConfigPatch) {
        if let Some(v) = patch.ml_auto_predict {
            self.ml_auto_predict = v;
        }
        if let Some(v) = patch.ai_auto_analysis {
            self.ai_auto_analysis = v;
        }
        if let Some(v) = patch.ai_analysis_interval_ms {
            self.ai_analysis_interval_ms = v;
        }
        if let Some(v) = patch.ai_analysis_threshold {
            self.ai_analysis_threshold = v;
        }
        if let Some(v) = patch.plant_name {
            self.plant_name = v;
        }
        if let Some(v) = patch.ai_to_ml_feedback {
            self.ai_to_ml_feedback = v;
        }
    }
}

/// Partial update for [`SystemConfig`]; absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemConfigPatch {
    pub ml_auto_predict: Option<bool>,
    pub ai_auto_analysis: Option<bool>,
    pub ai_analysis_interval_ms: Option<u64>,
    pub ai_analysis_threshold: Option<f64>,
    pub plant_name: Option<String>,
    pub ai_to_ml_feedback: Option<bool>,
}

/// Retraining policy and the external training process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrainConfig {
    pub enabled: bool,
    pub min_samples: usize,
    /// Cron expression for the scheduled checks, e.g. `0 2 * * *`.
    pub schedule: String,
    pub auto_reload: bool,
    /// Minimum hours between successful automatic trainings.
    pub cooldown_hours: f64,
    pub python_path: PathBuf,
    pub script_path: PathBuf,
    pub training_data_file: PathBuf,
    pub history_file: PathBuf,
}

impl RetrainConfig {
    pub fn with_data_dir(data_dir: &std::path::Path) -> Self {
        Self {
            enabled: true,
            min_samples: 100,
            schedule: "0 2 * * *".to_string(),
            auto_reload: true,
            cooldown_hours: 6.0,
            python_path: PathBuf::from("python"),
            script_path: data_dir.join("retrain_model.py"),
            training_data_file: data_dir.join("ai_training_data.csv"),
            history_file: data_dir.join("training_history.json"),
        }
    }
}

/// Locations of the model artifacts and the watering-time store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
    pub model_file: PathBuf,
    pub scaler_file: PathBuf,
    pub last_watering_file: PathBuf,
}

impl PathsConfig {
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            model_file: data_dir.join("models").join("plant-model").join("model.json"),
            scaler_file: data_dir.join("scaler_params.json"),
            last_watering_file: data_dir.join("last_watering.json"),
            data_dir,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryConfig {
    /// Without a key no remote advisory client is built.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MqttConfig {
    /// Without a host the broker bridge stays off.
    pub host: Option<String>,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// Connect over TLS using the platform's root certificates.
    pub tls: bool,
}

/// Complete process configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub port: u16,
    pub system: SystemConfig,
    pub retrain: RetrainConfig,
    pub paths: PathsConfig,
    pub advisory: AdvisoryConfig,
    pub mqtt: MqttConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (environment, tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(lookup);

        let data_dir =
            PathBuf::from(env.string("PLANTCARE_DATA_DIR").unwrap_or_else(|| ".".to_string()));
        let paths = PathsConfig::with_data_dir(data_dir.clone());

        let defaults = SystemConfig::default();
        let system = SystemConfig {
            ml_auto_predict: env.parse_bool("ML_AUTO_PREDICT", defaults.ml_auto_predict)?,
            ai_auto_analysis: env.parse_bool("AI_AUTO_ANALYSIS", defaults.ai_auto_analysis)?,
            ai_analysis_interval_ms: env
                .parse("AI_ANALYSIS_INTERVAL_MS", defaults.ai_analysis_interval_ms)?,
            ai_analysis_threshold: env
                .parse("AI_ANALYSIS_THRESHOLD", defaults.ai_analysis_threshold)?,
            plant_name: env.string("PLANT_NAME").unwrap_or(defaults.plant_name),
            ai_to_ml_feedback: env.parse_bool("AI_TO_ML_FEEDBACK", defaults.ai_to_ml_feedback)?,
        };

        let mut retrain = RetrainConfig::with_data_dir(&data_dir);
        retrain.enabled = env.parse_bool("AUTO_RETRAIN_ENABLED", retrain.enabled)?;
        retrain.min_samples = env.parse("AUTO_RETRAIN_MIN_SAMPLES", retrain.min_samples)?;
        retrain.auto_reload = env.parse_bool("AUTO_RETRAIN_AUTO_RELOAD", retrain.auto_reload)?;
        if let Some(schedule) = env.string("AUTO_RETRAIN_SCHEDULE") {
            schedule
                .parse::<CronSchedule>()
                .map_err(|e| ConfigError::Invalid {
                    key: "AUTO_RETRAIN_SCHEDULE",
                    value: schedule.clone(),
                    reason: e.to_string(),
                })?;
            retrain.schedule = schedule;
        }
        if let Some(python) = env.string("PYTHON_PATH") {
            retrain.python_path = PathBuf::from(python);
        }
        if let Some(script) = env.string("RETRAIN_SCRIPT") {
            retrain.script_path = PathBuf::from(script);
        }

        let advisory = AdvisoryConfig {
            api_key: env.string("GEMINI_API_KEY"),
            model: env.string("GEMINI_MODEL").unwrap_or_else(|| "gemini-2.5-flash".to_string()),
        };

        let tls = env.parse_bool("MQTT_TLS", false)?;
        let mqtt = MqttConfig {
            host: env.string("MQTT_HOST"),
            port: env.parse("MQTT_PORT", if tls { 8883 } else { 1883 })?,
            client_id: env
                .string("MQTT_CLIENT_ID")
                .unwrap_or_else(|| "plantcare-server".to_string()),
            username: env.string("MQTT_USERNAME"),
            password: env.string("MQTT_PASSWORD"),
            tls,
        };

        Ok(Self {
            port: env.parse("PORT", 3000)?,
            system,
            retrain,
            paths,
            advisory,
            mqtt,
        })
    }
}

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn string(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn parse<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.string(key) {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                key,
                value: raw.clone(),
                reason: e.to_string(),
            }),
        }
    }

    fn parse_bool(&self, key: &'static str, default: bool) -> Result<bool, ConfigError> {
        match self.string(key) {
            None => Ok(default),
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::Invalid {
                    key,
                    value: raw,
                    reason: "expected a boolean".to_string(),
                }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let cfg = AppConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(cfg.port, 3000);
        assert!(cfg.system.ml_auto_predict);
        assert!(!cfg.system.ai_auto_analysis);
        assert_eq!(cfg.system.ai_analysis_interval_ms, 1_800_000);
        assert_eq!(cfg.retrain.min_samples, 100);
        assert_eq!(cfg.retrain.schedule, "0 2 * * *");
        assert_eq!(cfg.retrain.cooldown_hours, 6.0);
        assert!(cfg.mqtt.host.is_none());
        assert_eq!(cfg.mqtt.port, 1883);
        assert!(!cfg.mqtt.tls);
    }

    #[test]
    fn data_dir_anchors_every_file() {
        let cfg = AppConfig::from_lookup(lookup(&[("PLANTCARE_DATA_DIR", "/srv/plant")])).unwrap();

        assert_eq!(
            cfg.retrain.training_data_file,
            PathBuf::from("/srv/plant/ai_training_data.csv")
        );
        assert_eq!(cfg.retrain.history_file, PathBuf::from("/srv/plant/training_history.json"));
        assert_eq!(
            cfg.paths.model_file,
            PathBuf::from("/srv/plant/models/plant-model/model.json")
        );
    }

    #[test]
    fn unparseable_values_are_reported() {
        let err =
            AppConfig::from_lookup(lookup(&[("AUTO_RETRAIN_MIN_SAMPLES", "lots")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "AUTO_RETRAIN_MIN_SAMPLES", .. }));

        let err = AppConfig::from_lookup(lookup(&[("ML_AUTO_PREDICT", "maybe")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "ML_AUTO_PREDICT", .. }));

        let err = AppConfig::from_lookup(lookup(&[("MQTT_TLS", "sometimes")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "MQTT_TLS", .. }));
    }

    #[test]
    fn retrain_schedule_accepts_cron_and_rejects_garbage_at_startup() {
        let cfg = AppConfig::from_lookup(lookup(&[("AUTO_RETRAIN_SCHEDULE", "0 */6 * * 1-5")]))
            .unwrap();
        assert_eq!(cfg.retrain.schedule, "0 */6 * * 1-5");

        for bad in ["0 2 * *", "0 25 * * *", "0 0 31 2 *"] {
            let err =
                AppConfig::from_lookup(lookup(&[("AUTO_RETRAIN_SCHEDULE", bad)])).unwrap_err();
            assert!(
                matches!(err, ConfigError::Invalid { key: "AUTO_RETRAIN_SCHEDULE", .. }),
                "{bad}"
            );
        }
    }

    #[test]
    fn mqtt_tls_switches_the_default_port() {
        let cfg = AppConfig::from_lookup(lookup(&[("MQTT_HOST", "broker"), ("MQTT_TLS", "true")]))
            .unwrap();
        assert!(cfg.mqtt.tls);
        assert_eq!(cfg.mqtt.port, 8883);

        let cfg = AppConfig::from_lookup(lookup(&[("MQTT_TLS", "on"), ("MQTT_PORT", "9443")]))
            .unwrap();
        assert!(cfg.mqtt.tls);
        assert_eq!(cfg.mqtt.port, 9443);
    }

    #[test]
    fn patch_only_touches_given_fields() {
        let mut cfg = SystemConfig::default();
        cfg.apply(SystemConfigPatch {
            ai_auto_analysis: Some(true),
            plant_name: Some("Calathea".to_string()),
            ..SystemConfigPatch::default()
        });

        assert!(cfg.advisory_enabled());
        assert!(cfg.ml_auto_predict);
        assert_eq!(cfg.ai_analysis_threshold, 20.0);
    }
}
