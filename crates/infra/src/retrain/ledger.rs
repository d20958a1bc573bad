//! Durable history of training attempts.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

use super::Trigger;
use super::metrics::TrainingMetrics;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ledger {path} is not valid: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One training run, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingAttempt {
    pub timestamp: DateTime<Utc>,
    pub duration_seconds: f64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recall: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub f1_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub samples_used: usize,
    #[serde(default)]
    pub trigger: Trigger,
}

impl TrainingAttempt {
    pub fn succeeded(
        timestamp: DateTime<Utc>,
        duration_seconds: f64,
        metrics: TrainingMetrics,
        samples_used: usize,
        trigger: Trigger,
    ) -> Self {
        Self {
            timestamp,
            duration_seconds,
            success: true,
            accuracy: metrics.accuracy,
            precision: metrics.precision,
            recall: metrics.recall,
            f1_score: metrics.f1_score,
            error: None,
            exit_code: None,
            samples_used,
            trigger,
        }
    }

    pub fn failed(
        timestamp: DateTime<Utc>,
        duration_seconds: f64,
        error: impl Into<String>,
        exit_code: Option<i32>,
        samples_used: usize,
        trigger: Trigger,
    ) -> Self {
        Self {
            timestamp,
            duration_seconds,
            success: false,
            accuracy: None,
            precision: None,
            recall: None,
            f1_score: None,
            error: Some(error.into()),
            exit_code,
            samples_used,
            trigger,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct LedgerFile {
    last_updated: DateTime<Utc>,
    total_trainings: usize,
    #[serde(default)]
    history: Vec<TrainingAttempt>,
}

/// Append-only list of attempts, mirrored to a JSON file after every append.
///
/// The in-memory list is authoritative: a failed write is reported but the
/// attempt stays recorded.
#[derive(Debug)]
pub struct TrainingLedger {
    path: PathBuf,
    history: Vec<TrainingAttempt>,
}

impl TrainingLedger {
    /// An empty ledger persisting to `path`; nothing is read.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            history: Vec::new(),
        }
    }

    /// Restore from `path`. A missing file is an empty ledger.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        if !path.exists() {
            return Ok(Self::empty(path));
        }

        let raw = std::fs::read(&path).map_err(|source| LedgerError::Io {
            path: path.clone(),
            source,
        })?;
        let file: LedgerFile = serde_json::from_slice(&raw).map_err(|source| LedgerError::Format {
            path: path.clone(),
            source,
        })?;

        info!(records = file.history.len(), path = %path.display(), "training history loaded");
        Ok(Self {
            path,
            history: file.history,
        })
    }

    /// Like [`load`](Self::load), but an unreadable file yields an empty ledger.
    pub fn load_or_empty(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::load(&path) {
            Ok(ledger) => ledger,
            Err(e) => {
                error!(error = %e, "failed to load training history; starting empty");
                Self::empty(path)
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All attempts, oldest first.
    pub fn history(&self) -> &[TrainingAttempt] {
        &self.history
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Timestamp of the most recent successful attempt.
    pub fn last_successful(&self) -> Option<DateTime<Utc>> {
        self.history
            .iter()
            .filter(|a| a.success)
            .map(|a| a.timestamp)
            .max()
    }

    /// Record `attempt` and rewrite the file.
    pub fn append(&mut self, attempt: TrainingAttempt) -> Result<(), LedgerError> {
        self.history.push(attempt);
        self.persist().inspect_err(|e| {
            error!(error = %e, "failed to save training history");
        })
    }

    fn persist(&self) -> Result<(), LedgerError> {
        let io = |source: std::io::Error| LedgerError::Io {
            path: self.path.clone(),
            source,
        };

        let file = LedgerFile {
            last_updated: Utc::now(),
            total_trainings: self.history.len(),
            history: self.history.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&file).map_err(|source| LedgerError::Format {
            path: self.path.clone(),
            source,
        })?;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(io)?;
        }
        // Write-then-rename so a crash never leaves a truncated ledger.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes).map_err(io)?;
        std::fs::rename(&tmp, &self.path).map_err(io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("plantcare-{}", uuid::Uuid::now_v7()))
            .join("training_history.json")
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, hour, 0, 0).unwrap()
    }

    fn metrics() -> TrainingMetrics {
        TrainingMetrics {
            accuracy: Some(0.9),
            precision: Some(0.8),
            recall: Some(0.85),
            f1_score: Some(0.824),
        }
    }

    #[test]
    fn missing_file_is_empty() {
        let ledger = TrainingLedger::load(temp_path()).unwrap();
        assert!(ledger.is_empty());
        assert_eq!(ledger.last_successful(), None);
    }

    #[test]
    fn round_trip_restores_history_and_last_success() {
        let path = temp_path();
        let mut ledger = TrainingLedger::empty(&path);
        ledger
            .append(TrainingAttempt::succeeded(at(2), 12.5, metrics(), 150, Trigger::Auto))
            .unwrap();
        ledger
            .append(TrainingAttempt::succeeded(at(9), 10.0, metrics(), 180, Trigger::Manual))
            .unwrap();
        ledger
            .append(TrainingAttempt::failed(at(20), 1.0, "boom", Some(2), 200, Trigger::Auto))
            .unwrap();

        let restored = TrainingLedger::load(&path).unwrap();
        assert_eq!(restored.history(), ledger.history());
        assert_eq!(restored.last_successful(), Some(at(9)));

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["total_trainings"], 3);
        assert_eq!(raw["history"][2]["exit_code"], 2);
        assert_eq!(raw["history"][1]["trigger"], "manual");
        assert!(raw["history"][2].get("accuracy").is_none());
    }

    #[test]
    fn last_success_is_latest_by_time_not_position() {
        let mut ledger = TrainingLedger::empty(temp_path());
        ledger.history.push(TrainingAttempt::succeeded(at(10), 1.0, metrics(), 1, Trigger::Auto));
        ledger.history.push(TrainingAttempt::succeeded(at(4), 1.0, metrics(), 1, Trigger::Auto));
        assert_eq!(ledger.last_successful(), Some(at(10)));
    }

    #[test]
    fn records_written_elsewhere_load_with_defaults() {
        let path = temp_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            r#"{"last_updated":"2024-03-10T02:00:00Z","total_trainings":1,
                "history":[{"timestamp":"2024-03-10T02:00:00.000Z",
                            "duration_seconds":4.2,"success":true,"accuracy":0.9}]}"#,
        )
        .unwrap();

        let ledger = TrainingLedger::load(&path).unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.history()[0].trigger, Trigger::Auto);
        assert_eq!(ledger.last_successful(), Some(at(2)));
    }

    #[test]
    fn failed_write_keeps_attempt_in_memory() {
        let dir = std::env::temp_dir().join(format!("plantcare-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        // A directory where the file should be makes the rename fail.
        let path = dir.join("training_history.json");
        std::fs::create_dir_all(&path).unwrap();

        let mut ledger = TrainingLedger::empty(&path);
        let attempt = TrainingAttempt::succeeded(at(3), 1.0, metrics(), 1, Trigger::Auto);
        let err = ledger.append(attempt);
        assert!(err.is_err());
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.last_successful(), Some(at(3)));
    }

    #[test]
    fn corrupt_file_loads_empty_when_lenient() {
        let path = temp_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();

        assert!(matches!(TrainingLedger::load(&path), Err(LedgerError::Format { .. })));
        assert!(TrainingLedger::load_or_empty(&path).is_empty());
    }
}
