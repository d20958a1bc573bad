use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{StoreError, ensure_parent};

#[derive(Debug, Serialize, Deserialize)]
struct WateringRecord {
    /// Milliseconds since the Unix epoch.
    timestamp: i64,
    date: String,
}

/// Persists the time of the last watering.
#[derive(Debug, Clone)]
pub struct WateringStore {
    path: PathBuf,
}

impl WateringStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored time. `Ok(None)` when nothing has been stored yet.
    pub fn read(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read(&self.path).map_err(|e| StoreError::io(&self.path, e))?;
        let record: WateringRecord = serde_json::from_slice(&raw).map_err(|e| self.corrupt(e))?;
        Utc.timestamp_millis_opt(record.timestamp)
            .single()
            .map(Some)
            .ok_or_else(|| self.corrupt(format!("timestamp {} out of range", record.timestamp)))
    }

    /// Stored time, or `now` when the file is absent or unreadable.
    pub fn load_or(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.read() {
            Ok(Some(at)) => at,
            Ok(None) => now,
            Err(e) => {
                warn!(error = %e, "could not read last watering time; assuming now");
                now
            }
        }
    }

    pub fn save(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        ensure_parent(&self.path)?;
        let record = WateringRecord {
            timestamp: at.timestamp_millis(),
            date: at.to_rfc3339_opts(SecondsFormat::Millis, true),
        };
        let bytes = serde_json::to_vec_pretty(&record).map_err(|e| self.corrupt(e))?;
        std::fs::write(&self.path, bytes).map_err(|e| StoreError::io(&self.path, e))
    }

    fn corrupt(&self, reason: impl ToString) -> StoreError {
        StoreError::Corrupt {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> WateringStore {
        WateringStore::new(
            std::env::temp_dir()
                .join(format!("plantcare-{}", uuid::Uuid::now_v7()))
                .join("last_watering.json"),
        )
    }

    #[test]
    fn missing_file_means_now() {
        let store = temp_store();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        assert_eq!(store.read().unwrap(), None);
        assert_eq!(store.load_or(now), now);
    }

    #[test]
    fn saved_time_is_read_back_with_both_fields() {
        let store = temp_store();
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 6, 30, 0).unwrap();
        store.save(at).unwrap();

        assert_eq!(store.read().unwrap(), Some(at));
        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(store.path()).unwrap()).unwrap();
        assert_eq!(raw["timestamp"], at.timestamp_millis());
        assert_eq!(raw["date"], "2024-05-01T06:30:00.000Z");
    }

    #[test]
    fn corrupt_file_falls_back_to_now() {
        let store = temp_store();
        ensure_parent(store.path()).unwrap();
        std::fs::write(store.path(), b"not json").unwrap();

        assert!(matches!(store.read(), Err(StoreError::Corrupt { .. })));
        let now = Utc::now();
        assert_eq!(store.load_or(now), now);
    }
}
