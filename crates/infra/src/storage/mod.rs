//! Flat-file stores shared with the training script.
//!
//! These files are read by other tools, so their layouts are fixed.

use std::path::PathBuf;

use thiserror::Error;

pub mod training_data;
pub mod watering;

pub use training_data::{TRAINING_DATA_HEADER, TrainingDataFile, TrainingRow};
pub use watering::WateringStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Create the parent directory of `path` if it is missing.
pub(crate) fn ensure_parent(path: &std::path::Path) -> Result<(), StoreError> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            std::fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))
        }
        _ => Ok(()),
    }
}
