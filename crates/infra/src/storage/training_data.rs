use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{error, info};

use plantcare_core::FeatureVector;

use super::{StoreError, ensure_parent};

/// Column header of the training-data accumulator.
pub const TRAINING_DATA_HEADER: &str =
    "moisture,hour,days_since_water,temperature,air_humidity,needs_water";

/// One labelled sample.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingRow {
    pub features: FeatureVector,
    pub needs_water: bool,
}

impl TrainingRow {
    fn to_csv(&self) -> String {
        let f = &self.features;
        format!(
            "{},{:.0},{:.4},{},{},{}",
            f.moisture,
            f.hour,
            f.days_since_water,
            f.temperature,
            f.air_humidity,
            u8::from(self.needs_water)
        )
    }
}

/// CSV file of labelled samples consumed by the training script.
#[derive(Debug, Clone)]
pub struct TrainingDataFile {
    path: PathBuf,
}

impl TrainingDataFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the file with just the header if it does not exist yet.
    pub fn ensure_header(&self) -> Result<(), StoreError> {
        if self.path.exists() {
            return Ok(());
        }
        ensure_parent(&self.path)?;
        std::fs::write(&self.path, format!("{TRAINING_DATA_HEADER}\n"))
            .map_err(|e| StoreError::io(&self.path, e))?;
        info!(path = %self.path.display(), "created training data file");
        Ok(())
    }

    pub fn append(&self, row: &TrainingRow) -> Result<(), StoreError> {
        self.ensure_header()?;
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| StoreError::io(&self.path, e))?;
        writeln!(file, "{}", row.to_csv()).map_err(|e| StoreError::io(&self.path, e))
    }

    /// Number of samples: non-blank lines minus the header.
    ///
    /// A missing or unreadable file counts as zero samples.
    pub fn count_samples(&self) -> usize {
        if !self.path.exists() {
            return 0;
        }
        match std::fs::read_to_string(&self.path) {
            Ok(content) => content
                .lines()
                .filter(|line| !line.trim().is_empty())
                .count()
                .saturating_sub(1),
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "failed to count training samples");
                0
            }
        }
    }
}
