//! Shared, hot-swappable handle to the current watering model.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use plantcare_ai::model::predict;
use plantcare_ai::{AiError, ModelLoader, ModelPrediction, PlantModel};
use plantcare_core::FeatureVector;

use crate::retrain::ReloadHandler;

/// A model together with when and as which version it was installed.
pub struct LoadedModel {
    model: Box<dyn PlantModel>,
    version: u64,
    loaded_at: DateTime<Utc>,
}

impl LoadedModel {
    pub fn model(&self) -> &dyn PlantModel {
        self.model.as_ref()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}

impl fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModel")
            .field("model", &self.model.describe())
            .field("version", &self.version)
            .field("loaded_at", &self.loaded_at)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub description: String,
    pub version: u64,
    pub loaded_at: DateTime<Utc>,
}

/// Holder of the current model.
///
/// Readers take their own `Arc` of the model for the duration of one
/// prediction, so a reload never blocks on or interrupts inference: the old
/// model is dropped once its last in-flight prediction finishes.
#[derive(Debug, Default)]
pub struct ModelHandle {
    current: ArcSwapOption<LoadedModel>,
    versions: AtomicU64,
}

impl ModelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.current.load().is_some()
    }

    pub fn current(&self) -> Option<Arc<LoadedModel>> {
        self.current.load_full()
    }

    pub fn info(&self) -> Option<ModelInfo> {
        self.current().map(|m| ModelInfo {
            description: m.model.describe(),
            version: m.version,
            loaded_at: m.loaded_at,
        })
    }

    /// Replace the current model, returning the new version number.
    pub fn install(&self, model: Box<dyn PlantModel>) -> u64 {
        let version = self.versions.fetch_add(1, Ordering::SeqCst) + 1;
        let description = model.describe();
        self.current.store(Some(Arc::new(LoadedModel {
            model,
            version,
            loaded_at: Utc::now(),
        })));
        info!(version, model = %description, "model installed");
        version
    }

    /// Load a fresh model and swap it in. On failure the current model stays.
    pub fn reload(&self, loader: &dyn ModelLoader) -> Result<u64, AiError> {
        match loader.load() {
            Ok(model) => Ok(self.install(model)),
            Err(e) => {
                warn!(
                    error = %e,
                    loaded = self.is_loaded(),
                    "model load failed; keeping current model"
                );
                Err(e)
            }
        }
    }

    pub fn predict(&self, features: FeatureVector) -> Result<ModelPrediction, AiError> {
        let loaded = self.current().ok_or(AiError::ModelNotLoaded)?;
        predict(loaded.model(), features)
    }
}

/// Reload hook that refreshes a [`ModelHandle`] from a [`ModelLoader`].
pub struct ModelReloader {
    handle: Arc<ModelHandle>,
    loader: Arc<dyn ModelLoader>,
}

impl ModelReloader {
    pub fn new(handle: Arc<ModelHandle>, loader: Arc<dyn ModelLoader>) -> Self {
        Self { handle, loader }
    }
}

#[async_trait]
impl ReloadHandler for ModelReloader {
    async fn reload(&self) -> Result<(), AiError> {
        let handle = Arc::clone(&self.handle);
        let loader = Arc::clone(&self.loader);
        tokio::task::spawn_blocking(move || handle.reload(loader.as_ref()))
            .await
            .map_err(|e| AiError::Internal(format!("reload task failed: {e}")))?
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plantcare_core::FEATURE_COUNT;
    use std::sync::atomic::AtomicUsize;

    struct Fixed(f64);

    impl PlantModel for Fixed {
        fn describe(&self) -> String {
            format!("fixed({})", self.0)
        }

        fn predict_score(&self, _features: &[f64; FEATURE_COUNT]) -> Result<f64, AiError> {
            Ok(self.0)
        }
    }

    /// Yields 0.1, 0.2, ... on successive loads; fails when `fail` is set.
    struct Sequence {
        loads: AtomicUsize,
        fail: bool,
    }

    impl ModelLoader for Sequence {
        fn load(&self) -> Result<Box<dyn PlantModel>, AiError> {
            if self.fail {
                return Err(AiError::Artifact("missing model.json".to_string()));
            }
            let n = self.loads.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Box::new(Fixed(n as f64 / 10.0)))
        }
    }

    fn features() -> FeatureVector {
        FeatureVector {
            moisture: 30.0,
            hour: 9.0,
            days_since_water: 1.0,
            temperature: 24.0,
            air_humidity: 55.0,
        }
    }

    #[test]
    fn empty_handle_reports_model_not_loaded() {
        let handle = ModelHandle::new();
        assert!(!handle.is_loaded());
        assert_eq!(handle.predict(features()).unwrap_err(), AiError::ModelNotLoaded);
    }

    #[test]
    fn in_flight_reader_keeps_old_model_across_reload() {
        let handle = ModelHandle::new();
        let loader = Sequence {
            loads: AtomicUsize::new(0),
            fail: false,
        };
        assert_eq!(handle.reload(&loader).unwrap(), 1);

        let in_flight = handle.current().unwrap();
        assert_eq!(handle.reload(&loader).unwrap(), 2);

        let old = predict(in_flight.model(), features()).unwrap();
        let new = handle.predict(features()).unwrap();
        assert!((old.score - 0.1).abs() < 1e-9);
        assert!((new.score - 0.2).abs() < 1e-9);
        assert_eq!(in_flight.version(), 1);
    }

    #[test]
    fn failed_reload_keeps_current_model() {
        let handle = ModelHandle::new();
        handle.install(Box::new(Fixed(0.8)));

        let broken = Sequence {
            loads: AtomicUsize::new(0),
            fail: true,
        };
        assert!(matches!(handle.reload(&broken), Err(AiError::Artifact(_))));
        assert_eq!(handle.info().unwrap().description, "fixed(0.8)");
    }

    #[tokio::test]
    async fn reloader_swaps_through_the_hook() {
        let handle = Arc::new(ModelHandle::new());
        let loader: Arc<dyn ModelLoader> = Arc::new(Sequence {
            loads: AtomicUsize::new(0),
            fail: false,
        });
        let reloader = ModelReloader::new(Arc::clone(&handle), loader);

        reloader.reload().await.unwrap();
        assert_eq!(handle.info().map(|i| i.version), Some(1));
    }
}
