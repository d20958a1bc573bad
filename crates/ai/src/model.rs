use serde::{Deserialize, Serialize};

use plantcare_core::{FEATURE_COUNT, FeatureVector};

use crate::result::AiError;

/// Score threshold above which the model says "water".
pub const WATERING_THRESHOLD: f64 = 0.5;

/// A loaded watering model.
///
/// Implementations must be pure with respect to their inputs: the same
/// features always give the same score, and `predict_score` never mutates
/// shared state. That is what lets a handle be swapped while predictions are
/// in flight.
pub trait PlantModel: Send + Sync + 'static {
    /// Short human-readable description (architecture, artifact name).
    fn describe(&self) -> String;

    /// Probability in `[0, 1]` that the plant needs water.
    fn predict_score(&self, features: &[f64; FEATURE_COUNT]) -> Result<f64, AiError>;
}

/// Produces fresh model instances (initial load and hot reload).
pub trait ModelLoader: Send + Sync + 'static {
    fn load(&self) -> Result<Box<dyn PlantModel>, AiError>;
}

/// Output of one model invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPrediction {
    /// Score in `[0, 1]`.
    pub score: f64,
    pub needs_water: bool,
    /// `score × 100`.
    pub confidence: f64,
    pub features: FeatureVector,
}

impl ModelPrediction {
    pub fn from_score(score: f64, features: FeatureVector) -> Self {
        let score = score.clamp(0.0, 1.0);
        Self {
            score,
            needs_water: score > WATERING_THRESHOLD,
            confidence: score * 100.0,
            features,
        }
    }
}

/// Run `model` on `features`, rejecting non-finite scores.
pub fn predict(
    model: &dyn PlantModel,
    features: FeatureVector,
) -> Result<ModelPrediction, AiError> {
    let score = model.predict_score(&features.as_array())?;
    if !score.is_finite() {
        return Err(AiError::InferenceFailed(format!(
            "model returned non-finite score {score}"
        )));
    }
    Ok(ModelPrediction::from_score(score, features))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(f64);

    impl PlantModel for Fixed {
        fn describe(&self) -> String {
            "fixed".to_string()
        }

        fn predict_score(&self, _features: &[f64; FEATURE_COUNT]) -> Result<f64, AiError> {
            Ok(self.0)
        }
    }

    fn features() -> FeatureVector {
        FeatureVector {
            moisture: 20.0,
            hour: 7.0,
            days_since_water: 1.5,
            temperature: 30.0,
            air_humidity: 40.0,
        }
    }

    #[test]
    fn prediction_derives_flag_and_confidence() {
        let p = predict(&Fixed(0.72), features()).unwrap();
        assert!(p.needs_water);
        assert!((p.confidence - 72.0).abs() < 1e-9);

        let p = predict(&Fixed(0.5), features()).unwrap();
        assert!(!p.needs_water, "threshold is strict");
    }

    #[test]
    fn nan_score_is_an_inference_failure() {
        let err = predict(&Fixed(f64::NAN), features()).unwrap_err();
        assert!(matches!(err, AiError::InferenceFailed(_)));
    }
}
