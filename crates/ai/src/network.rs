//! Scaler-normalised dense network, loaded from JSON artifacts.
//!
//! Artifact format (written by the training script):
//!
//! ```json
//! { "layers": [
//!     { "weights": [[...5 inputs...], ...], "bias": [...], "activation": "relu" },
//!     { "weights": [[...]], "bias": [0.1], "activation": "sigmoid" }
//! ] }
//! ```
//!
//! `weights[o][i]` is the weight from input `i` to output neuron `o`. The last
//! layer must have exactly one output.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use plantcare_core::FEATURE_COUNT;

use crate::model::{ModelLoader, PlantModel};
use crate::result::AiError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Linear,
    Relu,
    Sigmoid,
    Tanh,
}

impl Activation {
    fn apply(self, x: f64) -> f64 {
        match self {
            Activation::Linear => x,
            Activation::Relu => x.max(0.0),
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activation::Tanh => x.tanh(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    pub weights: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
    #[serde(default)]
    pub activation: Activation,
}

impl DenseLayer {
    fn inputs(&self) -> usize {
        self.weights.first().map(Vec::len).unwrap_or(0)
    }

    fn outputs(&self) -> usize {
        self.weights.len()
    }

    fn forward(&self, input: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| {
                let z: f64 = row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>() + b;
                self.activation.apply(z)
            })
            .collect()
    }
}

/// Standardisation applied before the first layer: `(x - mean) / scale`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    pub mean: [f64; FEATURE_COUNT],
    pub scale: [f64; FEATURE_COUNT],
}

impl Default for ScalerParams {
    /// Moments of the synthetic bootstrap dataset.
    fn default() -> Self {
        Self {
            mean: [50.0, 11.5, 3.5, 25.0, 60.0],
            scale: [28.87, 6.93, 2.02, 5.77, 17.32],
        }
    }
}

impl ScalerParams {
    fn normalize(&self, features: &[f64; FEATURE_COUNT]) -> [f64; FEATURE_COUNT] {
        let mut out = [0.0; FEATURE_COUNT];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = (features[i] - self.mean[i]) / self.scale[i];
        }
        out
    }
}

#[derive(Debug, Deserialize)]
struct ModelArtifact {
    layers: Vec<DenseLayer>,
}

/// Feed-forward network over the five watering features.
#[derive(Debug, Clone)]
pub struct DenseNetwork {
    layers: Vec<DenseLayer>,
    scaler: ScalerParams,
}

impl DenseNetwork {
    /// Build a network, validating layer shapes and the scaler.
    pub fn new(layers: Vec<DenseLayer>, scaler: ScalerParams) -> Result<Self, AiError> {
        if layers.is_empty() {
            return Err(AiError::Artifact("network has no layers".to_string()));
        }
        if scaler.scale.iter().any(|s| *s == 0.0 || !s.is_finite()) {
            return Err(AiError::Artifact("scaler scale must be finite and non-zero".to_string()));
        }

        let mut expected_inputs = FEATURE_COUNT;
        for (idx, layer) in layers.iter().enumerate() {
            if layer.outputs() == 0 || layer.bias.len() != layer.outputs() {
                return Err(AiError::Artifact(format!(
                    "layer {idx}: {} weight rows but {} biases",
                    layer.outputs(),
                    layer.bias.len()
                )));
            }
            if layer.weights.iter().any(|row| row.len() != expected_inputs) {
                return Err(AiError::Artifact(format!(
                    "layer {idx}: expected {expected_inputs} inputs per row, found {}",
                    layer.inputs()
                )));
            }
            expected_inputs = layer.outputs();
        }
        if expected_inputs != 1 {
            return Err(AiError::Artifact(format!(
                "final layer must have one output, found {expected_inputs}"
            )));
        }

        Ok(Self { layers, scaler })
    }

    fn forward(&self, features: &[f64; FEATURE_COUNT]) -> f64 {
        let mut activations = self.scaler.normalize(features).to_vec();
        for layer in &self.layers {
            activations = layer.forward(&activations);
        }
        activations.first().copied().unwrap_or(f64::NAN)
    }
}

impl PlantModel for DenseNetwork {
    fn describe(&self) -> String {
        let shape: Vec<String> = self.layers.iter().map(|l| l.outputs().to_string()).collect();
        format!("dense[{FEATURE_COUNT}->{}]", shape.join("->"))
    }

    fn predict_score(&self, features: &[f64; FEATURE_COUNT]) -> Result<f64, AiError> {
        if features.iter().any(|f| !f.is_finite()) {
            return Err(AiError::InvalidInput("features must be finite".to_string()));
        }
        Ok(self.forward(features))
    }
}

/// Loads a [`DenseNetwork`] from a model JSON file plus optional scaler params.
#[derive(Debug, Clone)]
pub struct FileModelLoader {
    model_path: PathBuf,
    scaler_path: PathBuf,
}

impl FileModelLoader {
    pub fn new(model_path: impl Into<PathBuf>, scaler_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            scaler_path: scaler_path.into(),
        }
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    fn read_scaler(&self) -> Result<ScalerParams, AiError> {
        if !self.scaler_path.exists() {
            info!(path = %self.scaler_path.display(), "scaler params not found; using defaults");
            return Ok(ScalerParams::default());
        }
        let raw = std::fs::read_to_string(&self.scaler_path)
            .map_err(|e| AiError::Artifact(format!("{}: {e}", self.scaler_path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| AiError::Artifact(format!("{}: {e}", self.scaler_path.display())))
    }
}

impl ModelLoader for FileModelLoader {
    fn load(&self) -> Result<Box<dyn PlantModel>, AiError> {
        if !self.model_path.exists() {
            return Err(AiError::Artifact(format!(
                "model file not found: {}",
                self.model_path.display()
            )));
        }
        let raw = std::fs::read_to_string(&self.model_path)
            .map_err(|e| AiError::Artifact(format!("{}: {e}", self.model_path.display())))?;
        let artifact: ModelArtifact = serde_json::from_str(&raw)
            .map_err(|e| AiError::Artifact(format!("{}: {e}", self.model_path.display())))?;

        let network = DenseNetwork::new(artifact.layers, self.read_scaler()?)?;
        Ok(Box::new(network))
    }
}
