//! `plantcare-ai`
//!
//! **Responsibility:** the two decision inputs and how they are fused.
//!
//! - `model`/`network`: the numeric watering model (collaborator trait + a
//!   scaler-normalised dense network loaded from disk)
//! - `advisory`/`gemini`/`rate_limit`: the qualitative advisory collaborator
//! - `hybrid`: the pure scorer combining both into one decision
//!
//! Nothing here performs telemetry bookkeeping or owns long-lived state.

pub mod advisory;
pub mod gemini;
pub mod hybrid;
pub mod model;
pub mod network;
pub mod rate_limit;
pub mod result;

pub use advisory::{AdvisoryClient, AdvisoryResult};
pub use gemini::GeminiAdvisoryClient;
pub use hybrid::{
    AdvisorySignal, AiAssessment, DecisionMethod, HybridDecision, HybridWeights, PredictionSummary,
    SignalBasis, interpret_advisory,
};
pub use model::{ModelLoader, ModelPrediction, PlantModel};
pub use network::{Activation, DenseLayer, DenseNetwork, FileModelLoader, ScalerParams};
pub use rate_limit::{RateLimitedAdvisory, RateLimiter};
pub use result::AiError;
