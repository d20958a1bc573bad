//! Hybrid watering decision: numeric model score fused with an advisory.
//!
//! Pure and deterministic: no clock, no IO, no shared state. The same
//! `(prediction, advisory)` pair always produces the same decision.

use serde::{Deserialize, Serialize};

use plantcare_core::FeatureVector;

use crate::advisory::AdvisoryResult;
use crate::model::{ModelPrediction, WATERING_THRESHOLD};

const WATER_KEYWORDS: [&str; 2] = ["siram", "water"];
const POOR_HEALTH_KEYWORDS: [&str; 2] = ["buruk", "poor"];
const GOOD_HEALTH_KEYWORDS: [&str; 2] = ["baik", "good"];

/// Relative weight of each input. A tunable policy, not derived from data.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct HybridWeights {
    pub model: f64,
    pub advisory: f64,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            model: 0.7,
            advisory: 0.3,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionMethod {
    MlOnly,
    HybridMlAi,
}

/// Which advisory field produced the signal.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SignalBasis {
    UrgentAction,
    Recommendation,
    PoorHealth,
    GoodHealth,
    Neutral,
}

/// Binary watering signal read out of an advisory's text.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AdvisorySignal {
    pub needs_water: bool,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    pub basis: SignalBasis,
}

impl AdvisorySignal {
    fn new(needs_water: bool, confidence: f64, basis: SignalBasis) -> Self {
        Self {
            needs_water,
            confidence,
            basis,
        }
    }

    /// Map onto the model's scale: probability that watering is needed.
    pub fn score(&self) -> f64 {
        if self.needs_water {
            self.confidence
        } else {
            1.0 - self.confidence
        }
    }
}

/// Interpret an advisory, first matching rule wins:
///
/// 1. an urgent action (other than the literal `null`)
/// 2. a recommendation mentioning watering
/// 3. a poor health status
/// 4. a good health status
/// 5. neutral
pub fn interpret_advisory(advisory: &AdvisoryResult) -> AdvisorySignal {
    let urgent = normalized(advisory.urgent_action.as_deref());
    let recommendation = normalized(advisory.recommendation.as_deref());
    let health = normalized(advisory.health_status.as_deref());

    if !urgent.is_empty() && urgent != "null" {
        AdvisorySignal::new(true, 0.9, SignalBasis::UrgentAction)
    } else if contains_any(&recommendation, &WATER_KEYWORDS) {
        AdvisorySignal::new(true, 0.75, SignalBasis::Recommendation)
    } else if contains_any(&health, &POOR_HEALTH_KEYWORDS) {
        AdvisorySignal::new(true, 0.7, SignalBasis::PoorHealth)
    } else if contains_any(&health, &GOOD_HEALTH_KEYWORDS) {
        AdvisorySignal::new(false, 0.6, SignalBasis::GoodHealth)
    } else {
        AdvisorySignal::new(false, 0.5, SignalBasis::Neutral)
    }
}

fn normalized(text: Option<&str>) -> String {
    text.map(|s| s.trim().to_lowercase()).unwrap_or_default()
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// The model's view, retained untouched on hybrid decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionSummary {
    pub score: f64,
    pub needs_water: bool,
    pub confidence: f64,
}

/// The advisory's view, confidence in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiAssessment {
    pub needs_water: bool,
    pub confidence: f64,
}

/// Final watering decision for one telemetry event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HybridDecision {
    pub score: f64,
    pub needs_water: bool,
    pub confidence: f64,
    pub features: FeatureVector,
    pub method: DecisionMethod,
    pub ai_adjusted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ml_prediction: Option<PredictionSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_assessment: Option<AiAssessment>,
}

impl HybridDecision {
    fn model_only(prediction: &ModelPrediction) -> Self {
        Self {
            score: prediction.score,
            needs_water: prediction.needs_water,
            confidence: prediction.confidence,
            features: prediction.features,
            method: DecisionMethod::MlOnly,
            ai_adjusted: false,
            ml_prediction: None,
            ai_assessment: None,
        }
    }
}

/// Score with the default 0.7 / 0.3 weights.
pub fn score(prediction: &ModelPrediction, advisory: Option<&AdvisoryResult>) -> HybridDecision {
    score_with(prediction, advisory, HybridWeights::default())
}

pub fn score_with(
    prediction: &ModelPrediction,
    advisory: Option<&AdvisoryResult>,
    weights: HybridWeights,
) -> HybridDecision {
    let Some(advisory) = advisory else {
        return HybridDecision::model_only(prediction);
    };

    let signal = interpret_advisory(advisory);
    let hybrid = prediction.score * weights.model + signal.score() * weights.advisory;

    HybridDecision {
        score: hybrid,
        needs_water: hybrid > WATERING_THRESHOLD,
        confidence: hybrid * 100.0,
        features: prediction.features,
        method: DecisionMethod::HybridMlAi,
        ai_adjusted: true,
        ml_prediction: Some(PredictionSummary {
            score: prediction.score,
            needs_water: prediction.needs_water,
            confidence: prediction.confidence,
        }),
        ai_assessment: Some(AiAssessment {
            needs_water: signal.needs_water,
            confidence: signal.confidence * 100.0,
        }),
    }
}
