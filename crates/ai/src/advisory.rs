//! Advisory (text-based plant care recommendation) types.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

use crate::result::AiError;

/// Recommendation returned by the advisory service.
///
/// The service's output shape is not guaranteed, so every field is optional
/// and wrongly-typed values are treated as absent instead of failing the whole
/// payload. Only `urgent_action`, `recommendation` and `health_status` feed the
/// watering decision; the rest is carried for display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryResult {
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub plant_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub plant_identified: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub watering_schedule: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub moisture_analysis: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub optimal_moisture_range: Option<String>,
    #[serde(default, deserialize_with = "lenient_list", skip_serializing_if = "Vec::is_empty")]
    pub tips: Vec<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub health_status: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub urgent_action: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub sunlight_needs: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub ideal_temperature: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
    /// Soil moisture the advice was requested for.
    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub moisture: Option<f64>,
}

impl AdvisoryResult {
    /// Parse a JSON object leniently. Non-objects are an error.
    pub fn from_json(value: JsonValue) -> Result<Self, AiError> {
        if !value.is_object() {
            return Err(AiError::Advisory("advisory payload is not a JSON object".to_string()));
        }
        serde_json::from_value(value).map_err(|e| AiError::Advisory(e.to_string()))
    }
}

fn lenient_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match JsonValue::deserialize(d)? {
        JsonValue::String(s) => Some(s),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn lenient_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    Ok(match JsonValue::deserialize(d)? {
        JsonValue::Array(items) => items
            .into_iter()
            .filter_map(|v| match v {
                JsonValue::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        JsonValue::String(s) => vec![s],
        _ => Vec::new(),
    })
}

fn lenient_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Ok(match JsonValue::deserialize(d)? {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// The advisory collaborator.
///
/// `history` is the recent moisture series, oldest first.
#[async_trait]
pub trait AdvisoryClient: Send + Sync + 'static {
    async fn analyze(
        &self,
        moisture: f64,
        history: &[f64],
        plant_name: &str,
    ) -> Result<AdvisoryResult, AiError>;
}
