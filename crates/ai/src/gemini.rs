//! Gemini-backed advisory client.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::advisory::{AdvisoryClient, AdvisoryResult};
use crate::result::AiError;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const HISTORY_POINTS: usize = 24;

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

/// Calls the Gemini `generateContent` endpoint and parses the JSON advice.
#[derive(Debug, Clone)]
pub struct GeminiAdvisoryClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiAdvisoryClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, AiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AiError::Internal(format!("http client: {e}")))?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl AdvisoryClient for GeminiAdvisoryClient {
    async fn analyze(
        &self,
        moisture: f64,
        history: &[f64],
        plant_name: &str,
    ) -> Result<AdvisoryResult, AiError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = json!({
            "contents": [{ "parts": [{ "text": build_prompt(plant_name, moisture, history) }] }]
        });

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AiError::Advisory(format!("request failed: {e}")))?
            .error_for_status()
            .map_err(|e| AiError::Advisory(format!("bad status: {e}")))?;

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AiError::Advisory(format!("unreadable response: {e}")))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .filter_map(|p| p.text)
            .collect();
        debug!(model = %self.model, chars = text.len(), "advisory response received");

        let mut advisory = parse_advisory(&text)?;
        advisory.plant_name = Some(plant_name.to_string());
        advisory.moisture = Some(moisture);
        advisory.generated_at = Some(Utc::now().to_rfc3339());
        Ok(advisory)
    }
}

fn build_prompt(plant_name: &str, moisture: f64, history: &[f64]) -> String {
    let skip = history.len().saturating_sub(HISTORY_POINTS);
    let series = if history.is_empty() {
        "no data".to_string()
    } else {
        history[skip..]
            .iter()
            .map(|m| format!("{m:.1}"))
            .collect::<Vec<_>>()
            .join(", ")
    };

    format!(
        r#"You are a horticulture expert specialising in house plant care.

PLANT: {plant_name}

CURRENT CONDITIONS:
- Soil moisture: {moisture:.1}%
- Soil moisture over the last readings (oldest first): {series}

TASKS:
1. Identify the characteristics of "{plant_name}".
2. Judge whether {moisture:.1}% soil moisture suits "{plant_name}".
3. Give a specific, actionable care recommendation (say "water" explicitly if watering is needed).
4. Give practical tips.

Reply with JSON only, no markdown:
{{
  "plant_identified": "full plant name",
  "recommendation": "short actionable recommendation",
  "watering_schedule": "watering schedule",
  "moisture_analysis": "moisture analysis",
  "optimal_moisture_range": "optimal range",
  "tips": ["tip 1", "tip 2", "tip 3"],
  "health_status": "Excellent/Good/Needs Attention/Poor",
  "urgent_action": "immediate action, or null",
  "sunlight_needs": "light needs",
  "ideal_temperature": "ideal temperature"
}}"#
    )
}

/// Locate the JSON object in a model reply, tolerating markdown code fences
/// and surrounding prose.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Parse a model reply into an [`AdvisoryResult`].
pub fn parse_advisory(text: &str) -> Result<AdvisoryResult, AiError> {
    let object = extract_json_object(text)
        .ok_or_else(|| AiError::Advisory("no JSON object in advisory reply".to_string()))?;
    let value: serde_json::Value =
        serde_json::from_str(object).map_err(|e| AiError::Advisory(format!("invalid JSON: {e}")))?;
    AdvisoryResult::from_json(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_object_from_fenced_reply() {
        let reply = "```json\n{\"health_status\": \"Good\", \"urgent_action\": null}\n```\n";
        let advisory = parse_advisory(reply).unwrap();
        assert_eq!(advisory.health_status.as_deref(), Some("Good"));
        assert_eq!(advisory.urgent_action, None);
    }

    #[test]
    fn reply_without_object_is_an_error() {
        assert!(matches!(
            parse_advisory("I cannot help with that."),
            Err(AiError::Advisory(_))
        ));
    }

    #[test]
    fn prompt_keeps_only_last_24_points() {
        let history: Vec<f64> = (0..30).map(f64::from).collect();
        let prompt = build_prompt("Monstera", 33.0, &history);
        assert!(prompt.contains("6.0, 7.0"));
        assert!(!prompt.contains(" 5.0,"));
        assert!(prompt.contains("29.0"));
    }
}
