use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use tracing::warn;

use plantcare_core::SensorReading;
use plantcare_events::{BrokerMessage, EventBus, topic};

use crate::app::errors;
use crate::app::services::AppServices;

const DEFAULT_HISTORY_LIMIT: usize = 100;

pub fn router() -> Router {
    Router::new()
        .route("/sensor", post(ingest))
        .route("/sensor/latest", get(latest))
        .route("/sensor/history", get(history))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

pub async fn latest(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    let Some(reading) = services.store().latest() else {
        return errors::json_error(StatusCode::NOT_FOUND, "no_data", "no sensor data received yet");
    };
    let device = services.handler.device_status();

    Json(json!({
        "reading": reading,
        "pump_status": device.pump_status,
        "auto_mode": device.auto_mode,
        "prediction": services.store().latest_prediction(),
    }))
    .into_response()
}

pub async fn history(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<HistoryQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    Json(services.store().recent(limit))
}

/// Publish a telemetry payload onto the bus as if it came from the broker.
///
/// The payload is validated first so callers get a 400 instead of a silently
/// dropped event; processing itself happens on the telemetry worker.
pub async fn ingest(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<JsonValue>,
) -> axum::response::Response {
    if let Err(e) = SensorReading::from_json(&body, Utc::now()) {
        return errors::json_error(StatusCode::BAD_REQUEST, "invalid_telemetry", e.to_string());
    }

    let message = BrokerMessage::new(topic::SENSOR, body);
    let id = message.id();
    if let Err(e) = services.bus.publish(message) {
        warn!(error = ?e, "failed to publish telemetry");
        return errors::json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "bus_unavailable",
            format!("{e:?}"),
        );
    }

    (StatusCode::ACCEPTED, Json(json!({ "id": id.to_string() }))).into_response()
}
