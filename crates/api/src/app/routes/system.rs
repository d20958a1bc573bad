use std::sync::Arc;

use axum::{Json, extract::Extension, response::IntoResponse};
use chrono::Utc;
use serde_json::json;

use crate::app::services::AppServices;

pub async fn health(Extension(services): Extension<Arc<AppServices>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "uptime_seconds": services.uptime().as_secs_f64(),
    }))
}

pub async fn status(Extension(services): Extension<Arc<AppServices>>) -> impl IntoResponse {
    let handler = &services.handler;
    let config = handler.config();
    let store = services.store();

    Json(json!({
        "device": handler.device_status(),
        "plant_name": config.plant_name,
        "model": services.model().info(),
        "advisory_available": handler.has_advisory_client(),
        "readings": store.reading_count(),
        "advisories": store.advisory_count(),
        "latest_prediction": store.latest_prediction(),
        "latest_advisory": store.latest_advisory(),
        "is_training": services.retrain.is_training(),
        "workers": services.worker_names(),
        "config": config,
        "timestamp": Utc::now(),
    }))
}
