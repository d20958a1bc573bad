use std::sync::Arc;

use axum::{Json, extract::Extension, response::IntoResponse};
use serde_json::json;

use plantcare_infra::SystemConfigPatch;

use crate::app::services::AppServices;

pub async fn get_config(Extension(services): Extension<Arc<AppServices>>) -> impl IntoResponse {
    Json(json!({
        "config": services.handler.config(),
        "model_loaded": services.model().is_loaded(),
        "advisory_available": services.handler.has_advisory_client(),
        "training_data_samples": services.retrain.stats().current_samples,
    }))
}

pub async fn update_config(
    Extension(services): Extension<Arc<AppServices>>,
    Json(patch): Json<SystemConfigPatch>,
) -> impl IntoResponse {
    Json(json!({ "config": services.handler.update_config(patch) }))
}
