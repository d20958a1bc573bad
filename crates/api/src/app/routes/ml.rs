use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;

use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/ml/predict", get(predict).post(predict))
        .route("/ai/advice", post(advice))
}

#[derive(Debug, Default, Deserialize)]
pub struct AdviceRequest {
    pub plant_name: Option<String>,
}

/// Decide for the latest reading right now. The decision is also published.
pub async fn predict(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.handler.predict_on_demand() {
        Ok(published) => Json(published).into_response(),
        Err(e) => errors::ai_error_to_response(e),
    }
}

pub async fn advice(
    Extension(services): Extension<Arc<AppServices>>,
    body: Option<Json<AdviceRequest>>,
) -> axum::response::Response {
    if !services.handler.has_advisory_client() {
        return errors::json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "advisory_unavailable",
            "no advisory service configured",
        );
    }

    let request = body.map(|Json(r)| r).unwrap_or_default();
    match services.handler.request_advisory(request.plant_name.as_deref()).await {
        Ok(result) => Json(result).into_response(),
        Err(e) => errors::ai_error_to_response(e),
    }
}
