use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use plantcare_infra::RetrainOutcome;
use plantcare_infra::retrain::{RejectReason, RetrainError};

use crate::app::services::AppServices;

const DEFAULT_HISTORY_LIMIT: usize = 10;

pub fn router() -> Router {
    Router::new()
        .route("/retrain", post(trigger))
        .route("/retrain/stats", get(stats))
        .route("/retrain/history", get(history))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

/// Manual retrain. Waits for the run to finish.
pub async fn trigger(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.retrain.force_retrain().await {
        Ok(outcome) => (outcome_status(&outcome), Json(outcome)).into_response(),
        Err(RetrainError::Persist { outcome, source }) => {
            error!(error = %source, "manual retrain finished but history not saved");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "persist_failed",
                    "message": source.to_string(),
                    "outcome": outcome,
                })),
            )
                .into_response()
        }
    }
}

fn outcome_status(outcome: &RetrainOutcome) -> StatusCode {
    match outcome {
        RetrainOutcome::Completed { .. } => StatusCode::OK,
        RetrainOutcome::Failed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        RetrainOutcome::Rejected(RejectReason::AlreadyTraining) => StatusCode::CONFLICT,
        RetrainOutcome::Rejected(RejectReason::TrainerUnavailable { .. }) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        RetrainOutcome::Rejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

pub async fn stats(Extension(services): Extension<Arc<AppServices>>) -> impl IntoResponse {
    Json(services.retrain.stats())
}

pub async fn history(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<HistoryQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let history = services.retrain.history(limit);
    Json(json!({
        "count": history.len(),
        "history": history,
    }))
}
