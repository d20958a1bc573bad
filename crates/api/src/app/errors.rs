use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use plantcare_ai::AiError;

pub fn ai_error_to_response(err: AiError) -> axum::response::Response {
    match err {
        AiError::InvalidInput(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_input", msg),
        AiError::ModelNotLoaded => json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "model_not_loaded",
            "no model loaded",
        ),
        AiError::RateLimited { .. } => {
            json_error(StatusCode::TOO_MANY_REQUESTS, "rate_limited", err.to_string())
        }
        AiError::Advisory(msg) => json_error(StatusCode::BAD_GATEWAY, "advisory_failed", msg),
        AiError::InferenceFailed(_) | AiError::Artifact(_) | AiError::Internal(_) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            err.to_string(),
        ),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
