use axum::{Router, routing::get};

pub mod config;
pub mod ml;
pub mod retrain;
pub mod sensor;
pub mod system;

/// Router for everything under `/api`.
pub fn router() -> Router {
    Router::new()
        .route("/status", get(system::status))
        .route("/config", get(config::get_config).post(config::update_config))
        .merge(sensor::router())
        .merge(ml::router())
        .merge(retrain::router())
}
