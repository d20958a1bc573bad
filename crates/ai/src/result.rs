use thiserror::Error;

/// Failures of the model or advisory collaborators.
///
/// None of these are fatal: the stream handler logs them and skips the
/// affected step for that event.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AiError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No model has been loaded yet (or the last load failed).
    #[error("model not loaded")]
    ModelNotLoaded,

    #[error("inference failed: {0}")]
    InferenceFailed(String),

    /// Model artifact missing or unreadable.
    #[error("model artifact error: {0}")]
    Artifact(String),

    /// Local call budget exhausted; the remote service was not contacted.
    #[error("rate limit exceeded: at most {limit} calls per {window_secs}s")]
    RateLimited { limit: usize, window_secs: u64 },

    #[error("advisory service failed: {0}")]
    Advisory(String),

    #[error("internal error: {0}")]
    Internal(String),
}
