//! Ingest error model.

use thiserror::Error;

/// Result type used when turning raw payloads into domain values.
pub type IngestResult<T> = Result<T, IngestError>;

/// Why an incoming payload was refused.
///
/// Ingest failures are never fatal: callers log them and drop the payload.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum IngestError {
    /// The payload was not valid JSON or had the wrong shape.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// A numeric field was NaN/infinite or outside its allowed range.
    #[error("field `{field}` out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },
}

impl IngestError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }
}

impl From<serde_json::Error> for IngestError {
    fn from(e: serde_json::Error) -> Self {
        Self::Malformed(e.to_string())
    }
}
