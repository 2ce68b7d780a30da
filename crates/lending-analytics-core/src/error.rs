use thiserror::Error;

#[derive(Debug, Error)]
pub enum LendingAnalyticsError {
    #[error("Invalid input: {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("No aggregate loan records supplied; no report can be built")]
    EmptyRecordSet,

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for LendingAnalyticsError {
    fn from(e: serde_json::Error) -> Self {
        LendingAnalyticsError::SerializationError(e.to_string())
    }
}
