use crate::messaging::BusError;

// ============================================================================
// Credit Analysis Errors
// ============================================================================

/// Registration payload rejected before scoring. Business-level: the message
/// is acknowledged and a failure event is published instead.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("customer id must not be empty")]
    MissingCustomerId,

    #[error("customer name must not be empty")]
    MissingName,

    #[error("customer national id must not be empty")]
    MissingNationalId,

    #[error("income must be a positive value")]
    NonPositiveIncome,

    #[error("age must be between 18 and 120 years (got {0})")]
    AgeOutOfRange(i32),

    #[error("credit history category must not be empty")]
    MissingHistoryCategory,

    #[error("invalid credit history category '{0}': expected GOOD, REGULAR or BAD")]
    UnknownHistoryCategory(String),

    #[error("malformed registration payload: {0}")]
    MalformedPayload(String),
}

/// Failure while computing or encoding an analysis
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: String },

    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error("invalid registration event: {0}")]
    Validation(#[from] ValidationError),

    #[error("credit analysis failed: {0}")]
    Processing(#[from] ProcessingError),

    #[error("failed to publish to '{topic}': {source}")]
    Publication {
        topic: String,
        #[source]
        source: BusError,
    },
}

impl ScoringError {
    /// Label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ScoringError::Validation(_) => "validation",
            ScoringError::Processing(_) => "processing",
            ScoringError::Publication { .. } => "publication",
        }
    }
}
