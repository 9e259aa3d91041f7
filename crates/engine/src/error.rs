use leadbook_core::{CoreError, ValidationErrors, Violation};
use leadbook_storage::StorageError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("authentication required")]
    Unauthorized,

    #[error("lead {0} belongs to another user")]
    Forbidden(String),

    #[error("lead not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("lead {0} was modified by someone else; reload and retry")]
    ConcurrencyConflict(String),

    #[error("too many requests; retry in {retry_after_ms} ms")]
    TooManyRequests { retry_after_ms: u64 },

    #[error("Maximum {max_rows} rows allowed")]
    CapacityExceeded { max_rows: usize },

    #[error("storage error: {0}")]
    Persistence(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

/// Coarse error category a front end maps onto its own status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    Unauthorized,
    Forbidden,
    NotFound,
    Validation,
    ConcurrencyConflict,
    TooManyRequests,
    CapacityExceeded,
    Persistence,
    Internal,
}

/// Structured form of an [`EngineError`], safe to hand to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub detail: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<Violation>,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Unauthorized => ErrorKind::Unauthorized,
            EngineError::Forbidden(_) => ErrorKind::Forbidden,
            EngineError::NotFound(_) => ErrorKind::NotFound,
            EngineError::Validation(_) => ErrorKind::Validation,
            EngineError::ConcurrencyConflict(_) => ErrorKind::ConcurrencyConflict,
            EngineError::TooManyRequests { .. } => ErrorKind::TooManyRequests,
            EngineError::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
            EngineError::Persistence(_) => ErrorKind::Persistence,
            EngineError::Core(_) | EngineError::Csv(_) => ErrorKind::Internal,
        }
    }

    /// Store and internal faults are reported generically; their detail
    /// stays in the logs.
    pub fn report(&self) -> ErrorReport {
        let detail = match self.kind() {
            ErrorKind::Persistence => "A storage error occurred".to_string(),
            ErrorKind::Internal => "An internal error occurred".to_string(),
            _ => self.to_string(),
        };
        let violations = match self {
            EngineError::Validation(errors) => errors.violations().to_vec(),
            _ => Vec::new(),
        };
        ErrorReport {
            kind: self.kind(),
            detail,
            violations,
        }
    }
}
