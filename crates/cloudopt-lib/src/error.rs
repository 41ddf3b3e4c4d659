//! Error kinds surfaced by the core

use crate::models::ResourceId;
use thiserror::Error;

/// Errors returned by the store, the usage ledger and the engine
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Resource not found: {0}")]
    NotFound(ResourceId),

    #[error("Concurrent modification of resource {0}, retry the transition")]
    Conflict(ResourceId),

    /// `index` is the position in the evaluated batch. Single-record inputs
    /// (one usage record, one transition result, a query parameter) use 0.
    #[error("Invalid record at index {index}: {reason}")]
    InvalidRecord { index: usize, reason: String },

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
}

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Whether the caller may retry the whole operation
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Conflict(_))
    }

    /// Short label for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::NotFound(_) => "not_found",
            CoreError::Conflict(_) => "conflict",
            CoreError::InvalidRecord { .. } => "invalid_record",
            CoreError::StorageUnavailable(_) => "storage_unavailable",
        }
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        CoreError::StorageUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::StorageUnavailable(format!("Malformed storage data: {}", err))
    }
}
