//! Store-specific error types and conversions.

use agendo_core::error::AgendoError;

/// Store-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store {namespace} is unavailable")]
    Unavailable { namespace: String },

    #[error("invalid path: {0:?}")]
    InvalidPath(String),
}

impl From<StoreError> for AgendoError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidPath(_) => AgendoError::Validation {
                message: err.to_string(),
            },
            other => AgendoError::Upstream(other.to_string()),
        }
    }
}
