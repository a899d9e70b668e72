//! Error types for the Agendo system.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgendoError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Business {business_id} has no license")]
    NoLicense { business_id: String },

    #[error("Permission denied: {reason}")]
    PermissionDenied { reason: String },

    #[error("Time slot {start}-{end} is already booked by {client_name}")]
    Conflict {
        client_name: String,
        start: String,
        end: String,
    },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("Store error: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AgendoError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn permission(reason: impl Into<String>) -> Self {
        Self::PermissionDenied {
            reason: reason.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

pub type AgendoResult<T> = Result<T, AgendoError>;
