//! Identity provider error types.

use agendo_core::error::AgendoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("email is already registered")]
    EmailInUse,

    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    #[error("password must be at least {min} characters")]
    WeakPassword { min: usize },

    #[error("account not found")]
    AccountNotFound,

    #[error("cryptography error: {0}")]
    Crypto(String),
}

impl From<IdentityError> for AgendoError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::InvalidCredentials | IdentityError::AccountNotFound => {
                AgendoError::AuthenticationFailed {
                    reason: err.to_string(),
                }
            }
            IdentityError::EmailInUse
            | IdentityError::InvalidEmail(_)
            | IdentityError::WeakPassword { .. } => AgendoError::Validation {
                message: err.to_string(),
            },
            IdentityError::Crypto(msg) => AgendoError::Internal(msg),
        }
    }
}
