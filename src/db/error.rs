//! Data-layer error type.
//!
//! Store functions return `StoreError`; the HTTP layer maps it onto
//! `ApiError` so storage-engine messages never reach a client.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("email is already registered")]
    DuplicateEmail,

    #[error("referenced {0} does not exist")]
    ForeignKeyViolation(&'static str),

    #[error("cannot change status from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("{field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("stored payload could not be encoded: {0}")]
    Payload(#[from] serde_json::Error),
}

impl StoreError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        StoreError::Validation {
            field,
            message: message.into(),
        }
    }
}

/// Whether a sqlx error is a UNIQUE constraint violation
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

/// Whether a sqlx error is a FOREIGN KEY constraint violation
pub fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_foreign_key_violation(),
        _ => false,
    }
}
