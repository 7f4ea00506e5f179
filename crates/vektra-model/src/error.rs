//! Shadow store error types.

use thiserror::Error;

/// Result type for shadow store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Shadow store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Record not found.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Illegal job status transition.
    #[error("illegal job transition: {from} -> {to}")]
    IllegalTransition { from: String, to: String },

    /// Uniqueness conflict.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend-specific error.
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Creates a not-found error.
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Creates an illegal-transition error.
    pub fn illegal_transition(from: impl ToString, to: impl ToString) -> Self {
        Self::IllegalTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Creates a conflict error.
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Creates a backend error.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}
