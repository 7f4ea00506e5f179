//! Queue error types.

use thiserror::Error;
use vektra_model::StoreError;

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Queue errors.
#[derive(Debug, Error)]
pub enum QueueError {
    /// A pending job with the same task name already exists for the
    /// organization.
    #[error("a `{0}` job is already pending for this organization")]
    AlreadyPending(String),

    /// The job cannot be retried from its current state.
    #[error("job cannot be retried: {0}")]
    NotRetryable(String),

    /// The job cannot be cancelled from its current state.
    #[error("only pending jobs can be cancelled")]
    NotCancellable,

    /// No job with the given id.
    #[error("job not found: {0}")]
    JobNotFound(uuid::Uuid),

    /// The worker side of the queue has shut down.
    #[error("queue is closed")]
    Closed,

    /// Persistence failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl QueueError {
    /// Creates a not retryable error.
    pub fn not_retryable(msg: impl Into<String>) -> Self {
        Self::NotRetryable(msg.into())
    }
}
