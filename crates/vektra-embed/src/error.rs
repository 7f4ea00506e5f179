//! Embedding error types.

use thiserror::Error;

/// Result type for embedding operations.
pub type EmbedResult<T> = Result<T, EmbedError>;

/// Embedding errors.
#[derive(Debug, Error)]
pub enum EmbedError {
    /// The organization has no embedding credentials on file.
    #[error("no embedder configured for this organization")]
    NoEmbedderConfigured,

    /// Invalid embedder configuration.
    #[error("invalid embedder configuration: {0}")]
    Config(String),

    /// The upstream embedding provider failed.
    #[error("embedding provider error: {0}")]
    Provider(String),
}

impl EmbedError {
    /// Creates an invalid config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a provider error.
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }
}
