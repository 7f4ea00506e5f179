//! Connector error types.

use thiserror::Error;

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// Connector errors.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Could not reach the remote instance.
    #[error("connection error: {0}")]
    Connection(String),

    /// The remote index/cluster exists but is not ready to serve.
    #[error("instance not ready: {0}")]
    NotReady(String),

    /// Operation timeout.
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Authentication error.
    #[error("authentication error: {0}")]
    Authentication(String),

    /// Namespace/collection not found.
    #[error("namespace not found: {0}")]
    NamespaceNotFound(String),

    /// Vector dimension mismatch.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The provider (or its tier) cannot perform this operation.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Backend-specific error.
    #[error("backend error: {0}")]
    Backend(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl ConnectorError {
    /// Creates a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a not ready error.
    pub fn not_ready(msg: impl Into<String>) -> Self {
        Self::NotReady(msg.into())
    }

    /// Creates a timeout error.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Creates an invalid config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an authentication error.
    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Creates a namespace not found error.
    pub fn namespace_not_found(name: impl Into<String>) -> Self {
        Self::NamespaceNotFound(name.into())
    }

    /// Creates a dimension mismatch error.
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch { expected, actual }
    }

    /// Creates an unsupported operation error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Creates a backend error.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Creates a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Returns true if retrying the same operation could succeed.
    ///
    /// Configuration, authentication and shape errors are permanent;
    /// transport-level failures are not.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::NotReady(_) | Self::Timeout(_)
        )
    }
}

impl From<reqwest::Error> for ConnectorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else if err.is_decode() {
            Self::Serialization(err.to_string())
        } else {
            Self::Backend(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ConnectorError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_failures_are_retryable() {
        assert!(ConnectorError::connection("refused").retryable());
        assert!(ConnectorError::not_ready("initializing").retryable());
        assert!(ConnectorError::timeout("deadline").retryable());

        assert!(!ConnectorError::config("bad url").retryable());
        assert!(!ConnectorError::authentication("denied").retryable());
        assert!(!ConnectorError::dimension_mismatch(1536, 768).retryable());
        assert!(!ConnectorError::unsupported("starter tier").retryable());
    }
}
