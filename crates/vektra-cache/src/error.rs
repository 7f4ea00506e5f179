//! Cache error types.

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors that can occur during cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Failed to initialize the cache operator.
    #[error("cache initialization failed: {0}")]
    Init(String),

    /// No cache file exists for the document.
    #[error("no cached vectors: {0}")]
    NotFound(String),

    /// The cache file exists but could not be decoded.
    #[error("corrupt cache file {path}: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// Failed to encode entries for writing.
    #[error("cache serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend-specific error.
    #[error("cache backend error: {0}")]
    Backend(opendal::Error),
}

impl CacheError {
    /// Creates a new initialization error.
    pub fn init(msg: impl Into<String>) -> Self {
        Self::Init(msg.into())
    }

    /// Creates a new not found error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Creates a new corrupt file error.
    pub fn corrupt(path: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Corrupt {
            path: path.into(),
            source,
        }
    }
}

impl From<opendal::Error> for CacheError {
    fn from(err: opendal::Error) -> Self {
        use opendal::ErrorKind;

        match err.kind() {
            ErrorKind::NotFound => Self::NotFound(err.to_string()),
            _ => Self::Backend(err),
        }
    }
}
