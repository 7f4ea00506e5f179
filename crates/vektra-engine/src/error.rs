//! Engine error types.

use thiserror::Error;
use uuid::Uuid;
use vektra_cache::CacheError;
use vektra_connector::ConnectorError;
use vektra_embed::EmbedError;
use vektra_model::StoreError;
use vektra_queue::QueueError;

/// Result type for engine workflows.
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine errors.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The document produced no chunks after splitting.
    #[error("document `{0}` is empty after splitting")]
    EmptyDocument(String),

    /// Every embedding batch failed, so nothing was written.
    #[error("no chunks of `{0}` could be embedded")]
    NothingEmbedded(String),

    /// A clone was requested for a document with no cache file.
    #[error("no cached vectors for document `{0}`, it cannot be cloned")]
    CacheMissing(String),

    /// Workspace record not found.
    #[error("workspace not found: {0}")]
    WorkspaceNotFound(Uuid),

    /// Document record not found.
    #[error("document not found: {0}")]
    DocumentNotFound(Uuid),

    /// RAG test record not found.
    #[error("rag test not found: {0}")]
    RagTestNotFound(Uuid),

    /// The remote namespace backing a workspace no longer exists.
    #[error("remote namespace `{0}` does not exist")]
    NamespaceMissing(String),

    /// The connector (or its tier) cannot clone namespaces.
    #[error("namespace cloning is not supported by this connector")]
    CloneUnsupported,

    /// No connector configuration for the organization.
    #[error("no vector database configured for organization {0}")]
    NoConnector(Uuid),

    /// The job payload did not deserialize into the expected arguments.
    #[error("invalid job payload: {0}")]
    InvalidJob(String),

    /// Shadow store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Vector cache failure.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Remote vector database failure.
    #[error(transparent)]
    Connector(#[from] ConnectorError),

    /// Embedding failure.
    #[error(transparent)]
    Embed(#[from] EmbedError),

    /// Job queue failure.
    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl EngineError {
    /// Returns true if an operator retry of the whole job could succeed.
    ///
    /// Transport-level remote failures are worth retrying; configuration
    /// and structural errors (missing cache, dimension mismatch) are not.
    pub fn can_retry(&self) -> bool {
        match self {
            Self::Connector(err) => err.retryable(),
            Self::Embed(EmbedError::Provider(_)) => true,
            Self::Cache(CacheError::Backend(_)) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability_follows_the_error_class() {
        assert!(EngineError::from(ConnectorError::connection("refused")).can_retry());
        assert!(EngineError::from(EmbedError::provider("rate limited")).can_retry());

        assert!(!EngineError::CacheMissing("doc.txt".into()).can_retry());
        assert!(!EngineError::from(EmbedError::NoEmbedderConfigured).can_retry());
        assert!(!EngineError::from(ConnectorError::dimension_mismatch(1536, 768)).can_retry());
    }
}
