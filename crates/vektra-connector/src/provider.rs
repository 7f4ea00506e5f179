//! Connector trait and backend factory.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::TRACING_TARGET;
use crate::chroma::ChromaConnector;
use crate::config::{ConnectorConfig, ConnectorKind};
use crate::error::ConnectorResult;
use crate::pinecone::PineconeConnector;
use crate::qdrant::QdrantConnector;
use crate::types::{NamespaceInfo, RawPage, SimilaritySearch, VectorChunk};
use crate::weaviate::WeaviateConnector;

/// Maximum vectors sent in one upsert request.
pub const UPSERT_BATCH_SIZE: usize = 500;

/// Uniform surface over a remote vector database.
///
/// Namespaces map to whatever partitioning the provider has: Pinecone
/// namespaces, Chroma collections, Qdrant collections, Weaviate classes.
#[async_trait]
pub trait VectorConnector: Send + Sync {
    /// Returns the provider kind.
    fn kind(&self) -> ConnectorKind;

    /// Page size used by the sync engine when walking a namespace.
    fn sync_page_size(&self) -> usize {
        100
    }

    /// Whether whole namespaces can be cloned on this instance.
    fn supports_namespace_clone(&self) -> bool {
        true
    }

    /// Verifies the remote instance is reachable and ready.
    async fn heartbeat(&self) -> ConnectorResult<()>;

    /// Lists all namespaces with their vector counts.
    async fn namespaces(&self) -> ConnectorResult<Vec<NamespaceInfo>>;

    /// Looks up one namespace.
    async fn namespace(&self, name: &str) -> ConnectorResult<Option<NamespaceInfo>>;

    /// Returns true if the namespace exists.
    async fn namespace_exists(&self, name: &str) -> ConnectorResult<bool> {
        Ok(self.namespace(name).await?.is_some())
    }

    /// Creates a namespace sized for `dimensions`-wide vectors.
    async fn create_namespace(&self, name: &str, dimensions: usize) -> ConnectorResult<()>;

    /// Deletes a namespace and everything in it.
    async fn delete_namespace(&self, name: &str) -> ConnectorResult<()>;

    /// Fetches one page of raw vectors from a namespace.
    ///
    /// Pass the previous page's `next_cursor` to continue; `None` starts
    /// a fresh walk.
    async fn raw_get(
        &self,
        namespace: &str,
        page_size: usize,
        cursor: Option<&str>,
    ) -> ConnectorResult<RawPage>;

    /// Writes vectors, batching internally at [`UPSERT_BATCH_SIZE`].
    async fn upsert(&self, namespace: &str, chunks: Vec<VectorChunk>) -> ConnectorResult<()>;

    /// Replaces one vector's values and metadata in place.
    async fn update_vector(&self, namespace: &str, chunk: VectorChunk) -> ConnectorResult<()>;

    /// Deletes vectors by id.
    async fn delete_vectors(&self, namespace: &str, ids: &[String]) -> ConnectorResult<()>;

    /// Fetches metadata for the given vector ids.
    async fn vector_metadata(
        &self,
        namespace: &str,
        ids: &[String],
    ) -> ConnectorResult<HashMap<String, serde_json::Value>>;

    /// Runs a similarity query against a namespace.
    async fn similarity_search(
        &self,
        namespace: &str,
        query: &[f32],
        top_k: usize,
    ) -> ConnectorResult<SimilaritySearch>;
}

/// Builds a connector for the given configuration.
pub async fn connector_for(config: &ConnectorConfig) -> ConnectorResult<Box<dyn VectorConnector>> {
    let connector: Box<dyn VectorConnector> = match config {
        ConnectorConfig::Pinecone(cfg) => Box::new(PineconeConnector::new(cfg).await?),
        ConnectorConfig::Chroma(cfg) => Box::new(ChromaConnector::new(cfg)?),
        ConnectorConfig::Qdrant(cfg) => Box::new(QdrantConnector::new(cfg)?),
        ConnectorConfig::Weaviate(cfg) => Box::new(WeaviateConnector::new(cfg)?),
    };

    tracing::info!(
        target: TRACING_TARGET,
        provider = %config.kind(),
        "Connector initialized"
    );

    Ok(connector)
}
