//! Connector configuration types.

use serde::{Deserialize, Serialize};

// Re-export configs from backend modules
pub use crate::chroma::ChromaConfig;
pub use crate::pinecone::PineconeConfig;
pub use crate::qdrant::QdrantConfig;
pub use crate::weaviate::WeaviateConfig;

/// The supported vector database providers.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConnectorKind {
    Pinecone,
    Chroma,
    Qdrant,
    Weaviate,
}

impl ConnectorKind {
    /// Builds the queue task name for a verb, e.g. `qdrant/sync`.
    pub fn task_name(&self, verb: &str) -> String {
        format!("{self}/{verb}")
    }
}

/// Connector backend configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum ConnectorConfig {
    /// Pinecone managed vector database.
    Pinecone(PineconeConfig),
    /// Chroma instance.
    Chroma(ChromaConfig),
    /// Qdrant cluster.
    Qdrant(QdrantConfig),
    /// Weaviate cluster.
    Weaviate(WeaviateConfig),
}

impl ConnectorConfig {
    /// Returns the provider kind.
    pub fn kind(&self) -> ConnectorKind {
        match self {
            Self::Pinecone(_) => ConnectorKind::Pinecone,
            Self::Chroma(_) => ConnectorKind::Chroma,
            Self::Qdrant(_) => ConnectorKind::Qdrant,
            Self::Weaviate(_) => ConnectorKind::Weaviate,
        }
    }
}
