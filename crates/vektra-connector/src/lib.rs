#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod chroma;
pub mod pinecone;
pub mod qdrant;
pub mod weaviate;

mod config;
mod error;
mod provider;
mod types;

pub use config::{ConnectorConfig, ConnectorKind};
pub use error::{ConnectorError, ConnectorResult};
pub use provider::{UPSERT_BATCH_SIZE, VectorConnector, connector_for};
pub use types::{NamespaceInfo, RawPage, SimilaritySearch, VectorChunk};

/// Tracing target for connector operations.
pub const TRACING_TARGET: &str = "vektra_connector";
