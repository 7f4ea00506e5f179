//! Qdrant connector backend.

mod backend;
mod config;

pub use backend::QdrantConnector;
pub use config::QdrantConfig;
