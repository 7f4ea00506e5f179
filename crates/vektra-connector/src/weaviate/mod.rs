//! Weaviate connector backend.

mod backend;
mod config;

pub use backend::WeaviateConnector;
pub use config::WeaviateConfig;
