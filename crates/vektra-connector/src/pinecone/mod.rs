//! Pinecone connector backend.

mod backend;
mod config;

pub use backend::PineconeConnector;
pub use config::PineconeConfig;
