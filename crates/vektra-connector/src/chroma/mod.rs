//! Chroma connector backend.

mod backend;
mod config;

pub use backend::ChromaConnector;
pub use config::ChromaConfig;
