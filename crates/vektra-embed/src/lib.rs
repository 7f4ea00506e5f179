#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod embedder;
mod error;
mod splitter;

pub use config::EmbedderConfig;
pub use embedder::{Embedder, MAX_EMBED_BATCH, OpenAiEmbedder};
pub use error::{EmbedError, EmbedResult};
pub use splitter::{ChunkProfile, Splitter};

/// Tracing target for embedding operations.
pub const TRACING_TARGET: &str = "vektra_embed";
