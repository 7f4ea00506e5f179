#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod entry;
mod error;
mod key;
mod store;

pub use entry::CacheEntry;
pub use error::{CacheError, CacheResult};
pub use key::cache_key;
pub use store::VectorCache;

/// Tracing target for cache operations.
pub const TRACING_TARGET: &str = "vektra_cache";
