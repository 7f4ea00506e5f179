//! Cached vector entries.

use serde::{Deserialize, Serialize};

/// One embedded chunk as stored in a document's cache file.
///
/// `metadata` carries whatever the remote store held for the vector,
/// including the `text` key used to rebuild context at query time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The vector id in the remote store at capture time.
    pub vector_db_id: String,
    pub values: Vec<f32>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl CacheEntry {
    /// Creates an entry.
    pub fn new(
        vector_db_id: impl Into<String>,
        values: Vec<f32>,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            vector_db_id: vector_db_id.into(),
            values,
            metadata,
        }
    }

    /// Returns the `text` metadata field, if present.
    pub fn text(&self) -> Option<&str> {
        self.metadata.get("text").and_then(|v| v.as_str())
    }
}
