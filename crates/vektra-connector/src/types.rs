//! Shared connector data types.

use serde::{Deserialize, Serialize};

/// A remote namespace/collection and its vector count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceInfo {
    pub name: String,
    pub count: u64,
}

impl NamespaceInfo {
    /// Creates a namespace descriptor.
    pub fn new(name: impl Into<String>, count: u64) -> Self {
        Self {
            name: name.into(),
            count,
        }
    }
}

/// One vector with its payload, as written to or read from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorChunk {
    pub id: String,
    pub values: Vec<f32>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl VectorChunk {
    /// Creates a chunk.
    pub fn new(id: impl Into<String>, values: Vec<f32>, metadata: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            values,
            metadata,
        }
    }

    /// Returns the `text` metadata field, if present.
    pub fn text(&self) -> Option<&str> {
        self.metadata.get("text").and_then(|v| v.as_str())
    }
}

/// One page of a raw namespace walk.
///
/// The three vectors are aligned by index. `next_cursor` is an opaque
/// provider-specific token; `None` means the walk is complete.
#[derive(Debug, Clone, Default)]
pub struct RawPage {
    pub ids: Vec<String>,
    pub embeddings: Vec<Vec<f32>>,
    pub metadatas: Vec<serde_json::Value>,
    pub next_cursor: Option<String>,
}

impl RawPage {
    /// Returns the number of vectors in this page.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true if the page carries no vectors.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Consumes the page into aligned [`VectorChunk`]s.
    pub fn into_chunks(self) -> Vec<VectorChunk> {
        self.ids
            .into_iter()
            .zip(self.embeddings)
            .zip(self.metadatas)
            .map(|((id, values), metadata)| VectorChunk {
                id,
                values,
                metadata,
            })
            .collect()
    }
}

/// Result of a similarity query, aligned by index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimilaritySearch {
    pub vector_ids: Vec<String>,
    pub context_texts: Vec<String>,
    pub source_documents: Vec<serde_json::Value>,
    pub scores: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_page_zips_into_chunks() {
        let page = RawPage {
            ids: vec!["a".into(), "b".into()],
            embeddings: vec![vec![0.1], vec![0.2]],
            metadatas: vec![
                serde_json::json!({"text": "one"}),
                serde_json::json!({"text": "two"}),
            ],
            next_cursor: None,
        };

        let chunks = page.into_chunks();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].id, "a");
        assert_eq!(chunks[1].text(), Some("two"));
    }
}
