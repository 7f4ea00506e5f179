//! Vector cache over OpenDAL operators.

use opendal::{Operator, services};
use uuid::Uuid;

use crate::TRACING_TARGET;
use crate::entry::CacheEntry;
use crate::error::{CacheError, CacheResult};
use crate::key::cache_key;

/// Document-addressed store of embedded vectors.
///
/// One JSON file per document, named by [`cache_key`]. Writes replace the
/// whole file; partial updates go through [`VectorCache::update_entry`].
#[derive(Debug, Clone)]
pub struct VectorCache {
    operator: Operator,
}

impl VectorCache {
    /// Creates a cache over an existing operator.
    pub fn new(operator: Operator) -> Self {
        Self { operator }
    }

    /// Creates a filesystem-backed cache rooted at `root`.
    pub fn with_fs_root(root: &str) -> CacheResult<Self> {
        let builder = services::Fs::default().root(root);
        let operator = Operator::new(builder)
            .map(|op| op.finish())
            .map_err(|e| CacheError::init(e.to_string()))?;

        tracing::info!(
            target: TRACING_TARGET,
            root = %root,
            "Vector cache initialized"
        );

        Ok(Self { operator })
    }

    /// Creates an in-memory cache.
    pub fn with_memory() -> CacheResult<Self> {
        let operator = Operator::new(services::Memory::default())
            .map(|op| op.finish())
            .map_err(|e| CacheError::init(e.to_string()))?;
        Ok(Self { operator })
    }

    /// Returns true if a cache file exists for the document.
    pub async fn exists(&self, workspace_id: Uuid, document_name: &str) -> CacheResult<bool> {
        let path = cache_key(workspace_id, document_name);
        Ok(self.operator.exists(&path).await?)
    }

    /// Reads the cached entries for a document.
    pub async fn get(
        &self,
        workspace_id: Uuid,
        document_name: &str,
    ) -> CacheResult<Vec<CacheEntry>> {
        let path = cache_key(workspace_id, document_name);
        let data = self.operator.read(&path).await?.to_vec();
        serde_json::from_slice(&data).map_err(|e| CacheError::corrupt(path, e))
    }

    /// Writes the full entry set for a document, replacing any previous file.
    pub async fn put(
        &self,
        workspace_id: Uuid,
        document_name: &str,
        entries: &[CacheEntry],
    ) -> CacheResult<()> {
        let path = cache_key(workspace_id, document_name);
        let data = serde_json::to_vec(entries)?;

        tracing::debug!(
            target: TRACING_TARGET,
            path = %path,
            entries = entries.len(),
            "Writing cache file"
        );

        self.operator.write(&path, data).await?;
        Ok(())
    }

    /// Deletes the cache file for a document, if any.
    pub async fn delete(&self, workspace_id: Uuid, document_name: &str) -> CacheResult<()> {
        let path = cache_key(workspace_id, document_name);
        self.operator.delete(&path).await?;
        Ok(())
    }

    /// Rewrites a single entry's values and `text` metadata in place.
    ///
    /// Returns false when the file exists but holds no entry with the given
    /// vector id.
    pub async fn update_entry(
        &self,
        workspace_id: Uuid,
        document_name: &str,
        vector_db_id: &str,
        values: &[f32],
        text: &str,
    ) -> CacheResult<bool> {
        let mut entries = self.get(workspace_id, document_name).await?;

        let Some(entry) = entries.iter_mut().find(|e| e.vector_db_id == vector_db_id) else {
            tracing::warn!(
                target: TRACING_TARGET,
                vector_id = %vector_db_id,
                document = %document_name,
                "Vector id not present in cache file"
            );
            return Ok(false);
        };

        entry.values = values.to_vec();
        match &mut entry.metadata {
            serde_json::Value::Object(map) => {
                map.insert("text".into(), serde_json::Value::String(text.into()));
            }
            other => {
                *other = serde_json::json!({ "text": text });
            }
        }

        self.put(workspace_id, document_name, &entries).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries() -> Vec<CacheEntry> {
        vec![
            CacheEntry::new("v-1", vec![0.1, 0.2], serde_json::json!({"text": "alpha"})),
            CacheEntry::new("v-2", vec![0.3, 0.4], serde_json::json!({"text": "beta"})),
        ]
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let cache = VectorCache::with_memory().unwrap();
        let ws = Uuid::new_v4();

        assert!(!cache.exists(ws, "doc.txt").await.unwrap());
        cache.put(ws, "doc.txt", &entries()).await.unwrap();
        assert!(cache.exists(ws, "doc.txt").await.unwrap());

        let got = cache.get(ws, "doc.txt").await.unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].vector_db_id, "v-1");
        assert_eq!(got[1].text(), Some("beta"));
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let cache = VectorCache::with_memory().unwrap();
        let err = cache.get(Uuid::new_v4(), "nope.txt").await.unwrap_err();
        assert!(matches!(err, CacheError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_entry_rewrites_values_and_text() {
        let cache = VectorCache::with_memory().unwrap();
        let ws = Uuid::new_v4();
        cache.put(ws, "doc.txt", &entries()).await.unwrap();

        let updated = cache
            .update_entry(ws, "doc.txt", "v-2", &[0.9, 0.9], "gamma")
            .await
            .unwrap();
        assert!(updated);

        let got = cache.get(ws, "doc.txt").await.unwrap();
        assert_eq!(got[1].values, vec![0.9, 0.9]);
        assert_eq!(got[1].text(), Some("gamma"));
        // Untouched sibling entry survives.
        assert_eq!(got[0].text(), Some("alpha"));

        let missing = cache
            .update_entry(ws, "doc.txt", "v-404", &[0.0], "x")
            .await
            .unwrap();
        assert!(!missing);
    }

    #[tokio::test]
    async fn filesystem_root_persists_across_handles() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_str().unwrap();
        let ws = Uuid::new_v4();

        {
            let cache = VectorCache::with_fs_root(root).unwrap();
            cache.put(ws, "doc.txt", &entries()).await.unwrap();
        }

        let reopened = VectorCache::with_fs_root(root).unwrap();
        assert!(reopened.exists(ws, "doc.txt").await.unwrap());
    }
}
