//! In-memory test doubles for engine workflow tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use vektra_connector::{
    ConnectorError, ConnectorKind, ConnectorResult, NamespaceInfo, RawPage, SimilaritySearch,
    VectorChunk, VectorConnector,
};
use vektra_embed::{EmbedResult, Embedder};

/// Deterministic embedder: four values derived from the text bytes.
pub struct FakeEmbedder;

#[async_trait]
impl Embedder for FakeEmbedder {
    fn dimensions(&self) -> usize {
        4
    }

    async fn embed_batch(&self, texts: &[String]) -> EmbedResult<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let sum: u32 = text.bytes().map(u32::from).sum();
                vec![
                    text.len() as f32,
                    (sum % 97) as f32,
                    (sum % 13) as f32,
                    1.0,
                ]
            })
            .collect())
    }
}

/// In-memory vector database with offset-cursor pagination.
pub struct FakeConnector {
    kind: ConnectorKind,
    supports_clone: bool,
    page_size: usize,
    data: Mutex<HashMap<String, Vec<VectorChunk>>>,
    failing: Mutex<HashSet<String>>,
    canned_search: Mutex<Option<SimilaritySearch>>,
}

impl FakeConnector {
    pub fn new(kind: ConnectorKind) -> Self {
        Self {
            kind,
            supports_clone: true,
            page_size: 2,
            data: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            canned_search: Mutex::new(None),
        }
    }

    pub fn without_namespace_support(kind: ConnectorKind) -> Self {
        Self {
            supports_clone: false,
            ..Self::new(kind)
        }
    }

    pub fn seed(&self, namespace: &str, chunks: Vec<VectorChunk>) {
        self.data.lock().unwrap().insert(namespace.into(), chunks);
    }

    pub fn fail_namespace(&self, namespace: &str) {
        self.failing.lock().unwrap().insert(namespace.into());
    }

    pub fn set_search(&self, search: SimilaritySearch) {
        *self.canned_search.lock().unwrap() = Some(search);
    }

    pub fn vectors_in(&self, namespace: &str) -> Vec<VectorChunk> {
        self.data
            .lock()
            .unwrap()
            .get(namespace)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl VectorConnector for FakeConnector {
    fn kind(&self) -> ConnectorKind {
        self.kind
    }

    fn sync_page_size(&self) -> usize {
        self.page_size
    }

    fn supports_namespace_clone(&self) -> bool {
        self.supports_clone
    }

    async fn heartbeat(&self) -> ConnectorResult<()> {
        Ok(())
    }

    async fn namespaces(&self) -> ConnectorResult<Vec<NamespaceInfo>> {
        let data = self.data.lock().unwrap();
        let mut namespaces: Vec<NamespaceInfo> = data
            .iter()
            .map(|(name, chunks)| NamespaceInfo::new(name.clone(), chunks.len() as u64))
            .collect();
        namespaces.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(namespaces)
    }

    async fn namespace(&self, name: &str) -> ConnectorResult<Option<NamespaceInfo>> {
        let data = self.data.lock().unwrap();
        Ok(data
            .get(name)
            .map(|chunks| NamespaceInfo::new(name, chunks.len() as u64)))
    }

    async fn create_namespace(&self, name: &str, _dimensions: usize) -> ConnectorResult<()> {
        self.data.lock().unwrap().entry(name.into()).or_default();
        Ok(())
    }

    async fn delete_namespace(&self, name: &str) -> ConnectorResult<()> {
        if !self.supports_clone {
            return Err(ConnectorError::unsupported(
                "this tier cannot delete namespaces",
            ));
        }
        self.data.lock().unwrap().remove(name);
        Ok(())
    }

    async fn raw_get(
        &self,
        namespace: &str,
        page_size: usize,
        cursor: Option<&str>,
    ) -> ConnectorResult<RawPage> {
        if self.failing.lock().unwrap().contains(namespace) {
            return Err(ConnectorError::connection("namespace unreachable"));
        }

        let data = self.data.lock().unwrap();
        let chunks = data
            .get(namespace)
            .ok_or_else(|| ConnectorError::namespace_not_found(namespace))?;

        let offset: usize = cursor.map(|c| c.parse().unwrap_or(0)).unwrap_or(0);
        let page: Vec<&VectorChunk> = chunks.iter().skip(offset).take(page_size).collect();
        let next = offset + page.len();

        Ok(RawPage {
            ids: page.iter().map(|c| c.id.clone()).collect(),
            embeddings: page.iter().map(|c| c.values.clone()).collect(),
            metadatas: page.iter().map(|c| c.metadata.clone()).collect(),
            next_cursor: (next < chunks.len()).then(|| next.to_string()),
        })
    }

    async fn upsert(&self, namespace: &str, chunks: Vec<VectorChunk>) -> ConnectorResult<()> {
        let mut data = self.data.lock().unwrap();
        let existing = data.entry(namespace.into()).or_default();
        for chunk in chunks {
            match existing.iter_mut().find(|c| c.id == chunk.id) {
                Some(slot) => *slot = chunk,
                None => existing.push(chunk),
            }
        }
        Ok(())
    }

    async fn update_vector(&self, namespace: &str, chunk: VectorChunk) -> ConnectorResult<()> {
        self.upsert(namespace, vec![chunk]).await
    }

    async fn delete_vectors(&self, namespace: &str, ids: &[String]) -> ConnectorResult<()> {
        let mut data = self.data.lock().unwrap();
        if let Some(chunks) = data.get_mut(namespace) {
            chunks.retain(|c| !ids.contains(&c.id));
        }
        Ok(())
    }

    async fn vector_metadata(
        &self,
        namespace: &str,
        ids: &[String],
    ) -> ConnectorResult<HashMap<String, serde_json::Value>> {
        let data = self.data.lock().unwrap();
        let chunks = data
            .get(namespace)
            .ok_or_else(|| ConnectorError::namespace_not_found(namespace))?;
        Ok(chunks
            .iter()
            .filter(|c| ids.contains(&c.id))
            .map(|c| (c.id.clone(), c.metadata.clone()))
            .collect())
    }

    async fn similarity_search(
        &self,
        _namespace: &str,
        _query: &[f32],
        _top_k: usize,
    ) -> ConnectorResult<SimilaritySearch> {
        Ok(self
            .canned_search
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_default())
    }
}
