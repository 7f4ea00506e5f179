//! Chroma backend implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use super::ChromaConfig;
use crate::TRACING_TARGET;
use crate::config::ConnectorKind;
use crate::error::{ConnectorError, ConnectorResult};
use crate::provider::{UPSERT_BATCH_SIZE, VectorConnector};
use crate::types::{NamespaceInfo, RawPage, SimilaritySearch, VectorChunk};

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    id: String,
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct GetResponse {
    #[serde(default)]
    ids: Vec<String>,
    #[serde(default)]
    embeddings: Option<Vec<Vec<f32>>>,
    #[serde(default)]
    metadatas: Option<Vec<Option<serde_json::Value>>>,
    #[serde(default)]
    documents: Option<Vec<Option<String>>>,
}

#[derive(Debug, Default, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    ids: Vec<Vec<String>>,
    #[serde(default)]
    metadatas: Vec<Vec<Option<serde_json::Value>>>,
    #[serde(default)]
    documents: Vec<Vec<Option<String>>>,
    #[serde(default)]
    distances: Vec<Vec<f32>>,
}

/// Chroma backend implementation.
pub struct ChromaConnector {
    http: reqwest::Client,
    config: ChromaConfig,
}

impl ChromaConnector {
    /// Creates a new Chroma backend.
    pub fn new(config: &ChromaConfig) -> ConnectorResult<Self> {
        if config.instance_url.is_empty() {
            return Err(ConnectorError::config("instance URL is required"));
        }

        Ok(Self {
            http: reqwest::Client::new(),
            config: config.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{path}", self.config.instance_url)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.http.request(method, self.url(path));
        if let Some((header, value)) = self.config.auth_header() {
            builder = builder.header(header, value);
        }
        builder
    }

    async fn check(response: reqwest::Response, path: &str) -> ConnectorResult<reqwest::Response> {
        let status = response.status();
        match status {
            status if status.is_success() => Ok(response),
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => Err(
                ConnectorError::authentication("instance rejected the auth token"),
            ),
            status => Err(ConnectorError::backend(format!("{path} returned {status}"))),
        }
    }

    /// Resolves a collection's UUID; vector-level routes key on it.
    async fn collection(&self, name: &str) -> ConnectorResult<CollectionInfo> {
        let path = format!("/collections/{name}");
        let response = self.request(reqwest::Method::GET, &path).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ConnectorError::namespace_not_found(name));
        }
        Ok(Self::check(response, &path).await?.json().await?)
    }

    async fn collection_count(&self, id: &str) -> ConnectorResult<u64> {
        let path = format!("/collections/{id}/count");
        let response = self.request(reqwest::Method::GET, &path).send().await?;
        Ok(Self::check(response, &path).await?.json().await?)
    }
}

#[async_trait]
impl VectorConnector for ChromaConnector {
    fn kind(&self) -> ConnectorKind {
        ConnectorKind::Chroma
    }

    async fn heartbeat(&self) -> ConnectorResult<()> {
        let response = self.request(reqwest::Method::GET, "").send().await?;
        Self::check(response, "/api/v1").await?;
        Ok(())
    }

    async fn namespaces(&self) -> ConnectorResult<Vec<NamespaceInfo>> {
        let response = self
            .request(reqwest::Method::GET, "/collections")
            .send()
            .await?;
        let collections: Vec<CollectionInfo> =
            Self::check(response, "/collections").await?.json().await?;

        let mut namespaces = Vec::with_capacity(collections.len());
        for info in collections {
            let count = self.collection_count(&info.id).await.unwrap_or(0);
            namespaces.push(NamespaceInfo::new(info.name, count));
        }
        Ok(namespaces)
    }

    async fn namespace(&self, name: &str) -> ConnectorResult<Option<NamespaceInfo>> {
        let info = match self.collection(name).await {
            Ok(info) => info,
            Err(ConnectorError::NamespaceNotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let count = self.collection_count(&info.id).await?;
        Ok(Some(NamespaceInfo::new(info.name, count)))
    }

    async fn create_namespace(&self, name: &str, _dimensions: usize) -> ConnectorResult<()> {
        // Chroma infers dimensions from the first add.
        let response = self
            .request(reqwest::Method::POST, "/collections")
            .json(&serde_json::json!({ "name": name, "get_or_create": true }))
            .send()
            .await?;
        Self::check(response, "/collections").await?;

        tracing::debug!(
            target: TRACING_TARGET,
            collection = %name,
            "Created Chroma collection"
        );
        Ok(())
    }

    async fn delete_namespace(&self, name: &str) -> ConnectorResult<()> {
        let path = format!("/collections/{name}");
        let response = self.request(reqwest::Method::DELETE, &path).send().await?;
        Self::check(response, &path).await?;
        Ok(())
    }

    async fn raw_get(
        &self,
        namespace: &str,
        page_size: usize,
        cursor: Option<&str>,
    ) -> ConnectorResult<RawPage> {
        let offset: usize = match cursor {
            Some(raw) => raw
                .parse()
                .map_err(|_| ConnectorError::backend(format!("invalid page cursor: {raw}")))?,
            None => 0,
        };

        let info = self.collection(namespace).await?;
        let path = format!("/collections/{}/get", info.id);
        let response = self
            .request(reqwest::Method::POST, &path)
            .json(&serde_json::json!({
                "limit": page_size,
                "offset": offset,
                "include": ["embeddings", "documents", "metadatas"],
            }))
            .send()
            .await?;
        let body: GetResponse = Self::check(response, &path).await?.json().await?;

        let fetched = body.ids.len();
        let embeddings = body.embeddings.unwrap_or_default();
        let metadatas = body.metadatas.unwrap_or_default();
        let documents = body.documents.unwrap_or_default();

        let mut page = RawPage::default();
        for (i, id) in body.ids.into_iter().enumerate() {
            let mut metadata = metadatas
                .get(i)
                .cloned()
                .flatten()
                .unwrap_or_else(|| serde_json::json!({}));
            // Document text lives outside the metadata in Chroma; fold it
            // in so every provider yields the same shape.
            if let Some(Some(text)) = documents.get(i)
                && let Some(map) = metadata.as_object_mut()
            {
                map.entry("text")
                    .or_insert_with(|| serde_json::Value::String(text.clone()));
            }

            page.ids.push(id);
            page.embeddings
                .push(embeddings.get(i).cloned().unwrap_or_default());
            page.metadatas.push(metadata);
        }

        if fetched == page_size {
            page.next_cursor = Some((offset + fetched).to_string());
        }
        Ok(page)
    }

    async fn upsert(&self, namespace: &str, chunks: Vec<VectorChunk>) -> ConnectorResult<()> {
        let info = self.collection(namespace).await?;
        let path = format!("/collections/{}/add", info.id);

        for batch in chunks.chunks(UPSERT_BATCH_SIZE) {
            let documents: Vec<&str> = batch.iter().map(|c| c.text().unwrap_or_default()).collect();
            let body = serde_json::json!({
                "ids": batch.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(),
                "embeddings": batch.iter().map(|c| &c.values).collect::<Vec<_>>(),
                "metadatas": batch.iter().map(|c| &c.metadata).collect::<Vec<_>>(),
                "documents": documents,
            });
            let response = self
                .request(reqwest::Method::POST, &path)
                .json(&body)
                .send()
                .await?;
            Self::check(response, &path).await?;
        }
        Ok(())
    }

    async fn update_vector(&self, namespace: &str, chunk: VectorChunk) -> ConnectorResult<()> {
        let info = self.collection(namespace).await?;
        let path = format!("/collections/{}/update", info.id);
        let body = serde_json::json!({
            "ids": [chunk.id],
            "embeddings": [chunk.values],
            "metadatas": [chunk.metadata],
            "documents": [chunk.text().unwrap_or_default()],
        });
        let response = self
            .request(reqwest::Method::POST, &path)
            .json(&body)
            .send()
            .await?;
        Self::check(response, &path).await?;
        Ok(())
    }

    async fn delete_vectors(&self, namespace: &str, ids: &[String]) -> ConnectorResult<()> {
        let info = self.collection(namespace).await?;
        let path = format!("/collections/{}/delete", info.id);
        let response = self
            .request(reqwest::Method::POST, &path)
            .json(&serde_json::json!({ "ids": ids }))
            .send()
            .await?;
        Self::check(response, &path).await?;
        Ok(())
    }

    async fn vector_metadata(
        &self,
        namespace: &str,
        ids: &[String],
    ) -> ConnectorResult<HashMap<String, serde_json::Value>> {
        let info = self.collection(namespace).await?;
        let path = format!("/collections/{}/get", info.id);
        let response = self
            .request(reqwest::Method::POST, &path)
            .json(&serde_json::json!({
                "ids": ids,
                "include": ["metadatas", "documents"],
            }))
            .send()
            .await?;
        let body: GetResponse = Self::check(response, &path).await?.json().await?;

        let metadatas = body.metadatas.unwrap_or_default();
        let documents = body.documents.unwrap_or_default();

        let mut result = HashMap::with_capacity(body.ids.len());
        for (i, id) in body.ids.into_iter().enumerate() {
            let mut metadata = metadatas
                .get(i)
                .cloned()
                .flatten()
                .unwrap_or_else(|| serde_json::json!({}));
            if let Some(Some(text)) = documents.get(i)
                && let Some(map) = metadata.as_object_mut()
            {
                map.entry("text")
                    .or_insert_with(|| serde_json::Value::String(text.clone()));
            }
            result.insert(id, metadata);
        }
        Ok(result)
    }

    async fn similarity_search(
        &self,
        namespace: &str,
        query: &[f32],
        top_k: usize,
    ) -> ConnectorResult<SimilaritySearch> {
        let info = self.collection(namespace).await?;
        let path = format!("/collections/{}/query", info.id);
        let response = self
            .request(reqwest::Method::POST, &path)
            .json(&serde_json::json!({
                "query_embeddings": [query],
                "n_results": top_k,
                "include": ["metadatas", "documents", "distances"],
            }))
            .send()
            .await?;
        let body: QueryResponse = Self::check(response, &path).await?.json().await?;

        let mut result = SimilaritySearch::default();
        let Some(ids) = body.ids.first() else {
            return Ok(result);
        };
        for (i, id) in ids.iter().enumerate() {
            result.vector_ids.push(id.clone());
            result.context_texts.push(
                body.documents
                    .first()
                    .and_then(|d| d.get(i).cloned().flatten())
                    .unwrap_or_default(),
            );
            result.source_documents.push(
                body.metadatas
                    .first()
                    .and_then(|m| m.get(i).cloned().flatten())
                    .unwrap_or_else(|| serde_json::json!({})),
            );
            result.scores.push(distance_to_score(
                body.distances.first().and_then(|d| d.get(i).copied()),
            ));
        }
        Ok(result)
    }
}

/// Maps a cosine distance to a similarity score in `[0, 1]`.
fn distance_to_score(distance: Option<f32>) -> f32 {
    match distance {
        Some(d) => (1.0 - d).clamp(0.0, 1.0),
        None => 0.0,
    }
}
