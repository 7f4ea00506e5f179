//! Pinecone backend implementation.
//!
//! Pinecone has no native pagination, so a full namespace walk is done by
//! repeatedly querying with a zero vector while excluding everything already
//! tagged with the current run id, then tagging each fetched vector.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use uuid::Uuid;

use super::PineconeConfig;
use crate::TRACING_TARGET;
use crate::config::ConnectorKind;
use crate::error::{ConnectorError, ConnectorResult};
use crate::provider::{UPSERT_BATCH_SIZE, VectorConnector};
use crate::types::{NamespaceInfo, RawPage, SimilaritySearch, VectorChunk};

/// Fallback embedding width when the controller does not report one.
const DEFAULT_DIMENSIONS: usize = 1536;

/// Starter-tier deletes must go out in id batches of this size.
const STARTER_DELETE_BATCH_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct DescribeIndexResponse {
    #[serde(default)]
    database: DescribeDatabase,
    status: DescribeStatus,
}

#[derive(Debug, Default, Deserialize)]
struct DescribeDatabase {
    #[serde(default)]
    dimension: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct DescribeStatus {
    #[serde(default)]
    ready: bool,
    #[serde(default)]
    host: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IndexStatsResponse {
    #[serde(default)]
    namespaces: HashMap<String, NamespaceStats>,
}

#[derive(Debug, Deserialize)]
struct NamespaceStats {
    #[serde(rename = "vectorCount", default)]
    vector_count: u64,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    values: Vec<f32>,
    #[serde(default)]
    metadata: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct FetchResponse {
    #[serde(default)]
    vectors: HashMap<String, FetchedVector>,
}

#[derive(Debug, Deserialize)]
struct FetchedVector {
    #[serde(default)]
    metadata: serde_json::Value,
}

/// Pinecone backend implementation.
pub struct PineconeConnector {
    http: reqwest::Client,
    config: PineconeConfig,
    host: String,
    dimensions: usize,
}

impl PineconeConnector {
    /// Creates a new Pinecone backend, verifying the index is ready.
    pub async fn new(config: &PineconeConfig) -> ConnectorResult<Self> {
        let http = reqwest::Client::new();
        let described = Self::describe(&http, config).await?;

        if !described.status.ready {
            return Err(ConnectorError::not_ready(format!(
                "index {} is not ready",
                config.index
            )));
        }
        let host = described
            .status
            .host
            .ok_or_else(|| ConnectorError::not_ready("index has no host assigned"))?;

        tracing::debug!(
            target: TRACING_TARGET,
            index = %config.index,
            host = %host,
            "Connected to Pinecone"
        );

        Ok(Self {
            http,
            config: config.clone(),
            host,
            dimensions: described.database.dimension.unwrap_or(DEFAULT_DIMENSIONS),
        })
    }

    /// Returns the index embedding width.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn describe(
        http: &reqwest::Client,
        config: &PineconeConfig,
    ) -> ConnectorResult<DescribeIndexResponse> {
        let response = http
            .get(config.controller_url())
            .header("Api-Key", &config.api_key)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(response.json().await?),
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => Err(
                ConnectorError::authentication("controller rejected the API key"),
            ),
            status => Err(ConnectorError::backend(format!(
                "describe index returned {status}"
            ))),
        }
    }

    fn op_url(&self, path: &str) -> String {
        // The controller usually reports a bare hostname; a host that
        // already carries a scheme is used as-is.
        if self.host.starts_with("http://") || self.host.starts_with("https://") {
            format!("{}{path}", self.host)
        } else {
            format!("https://{}{path}", self.host)
        }
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> ConnectorResult<T> {
        let response = self
            .http
            .post(self.op_url(path))
            .header("Api-Key", &self.config.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConnectorError::backend(format!("{path} returned {status}")));
        }
        Ok(response.json().await?)
    }

    async fn index_stats(&self) -> ConnectorResult<IndexStatsResponse> {
        self.post_json("/describe_index_stats", &serde_json::json!({}))
            .await
    }

    /// Queries with progressive `topK` halving when the response is a 500.
    ///
    /// Oversized metadata can push the response past what Pinecone is
    /// willing to send; halving twice is the fallback before giving up.
    async fn query_with_backoff(
        &self,
        mut body: serde_json::Value,
        top_k: usize,
    ) -> ConnectorResult<QueryResponse> {
        let mut last_err = None;
        for attempt_top_k in backoff_top_ks(top_k) {
            body["topK"] = serde_json::json!(attempt_top_k);
            let response = self
                .http
                .post(self.op_url("/query"))
                .header("Api-Key", &self.config.api_key)
                .json(&body)
                .send()
                .await?;

            let status = response.status();
            if status.is_success() {
                return Ok(response.json().await?);
            }
            if status != reqwest::StatusCode::INTERNAL_SERVER_ERROR {
                return Err(ConnectorError::backend(format!("query returned {status}")));
            }

            tracing::warn!(
                target: TRACING_TARGET,
                top_k = attempt_top_k,
                "Pinecone query overflowed, halving page size"
            );
            last_err = Some(ConnectorError::backend(format!("query returned {status}")));
        }

        Err(last_err.unwrap_or_else(|| ConnectorError::backend("query failed")))
    }

    /// Tags fetched ids with the run id so the next page skips them.
    ///
    /// Individual tag failures are swallowed; a missed tag only means the
    /// vector shows up again on a later page.
    async fn tag_run_id(&self, namespace: &str, ids: &[String], run_id: &str) {
        tracing::debug!(
            target: TRACING_TARGET,
            count = ids.len(),
            run_id = %run_id,
            "Tagging fetched vectors with run id"
        );

        let updates = ids.iter().map(|id| {
            let body = serde_json::json!({
                "id": id,
                "namespace": namespace,
                "setMetadata": { "runId": run_id },
            });
            async move {
                let _ = self
                    .http
                    .post(self.op_url("/vectors/update"))
                    .header("Api-Key", &self.config.api_key)
                    .json(&body)
                    .send()
                    .await;
            }
        });
        join_all(updates).await;
    }
}

#[async_trait]
impl VectorConnector for PineconeConnector {
    fn kind(&self) -> ConnectorKind {
        ConnectorKind::Pinecone
    }

    fn sync_page_size(&self) -> usize {
        1_000
    }

    fn supports_namespace_clone(&self) -> bool {
        !self.config.is_starter_tier()
    }

    async fn heartbeat(&self) -> ConnectorResult<()> {
        let described = Self::describe(&self.http, &self.config).await?;
        if !described.status.ready {
            return Err(ConnectorError::not_ready(format!(
                "index {} is not ready",
                self.config.index
            )));
        }
        Ok(())
    }

    async fn namespaces(&self) -> ConnectorResult<Vec<NamespaceInfo>> {
        let stats = self.index_stats().await?;
        let mut namespaces: Vec<NamespaceInfo> = stats
            .namespaces
            .into_iter()
            .map(|(name, ns)| NamespaceInfo::new(name, ns.vector_count))
            .collect();
        namespaces.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(namespaces)
    }

    async fn namespace(&self, name: &str) -> ConnectorResult<Option<NamespaceInfo>> {
        let stats = self.index_stats().await?;
        Ok(stats
            .namespaces
            .get(name)
            .map(|ns| NamespaceInfo::new(name, ns.vector_count)))
    }

    async fn create_namespace(&self, name: &str, dimensions: usize) -> ConnectorResult<()> {
        // Namespaces materialize on first upsert; only the width can be
        // validated up front.
        if self.config.is_starter_tier() && !name.is_empty() {
            return Err(ConnectorError::unsupported(
                "starter tier indexes do not support namespaces",
            ));
        }
        if dimensions != self.dimensions {
            return Err(ConnectorError::dimension_mismatch(
                self.dimensions,
                dimensions,
            ));
        }
        Ok(())
    }

    async fn delete_namespace(&self, name: &str) -> ConnectorResult<()> {
        if self.config.is_starter_tier() {
            return Err(ConnectorError::unsupported(
                "starter tier indexes do not support deleteAll",
            ));
        }
        let _: serde_json::Value = self
            .post_json(
                "/vectors/delete",
                &serde_json::json!({ "deleteAll": true, "namespace": name }),
            )
            .await?;
        Ok(())
    }

    async fn raw_get(
        &self,
        namespace: &str,
        page_size: usize,
        cursor: Option<&str>,
    ) -> ConnectorResult<RawPage> {
        let run_id = cursor
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let body = serde_json::json!({
            "namespace": namespace,
            "topK": page_size,
            "includeValues": true,
            "includeMetadata": true,
            "vector": vec![0.0f32; self.dimensions],
            "filter": { "runId": { "$ne": run_id } },
        });
        let response = self.query_with_backoff(body, page_size).await?;

        let mut page = RawPage::default();
        for m in response.matches {
            page.ids.push(m.id);
            page.embeddings.push(m.values);
            page.metadatas.push(m.metadata);
        }

        if !page.is_empty() {
            self.tag_run_id(namespace, &page.ids, &run_id).await;
            page.next_cursor = Some(run_id);
        }
        Ok(page)
    }

    async fn upsert(&self, namespace: &str, chunks: Vec<VectorChunk>) -> ConnectorResult<()> {
        for batch in chunks.chunks(UPSERT_BATCH_SIZE) {
            let vectors: Vec<serde_json::Value> = batch
                .iter()
                .map(|c| {
                    serde_json::json!({
                        "id": c.id,
                        "values": c.values,
                        "metadata": c.metadata,
                    })
                })
                .collect();
            let _: serde_json::Value = self
                .post_json(
                    "/vectors/upsert",
                    &serde_json::json!({ "vectors": vectors, "namespace": namespace }),
                )
                .await?;
        }
        Ok(())
    }

    async fn update_vector(&self, namespace: &str, chunk: VectorChunk) -> ConnectorResult<()> {
        let _: serde_json::Value = self
            .post_json(
                "/vectors/update",
                &serde_json::json!({
                    "id": chunk.id,
                    "namespace": namespace,
                    "values": chunk.values,
                    "setMetadata": chunk.metadata,
                }),
            )
            .await?;
        Ok(())
    }

    async fn delete_vectors(&self, namespace: &str, ids: &[String]) -> ConnectorResult<()> {
        if self.config.is_starter_tier() {
            for batch in ids.chunks(STARTER_DELETE_BATCH_SIZE) {
                let _: serde_json::Value = self
                    .post_json("/vectors/delete", &serde_json::json!({ "ids": batch }))
                    .await?;
            }
            return Ok(());
        }

        let _: serde_json::Value = self
            .post_json(
                "/vectors/delete",
                &serde_json::json!({ "ids": ids, "namespace": namespace }),
            )
            .await?;
        Ok(())
    }

    async fn vector_metadata(
        &self,
        namespace: &str,
        ids: &[String],
    ) -> ConnectorResult<HashMap<String, serde_json::Value>> {
        let mut url = format!("{}?namespace={namespace}", self.op_url("/vectors/fetch"));
        for id in ids {
            url.push_str(&format!("&ids={id}"));
        }

        let response = self
            .http
            .get(url)
            .header("Api-Key", &self.config.api_key)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ConnectorError::backend(format!("fetch returned {status}")));
        }

        let fetched: FetchResponse = response.json().await?;
        Ok(fetched
            .vectors
            .into_iter()
            .map(|(id, v)| (id, v.metadata))
            .collect())
    }

    async fn similarity_search(
        &self,
        namespace: &str,
        query: &[f32],
        top_k: usize,
    ) -> ConnectorResult<SimilaritySearch> {
        let body = serde_json::json!({
            "namespace": namespace,
            "vector": query,
            "topK": top_k,
            "includeMetadata": true,
        });
        let response: QueryResponse = self.post_json("/query", &body).await?;

        let mut result = SimilaritySearch::default();
        for m in response.matches {
            let text = m
                .metadata
                .get("text")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            result.context_texts.push(text.to_string());
            result.scores.push(m.score);
            result.source_documents.push(serde_json::json!({
                "id": m.id,
                "score": m.score,
                "metadata": m.metadata,
            }));
            result.vector_ids.push(m.id);
        }
        Ok(result)
    }
}

/// `topK` sizes tried for one page: full, half, quarter.
fn backoff_top_ks(initial: usize) -> [usize; 3] {
    [initial, initial / 2, initial / 4]
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn connector(server: &MockServer) -> PineconeConnector {
        PineconeConnector {
            http: reqwest::Client::new(),
            config: PineconeConfig::new("key", "us-east-1-aws", "idx"),
            host: server.uri(),
            dimensions: 2,
        }
    }

    fn page_of(id: &str) -> serde_json::Value {
        serde_json::json!({
            "matches": [
                { "id": id, "score": 0.0, "values": [0.1, 0.2], "metadata": { "title": "a.txt" } },
            ],
        })
    }

    #[test]
    fn backoff_halves_then_quarters() {
        assert_eq!(backoff_top_ks(1_000), [1_000, 500, 250]);
        assert_eq!(backoff_top_ks(10), [10, 5, 2]);
    }

    #[tokio::test]
    async fn run_id_walk_tags_visited_vectors_and_terminates() {
        let server = MockServer::start().await;

        // Two pages of one match each, then exhaustion.
        Mock::given(method("POST"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_of("v-1")))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_of("v-2")))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "matches": [] })),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/vectors/update"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let connector = connector(&server);

        let first = connector.raw_get("docs", 10, None).await.unwrap();
        assert_eq!(first.ids, vec!["v-1"]);
        let run_id = first.next_cursor.clone().unwrap();

        // The cursor round-trips the run id across pages.
        let second = connector.raw_get("docs", 10, Some(&run_id)).await.unwrap();
        assert_eq!(second.ids, vec!["v-2"]);
        assert_eq!(second.next_cursor.as_deref(), Some(run_id.as_str()));

        let last = connector.raw_get("docs", 10, Some(&run_id)).await.unwrap();
        assert!(last.is_empty());
        assert!(last.next_cursor.is_none());

        let requests = server.received_requests().await.unwrap();

        // Every fetched id was tagged with the run id.
        let tags: Vec<serde_json::Value> = requests
            .iter()
            .filter(|r| r.url.path() == "/vectors/update")
            .map(|r| r.body_json().unwrap())
            .collect();
        assert_eq!(tags.len(), 2);
        assert!(tags.iter().all(|t| t["setMetadata"]["runId"] == run_id.as_str()));

        // Every query after the first excludes the tagged run id.
        let queries: Vec<serde_json::Value> = requests
            .iter()
            .filter(|r| r.url.path() == "/query")
            .map(|r| r.body_json().unwrap())
            .collect();
        assert_eq!(queries.len(), 3);
        assert_eq!(queries[1]["filter"]["runId"]["$ne"], run_id.as_str());
        assert_eq!(queries[2]["filter"]["runId"]["$ne"], run_id.as_str());
    }

    #[tokio::test]
    async fn query_overflow_halves_the_page_size() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_of("v-1")))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/vectors/update"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let page = connector(&server).raw_get("docs", 100, None).await.unwrap();
        assert_eq!(page.ids, vec!["v-1"]);

        let requests = server.received_requests().await.unwrap();
        let top_ks: Vec<u64> = requests
            .iter()
            .filter(|r| r.url.path() == "/query")
            .map(|r| r.body_json::<serde_json::Value>().unwrap()["topK"].as_u64().unwrap())
            .collect();
        assert_eq!(top_ks, vec![100, 50]);
    }
}
