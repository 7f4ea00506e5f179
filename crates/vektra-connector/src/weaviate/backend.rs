//! Weaviate backend implementation.
//!
//! Namespaces map to schema classes. Weaviate only accepts capitalized
//! class names, so every namespace is normalized through [`class_name`]
//! before it touches the wire.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use super::WeaviateConfig;
use crate::TRACING_TARGET;
use crate::config::ConnectorKind;
use crate::error::{ConnectorError, ConnectorResult};
use crate::provider::{UPSERT_BATCH_SIZE, VectorConnector};
use crate::types::{NamespaceInfo, RawPage, SimilaritySearch, VectorChunk};

#[derive(Debug, Default, Deserialize)]
struct SchemaResponse {
    #[serde(default)]
    classes: Vec<SchemaClass>,
}

#[derive(Debug, Deserialize)]
struct SchemaClass {
    class: String,
    #[serde(default)]
    properties: Vec<SchemaProperty>,
}

#[derive(Debug, Deserialize)]
struct SchemaProperty {
    name: String,
}

/// Weaviate backend implementation.
pub struct WeaviateConnector {
    http: reqwest::Client,
    config: WeaviateConfig,
}

impl WeaviateConnector {
    /// Creates a new Weaviate backend.
    pub fn new(config: &WeaviateConfig) -> ConnectorResult<Self> {
        if config.cluster_url.is_empty() {
            return Err(ConnectorError::config("cluster URL is required"));
        }

        Ok(Self {
            http: reqwest::Client::new(),
            config: config.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1{path}", self.config.cluster_url)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.http.request(method, self.url(path));
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }
        builder
    }

    async fn check(response: reqwest::Response, path: &str) -> ConnectorResult<reqwest::Response> {
        let status = response.status();
        match status {
            status if status.is_success() => Ok(response),
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => Err(
                ConnectorError::authentication("cluster rejected the API key"),
            ),
            status => Err(ConnectorError::backend(format!("{path} returned {status}"))),
        }
    }

    async fn graphql(&self, query: String) -> ConnectorResult<serde_json::Value> {
        let response = self
            .request(reqwest::Method::POST, "/graphql")
            .json(&serde_json::json!({ "query": query }))
            .send()
            .await?;
        let body: serde_json::Value = Self::check(response, "/graphql").await?.json().await?;

        if let Some(errors) = body.get("errors").and_then(|e| e.as_array())
            && !errors.is_empty()
        {
            return Err(ConnectorError::backend(format!(
                "graphql errors: {}",
                serde_json::Value::Array(errors.clone())
            )));
        }
        Ok(body)
    }

    async fn schema(&self) -> ConnectorResult<SchemaResponse> {
        let response = self.request(reqwest::Method::GET, "/schema").send().await?;
        Ok(Self::check(response, "/schema").await?.json().await?)
    }

    /// Property names of a class, needed to build GraphQL field lists.
    async fn field_names(&self, class: &str) -> ConnectorResult<Vec<String>> {
        let schema = self.schema().await?;
        let class_schema = schema
            .classes
            .into_iter()
            .find(|c| c.class == class)
            .ok_or_else(|| ConnectorError::namespace_not_found(class))?;
        Ok(class_schema.properties.into_iter().map(|p| p.name).collect())
    }

    async fn class_count(&self, class: &str) -> ConnectorResult<Option<u64>> {
        let query = format!("{{ Aggregate {{ {class} {{ meta {{ count }} }} }} }}");
        let body = match self.graphql(query).await {
            Ok(body) => body,
            // Aggregate fails for unknown classes.
            Err(ConnectorError::Backend(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        Ok(body
            .pointer(&format!("/data/Aggregate/{class}/0/meta/count"))
            .and_then(|v| v.as_u64()))
    }
}

#[async_trait]
impl VectorConnector for WeaviateConnector {
    fn kind(&self) -> ConnectorKind {
        ConnectorKind::Weaviate
    }

    async fn heartbeat(&self) -> ConnectorResult<()> {
        let response = self
            .request(reqwest::Method::GET, "/.well-known/live")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ConnectorError::not_ready("cluster is not live"));
        }
        Ok(())
    }

    async fn namespaces(&self) -> ConnectorResult<Vec<NamespaceInfo>> {
        let schema = self.schema().await?;
        let mut namespaces = Vec::with_capacity(schema.classes.len());
        for class in schema.classes {
            let count = self.class_count(&class.class).await?.unwrap_or(0);
            namespaces.push(NamespaceInfo::new(class.class, count));
        }
        Ok(namespaces)
    }

    async fn namespace(&self, name: &str) -> ConnectorResult<Option<NamespaceInfo>> {
        let class = class_name(name);
        Ok(self
            .class_count(&class)
            .await?
            .map(|count| NamespaceInfo::new(class, count)))
    }

    async fn create_namespace(&self, name: &str, _dimensions: usize) -> ConnectorResult<()> {
        let class = class_name(name);
        let response = self
            .request(reqwest::Method::POST, "/schema")
            .json(&serde_json::json!({ "class": class, "vectorizer": "none" }))
            .send()
            .await?;
        Self::check(response, "/schema").await?;

        tracing::debug!(
            target: TRACING_TARGET,
            class = %class,
            "Created Weaviate class"
        );
        Ok(())
    }

    async fn delete_namespace(&self, name: &str) -> ConnectorResult<()> {
        let class = class_name(name);
        let path = format!("/schema/{class}");
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
        let class = class_name(namespace);
        let fields = self.field_names(&class).await?.join(" ");
        let after = cursor
            .map(|id| format!(", after: \"{id}\""))
            .unwrap_or_default();
        let query = format!(
            "{{ Get {{ {class}(limit: {page_size}{after}) {{ {fields} _additional {{ id vector }} }} }} }}"
        );

        let body = self.graphql(query).await?;
        let objects = body
            .pointer(&format!("/data/Get/{class}"))
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        let mut page = RawPage::default();
        for object in objects {
            let serde_json::Value::Object(mut map) = object else {
                continue;
            };
            let additional = map.remove("_additional").unwrap_or_default();
            let Some(id) = additional.get("id").and_then(|v| v.as_str()) else {
                continue;
            };
            let vector: Vec<f32> = additional
                .get("vector")
                .and_then(|v| v.as_array())
                .map(|arr| {
                    arr.iter()
                        .filter_map(|n| n.as_f64())
                        .map(|n| n as f32)
                        .collect()
                })
                .unwrap_or_default();

            page.ids.push(id.to_string());
            page.embeddings.push(vector);
            page.metadatas.push(serde_json::Value::Object(map));
        }

        // The walk stops on the first empty page; the cursor is the last
        // object id seen.
        page.next_cursor = page.ids.last().cloned();
        Ok(page)
    }

    async fn upsert(&self, namespace: &str, chunks: Vec<VectorChunk>) -> ConnectorResult<()> {
        let class = class_name(namespace);
        for batch in chunks.chunks(UPSERT_BATCH_SIZE) {
            let objects: Vec<serde_json::Value> = batch
                .iter()
                .map(|c| {
                    serde_json::json!({
                        "class": class,
                        "id": c.id,
                        "vector": c.values,
                        "properties": c.metadata,
                    })
                })
                .collect();
            let response = self
                .request(reqwest::Method::POST, "/batch/objects")
                .json(&serde_json::json!({ "objects": objects }))
                .send()
                .await?;
            Self::check(response, "/batch/objects").await?;
        }
        Ok(())
    }

    async fn update_vector(&self, namespace: &str, chunk: VectorChunk) -> ConnectorResult<()> {
        let class = class_name(namespace);
        let path = format!("/objects/{class}/{}", chunk.id);
        let body = serde_json::json!({
            "class": class,
            "id": chunk.id,
            "vector": chunk.values,
            "properties": chunk.metadata,
        });
        let response = self
            .request(reqwest::Method::PUT, &path)
            .json(&body)
            .send()
            .await?;
        Self::check(response, &path).await?;
        Ok(())
    }

    async fn delete_vectors(&self, namespace: &str, ids: &[String]) -> ConnectorResult<()> {
        let class = class_name(namespace);
        for id in ids {
            let path = format!("/objects/{class}/{id}");
            let response = self.request(reqwest::Method::DELETE, &path).send().await?;
            if response.status() == reqwest::StatusCode::NOT_FOUND {
                continue;
            }
            Self::check(response, &path).await?;
        }
        Ok(())
    }

    async fn vector_metadata(
        &self,
        namespace: &str,
        ids: &[String],
    ) -> ConnectorResult<HashMap<String, serde_json::Value>> {
        let class = class_name(namespace);
        let mut result = HashMap::with_capacity(ids.len());
        for id in ids {
            let path = format!("/objects/{class}/{id}");
            let response = self.request(reqwest::Method::GET, &path).send().await?;
            if response.status() == reqwest::StatusCode::NOT_FOUND {
                continue;
            }
            let body: serde_json::Value = Self::check(response, &path).await?.json().await?;
            let properties = body
                .get("properties")
                .cloned()
                .unwrap_or_else(|| serde_json::json!({}));
            result.insert(id.clone(), properties);
        }
        Ok(result)
    }

    async fn similarity_search(
        &self,
        namespace: &str,
        query: &[f32],
        top_k: usize,
    ) -> ConnectorResult<SimilaritySearch> {
        let class = class_name(namespace);
        let fields = self.field_names(&class).await?.join(" ");
        let vector = serde_json::to_string(query)?;
        let gql = format!(
            "{{ Get {{ {class}(limit: {top_k}, nearVector: {{ vector: {vector} }}) {{ {fields} _additional {{ id certainty }} }} }} }}"
        );

        let body = self.graphql(gql).await?;
        let objects = body
            .pointer(&format!("/data/Get/{class}"))
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        let mut result = SimilaritySearch::default();
        for object in objects {
            let serde_json::Value::Object(mut map) = object else {
                continue;
            };
            let additional = map.remove("_additional").unwrap_or_default();
            let id = additional
                .get("id")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let score = additional
                .get("certainty")
                .and_then(|v| v.as_f64())
                .unwrap_or_default() as f32;
            let text = map
                .get("text")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();

            result.vector_ids.push(id);
            result.context_texts.push(text);
            result.source_documents.push(serde_json::Value::Object(map));
            result.scores.push(score);
        }
        Ok(result)
    }
}

/// Normalizes a namespace into a Weaviate class name.
///
/// Splits on anything non-alphanumeric and capitalizes each segment, so
/// `my-docs` becomes `MyDocs`.
pub fn class_name(namespace: &str) -> String {
    let mut class = String::with_capacity(namespace.len());
    let mut capitalize = true;
    for c in namespace.chars() {
        if !c.is_ascii_alphanumeric() {
            capitalize = true;
            continue;
        }
        if capitalize {
            class.extend(c.to_uppercase());
            capitalize = false;
        } else {
            class.push(c);
        }
    }
    class
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn class_names_are_pascal_cased() {
        assert_eq!(class_name("my-docs"), "MyDocs");
        assert_eq!(class_name("already"), "Already");
        assert_eq!(class_name("spaced out name"), "SpacedOutName");
        assert_eq!(class_name("snake_case_ns"), "SnakeCaseNs");
    }

    #[tokio::test]
    async fn heartbeat_checks_cluster_liveness() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/.well-known/live"))
            .respond_with(ResponseTemplate::new(200))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/.well-known/live"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let connector = WeaviateConnector::new(&WeaviateConfig::new(server.uri())).unwrap();
        connector.heartbeat().await.unwrap();

        let err = connector.heartbeat().await.unwrap_err();
        assert!(matches!(err, ConnectorError::NotReady(_)));
    }

    #[tokio::test]
    async fn raw_get_walks_objects_with_after_cursor() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/schema"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "classes": [{
                    "class": "MyDocs",
                    "properties": [{ "name": "title" }, { "name": "text" }],
                }],
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "Get": { "MyDocs": [
                    {
                        "title": "a.txt",
                        "text": "alpha",
                        "_additional": { "id": "w-1", "vector": [0.1, 0.2] },
                    },
                ]}},
            })))
            .mount(&server)
            .await;

        let connector = WeaviateConnector::new(&WeaviateConfig::new(server.uri())).unwrap();
        let page = connector.raw_get("my-docs", 10, None).await.unwrap();

        assert_eq!(page.ids, vec!["w-1"]);
        assert_eq!(page.embeddings[0], vec![0.1, 0.2]);
        assert_eq!(page.metadatas[0]["text"], "alpha");
        assert_eq!(page.next_cursor.as_deref(), Some("w-1"));
    }

    #[tokio::test]
    async fn namespaces_come_from_schema_classes() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/schema"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "classes": [{ "class": "Notes", "properties": [] }],
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "Aggregate": { "Notes": [{ "meta": { "count": 7 } }] } },
            })))
            .mount(&server)
            .await;

        let connector = WeaviateConnector::new(&WeaviateConfig::new(server.uri())).unwrap();
        let namespaces = connector.namespaces().await.unwrap();
        assert_eq!(namespaces, vec![NamespaceInfo::new("Notes", 7)]);
    }
}
