//! Qdrant backend implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::vectors_config::Config as VectorsConfig;
use qdrant_client::qdrant::with_payload_selector::SelectorOptions;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, DeletePointsBuilder, Distance, GetPointsBuilder, PointId, PointStruct,
    ScrollPointsBuilder, SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
};

use super::QdrantConfig;
use crate::TRACING_TARGET;
use crate::config::ConnectorKind;
use crate::error::{ConnectorError, ConnectorResult};
use crate::provider::{UPSERT_BATCH_SIZE, VectorConnector};
use crate::types::{NamespaceInfo, RawPage, SimilaritySearch, VectorChunk};

/// Qdrant backend implementation.
pub struct QdrantConnector {
    client: Qdrant,
    #[allow(dead_code)]
    config: QdrantConfig,
}

impl QdrantConnector {
    /// Creates a new Qdrant backend.
    pub fn new(config: &QdrantConfig) -> ConnectorResult<Self> {
        let client = Qdrant::from_url(&config.cluster_url)
            .api_key(config.api_key.clone())
            .build()
            .map_err(|e| ConnectorError::connection(e.to_string()))?;

        tracing::debug!(
            target: TRACING_TARGET,
            url = %config.cluster_url,
            "Connected to Qdrant"
        );

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    async fn point_count(&self, collection: &str) -> ConnectorResult<u64> {
        let info = self
            .client
            .collection_info(collection)
            .await
            .map_err(|e| ConnectorError::backend(e.to_string()))?;
        Ok(info.result.and_then(|r| r.points_count).unwrap_or(0))
    }

    /// Extracts vector data from Qdrant's VectorsOutput.
    fn extract_vector(vectors: Option<qdrant_client::qdrant::VectorsOutput>) -> Option<Vec<f32>> {
        use qdrant_client::qdrant::vectors_output::VectorsOptions;

        vectors.and_then(|v| match v.vectors_options {
            #[allow(deprecated)]
            Some(VectorsOptions::Vector(vec)) => Some(vec.data),
            _ => None,
        })
    }

    /// Extracts point ID as a string.
    fn extract_point_id(id: Option<PointId>) -> Option<String> {
        use qdrant_client::qdrant::point_id::PointIdOptions;

        match id {
            Some(PointId {
                point_id_options: Some(id),
            }) => match id {
                PointIdOptions::Num(n) => Some(n.to_string()),
                PointIdOptions::Uuid(s) => Some(s),
            },
            _ => None,
        }
    }

    fn parse_point_id(raw: &str) -> PointId {
        match raw.parse::<u64>() {
            Ok(n) => PointId::from(n),
            Err(_) => PointId::from(raw.to_string()),
        }
    }

    fn payload_from_metadata(
        metadata: serde_json::Value,
    ) -> HashMap<String, qdrant_client::qdrant::Value> {
        match metadata {
            serde_json::Value::Object(map) => map
                .into_iter()
                .map(|(k, v)| (k, json_to_qdrant_value(v)))
                .collect(),
            _ => HashMap::new(),
        }
    }

    fn metadata_from_payload(
        payload: HashMap<String, qdrant_client::qdrant::Value>,
    ) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = payload
            .into_iter()
            .map(|(k, v)| (k, qdrant_value_to_json(v)))
            .collect();
        serde_json::Value::Object(map)
    }
}

#[async_trait]
impl VectorConnector for QdrantConnector {
    fn kind(&self) -> ConnectorKind {
        ConnectorKind::Qdrant
    }

    async fn heartbeat(&self) -> ConnectorResult<()> {
        self.client
            .health_check()
            .await
            .map_err(|e| ConnectorError::connection(e.to_string()))?;
        Ok(())
    }

    async fn namespaces(&self) -> ConnectorResult<Vec<NamespaceInfo>> {
        let response = self
            .client
            .list_collections()
            .await
            .map_err(|e| ConnectorError::backend(e.to_string()))?;

        let mut namespaces = Vec::with_capacity(response.collections.len());
        for description in response.collections {
            let count = self.point_count(&description.name).await.unwrap_or(0);
            namespaces.push(NamespaceInfo::new(description.name, count));
        }
        Ok(namespaces)
    }

    async fn namespace(&self, name: &str) -> ConnectorResult<Option<NamespaceInfo>> {
        let exists = self
            .client
            .collection_exists(name)
            .await
            .map_err(|e| ConnectorError::backend(e.to_string()))?;
        if !exists {
            return Ok(None);
        }
        Ok(Some(NamespaceInfo::new(name, self.point_count(name).await?)))
    }

    async fn create_namespace(&self, name: &str, dimensions: usize) -> ConnectorResult<()> {
        if self.namespace_exists(name).await? {
            return Ok(());
        }

        let vectors_config = VectorsConfig::Params(
            VectorParamsBuilder::new(dimensions as u64, Distance::Cosine).build(),
        );
        self.client
            .create_collection(CreateCollectionBuilder::new(name).vectors_config(vectors_config))
            .await
            .map_err(|e| ConnectorError::backend(e.to_string()))?;

        tracing::info!(
            target: TRACING_TARGET,
            collection = %name,
            dimensions = %dimensions,
            "Created Qdrant collection"
        );
        Ok(())
    }

    async fn delete_namespace(&self, name: &str) -> ConnectorResult<()> {
        self.client
            .delete_collection(name)
            .await
            .map_err(|e| ConnectorError::backend(e.to_string()))?;
        Ok(())
    }

    async fn raw_get(
        &self,
        namespace: &str,
        page_size: usize,
        cursor: Option<&str>,
    ) -> ConnectorResult<RawPage> {
        let mut scroll = ScrollPointsBuilder::new(namespace)
            .limit(page_size as u32)
            .with_payload(true)
            .with_vectors(true);
        if let Some(raw) = cursor {
            scroll = scroll.offset(Self::parse_point_id(raw));
        }

        let response = self
            .client
            .scroll(scroll)
            .await
            .map_err(|e| ConnectorError::backend(e.to_string()))?;

        let mut page = RawPage::default();
        for point in response.result {
            let Some(id) = Self::extract_point_id(point.id) else {
                continue;
            };
            page.ids.push(id);
            page.embeddings
                .push(Self::extract_vector(point.vectors).unwrap_or_default());
            page.metadatas.push(Self::metadata_from_payload(point.payload));
        }
        page.next_cursor = Self::extract_point_id(response.next_page_offset);
        Ok(page)
    }

    async fn upsert(&self, namespace: &str, chunks: Vec<VectorChunk>) -> ConnectorResult<()> {
        for batch in chunks.chunks(UPSERT_BATCH_SIZE) {
            let points: Vec<PointStruct> = batch
                .iter()
                .cloned()
                .map(|c| {
                    PointStruct::new(c.id, c.values, Self::payload_from_metadata(c.metadata))
                })
                .collect();

            self.client
                .upsert_points(UpsertPointsBuilder::new(namespace, points))
                .await
                .map_err(|e| ConnectorError::backend(e.to_string()))?;
        }
        Ok(())
    }

    async fn update_vector(&self, namespace: &str, chunk: VectorChunk) -> ConnectorResult<()> {
        // Qdrant upserts replace the whole point.
        self.upsert(namespace, vec![chunk]).await
    }

    async fn delete_vectors(&self, namespace: &str, ids: &[String]) -> ConnectorResult<()> {
        let point_ids: Vec<PointId> = ids.iter().map(|id| Self::parse_point_id(id)).collect();
        self.client
            .delete_points(DeletePointsBuilder::new(namespace).points(point_ids))
            .await
            .map_err(|e| ConnectorError::backend(e.to_string()))?;
        Ok(())
    }

    async fn vector_metadata(
        &self,
        namespace: &str,
        ids: &[String],
    ) -> ConnectorResult<HashMap<String, serde_json::Value>> {
        let point_ids: Vec<PointId> = ids.iter().map(|id| Self::parse_point_id(id)).collect();
        let response = self
            .client
            .get_points(GetPointsBuilder::new(namespace, point_ids).with_payload(true))
            .await
            .map_err(|e| ConnectorError::backend(e.to_string()))?;

        let mut result = HashMap::with_capacity(response.result.len());
        for point in response.result {
            let Some(id) = Self::extract_point_id(point.id) else {
                continue;
            };
            result.insert(id, Self::metadata_from_payload(point.payload));
        }
        Ok(result)
    }

    async fn similarity_search(
        &self,
        namespace: &str,
        query: &[f32],
        top_k: usize,
    ) -> ConnectorResult<SimilaritySearch> {
        let search = SearchPointsBuilder::new(namespace, query.to_vec(), top_k as u64)
            .with_payload(SelectorOptions::Enable(true));
        let response = self
            .client
            .search_points(search)
            .await
            .map_err(|e| ConnectorError::backend(e.to_string()))?;

        let mut result = SimilaritySearch::default();
        for point in response.result {
            let id = Self::extract_point_id(point.id).unwrap_or_default();
            let metadata = Self::metadata_from_payload(point.payload);
            let text = metadata
                .get("text")
                .and_then(|v| v.as_str())
                .unwrap_or_default();

            result.context_texts.push(text.to_string());
            result.scores.push(point.score);
            result.source_documents.push(serde_json::json!({
                "id": id,
                "score": point.score,
                "metadata": metadata,
            }));
            result.vector_ids.push(id);
        }
        Ok(result)
    }
}

/// Converts JSON value to Qdrant value.
fn json_to_qdrant_value(value: serde_json::Value) -> qdrant_client::qdrant::Value {
    use qdrant_client::qdrant::value::Kind;

    let kind = match value {
        serde_json::Value::Null => Kind::NullValue(0),
        serde_json::Value::Bool(b) => Kind::BoolValue(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Kind::IntegerValue(i)
            } else if let Some(f) = n.as_f64() {
                Kind::DoubleValue(f)
            } else {
                Kind::StringValue(n.to_string())
            }
        }
        serde_json::Value::String(s) => Kind::StringValue(s),
        serde_json::Value::Array(arr) => {
            let values: Vec<qdrant_client::qdrant::Value> =
                arr.into_iter().map(json_to_qdrant_value).collect();
            Kind::ListValue(qdrant_client::qdrant::ListValue { values })
        }
        serde_json::Value::Object(obj) => {
            let fields: HashMap<String, qdrant_client::qdrant::Value> = obj
                .into_iter()
                .map(|(k, v)| (k, json_to_qdrant_value(v)))
                .collect();
            Kind::StructValue(qdrant_client::qdrant::Struct { fields })
        }
    };

    qdrant_client::qdrant::Value { kind: Some(kind) }
}

/// Converts Qdrant value to JSON value.
fn qdrant_value_to_json(value: qdrant_client::qdrant::Value) -> serde_json::Value {
    use qdrant_client::qdrant::value::Kind;

    match value.kind {
        Some(Kind::NullValue(_)) => serde_json::Value::Null,
        Some(Kind::BoolValue(b)) => serde_json::Value::Bool(b),
        Some(Kind::IntegerValue(i)) => serde_json::json!(i),
        Some(Kind::DoubleValue(f)) => serde_json::json!(f),
        Some(Kind::StringValue(s)) => serde_json::Value::String(s),
        Some(Kind::ListValue(list)) => {
            let arr: Vec<serde_json::Value> =
                list.values.into_iter().map(qdrant_value_to_json).collect();
            serde_json::Value::Array(arr)
        }
        Some(Kind::StructValue(obj)) => {
            let map: serde_json::Map<String, serde_json::Value> = obj
                .fields
                .into_iter()
                .map(|(k, v)| (k, qdrant_value_to_json(v)))
                .collect();
            serde_json::Value::Object(map)
        }
        None => serde_json::Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_round_trips_through_qdrant_values() {
        let metadata = serde_json::json!({
            "title": "a.txt",
            "loc.lines.from": 1,
            "score": 0.5,
            "tags": ["x", "y"],
            "nested": { "flag": true },
        });

        let payload = QdrantConnector::payload_from_metadata(metadata.clone());
        let restored = QdrantConnector::metadata_from_payload(payload);
        assert_eq!(restored, metadata);
    }

    #[test]
    fn point_ids_parse_numeric_and_uuid() {
        use qdrant_client::qdrant::point_id::PointIdOptions;

        let numeric = QdrantConnector::parse_point_id("42");
        assert!(matches!(
            numeric.point_id_options,
            Some(PointIdOptions::Num(42))
        ));

        let uuid = QdrantConnector::parse_point_id("8d9df1f5-6c8f-4b2a-9d6c-2e1df1f56c8f");
        assert!(matches!(
            uuid.point_id_options,
            Some(PointIdOptions::Uuid(_))
        ));
    }
}
