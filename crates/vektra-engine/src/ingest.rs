//! Document ingest: split, embed, upsert, shadow, cache.

use std::sync::Arc;

use uuid::Uuid;
use vektra_cache::{CacheEntry, VectorCache};
use vektra_connector::{ConnectorKind, VectorChunk, VectorConnector};
use vektra_embed::{ChunkProfile, EmbedError, Embedder, MAX_EMBED_BATCH, Splitter};
use vektra_model::{Document, NewDocument, NewDocumentVector, ShadowStore, Workspace};

use crate::TRACING_TARGET;
use crate::error::{EngineError, EngineResult};

/// Outcome of one ingest.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub document: Document,
    /// Chunks embedded and written.
    pub chunks: usize,
    /// Chunks lost to failed embedding batches.
    pub dropped: usize,
    /// True when the document already existed and nothing was written.
    pub skipped: bool,
}

/// Chunk/embed/write pipeline for new documents.
pub struct IngestPipeline {
    store: Arc<dyn ShadowStore>,
    cache: VectorCache,
    embedder: Arc<dyn Embedder>,
}

impl IngestPipeline {
    /// Creates an ingest pipeline.
    pub fn new(
        store: Arc<dyn ShadowStore>,
        cache: VectorCache,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            store,
            cache,
            embedder,
        }
    }

    /// Chunk profile for a provider. Chroma takes wide chunks to keep the
    /// collection small; everything else takes the standard profile.
    pub fn profile_for(kind: ConnectorKind) -> ChunkProfile {
        match kind {
            ConnectorKind::Chroma => ChunkProfile::WIDE,
            _ => ChunkProfile::STANDARD,
        }
    }

    /// Ingests a document into a workspace.
    ///
    /// A document with the same name already in the workspace makes this a
    /// no-op, so re-running an add job cannot duplicate vectors. A batch
    /// that fails to embed drops only its own chunks; if nothing embeds,
    /// the local document row is rolled back and the ingest fails.
    pub async fn add_document(
        &self,
        connector: &dyn VectorConnector,
        workspace: &Workspace,
        name: &str,
        text: &str,
    ) -> EngineResult<IngestReport> {
        if let Some(existing) = self.store.document_by_name(workspace.id, name).await? {
            tracing::info!(
                target: TRACING_TARGET,
                document = %name,
                workspace = %workspace.slug,
                "Document already ingested, skipping"
            );
            return Ok(IngestReport {
                document: existing,
                chunks: 0,
                dropped: 0,
                skipped: true,
            });
        }

        let profile = Self::profile_for(connector.kind());
        let chunks = Splitter::new(profile).split(text)?;
        if chunks.is_empty() {
            return Err(EngineError::EmptyDocument(name.to_string()));
        }

        let document = self
            .store
            .create_document(NewDocument::new(
                workspace.id,
                workspace.organization_id,
                name,
            ))
            .await?;

        let (vectors, dropped) = match self.embed_chunks(name, &chunks).await {
            Ok(embedded) => embedded,
            Err(err) => {
                self.store.delete_document(document.id).await?;
                return Err(err);
            }
        };

        if vectors.is_empty() {
            self.store.delete_document(document.id).await?;
            return Err(EngineError::NothingEmbedded(name.to_string()));
        }

        if let Err(err) = self
            .write_chunks(connector, workspace, &document, &vectors)
            .await
        {
            tracing::error!(
                target: TRACING_TARGET,
                document = %name,
                error = %err,
                "Ingest failed after embedding, rolling back document"
            );
            self.store.delete_document(document.id).await?;
            return Err(err);
        }

        tracing::info!(
            target: TRACING_TARGET,
            document = %name,
            workspace = %workspace.slug,
            chunks = vectors.len(),
            dropped,
            "Document ingested"
        );

        Ok(IngestReport {
            document,
            chunks: vectors.len(),
            dropped,
            skipped: false,
        })
    }

    /// Re-embeds one chunk's replacement text and patches it everywhere:
    /// the remote vector, and the cache entry.
    pub async fn update_embedding(
        &self,
        connector: &dyn VectorConnector,
        workspace: &Workspace,
        document_id: Uuid,
        vector_id: &str,
        new_text: &str,
    ) -> EngineResult<()> {
        let document = self
            .store
            .document(document_id)
            .await?
            .ok_or(EngineError::DocumentNotFound(document_id))?;

        let texts = vec![new_text.to_string()];
        let values = self
            .embedder
            .embed_batch(&texts)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::NothingEmbedded(document.name.clone()))?;

        let ids = vec![vector_id.to_string()];
        let mut metadata = self
            .connector_metadata(connector, &workspace.name, &ids)
            .await?
            .remove(vector_id)
            .unwrap_or_else(|| serde_json::json!({}));
        match &mut metadata {
            serde_json::Value::Object(map) => {
                map.insert("text".into(), serde_json::Value::String(new_text.into()));
            }
            other => *other = serde_json::json!({ "text": new_text }),
        }

        connector
            .update_vector(
                &workspace.name,
                VectorChunk::new(vector_id, values.clone(), metadata),
            )
            .await?;

        let patched = self
            .cache
            .update_entry(workspace.id, &document.name, vector_id, &values, new_text)
            .await?;
        if !patched {
            tracing::warn!(
                target: TRACING_TARGET,
                vector_id = %vector_id,
                document = %document.name,
                "Remote vector updated but cache entry was absent"
            );
        }

        Ok(())
    }

    async fn embed_chunks(
        &self,
        name: &str,
        chunks: &[String],
    ) -> EngineResult<(Vec<VectorChunk>, usize)> {
        let mut vectors = Vec::with_capacity(chunks.len());
        let mut dropped = 0;

        for batch in chunks.chunks(MAX_EMBED_BATCH) {
            match self.embedder.embed_batch(batch).await {
                Ok(embeddings) => {
                    for (text, values) in batch.iter().zip(embeddings) {
                        vectors.push(VectorChunk::new(
                            Uuid::new_v4().to_string(),
                            values,
                            serde_json::json!({ "title": name, "text": text }),
                        ));
                    }
                }
                // Missing credentials fail the whole ingest; a flaky
                // provider call only loses its own batch.
                Err(err @ (EmbedError::NoEmbedderConfigured | EmbedError::Config(_))) => {
                    return Err(err.into());
                }
                Err(err) => {
                    tracing::warn!(
                        target: TRACING_TARGET,
                        document = %name,
                        batch = batch.len(),
                        error = %err,
                        "Embedding batch failed, dropping its chunks"
                    );
                    dropped += batch.len();
                }
            }
        }

        Ok((vectors, dropped))
    }

    async fn write_chunks(
        &self,
        connector: &dyn VectorConnector,
        workspace: &Workspace,
        document: &Document,
        vectors: &[VectorChunk],
    ) -> EngineResult<()> {
        connector.upsert(&workspace.name, vectors.to_vec()).await?;

        let rows = vectors
            .iter()
            .map(|chunk| NewDocumentVector {
                doc_id: document.doc_id,
                document_id: document.id,
                workspace_id: workspace.id,
                organization_id: workspace.organization_id,
                vector_id: chunk.id.clone(),
            })
            .collect();
        self.store.create_document_vectors(rows).await?;

        let entries: Vec<CacheEntry> = vectors
            .iter()
            .map(|chunk| CacheEntry::new(chunk.id.clone(), chunk.values.clone(), chunk.metadata.clone()))
            .collect();
        self.cache
            .put(workspace.id, &document.name, &entries)
            .await?;

        Ok(())
    }

    async fn connector_metadata(
        &self,
        connector: &dyn VectorConnector,
        namespace: &str,
        ids: &[String],
    ) -> EngineResult<std::collections::HashMap<String, serde_json::Value>> {
        Ok(connector.vector_metadata(namespace, ids).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chroma_takes_the_wide_profile() {
        assert_eq!(
            IngestPipeline::profile_for(ConnectorKind::Chroma),
            ChunkProfile::WIDE
        );
        assert_eq!(
            IngestPipeline::profile_for(ConnectorKind::Qdrant),
            ChunkProfile::STANDARD
        );
        assert_eq!(
            IngestPipeline::profile_for(ConnectorKind::Pinecone),
            ChunkProfile::STANDARD
        );
    }
}
