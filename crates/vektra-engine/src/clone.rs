//! Clone and migrate workflows, replayed from the vector cache.
//!
//! Cloning never re-embeds: the cached values and metadata are written to
//! the destination under freshly minted vector ids.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;
use vektra_cache::{CacheEntry, CacheError, VectorCache};
use vektra_connector::{VectorChunk, VectorConnector};
use vektra_model::{Document, NewDocument, NewDocumentVector, ShadowStore, Workspace};

use crate::TRACING_TARGET;
use crate::error::{EngineError, EngineResult};

/// One document left out of a clone, with the reason.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedDocument {
    pub name: String,
    pub reason: String,
}

/// Outcome of a workspace clone.
#[derive(Debug, Clone, Serialize)]
pub struct CloneReport {
    pub workspace: Workspace,
    pub cloned: usize,
    pub skipped: Vec<SkippedDocument>,
}

/// One workspace left out of a migration, with the reason.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedWorkspace {
    pub workspace: String,
    pub reason: String,
}

/// Outcome of an organization migration.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrateReport {
    pub workspaces: usize,
    pub documents: usize,
    pub skipped_workspaces: Vec<SkippedWorkspace>,
    pub skipped_documents: Vec<SkippedDocument>,
}

/// Clones documents and workspaces out of the vector cache.
pub struct CloneEngine {
    store: Arc<dyn ShadowStore>,
    cache: VectorCache,
}

impl CloneEngine {
    /// Creates a clone engine.
    pub fn new(store: Arc<dyn ShadowStore>, cache: VectorCache) -> Self {
        Self { store, cache }
    }

    /// Clones one document into another workspace.
    ///
    /// The cache file is required; a document that was never cached cannot
    /// be cloned and the error is permanent.
    pub async fn clone_document(
        &self,
        connector: &dyn VectorConnector,
        source: &Workspace,
        document: &Document,
        dest: &Workspace,
    ) -> EngineResult<Document> {
        let entries = self.cached_entries(source, &document.name).await?;
        let (cloned, vectors) = self
            .write_clone(connector, dest, &document.name, &entries)
            .await?;

        tracing::info!(
            target: TRACING_TARGET,
            document = %document.name,
            from = %source.slug,
            to = %dest.slug,
            vectors,
            "Document cloned"
        );
        Ok(cloned)
    }

    /// Clones a whole workspace under a new name, creating the remote
    /// namespace on first write.
    ///
    /// Uncached documents are skipped with a logged error; a document that
    /// fails mid-write is rolled back alone. If the workspace itself cannot
    /// be set up, the destination is deleted and the error propagates.
    pub async fn clone_workspace(
        &self,
        connector: &dyn VectorConnector,
        source: &Workspace,
        dest_organization: Uuid,
        new_name: &str,
    ) -> EngineResult<CloneReport> {
        if !connector.supports_namespace_clone() {
            return Err(EngineError::CloneUnsupported);
        }

        let documents = self.store.documents_in_workspace(source.id).await?;
        let dest = self
            .store
            .create_workspace(dest_organization, new_name)
            .await?;

        match self.clone_into(connector, source, &dest, &documents).await {
            Ok((cloned, skipped)) => Ok(CloneReport {
                workspace: dest,
                cloned,
                skipped,
            }),
            Err(err) => {
                tracing::error!(
                    target: TRACING_TARGET,
                    workspace = %new_name,
                    error = %err,
                    "Workspace clone failed, deleting destination"
                );
                self.store.delete_workspace(dest.id).await?;
                Err(err)
            }
        }
    }

    /// Clones every workspace of one organization onto another
    /// organization's vector database.
    pub async fn migrate_organization(
        &self,
        dest_connector: &dyn VectorConnector,
        source_organization: Uuid,
        dest_organization: Uuid,
    ) -> EngineResult<MigrateReport> {
        let workspaces = self
            .store
            .workspaces_for_organization(source_organization)
            .await?;

        let mut report = MigrateReport::default();
        for workspace in workspaces {
            if !dest_connector.supports_namespace_clone() {
                report.skipped_workspaces.push(SkippedWorkspace {
                    workspace: workspace.name.clone(),
                    reason: "destination tier does not support namespaces".into(),
                });
                continue;
            }

            match self
                .clone_workspace(
                    dest_connector,
                    &workspace,
                    dest_organization,
                    &workspace.name,
                )
                .await
            {
                Ok(cloned) => {
                    report.workspaces += 1;
                    report.documents += cloned.cloned;
                    report.skipped_documents.extend(cloned.skipped);
                }
                Err(err) => report.skipped_workspaces.push(SkippedWorkspace {
                    workspace: workspace.name.clone(),
                    reason: err.to_string(),
                }),
            }
        }

        tracing::info!(
            target: TRACING_TARGET,
            from = %source_organization,
            to = %dest_organization,
            workspaces = report.workspaces,
            documents = report.documents,
            "Migration complete"
        );
        Ok(report)
    }

    async fn clone_into(
        &self,
        connector: &dyn VectorConnector,
        source: &Workspace,
        dest: &Workspace,
        documents: &[Document],
    ) -> EngineResult<(usize, Vec<SkippedDocument>)> {
        let mut namespace_ready = connector.namespace_exists(&dest.name).await?;
        let mut cloned = 0;
        let mut skipped = Vec::new();

        for document in documents {
            let entries = match self.cached_entries(source, &document.name).await {
                Ok(entries) => entries,
                Err(err) => {
                    tracing::warn!(
                        target: TRACING_TARGET,
                        document = %document.name,
                        error = %err,
                        "Skipping document without usable cache"
                    );
                    skipped.push(SkippedDocument {
                        name: document.name.clone(),
                        reason: err.to_string(),
                    });
                    continue;
                }
            };

            // The namespace is sized from the first cached vector seen.
            if !namespace_ready {
                let Some(dimensions) = entries.first().map(|e| e.values.len()) else {
                    skipped.push(SkippedDocument {
                        name: document.name.clone(),
                        reason: "cache file holds no vectors".into(),
                    });
                    continue;
                };
                connector.create_namespace(&dest.name, dimensions).await?;
                namespace_ready = true;
            }

            match self
                .write_clone(connector, dest, &document.name, &entries)
                .await
            {
                Ok(_) => cloned += 1,
                Err(err) => skipped.push(SkippedDocument {
                    name: document.name.clone(),
                    reason: err.to_string(),
                }),
            }
        }

        Ok((cloned, skipped))
    }

    /// Reads a document's cache file, mapping a missing file to the
    /// permanent clone error.
    async fn cached_entries(
        &self,
        workspace: &Workspace,
        document_name: &str,
    ) -> EngineResult<Vec<CacheEntry>> {
        match self.cache.get(workspace.id, document_name).await {
            Ok(entries) => Ok(entries),
            Err(CacheError::NotFound(_)) => {
                Err(EngineError::CacheMissing(document_name.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Writes one cloned document: fresh vector ids, remote upsert, shadow
    /// rows, cache file. A failure rolls back the destination document.
    async fn write_clone(
        &self,
        connector: &dyn VectorConnector,
        dest: &Workspace,
        name: &str,
        entries: &[CacheEntry],
    ) -> EngineResult<(Document, usize)> {
        let document = self
            .store
            .create_document(NewDocument::new(dest.id, dest.organization_id, name))
            .await?;

        let fresh: Vec<CacheEntry> = entries
            .iter()
            .map(|entry| {
                CacheEntry::new(
                    Uuid::new_v4().to_string(),
                    entry.values.clone(),
                    entry.metadata.clone(),
                )
            })
            .collect();

        if let Err(err) = self.finish_clone(connector, dest, &document, &fresh).await {
            self.store.delete_document(document.id).await?;
            return Err(err);
        }

        Ok((document, fresh.len()))
    }

    async fn finish_clone(
        &self,
        connector: &dyn VectorConnector,
        dest: &Workspace,
        document: &Document,
        entries: &[CacheEntry],
    ) -> EngineResult<()> {
        let chunks: Vec<VectorChunk> = entries
            .iter()
            .map(|entry| {
                VectorChunk::new(
                    entry.vector_db_id.clone(),
                    entry.values.clone(),
                    entry.metadata.clone(),
                )
            })
            .collect();
        connector.upsert(&dest.name, chunks).await?;

        let rows = entries
            .iter()
            .map(|entry| NewDocumentVector {
                doc_id: document.doc_id,
                document_id: document.id,
                workspace_id: dest.id,
                organization_id: dest.organization_id,
                vector_id: entry.vector_db_id.clone(),
            })
            .collect();
        self.store.create_document_vectors(rows).await?;

        self.cache.put(dest.id, &document.name, entries).await?;
        Ok(())
    }
}
