//! Full and single-namespace sync from a remote store into the shadow.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;
use vektra_cache::{CacheEntry, VectorCache};
use vektra_connector::{VectorChunk, VectorConnector};
use vektra_model::{NewDocument, NewDocumentVector, ShadowStore, Workspace};

use crate::TRACING_TARGET;
use crate::error::{EngineError, EngineResult};

/// Outcome of a sync pass, embedded in the job result.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub workspaces: usize,
    pub documents: usize,
    pub vectors: usize,
    /// Namespaces that errored; the rest of the sync still completed.
    pub failed_to_sync: Vec<FailedNamespace>,
}

/// One namespace that could not be synced.
#[derive(Debug, Clone, Serialize)]
pub struct FailedNamespace {
    pub namespace: String,
    pub reason: String,
}

/// Rebuilds the local shadow from remote namespace walks.
pub struct SyncEngine {
    store: Arc<dyn ShadowStore>,
    cache: VectorCache,
}

impl SyncEngine {
    /// Creates a sync engine.
    pub fn new(store: Arc<dyn ShadowStore>, cache: VectorCache) -> Self {
        Self { store, cache }
    }

    /// Wipes and rebuilds every workspace of an organization from the
    /// remote store.
    ///
    /// Failures are recorded per namespace; one bad namespace never aborts
    /// the others.
    pub async fn sync_all(
        &self,
        connector: &dyn VectorConnector,
        organization_id: Uuid,
    ) -> EngineResult<SyncReport> {
        let namespaces = connector.namespaces().await?;
        if namespaces.is_empty() {
            tracing::info!(
                target: TRACING_TARGET,
                organization = %organization_id,
                "Remote store has no namespaces, nothing to sync"
            );
            return Ok(SyncReport::default());
        }

        self.store.delete_all_workspaces(organization_id).await?;

        let mut report = SyncReport::default();
        for namespace in namespaces {
            let workspace = self
                .store
                .create_workspace(organization_id, &namespace.name)
                .await?;
            report.workspaces += 1;

            if namespace.count == 0 {
                continue;
            }

            match self.sync_into(connector, &workspace).await {
                Ok((documents, vectors)) => {
                    report.documents += documents;
                    report.vectors += vectors;
                }
                Err(err) => {
                    tracing::error!(
                        target: TRACING_TARGET,
                        namespace = %namespace.name,
                        error = %err,
                        "Namespace failed to sync"
                    );
                    report.failed_to_sync.push(FailedNamespace {
                        namespace: namespace.name.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            target: TRACING_TARGET,
            organization = %organization_id,
            workspaces = report.workspaces,
            documents = report.documents,
            vectors = report.vectors,
            failed = report.failed_to_sync.len(),
            "Sync complete"
        );

        Ok(report)
    }

    /// Wipes and rebuilds a single workspace from its remote namespace.
    pub async fn sync_workspace(
        &self,
        connector: &dyn VectorConnector,
        workspace: &Workspace,
    ) -> EngineResult<SyncReport> {
        let namespace = connector
            .namespace(&workspace.name)
            .await?
            .ok_or_else(|| EngineError::NamespaceMissing(workspace.name.clone()))?;

        for document in self.store.documents_in_workspace(workspace.id).await? {
            self.cache.delete(workspace.id, &document.name).await?;
            self.store.delete_document(document.id).await?;
        }

        let mut report = SyncReport {
            workspaces: 1,
            ..SyncReport::default()
        };
        if namespace.count == 0 {
            return Ok(report);
        }

        let (documents, vectors) = self.sync_into(connector, workspace).await?;
        report.documents = documents;
        report.vectors = vectors;
        Ok(report)
    }

    /// Walks a namespace page by page and writes the grouped shadow rows
    /// plus one cache file per document.
    async fn sync_into(
        &self,
        connector: &dyn VectorConnector,
        workspace: &Workspace,
    ) -> EngineResult<(usize, usize)> {
        let page_size = connector.sync_page_size();
        let mut chunks = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = connector
                .raw_get(&workspace.name, page_size, cursor.as_deref())
                .await?;
            let next = page.next_cursor.clone();
            if page.is_empty() {
                break;
            }

            tracing::debug!(
                target: TRACING_TARGET,
                namespace = %workspace.name,
                fetched = page.len(),
                "Fetched raw vector page"
            );
            chunks.extend(page.into_chunks());

            match next {
                Some(token) => cursor = Some(token),
                None => break,
            }
        }

        let groups = group_chunks(chunks);

        let new_documents = groups
            .iter()
            .map(|group| {
                NewDocument::new(workspace.id, workspace.organization_id, &group.name)
            })
            .collect();
        let documents = self.store.create_documents(new_documents).await?;

        let mut rows = Vec::new();
        for (document, group) in documents.iter().zip(&groups) {
            for chunk in &group.chunks {
                rows.push(NewDocumentVector {
                    doc_id: document.doc_id,
                    document_id: document.id,
                    workspace_id: workspace.id,
                    organization_id: workspace.organization_id,
                    vector_id: chunk.id.clone(),
                });
            }

            let entries: Vec<CacheEntry> = group
                .chunks
                .iter()
                .map(|chunk| {
                    CacheEntry::new(chunk.id.clone(), chunk.values.clone(), chunk.metadata.clone())
                })
                .collect();
            self.cache
                .put(workspace.id, &document.name, &entries)
                .await?;
        }

        let vector_count = rows.len();
        self.store.create_document_vectors(rows).await?;
        Ok((documents.len(), vector_count))
    }
}

/// One regrouped document and its chunks, in arrival order.
#[derive(Debug)]
pub(crate) struct DocumentGroup {
    pub name: String,
    pub chunks: Vec<VectorChunk>,
    line_counter: usize,
}

impl DocumentGroup {
    fn new(name: String) -> Self {
        Self {
            name,
            chunks: Vec::new(),
            line_counter: 0,
        }
    }

    /// Appends a chunk, synthesizing `loc.lines` from a running line
    /// counter when the remote metadata has none.
    fn push(&mut self, mut chunk: VectorChunk) {
        if chunk.metadata.get("loc").is_none() {
            let lines = chunk.text().map_or(1, |t| t.lines().count().max(1));
            let from = self.line_counter + 1;
            let to = self.line_counter + lines;
            self.line_counter = to;

            if let serde_json::Value::Object(map) = &mut chunk.metadata {
                map.insert(
                    "loc".into(),
                    serde_json::json!({ "lines": { "from": from, "to": to } }),
                );
            }
        }
        self.chunks.push(chunk);
    }
}

/// Regroups a flat namespace walk into documents.
///
/// Grouping key: `metadata.title`, else `metadata.name`, else a unique
/// synthetic `imported-document-<uuid>.txt` name per untitled chunk.
pub(crate) fn group_chunks(chunks: Vec<VectorChunk>) -> Vec<DocumentGroup> {
    let mut groups: Vec<DocumentGroup> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for chunk in chunks {
        let name = chunk
            .metadata
            .get("title")
            .or_else(|| chunk.metadata.get("name"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("imported-document-{}.txt", Uuid::new_v4()));

        let slot = *index.entry(name.clone()).or_insert_with(|| {
            groups.push(DocumentGroup::new(name));
            groups.len() - 1
        });
        groups[slot].push(chunk);
    }

    groups
}
