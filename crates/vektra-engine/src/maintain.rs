//! Maintenance workflows: new workspace, deletes, organization reset.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;
use vektra_cache::VectorCache;
use vektra_connector::{ConnectorError, VectorConnector};
use vektra_model::{ShadowStore, Workspace};

use crate::TRACING_TARGET;
use crate::error::{EngineError, EngineResult};
use crate::sync::FailedNamespace;

/// Outcome of an organization reset.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResetReport {
    pub workspaces: usize,
    pub documents: usize,
    pub failed: Vec<FailedNamespace>,
}

/// Destructive workspace/document upkeep.
pub struct Maintenance {
    store: Arc<dyn ShadowStore>,
    cache: VectorCache,
}

impl Maintenance {
    /// Creates a maintenance service.
    pub fn new(store: Arc<dyn ShadowStore>, cache: VectorCache) -> Self {
        Self { store, cache }
    }

    /// Creates a workspace locally and its namespace remotely.
    ///
    /// A failed remote creation rolls the local workspace back.
    pub async fn new_workspace(
        &self,
        connector: &dyn VectorConnector,
        organization_id: Uuid,
        name: &str,
        dimensions: usize,
    ) -> EngineResult<Workspace> {
        let workspace = self.store.create_workspace(organization_id, name).await?;

        if let Err(err) = connector.create_namespace(&workspace.name, dimensions).await {
            self.store.delete_workspace(workspace.id).await?;
            return Err(err.into());
        }

        tracing::info!(
            target: TRACING_TARGET,
            workspace = %workspace.slug,
            dimensions,
            "Workspace created"
        );
        Ok(workspace)
    }

    /// Deletes a document remotely (by vector id), locally (cascading its
    /// vector rows) and from the cache.
    pub async fn delete_document(
        &self,
        connector: &dyn VectorConnector,
        workspace: &Workspace,
        document_id: Uuid,
    ) -> EngineResult<()> {
        let document = self
            .store
            .document(document_id)
            .await?
            .ok_or(EngineError::DocumentNotFound(document_id))?;

        let ids: Vec<String> = self
            .store
            .vectors_for_document(document.id)
            .await?
            .into_iter()
            .map(|v| v.vector_id)
            .collect();
        if !ids.is_empty() {
            connector.delete_vectors(&workspace.name, &ids).await?;
        }

        self.store.delete_document(document.id).await?;
        self.cache.delete(workspace.id, &document.name).await?;

        tracing::info!(
            target: TRACING_TARGET,
            document = %document.name,
            workspace = %workspace.slug,
            vectors = ids.len(),
            "Document deleted"
        );
        Ok(())
    }

    /// Deletes a workspace remotely and locally.
    ///
    /// Where the provider cannot drop a whole namespace (starter-tier
    /// Pinecone), every known vector id is deleted explicitly instead.
    pub async fn delete_workspace(
        &self,
        connector: &dyn VectorConnector,
        workspace: &Workspace,
    ) -> EngineResult<usize> {
        let documents = self.store.documents_in_workspace(workspace.id).await?;

        match connector.delete_namespace(&workspace.name).await {
            Ok(()) => {}
            Err(ConnectorError::Unsupported(_)) => {
                let mut ids = Vec::new();
                for document in &documents {
                    ids.extend(
                        self.store
                            .vectors_for_document(document.id)
                            .await?
                            .into_iter()
                            .map(|v| v.vector_id),
                    );
                }
                if !ids.is_empty() {
                    connector.delete_vectors(&workspace.name, &ids).await?;
                }
            }
            Err(err) => return Err(err.into()),
        }

        for document in &documents {
            self.cache.delete(workspace.id, &document.name).await?;
        }
        self.store.delete_workspace(workspace.id).await?;

        tracing::info!(
            target: TRACING_TARGET,
            workspace = %workspace.slug,
            documents = documents.len(),
            "Workspace deleted"
        );
        Ok(documents.len())
    }

    /// Tears down every workspace of an organization, remote and local.
    ///
    /// Per-workspace failures are recorded and the reset keeps going.
    pub async fn reset_organization(
        &self,
        connector: &dyn VectorConnector,
        organization_id: Uuid,
    ) -> EngineResult<ResetReport> {
        let workspaces = self
            .store
            .workspaces_for_organization(organization_id)
            .await?;

        let mut report = ResetReport::default();
        for workspace in workspaces {
            match self.delete_workspace(connector, &workspace).await {
                Ok(documents) => {
                    report.workspaces += 1;
                    report.documents += documents;
                }
                Err(err) => {
                    tracing::error!(
                        target: TRACING_TARGET,
                        workspace = %workspace.slug,
                        error = %err,
                        "Workspace failed to reset"
                    );
                    report.failed.push(FailedNamespace {
                        namespace: workspace.name.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            target: TRACING_TARGET,
            organization = %organization_id,
            workspaces = report.workspaces,
            failed = report.failed.len(),
            "Organization reset"
        );
        Ok(report)
    }
}
