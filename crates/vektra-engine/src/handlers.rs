//! Background job handlers for every engine workflow.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;
use vektra_cache::VectorCache;
use vektra_connector::{ConnectorConfig, ConnectorKind, VectorConnector, connector_for};
use vektra_embed::Embedder;
use vektra_model::{ShadowStore, Workspace};
use vektra_queue::{HandlerRegistry, JobContext, JobHandler, JobOutcome};

use crate::TRACING_TARGET;
use crate::clone::CloneEngine;
use crate::drift::{DriftConfig, DriftDetector};
use crate::error::{EngineError, EngineResult};
use crate::ingest::IngestPipeline;
use crate::jobs::verbs;
use crate::maintain::Maintenance;
use crate::sync::SyncEngine;

/// Resolves the connector backing an organization's vector database.
#[async_trait]
pub trait ConnectorResolver: Send + Sync {
    async fn connector(&self, organization_id: Uuid) -> EngineResult<Arc<dyn VectorConnector>>;
}

/// Resolver over a static per-organization configuration map.
#[derive(Debug, Default)]
pub struct ConfigResolver {
    configs: HashMap<Uuid, ConnectorConfig>,
}

impl ConfigResolver {
    /// Creates a resolver from per-organization connector configs.
    pub fn new(configs: HashMap<Uuid, ConnectorConfig>) -> Self {
        Self { configs }
    }
}

#[async_trait]
impl ConnectorResolver for ConfigResolver {
    async fn connector(&self, organization_id: Uuid) -> EngineResult<Arc<dyn VectorConnector>> {
        let config = self
            .configs
            .get(&organization_id)
            .ok_or(EngineError::NoConnector(organization_id))?;
        Ok(Arc::from(connector_for(config).await?))
    }
}

/// Shared dependencies of every job handler.
pub struct EngineContext {
    pub store: Arc<dyn ShadowStore>,
    pub cache: VectorCache,
    pub embedder: Arc<dyn Embedder>,
    pub resolver: Arc<dyn ConnectorResolver>,
    pub drift: DriftConfig,
}

/// One workflow a handler can run.
#[derive(Debug, Clone, Copy)]
enum Op {
    AddDocument,
    UpdateEmbedding,
    Sync,
    SyncWorkspace,
    CloneDocument,
    CloneWorkspace,
    WorkspaceNew,
    WorkspaceDelete,
    DocumentDelete,
    OrganizationReset,
    OrganizationMigrate,
    RagTestRun,
}

/// Dispatches one task name onto its engine workflow.
struct EngineHandler {
    ctx: Arc<EngineContext>,
    task: String,
    op: Op,
}

#[derive(Deserialize)]
struct AddDocumentArgs {
    workspace_id: Uuid,
    name: String,
    text: String,
}

#[derive(Deserialize)]
struct UpdateEmbeddingArgs {
    workspace_id: Uuid,
    document_id: Uuid,
    vector_id: String,
    text: String,
}

#[derive(Deserialize)]
struct WorkspaceArgs {
    workspace_id: Uuid,
}

#[derive(Deserialize)]
struct CloneDocumentArgs {
    source_workspace_id: Uuid,
    document_id: Uuid,
    dest_workspace_id: Uuid,
}

#[derive(Deserialize)]
struct CloneWorkspaceArgs {
    workspace_id: Uuid,
    new_name: String,
}

#[derive(Deserialize)]
struct NewWorkspaceArgs {
    name: String,
    dimensions: usize,
}

#[derive(Deserialize)]
struct DocumentDeleteArgs {
    workspace_id: Uuid,
    document_id: Uuid,
}

#[derive(Deserialize)]
struct MigrateArgs {
    dest_organization_id: Uuid,
}

#[derive(Deserialize)]
struct RagTestArgs {
    test_id: Uuid,
}

#[async_trait]
impl JobHandler for EngineHandler {
    fn task_name(&self) -> &str {
        &self.task
    }

    async fn handle(&self, job: JobContext) -> JobOutcome {
        match self.run(&job).await {
            Ok(outcome) => outcome,
            Err(err) => JobOutcome::failed(err.to_string(), err.can_retry()),
        }
    }
}

impl EngineHandler {
    async fn run(&self, job: &JobContext) -> EngineResult<JobOutcome> {
        match self.op {
            Op::AddDocument => {
                let args: AddDocumentArgs = parse_args(job)?;
                let connector = self.connector(job).await?;
                let workspace = self.workspace(args.workspace_id).await?;

                let report = self
                    .ingest()
                    .add_document(connector.as_ref(), &workspace, &args.name, &args.text)
                    .await?;
                Ok(JobOutcome::complete_with(serde_json::json!({
                    "message": if report.skipped {
                        "Document already present, nothing ingested"
                    } else {
                        "Document ingested"
                    },
                    "document_id": report.document.id,
                    "doc_id": report.document.doc_id,
                    "chunks": report.chunks,
                    "dropped": report.dropped,
                })))
            }
            Op::UpdateEmbedding => {
                let args: UpdateEmbeddingArgs = parse_args(job)?;
                let connector = self.connector(job).await?;
                let workspace = self.workspace(args.workspace_id).await?;

                self.ingest()
                    .update_embedding(
                        connector.as_ref(),
                        &workspace,
                        args.document_id,
                        &args.vector_id,
                        &args.text,
                    )
                    .await?;
                Ok(JobOutcome::complete("Embedding updated"))
            }
            Op::Sync => {
                let connector = self.connector(job).await?;
                let report = self
                    .sync()
                    .sync_all(connector.as_ref(), job.organization_id)
                    .await?;
                Ok(JobOutcome::complete_with(report_json(
                    "Synchronization complete",
                    &report,
                )))
            }
            Op::SyncWorkspace => {
                let args: WorkspaceArgs = parse_args(job)?;
                let connector = self.connector(job).await?;
                let workspace = self.workspace(args.workspace_id).await?;

                let report = self
                    .sync()
                    .sync_workspace(connector.as_ref(), &workspace)
                    .await?;
                Ok(JobOutcome::complete_with(report_json(
                    "Workspace synchronized",
                    &report,
                )))
            }
            Op::CloneDocument => {
                let args: CloneDocumentArgs = parse_args(job)?;
                let connector = self.connector(job).await?;
                let source = self.workspace(args.source_workspace_id).await?;
                let dest = self.workspace(args.dest_workspace_id).await?;
                let document = self
                    .ctx
                    .store
                    .document(args.document_id)
                    .await?
                    .ok_or(EngineError::DocumentNotFound(args.document_id))?;

                let cloned = self
                    .clone_engine()
                    .clone_document(connector.as_ref(), &source, &document, &dest)
                    .await?;
                Ok(JobOutcome::complete_with(serde_json::json!({
                    "message": "Document cloned",
                    "document_id": cloned.id,
                    "doc_id": cloned.doc_id,
                })))
            }
            Op::CloneWorkspace => {
                let args: CloneWorkspaceArgs = parse_args(job)?;
                let connector = self.connector(job).await?;
                let source = self.workspace(args.workspace_id).await?;

                let report = self
                    .clone_engine()
                    .clone_workspace(
                        connector.as_ref(),
                        &source,
                        job.organization_id,
                        &args.new_name,
                    )
                    .await?;
                Ok(JobOutcome::complete_with(report_json(
                    "Workspace cloned",
                    &report,
                )))
            }
            Op::WorkspaceNew => {
                let args: NewWorkspaceArgs = parse_args(job)?;
                let connector = self.connector(job).await?;

                let workspace = self
                    .maintenance()
                    .new_workspace(
                        connector.as_ref(),
                        job.organization_id,
                        &args.name,
                        args.dimensions,
                    )
                    .await?;
                Ok(JobOutcome::complete_with(serde_json::json!({
                    "message": "Workspace created",
                    "workspace_id": workspace.id,
                    "slug": workspace.slug,
                })))
            }
            Op::WorkspaceDelete => {
                let args: WorkspaceArgs = parse_args(job)?;
                let connector = self.connector(job).await?;
                let workspace = self.workspace(args.workspace_id).await?;

                let documents = self
                    .maintenance()
                    .delete_workspace(connector.as_ref(), &workspace)
                    .await?;
                Ok(JobOutcome::complete_with(serde_json::json!({
                    "message": "Workspace deleted",
                    "documents": documents,
                })))
            }
            Op::DocumentDelete => {
                let args: DocumentDeleteArgs = parse_args(job)?;
                let connector = self.connector(job).await?;
                let workspace = self.workspace(args.workspace_id).await?;

                self.maintenance()
                    .delete_document(connector.as_ref(), &workspace, args.document_id)
                    .await?;
                Ok(JobOutcome::complete("Document deleted"))
            }
            Op::OrganizationReset => {
                let connector = self.connector(job).await?;
                let report = self
                    .maintenance()
                    .reset_organization(connector.as_ref(), job.organization_id)
                    .await?;
                Ok(JobOutcome::complete_with(report_json(
                    "Organization reset",
                    &report,
                )))
            }
            Op::OrganizationMigrate => {
                let args: MigrateArgs = parse_args(job)?;
                let dest_connector = self
                    .ctx
                    .resolver
                    .connector(args.dest_organization_id)
                    .await?;

                let report = self
                    .clone_engine()
                    .migrate_organization(
                        dest_connector.as_ref(),
                        job.organization_id,
                        args.dest_organization_id,
                    )
                    .await?;
                Ok(JobOutcome::complete_with(report_json(
                    "Organization migrated",
                    &report,
                )))
            }
            Op::RagTestRun => {
                let args: RagTestArgs = parse_args(job)?;
                let connector = self.connector(job).await?;
                let test = self
                    .ctx
                    .store
                    .rag_test(args.test_id)
                    .await?
                    .ok_or(EngineError::RagTestNotFound(args.test_id))?;

                let detector = DriftDetector::with_config(self.ctx.store.clone(), self.ctx.drift);
                let run = detector.run(connector.as_ref(), &test).await?;
                Ok(JobOutcome::complete_with(serde_json::json!({
                    "message": "RAG test executed",
                    "run_id": run.id,
                    "status": run.status,
                    "findings": run.results.error_log.len(),
                })))
            }
        }
    }

    async fn connector(&self, job: &JobContext) -> EngineResult<Arc<dyn VectorConnector>> {
        self.ctx.resolver.connector(job.organization_id).await
    }

    async fn workspace(&self, id: Uuid) -> EngineResult<Workspace> {
        self.ctx
            .store
            .workspace(id)
            .await?
            .ok_or(EngineError::WorkspaceNotFound(id))
    }

    fn ingest(&self) -> IngestPipeline {
        IngestPipeline::new(
            self.ctx.store.clone(),
            self.ctx.cache.clone(),
            self.ctx.embedder.clone(),
        )
    }

    fn sync(&self) -> SyncEngine {
        SyncEngine::new(self.ctx.store.clone(), self.ctx.cache.clone())
    }

    fn clone_engine(&self) -> CloneEngine {
        CloneEngine::new(self.ctx.store.clone(), self.ctx.cache.clone())
    }

    fn maintenance(&self) -> Maintenance {
        Maintenance::new(self.ctx.store.clone(), self.ctx.cache.clone())
    }
}

fn parse_args<T: DeserializeOwned>(job: &JobContext) -> EngineResult<T> {
    serde_json::from_value(job.data.clone()).map_err(|e| EngineError::InvalidJob(e.to_string()))
}

fn report_json(message: &str, report: &impl serde::Serialize) -> serde_json::Value {
    let mut value = serde_json::to_value(report).unwrap_or_else(|_| serde_json::json!({}));
    if let serde_json::Value::Object(map) = &mut value {
        map.insert(
            "message".into(),
            serde_json::Value::String(message.to_string()),
        );
    }
    value
}

/// Registers every engine workflow under its task names: the six
/// provider-bound verbs for each provider, plus the provider-agnostic
/// tasks.
pub fn register_handlers(registry: &mut HandlerRegistry, ctx: Arc<EngineContext>) {
    const KINDS: [ConnectorKind; 4] = [
        ConnectorKind::Pinecone,
        ConnectorKind::Chroma,
        ConnectorKind::Qdrant,
        ConnectorKind::Weaviate,
    ];
    const PROVIDER_VERBS: [(&str, Op); 6] = [
        (verbs::ADD_DOCUMENT, Op::AddDocument),
        (verbs::UPDATE_EMBEDDING, Op::UpdateEmbedding),
        (verbs::SYNC, Op::Sync),
        (verbs::SYNC_WORKSPACE, Op::SyncWorkspace),
        (verbs::CLONE_DOCUMENT, Op::CloneDocument),
        (verbs::CLONE_WORKSPACE, Op::CloneWorkspace),
    ];
    const GLOBAL_TASKS: [(&str, Op); 6] = [
        (verbs::WORKSPACE_NEW, Op::WorkspaceNew),
        (verbs::WORKSPACE_DELETE, Op::WorkspaceDelete),
        (verbs::DOCUMENT_DELETE, Op::DocumentDelete),
        (verbs::ORGANIZATION_RESET, Op::OrganizationReset),
        (verbs::ORGANIZATION_MIGRATE, Op::OrganizationMigrate),
        (verbs::RAG_TEST_RUN, Op::RagTestRun),
    ];

    for kind in KINDS {
        for (verb, op) in PROVIDER_VERBS {
            registry.register(Arc::new(EngineHandler {
                ctx: ctx.clone(),
                task: kind.task_name(verb),
                op,
            }));
        }
    }
    for (task, op) in GLOBAL_TASKS {
        registry.register(Arc::new(EngineHandler {
            ctx: ctx.clone(),
            task: task.to_string(),
            op,
        }));
    }

    tracing::debug!(
        target: TRACING_TARGET,
        tasks = registry.task_names().len(),
        "Engine job handlers registered"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_provider_and_global_task_is_registered() {
        struct NeverResolve;

        #[async_trait]
        impl ConnectorResolver for NeverResolve {
            async fn connector(
                &self,
                organization_id: Uuid,
            ) -> EngineResult<Arc<dyn VectorConnector>> {
                Err(EngineError::NoConnector(organization_id))
            }
        }

        let ctx = Arc::new(EngineContext {
            store: Arc::new(vektra_model::MemoryStore::new()),
            cache: VectorCache::with_memory().unwrap(),
            embedder: Arc::new(NoEmbedder),
            resolver: Arc::new(NeverResolve),
            drift: DriftConfig::default(),
        });

        let mut registry = HandlerRegistry::new();
        register_handlers(&mut registry, ctx);

        let names = registry.task_names();
        assert_eq!(names.len(), 4 * 6 + 6);
        assert!(names.contains(&"pinecone/addDocument"));
        assert!(names.contains(&"weaviate/cloneWorkspace"));
        assert!(names.contains(&"organization/reset"));
        assert!(names.contains(&"rag-test/run"));
    }

    struct NoEmbedder;

    #[async_trait]
    impl Embedder for NoEmbedder {
        fn dimensions(&self) -> usize {
            0
        }

        async fn embed_batch(&self, _texts: &[String]) -> vektra_embed::EmbedResult<Vec<Vec<f32>>> {
            Err(vektra_embed::EmbedError::NoEmbedderConfigured)
        }
    }
}
