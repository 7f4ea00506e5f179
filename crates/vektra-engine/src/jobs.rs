//! Task names and job submission helpers.

use uuid::Uuid;
use vektra_connector::{ConnectorKind, VectorConnector};
use vektra_model::{Job, NewJob};
use vektra_queue::{JobQueue, QueueError};

use crate::TRACING_TARGET;
use crate::error::EngineResult;

/// Task name building blocks.
///
/// Provider-bound verbs are prefixed via [`ConnectorKind::task_name`]
/// (`qdrant/sync`); the rest are complete task names as written.
pub mod verbs {
    pub const ADD_DOCUMENT: &str = "addDocument";
    pub const UPDATE_EMBEDDING: &str = "updateEmbedding";
    pub const SYNC: &str = "sync";
    pub const SYNC_WORKSPACE: &str = "syncWorkspace";
    pub const CLONE_DOCUMENT: &str = "cloneDocument";
    pub const CLONE_WORKSPACE: &str = "cloneWorkspace";

    pub const WORKSPACE_NEW: &str = "workspace/new";
    pub const WORKSPACE_DELETE: &str = "workspace/delete";
    pub const DOCUMENT_DELETE: &str = "document/delete";
    pub const ORGANIZATION_RESET: &str = "organization/reset";
    pub const ORGANIZATION_MIGRATE: &str = "organization/migrate";
    pub const RAG_TEST_RUN: &str = "rag-test/run";
}

/// Result of a guarded submission: either the enqueued job or the reason
/// nothing was enqueued.
#[derive(Debug, Clone)]
pub struct JobSubmission {
    pub job: Option<Job>,
    pub error: Option<String>,
}

impl JobSubmission {
    fn submitted(job: Job) -> Self {
        Self {
            job: Some(job),
            error: None,
        }
    }

    fn rejected(reason: impl Into<String>) -> Self {
        Self {
            job: None,
            error: Some(reason.into()),
        }
    }
}

/// Submits engine jobs with their payloads and guards.
#[derive(Clone)]
pub struct JobClient {
    queue: JobQueue,
}

impl JobClient {
    /// Creates a job client.
    pub fn new(queue: JobQueue) -> Self {
        Self { queue }
    }

    /// Enqueues a document ingest.
    pub async fn add_document(
        &self,
        kind: ConnectorKind,
        organization_id: Uuid,
        workspace_id: Uuid,
        name: &str,
        text: &str,
    ) -> EngineResult<Job> {
        let job = self
            .queue
            .submit(NewJob::new(
                kind.task_name(verbs::ADD_DOCUMENT),
                serde_json::json!({
                    "workspace_id": workspace_id,
                    "name": name,
                    "text": text,
                }),
                organization_id,
            ))
            .await?;
        Ok(job)
    }

    /// Enqueues a single-vector re-embed.
    pub async fn update_embedding(
        &self,
        kind: ConnectorKind,
        organization_id: Uuid,
        workspace_id: Uuid,
        document_id: Uuid,
        vector_id: &str,
        text: &str,
    ) -> EngineResult<Job> {
        let job = self
            .queue
            .submit(NewJob::new(
                kind.task_name(verbs::UPDATE_EMBEDDING),
                serde_json::json!({
                    "workspace_id": workspace_id,
                    "document_id": document_id,
                    "vector_id": vector_id,
                    "text": text,
                }),
                organization_id,
            ))
            .await?;
        Ok(job)
    }

    /// Enqueues a full organization sync. At most one can be pending.
    pub async fn sync(
        &self,
        kind: ConnectorKind,
        organization_id: Uuid,
    ) -> EngineResult<JobSubmission> {
        self.guarded(NewJob::new(
            kind.task_name(verbs::SYNC),
            serde_json::json!({}),
            organization_id,
        ))
        .await
    }

    /// Enqueues a single-workspace sync.
    pub async fn sync_workspace(
        &self,
        kind: ConnectorKind,
        organization_id: Uuid,
        workspace_id: Uuid,
    ) -> EngineResult<Job> {
        let job = self
            .queue
            .submit(NewJob::new(
                kind.task_name(verbs::SYNC_WORKSPACE),
                serde_json::json!({ "workspace_id": workspace_id }),
                organization_id,
            ))
            .await?;
        Ok(job)
    }

    /// Enqueues a document clone.
    pub async fn clone_document(
        &self,
        kind: ConnectorKind,
        organization_id: Uuid,
        source_workspace_id: Uuid,
        document_id: Uuid,
        dest_workspace_id: Uuid,
    ) -> EngineResult<Job> {
        let job = self
            .queue
            .submit(NewJob::new(
                kind.task_name(verbs::CLONE_DOCUMENT),
                serde_json::json!({
                    "source_workspace_id": source_workspace_id,
                    "document_id": document_id,
                    "dest_workspace_id": dest_workspace_id,
                }),
                organization_id,
            ))
            .await?;
        Ok(job)
    }

    /// Enqueues a workspace clone, unless the connector's tier cannot
    /// clone namespaces at all. Nothing is enqueued for such tiers.
    pub async fn clone_workspace(
        &self,
        connector: &dyn VectorConnector,
        organization_id: Uuid,
        workspace_id: Uuid,
        new_name: &str,
    ) -> EngineResult<JobSubmission> {
        if !connector.supports_namespace_clone() {
            tracing::debug!(
                target: TRACING_TARGET,
                provider = %connector.kind(),
                "Rejecting workspace clone on a tier without namespaces"
            );
            return Ok(JobSubmission::rejected(
                "this vector database tier does not support namespace cloning",
            ));
        }

        let job = self
            .queue
            .submit(NewJob::new(
                connector.kind().task_name(verbs::CLONE_WORKSPACE),
                serde_json::json!({
                    "workspace_id": workspace_id,
                    "new_name": new_name,
                }),
                organization_id,
            ))
            .await?;
        Ok(JobSubmission::submitted(job))
    }

    /// Enqueues a workspace creation.
    pub async fn new_workspace(
        &self,
        organization_id: Uuid,
        name: &str,
        dimensions: usize,
    ) -> EngineResult<Job> {
        let job = self
            .queue
            .submit(NewJob::new(
                verbs::WORKSPACE_NEW,
                serde_json::json!({ "name": name, "dimensions": dimensions }),
                organization_id,
            ))
            .await?;
        Ok(job)
    }

    /// Enqueues a workspace deletion.
    pub async fn delete_workspace(
        &self,
        organization_id: Uuid,
        workspace_id: Uuid,
    ) -> EngineResult<Job> {
        let job = self
            .queue
            .submit(NewJob::new(
                verbs::WORKSPACE_DELETE,
                serde_json::json!({ "workspace_id": workspace_id }),
                organization_id,
            ))
            .await?;
        Ok(job)
    }

    /// Enqueues a document deletion.
    pub async fn delete_document(
        &self,
        organization_id: Uuid,
        workspace_id: Uuid,
        document_id: Uuid,
    ) -> EngineResult<Job> {
        let job = self
            .queue
            .submit(NewJob::new(
                verbs::DOCUMENT_DELETE,
                serde_json::json!({
                    "workspace_id": workspace_id,
                    "document_id": document_id,
                }),
                organization_id,
            ))
            .await?;
        Ok(job)
    }

    /// Enqueues an organization reset. At most one can be pending.
    pub async fn reset_organization(&self, organization_id: Uuid) -> EngineResult<JobSubmission> {
        self.guarded(NewJob::new(
            verbs::ORGANIZATION_RESET,
            serde_json::json!({}),
            organization_id,
        ))
        .await
    }

    /// Enqueues an organization migration. At most one can be pending.
    pub async fn migrate_organization(
        &self,
        source_organization_id: Uuid,
        dest_organization_id: Uuid,
    ) -> EngineResult<JobSubmission> {
        self.guarded(NewJob::new(
            verbs::ORGANIZATION_MIGRATE,
            serde_json::json!({ "dest_organization_id": dest_organization_id }),
            source_organization_id,
        ))
        .await
    }

    /// Enqueues one RAG test run.
    pub async fn run_rag_test(&self, organization_id: Uuid, test_id: Uuid) -> EngineResult<Job> {
        let job = self
            .queue
            .submit(NewJob::new(
                verbs::RAG_TEST_RUN,
                serde_json::json!({ "test_id": test_id }),
                organization_id,
            ))
            .await?;
        Ok(job)
    }

    async fn guarded(&self, new: NewJob) -> EngineResult<JobSubmission> {
        match self.queue.submit_guarded(new).await {
            Ok(job) => Ok(JobSubmission::submitted(job)),
            Err(QueueError::AlreadyPending(task)) => Ok(JobSubmission::rejected(format!(
                "a `{task}` job is already pending for this organization"
            ))),
            Err(err) => Err(err.into()),
        }
    }
}
