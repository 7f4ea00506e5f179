//! The shadow store trait.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreResult;
use crate::job::{Job, JobStatus, NewJob};
use crate::rag::{NewRagTest, RagRunReport, RagRunStatus, RagTest, RagTestRun};
use crate::records::{
    Document, DocumentVector, NewDocument, NewDocumentVector, NewNotification, Notification,
    Workspace,
};

/// Abstract relational shadow of remote vector-store state.
///
/// Deletions cascade: removing a workspace removes its documents and their
/// vector rows, preserving the invariant that no orphaned local rows exist.
#[async_trait]
pub trait ShadowStore: Send + Sync {
    // Workspaces

    /// Creates a workspace, de-duplicating the slug within the organization.
    async fn create_workspace(&self, organization_id: Uuid, name: &str) -> StoreResult<Workspace>;

    async fn workspace(&self, id: Uuid) -> StoreResult<Option<Workspace>>;

    async fn workspace_by_slug(
        &self,
        organization_id: Uuid,
        slug: &str,
    ) -> StoreResult<Option<Workspace>>;

    async fn workspaces_for_organization(
        &self,
        organization_id: Uuid,
    ) -> StoreResult<Vec<Workspace>>;

    async fn delete_workspace(&self, id: Uuid) -> StoreResult<()>;

    /// Destructive full wipe used by the sync engine before reseeding.
    async fn delete_all_workspaces(&self, organization_id: Uuid) -> StoreResult<()>;

    // Documents

    async fn create_document(&self, new: NewDocument) -> StoreResult<Document>;

    async fn create_documents(&self, new: Vec<NewDocument>) -> StoreResult<Vec<Document>>;

    async fn document(&self, id: Uuid) -> StoreResult<Option<Document>>;

    async fn document_by_name(
        &self,
        workspace_id: Uuid,
        name: &str,
    ) -> StoreResult<Option<Document>>;

    async fn documents_in_workspace(&self, workspace_id: Uuid) -> StoreResult<Vec<Document>>;

    async fn delete_document(&self, id: Uuid) -> StoreResult<()>;

    // Document vectors

    async fn create_document_vectors(
        &self,
        new: Vec<NewDocumentVector>,
    ) -> StoreResult<Vec<DocumentVector>>;

    async fn vectors_for_document(&self, document_id: Uuid) -> StoreResult<Vec<DocumentVector>>;

    async fn vectors_for_organization(
        &self,
        organization_id: Uuid,
    ) -> StoreResult<Vec<DocumentVector>>;

    async fn delete_vectors_for_document(&self, document_id: Uuid) -> StoreResult<()>;

    // Jobs

    async fn create_job(&self, new: NewJob) -> StoreResult<Job>;

    async fn job(&self, id: Uuid) -> StoreResult<Option<Job>>;

    /// Applies a status transition, rejecting illegal ones.
    async fn update_job(
        &self,
        id: Uuid,
        status: JobStatus,
        result: serde_json::Value,
    ) -> StoreResult<Job>;

    /// Finds a pending job with the given task name for the organization.
    async fn pending_job(
        &self,
        organization_id: Uuid,
        task_name: &str,
    ) -> StoreResult<Option<Job>>;

    async fn jobs_for_organization(&self, organization_id: Uuid) -> StoreResult<Vec<Job>>;

    // RAG tests

    async fn create_rag_test(&self, new: NewRagTest) -> StoreResult<RagTest>;

    async fn rag_test(&self, id: Uuid) -> StoreResult<Option<RagTest>>;

    /// Stamps `last_run` on a test.
    async fn touch_rag_test(&self, id: Uuid) -> StoreResult<()>;

    async fn create_rag_test_run(
        &self,
        test_id: Uuid,
        status: RagRunStatus,
        results: RagRunReport,
    ) -> StoreResult<RagTestRun>;

    async fn update_rag_test_run(
        &self,
        run_id: Uuid,
        status: RagRunStatus,
        results: RagRunReport,
    ) -> StoreResult<RagTestRun>;

    async fn runs_for_test(&self, test_id: Uuid) -> StoreResult<Vec<RagTestRun>>;

    // Notifications

    async fn create_notification(&self, new: NewNotification) -> StoreResult<Notification>;

    async fn notifications_for_organization(
        &self,
        organization_id: Uuid,
    ) -> StoreResult<Vec<Notification>>;
}
