//! In-memory shadow store.

use std::collections::HashMap;

use async_trait::async_trait;
use jiff::Timestamp;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::TRACING_TARGET;
use crate::error::{StoreError, StoreResult};
use crate::job::{Job, JobStatus, NewJob};
use crate::rag::{NewRagTest, RagRunReport, RagRunStatus, RagTest, RagTestRun};
use crate::records::{
    Document, DocumentVector, NewDocument, NewDocumentVector, NewNotification, Notification,
    Workspace, slugify,
};
use crate::store::ShadowStore;

#[derive(Default)]
struct Inner {
    workspaces: HashMap<Uuid, Workspace>,
    documents: HashMap<Uuid, Document>,
    vectors: Vec<DocumentVector>,
    jobs: HashMap<Uuid, Job>,
    rag_tests: HashMap<Uuid, RagTest>,
    rag_runs: HashMap<Uuid, RagTestRun>,
    notifications: Vec<Notification>,
}

/// Hash-map backed [`ShadowStore`].
///
/// Safe for concurrent readers/writers; used as the default store and by the
/// test suites.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Inner {
    fn remove_document_cascading(&mut self, document_id: Uuid) {
        self.documents.remove(&document_id);
        self.vectors.retain(|v| v.document_id != document_id);
    }

    fn remove_workspace_cascading(&mut self, workspace_id: Uuid) {
        self.workspaces.remove(&workspace_id);
        let doc_ids: Vec<Uuid> = self
            .documents
            .values()
            .filter(|d| d.workspace_id == workspace_id)
            .map(|d| d.id)
            .collect();
        for id in doc_ids {
            self.remove_document_cascading(id);
        }
    }
}

#[async_trait]
impl ShadowStore for MemoryStore {
    async fn create_workspace(&self, organization_id: Uuid, name: &str) -> StoreResult<Workspace> {
        let mut inner = self.inner.write().await;
        let base = slugify(name);
        let mut slug = base.clone();
        let mut suffix = 2;
        while inner
            .workspaces
            .values()
            .any(|w| w.organization_id == organization_id && w.slug == slug)
        {
            slug = format!("{base}-{suffix}");
            suffix += 1;
        }

        let workspace = Workspace {
            id: Uuid::new_v4(),
            organization_id,
            name: name.to_string(),
            slug,
            created_at: Timestamp::now(),
        };
        inner.workspaces.insert(workspace.id, workspace.clone());

        tracing::debug!(
            target: TRACING_TARGET,
            workspace = %workspace.slug,
            "Created workspace"
        );
        Ok(workspace)
    }

    async fn workspace(&self, id: Uuid) -> StoreResult<Option<Workspace>> {
        Ok(self.inner.read().await.workspaces.get(&id).cloned())
    }

    async fn workspace_by_slug(
        &self,
        organization_id: Uuid,
        slug: &str,
    ) -> StoreResult<Option<Workspace>> {
        Ok(self
            .inner
            .read()
            .await
            .workspaces
            .values()
            .find(|w| w.organization_id == organization_id && w.slug == slug)
            .cloned())
    }

    async fn workspaces_for_organization(
        &self,
        organization_id: Uuid,
    ) -> StoreResult<Vec<Workspace>> {
        let mut workspaces: Vec<Workspace> = self
            .inner
            .read()
            .await
            .workspaces
            .values()
            .filter(|w| w.organization_id == organization_id)
            .cloned()
            .collect();
        workspaces.sort_by_key(|w| w.created_at);
        Ok(workspaces)
    }

    async fn delete_workspace(&self, id: Uuid) -> StoreResult<()> {
        self.inner.write().await.remove_workspace_cascading(id);
        Ok(())
    }

    async fn delete_all_workspaces(&self, organization_id: Uuid) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let ids: Vec<Uuid> = inner
            .workspaces
            .values()
            .filter(|w| w.organization_id == organization_id)
            .map(|w| w.id)
            .collect();
        tracing::debug!(
            target: TRACING_TARGET,
            organization = %organization_id,
            count = ids.len(),
            "Deleting all workspaces for organization"
        );
        for id in ids {
            inner.remove_workspace_cascading(id);
        }
        Ok(())
    }

    async fn create_document(&self, new: NewDocument) -> StoreResult<Document> {
        let document = Document {
            id: Uuid::new_v4(),
            doc_id: new.doc_id,
            workspace_id: new.workspace_id,
            organization_id: new.organization_id,
            name: new.name,
            created_at: Timestamp::now(),
        };
        self.inner
            .write()
            .await
            .documents
            .insert(document.id, document.clone());
        Ok(document)
    }

    async fn create_documents(&self, new: Vec<NewDocument>) -> StoreResult<Vec<Document>> {
        let mut inner = self.inner.write().await;
        let mut created = Vec::with_capacity(new.len());
        for input in new {
            let document = Document {
                id: Uuid::new_v4(),
                doc_id: input.doc_id,
                workspace_id: input.workspace_id,
                organization_id: input.organization_id,
                name: input.name,
                created_at: Timestamp::now(),
            };
            inner.documents.insert(document.id, document.clone());
            created.push(document);
        }
        Ok(created)
    }

    async fn document(&self, id: Uuid) -> StoreResult<Option<Document>> {
        Ok(self.inner.read().await.documents.get(&id).cloned())
    }

    async fn document_by_name(
        &self,
        workspace_id: Uuid,
        name: &str,
    ) -> StoreResult<Option<Document>> {
        Ok(self
            .inner
            .read()
            .await
            .documents
            .values()
            .find(|d| d.workspace_id == workspace_id && d.name == name)
            .cloned())
    }

    async fn documents_in_workspace(&self, workspace_id: Uuid) -> StoreResult<Vec<Document>> {
        let mut documents: Vec<Document> = self
            .inner
            .read()
            .await
            .documents
            .values()
            .filter(|d| d.workspace_id == workspace_id)
            .cloned()
            .collect();
        documents.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.name.cmp(&b.name)));
        Ok(documents)
    }

    async fn delete_document(&self, id: Uuid) -> StoreResult<()> {
        self.inner.write().await.remove_document_cascading(id);
        Ok(())
    }

    async fn create_document_vectors(
        &self,
        new: Vec<NewDocumentVector>,
    ) -> StoreResult<Vec<DocumentVector>> {
        let mut inner = self.inner.write().await;
        let mut created = Vec::with_capacity(new.len());
        for input in new {
            let vector = DocumentVector {
                id: Uuid::new_v4(),
                doc_id: input.doc_id,
                document_id: input.document_id,
                workspace_id: input.workspace_id,
                organization_id: input.organization_id,
                vector_id: input.vector_id,
            };
            inner.vectors.push(vector.clone());
            created.push(vector);
        }
        Ok(created)
    }

    async fn vectors_for_document(&self, document_id: Uuid) -> StoreResult<Vec<DocumentVector>> {
        Ok(self
            .inner
            .read()
            .await
            .vectors
            .iter()
            .filter(|v| v.document_id == document_id)
            .cloned()
            .collect())
    }

    async fn vectors_for_organization(
        &self,
        organization_id: Uuid,
    ) -> StoreResult<Vec<DocumentVector>> {
        Ok(self
            .inner
            .read()
            .await
            .vectors
            .iter()
            .filter(|v| v.organization_id == organization_id)
            .cloned()
            .collect())
    }

    async fn delete_vectors_for_document(&self, document_id: Uuid) -> StoreResult<()> {
        self.inner
            .write()
            .await
            .vectors
            .retain(|v| v.document_id != document_id);
        Ok(())
    }

    async fn create_job(&self, new: NewJob) -> StoreResult<Job> {
        let now = Timestamp::now();
        let job = Job {
            id: Uuid::new_v4(),
            task_name: new.task_name,
            data: new.data,
            status: JobStatus::Pending,
            result: serde_json::json!({}),
            created_by: new.created_by,
            organization_id: new.organization_id,
            created_at: now,
            last_updated_at: now,
        };
        self.inner.write().await.jobs.insert(job.id, job.clone());
        tracing::debug!(
            target: TRACING_TARGET,
            job = %job.id,
            task = %job.task_name,
            "Created job"
        );
        Ok(job)
    }

    async fn job(&self, id: Uuid) -> StoreResult<Option<Job>> {
        Ok(self.inner.read().await.jobs.get(&id).cloned())
    }

    async fn update_job(
        &self,
        id: Uuid,
        status: JobStatus,
        result: serde_json::Value,
    ) -> StoreResult<Job> {
        let mut inner = self.inner.write().await;
        let job = inner
            .jobs
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("job", id))?;

        if !job.can_transition_to(status) {
            return Err(StoreError::illegal_transition(job.status, status));
        }

        job.status = status;
        job.result = result;
        job.last_updated_at = Timestamp::now();
        Ok(job.clone())
    }

    async fn pending_job(
        &self,
        organization_id: Uuid,
        task_name: &str,
    ) -> StoreResult<Option<Job>> {
        Ok(self
            .inner
            .read()
            .await
            .jobs
            .values()
            .find(|j| {
                j.organization_id == organization_id
                    && j.status == JobStatus::Pending
                    && j.task_name == task_name
            })
            .cloned())
    }

    async fn jobs_for_organization(&self, organization_id: Uuid) -> StoreResult<Vec<Job>> {
        let mut jobs: Vec<Job> = self
            .inner
            .read()
            .await
            .jobs
            .values()
            .filter(|j| j.organization_id == organization_id)
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.created_at);
        Ok(jobs)
    }

    async fn create_rag_test(&self, new: NewRagTest) -> StoreResult<RagTest> {
        let test = RagTest {
            id: Uuid::new_v4(),
            organization_id: new.organization_id,
            workspace_id: new.workspace_id,
            query_text: new.query_text,
            query_vector: new.query_vector,
            top_k: new.top_k,
            schedule: new.schedule,
            comparisons: new.comparisons,
            enabled: true,
            last_run: None,
            created_at: Timestamp::now(),
        };
        self.inner
            .write()
            .await
            .rag_tests
            .insert(test.id, test.clone());
        Ok(test)
    }

    async fn rag_test(&self, id: Uuid) -> StoreResult<Option<RagTest>> {
        Ok(self.inner.read().await.rag_tests.get(&id).cloned())
    }

    async fn touch_rag_test(&self, id: Uuid) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let test = inner
            .rag_tests
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("rag_test", id))?;
        test.last_run = Some(Timestamp::now());
        Ok(())
    }

    async fn create_rag_test_run(
        &self,
        test_id: Uuid,
        status: RagRunStatus,
        results: RagRunReport,
    ) -> StoreResult<RagTestRun> {
        let mut inner = self.inner.write().await;
        let test = inner
            .rag_tests
            .get(&test_id)
            .ok_or_else(|| StoreError::not_found("rag_test", test_id))?;

        let run = RagTestRun {
            id: Uuid::new_v4(),
            rag_test_id: test.id,
            organization_id: test.organization_id,
            workspace_id: test.workspace_id,
            status,
            results,
            created_at: Timestamp::now(),
        };
        inner.rag_runs.insert(run.id, run.clone());
        Ok(run)
    }

    async fn update_rag_test_run(
        &self,
        run_id: Uuid,
        status: RagRunStatus,
        results: RagRunReport,
    ) -> StoreResult<RagTestRun> {
        let mut inner = self.inner.write().await;
        let run = inner
            .rag_runs
            .get_mut(&run_id)
            .ok_or_else(|| StoreError::not_found("rag_test_run", run_id))?;
        run.status = status;
        run.results = results;
        Ok(run.clone())
    }

    async fn runs_for_test(&self, test_id: Uuid) -> StoreResult<Vec<RagTestRun>> {
        let mut runs: Vec<RagTestRun> = self
            .inner
            .read()
            .await
            .rag_runs
            .values()
            .filter(|r| r.rag_test_id == test_id)
            .cloned()
            .collect();
        runs.sort_by_key(|r| r.created_at);
        Ok(runs)
    }

    async fn create_notification(&self, new: NewNotification) -> StoreResult<Notification> {
        let notification = Notification {
            id: Uuid::new_v4(),
            organization_id: new.organization_id,
            text_content: new.text_content,
            symbol: new.symbol,
            link: new.link,
            seen: false,
            created_at: Timestamp::now(),
        };
        self.inner
            .write()
            .await
            .notifications
            .push(notification.clone());
        Ok(notification)
    }

    async fn notifications_for_organization(
        &self,
        organization_id: Uuid,
    ) -> StoreResult<Vec<Notification>> {
        Ok(self
            .inner
            .read()
            .await
            .notifications
            .iter()
            .filter(|n| n.organization_id == organization_id)
            .cloned()
            .collect())
    }
}
