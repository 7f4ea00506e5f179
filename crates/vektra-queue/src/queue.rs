//! Durable job queue with an in-process dispatch worker.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use vektra_model::{Job, JobStatus, NewJob, ShadowStore};

use crate::TRACING_TARGET;
use crate::error::{QueueError, QueueResult};
use crate::handler::{JobContext, JobOutcome};
use crate::registry::HandlerRegistry;

/// Submission half of the queue.
///
/// Every submit persists a pending job record before handing the id to the
/// worker, so the job survives even if dispatch never happens.
#[derive(Clone)]
pub struct JobQueue {
    store: Arc<dyn ShadowStore>,
    tx: mpsc::UnboundedSender<Uuid>,
}

/// Dispatch half of the queue.
pub struct JobWorker {
    store: Arc<dyn ShadowStore>,
    registry: Arc<HandlerRegistry>,
    rx: mpsc::UnboundedReceiver<Uuid>,
    cancel_token: CancellationToken,
}

impl JobQueue {
    /// Creates a queue and its worker.
    pub fn new(
        store: Arc<dyn ShadowStore>,
        registry: Arc<HandlerRegistry>,
        cancel_token: CancellationToken,
    ) -> (Self, JobWorker) {
        let (tx, rx) = mpsc::unbounded_channel();
        let queue = Self {
            store: store.clone(),
            tx,
        };
        let worker = JobWorker {
            store,
            registry,
            rx,
            cancel_token,
        };
        (queue, worker)
    }

    /// Persists and dispatches a job.
    pub async fn submit(&self, new: NewJob) -> QueueResult<Job> {
        let job = self.store.create_job(new).await?;

        tracing::info!(
            target: TRACING_TARGET,
            job = %job.id,
            task = %job.task_name,
            "Job submitted"
        );

        self.tx.send(job.id).map_err(|_| QueueError::Closed)?;
        Ok(job)
    }

    /// Submits unless a job with the same task name is already pending for
    /// the organization.
    ///
    /// Structural jobs (sync, reset, migrate) use this so two rebuilds of
    /// the same data cannot interleave.
    pub async fn submit_guarded(&self, new: NewJob) -> QueueResult<Job> {
        if let Some(existing) = self
            .store
            .pending_job(new.organization_id, &new.task_name)
            .await?
        {
            tracing::debug!(
                target: TRACING_TARGET,
                task = %new.task_name,
                existing = %existing.id,
                "Duplicate structural job rejected"
            );
            return Err(QueueError::AlreadyPending(new.task_name));
        }
        self.submit(new).await
    }

    /// Re-runs a failed job by minting a fresh pending job with the same
    /// task and payload. The failed job itself is never mutated.
    pub async fn retry(&self, job_id: Uuid) -> QueueResult<Job> {
        let job = self
            .store
            .job(job_id)
            .await?
            .ok_or(QueueError::JobNotFound(job_id))?;

        if job.status != JobStatus::Failed {
            return Err(QueueError::not_retryable(format!(
                "job is {}, only failed jobs can be retried",
                job.status
            )));
        }
        let can_retry = job
            .result
            .get("can_retry")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if !can_retry {
            return Err(QueueError::not_retryable(
                "job failure was marked permanent",
            ));
        }

        let mut new = NewJob::new(job.task_name, job.data, job.organization_id);
        new.created_by = job.created_by;
        self.submit(new).await
    }

    /// Cancels a pending job by failing it before a worker picks it up.
    pub async fn cancel(&self, job_id: Uuid) -> QueueResult<Job> {
        let job = self
            .store
            .job(job_id)
            .await?
            .ok_or(QueueError::JobNotFound(job_id))?;
        if job.status != JobStatus::Pending {
            return Err(QueueError::NotCancellable);
        }

        let cancelled = self
            .store
            .update_job(
                job_id,
                JobStatus::Failed,
                serde_json::json!({
                    "message": "Job cancelled by operator",
                    "can_retry": false,
                }),
            )
            .await?;
        Ok(cancelled)
    }
}

impl JobWorker {
    /// Spawns the worker as a background task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Runs the dispatch loop until cancelled.
    async fn run(mut self) {
        tracing::info!(target: TRACING_TARGET, "Starting job worker");

        loop {
            tokio::select! {
                biased;

                () = self.cancel_token.cancelled() => {
                    tracing::info!(
                        target: TRACING_TARGET,
                        "Shutdown requested, stopping job worker"
                    );
                    break;
                }

                received = self.rx.recv() => {
                    let Some(job_id) = received else {
                        break;
                    };
                    self.dispatch(job_id).await;
                }
            }
        }
    }

    async fn dispatch(&self, job_id: Uuid) {
        let job = match self.store.job(job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                tracing::warn!(target: TRACING_TARGET, job = %job_id, "Dispatched job not found");
                return;
            }
            Err(err) => {
                tracing::error!(
                    target: TRACING_TARGET,
                    job = %job_id,
                    error = %err,
                    "Failed to load job"
                );
                return;
            }
        };

        // Cancelled (or already handled) jobs are skipped silently.
        if job.status != JobStatus::Pending {
            tracing::debug!(
                target: TRACING_TARGET,
                job = %job.id,
                status = %job.status,
                "Skipping non-pending job"
            );
            return;
        }

        let outcome = match self.registry.get(&job.task_name) {
            Some(handler) => {
                tracing::info!(
                    target: TRACING_TARGET,
                    job = %job.id,
                    task = %job.task_name,
                    "Processing job"
                );
                handler
                    .handle(JobContext {
                        job_id: job.id,
                        organization_id: job.organization_id,
                        data: job.data.clone(),
                    })
                    .await
            }
            None => JobOutcome::failed(
                format!("no handler registered for task `{}`", job.task_name),
                false,
            ),
        };

        let (status, result) = outcome.into_parts();
        match self.store.update_job(job.id, status, result).await {
            Ok(_) => {
                tracing::info!(
                    target: TRACING_TARGET,
                    job = %job.id,
                    status = %status,
                    "Job finished"
                );
            }
            Err(err) => {
                tracing::error!(
                    target: TRACING_TARGET,
                    job = %job.id,
                    error = %err,
                    "Failed to record job outcome"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use vektra_model::MemoryStore;

    use super::*;
    use crate::handler::JobHandler;

    struct EchoHandler;

    #[async_trait]
    impl JobHandler for EchoHandler {
        fn task_name(&self) -> &str {
            "test/echo"
        }

        async fn handle(&self, ctx: JobContext) -> JobOutcome {
            JobOutcome::complete_with(serde_json::json!({ "echoed": ctx.data }))
        }
    }

    struct FlakyHandler;

    #[async_trait]
    impl JobHandler for FlakyHandler {
        fn task_name(&self) -> &str {
            "test/flaky"
        }

        async fn handle(&self, _ctx: JobContext) -> JobOutcome {
            JobOutcome::failed("connection refused", true)
        }
    }

    fn setup(handlers: Vec<Arc<dyn JobHandler>>) -> (JobQueue, Arc<MemoryStore>, CancellationToken) {
        let store = Arc::new(MemoryStore::new());
        let mut registry = HandlerRegistry::new();
        for handler in handlers {
            registry.register(handler);
        }
        let cancel = CancellationToken::new();
        let (queue, worker) = JobQueue::new(store.clone(), Arc::new(registry), cancel.clone());
        worker.spawn();
        (queue, store, cancel)
    }

    async fn wait_terminal(store: &MemoryStore, id: Uuid) -> Job {
        for _ in 0..100 {
            if let Some(job) = store.job(id).await.unwrap()
                && job.status.is_terminal()
            {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job {id} never reached a terminal state");
    }

    #[tokio::test]
    async fn submitted_jobs_run_to_completion() {
        let (queue, store, _cancel) = setup(vec![Arc::new(EchoHandler)]);
        let org = Uuid::new_v4();

        let job = queue
            .submit(NewJob::new("test/echo", serde_json::json!({"n": 1}), org))
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Pending);

        let done = wait_terminal(&store, job.id).await;
        assert_eq!(done.status, JobStatus::Complete);
        assert_eq!(done.result["echoed"]["n"], 1);
    }

    #[tokio::test]
    async fn unknown_tasks_fail_permanently() {
        let (queue, store, _cancel) = setup(vec![]);
        let job = queue
            .submit(NewJob::new(
                "test/ghost",
                serde_json::json!({}),
                Uuid::new_v4(),
            ))
            .await
            .unwrap();

        let done = wait_terminal(&store, job.id).await;
        assert_eq!(done.status, JobStatus::Failed);
        assert_eq!(done.result["can_retry"], false);

        let err = queue.retry(job.id).await.unwrap_err();
        assert!(matches!(err, QueueError::NotRetryable(_)));
    }

    #[tokio::test]
    async fn retry_mints_a_new_pending_job() {
        let (queue, store, _cancel) = setup(vec![Arc::new(FlakyHandler)]);
        let org = Uuid::new_v4();

        let job = queue
            .submit(NewJob::new("test/flaky", serde_json::json!({"x": 2}), org))
            .await
            .unwrap();
        let failed = wait_terminal(&store, job.id).await;
        assert_eq!(failed.status, JobStatus::Failed);

        let retried = queue.retry(job.id).await.unwrap();
        assert_ne!(retried.id, job.id);
        assert_eq!(retried.task_name, "test/flaky");
        assert_eq!(retried.data["x"], 2);

        // The original failed job is untouched.
        let original = store.job(job.id).await.unwrap().unwrap();
        assert_eq!(original.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn guarded_submit_rejects_duplicates() {
        // No handler registered: the first job stays pending long enough to
        // hold the guard. The worker will fail it eventually, after which a
        // new guarded submit is allowed again.
        let (queue, store, cancel) = setup(vec![]);
        cancel.cancel();
        let org = Uuid::new_v4();

        queue
            .submit(NewJob::new("qdrant/sync", serde_json::json!({}), org))
            .await
            .unwrap();

        let err = queue
            .submit_guarded(NewJob::new("qdrant/sync", serde_json::json!({}), org))
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::AlreadyPending(_)));

        // Other organizations and other tasks are unaffected.
        queue
            .submit_guarded(NewJob::new(
                "qdrant/sync",
                serde_json::json!({}),
                Uuid::new_v4(),
            ))
            .await
            .unwrap();
        queue
            .submit_guarded(NewJob::new("chroma/sync", serde_json::json!({}), org))
            .await
            .unwrap();

        drop(store);
    }

    #[tokio::test]
    async fn cancel_only_applies_to_pending_jobs() {
        let (queue, store, cancel) = setup(vec![Arc::new(EchoHandler)]);

        // Stop the worker so the job stays pending.
        cancel.cancel();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let job = queue
            .submit(NewJob::new(
                "test/echo",
                serde_json::json!({}),
                Uuid::new_v4(),
            ))
            .await
            .unwrap();

        let cancelled = queue.cancel(job.id).await.unwrap();
        assert_eq!(cancelled.status, JobStatus::Failed);
        assert_eq!(cancelled.result["can_retry"], false);

        // A terminal job cannot be cancelled again.
        let err = queue.cancel(job.id).await.unwrap_err();
        assert!(matches!(err, QueueError::NotCancellable));

        drop(store);
    }
}
