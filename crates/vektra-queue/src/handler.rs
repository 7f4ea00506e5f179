//! Job handler trait and outcome types.

use async_trait::async_trait;
use uuid::Uuid;
use vektra_model::JobStatus;

/// Everything a handler gets about the job it is running.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub job_id: Uuid,
    pub organization_id: Uuid,
    /// The payload the job was submitted with.
    pub data: serde_json::Value,
}

/// Terminal verdict of one handler run.
///
/// Constructors only produce terminal states, so a handler cannot leave a
/// job pending by accident.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    status: JobStatus,
    result: serde_json::Value,
}

impl JobOutcome {
    /// A successful run with a human-readable message.
    pub fn complete(message: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Complete,
            result: serde_json::json!({ "message": message.into() }),
        }
    }

    /// A successful run with a full result payload.
    pub fn complete_with(result: serde_json::Value) -> Self {
        Self {
            status: JobStatus::Complete,
            result,
        }
    }

    /// A failed run. `can_retry` marks whether an operator retry could
    /// plausibly succeed.
    pub fn failed(message: impl Into<String>, can_retry: bool) -> Self {
        Self {
            status: JobStatus::Failed,
            result: serde_json::json!({
                "message": message.into(),
                "can_retry": can_retry,
            }),
        }
    }

    /// Returns the terminal status.
    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Returns the result payload.
    pub fn result(&self) -> &serde_json::Value {
        &self.result
    }

    /// Consumes the outcome into its parts.
    pub fn into_parts(self) -> (JobStatus, serde_json::Value) {
        (self.status, self.result)
    }
}

/// Trait for background job handlers.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Task name this handler consumes, e.g. `qdrant/sync`.
    fn task_name(&self) -> &str;

    /// Runs one job to a terminal outcome.
    ///
    /// Handlers report failures through [`JobOutcome::failed`] rather than
    /// panicking; the worker records whatever comes back.
    async fn handle(&self, ctx: JobContext) -> JobOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcomes_are_always_terminal() {
        assert_eq!(JobOutcome::complete("done").status(), JobStatus::Complete);

        let failed = JobOutcome::failed("boom", true);
        assert_eq!(failed.status(), JobStatus::Failed);
        assert_eq!(failed.result()["can_retry"], true);
    }
}
