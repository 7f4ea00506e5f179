//! Job records for background processing.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Job execution status.
///
/// Handlers may only move a job from `Pending` to a terminal status. An
/// operator retry never mutates a terminal job; it creates a new pending one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Complete,
    Failed,
}

impl JobStatus {
    /// Returns true for terminal states.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }
}

/// A queued unit of background work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    /// `<provider>/<verb>` or provider-agnostic (`organization/reset`).
    pub task_name: String,
    pub data: serde_json::Value,
    pub status: JobStatus,
    pub result: serde_json::Value,
    pub created_by: Option<Uuid>,
    pub organization_id: Uuid,
    pub created_at: Timestamp,
    pub last_updated_at: Timestamp,
}

impl Job {
    /// Returns true if the transition to `next` is legal for this job.
    ///
    /// `Pending -> Pending` is allowed so long-running handlers can publish
    /// progress into the result payload before finishing.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match self.status {
            JobStatus::Pending => true,
            JobStatus::Complete | JobStatus::Failed => {
                let _ = next;
                false
            }
        }
    }
}

/// Input for creating a job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub task_name: String,
    pub data: serde_json::Value,
    pub organization_id: Uuid,
    pub created_by: Option<Uuid>,
}

impl NewJob {
    /// Creates a job input.
    pub fn new(
        task_name: impl Into<String>,
        data: serde_json::Value,
        organization_id: Uuid,
    ) -> Self {
        Self {
            task_name: task_name.into(),
            data,
            organization_id,
            created_by: None,
        }
    }

    /// Records the requesting user.
    pub fn created_by(mut self, user_id: Uuid) -> Self {
        self.created_by = Some(user_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_with_status(status: JobStatus) -> Job {
        Job {
            id: Uuid::new_v4(),
            task_name: "qdrant/sync".into(),
            data: serde_json::json!({}),
            status,
            result: serde_json::json!({}),
            created_by: None,
            organization_id: Uuid::new_v4(),
            created_at: Timestamp::now(),
            last_updated_at: Timestamp::now(),
        }
    }

    #[test]
    fn pending_can_reach_terminal_states() {
        let job = job_with_status(JobStatus::Pending);
        assert!(job.can_transition_to(JobStatus::Complete));
        assert!(job.can_transition_to(JobStatus::Failed));
        assert!(job.can_transition_to(JobStatus::Pending));
    }

    #[test]
    fn terminal_states_are_immutable() {
        let complete = job_with_status(JobStatus::Complete);
        assert!(!complete.can_transition_to(JobStatus::Pending));
        assert!(!complete.can_transition_to(JobStatus::Failed));

        let failed = job_with_status(JobStatus::Failed);
        assert!(!failed.can_transition_to(JobStatus::Pending));
        assert!(!failed.can_transition_to(JobStatus::Complete));
    }

    #[test]
    fn status_round_trips_as_snake_case() {
        assert_eq!(JobStatus::Pending.to_string(), "pending");
        assert_eq!(
            serde_json::to_string(&JobStatus::Complete).unwrap(),
            "\"complete\""
        );
    }
}
