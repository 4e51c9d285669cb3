//! Sync job state machine and audit record.
//!
//! A job is one execution attempt of a data transfer for an integration:
//! `pending --dispatch--> running --success--> completed`, or
//! `running --error|timeout--> failed`. Terminal states are immutable.

use chrono::{DateTime, Utc};
use cobalt_courier_core::{IntegrationId, SyncJobId};
use cobalt_courier_integration::connector::{SyncKind, SyncSummary};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;

/// Status of a sync job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncJobStatus {
    /// Created, not yet dispatched.
    Pending,
    /// Currently executing.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with a failure; classification in the job's `failure` field.
    Failed,
}

impl SyncJobStatus {
    /// Returns true if this is a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Classification of a failed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Credentials could not be decrypted; requires manual re-authorization.
    Credential,
    /// The connector reported an unrecoverable failure; retried on a later
    /// tick with backoff.
    Connector,
    /// The connector call exceeded the per-job timeout.
    TimedOut,
    /// The process restarted while the job was running.
    Interrupted,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Credential => "credential",
            Self::Connector => "connector",
            Self::TimedOut => "timed_out",
            Self::Interrupted => "interrupted",
        };
        f.write_str(name)
    }
}

/// A record of one sync attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncJob {
    /// Unique identifier.
    pub id: SyncJobId,
    /// The integration this job belongs to.
    pub integration_id: IntegrationId,
    /// The scope of this attempt.
    pub kind: SyncKind,
    /// Current status.
    pub status: SyncJobStatus,
    /// When the job was triggered.
    pub started_at: DateTime<Utc>,
    /// When the job reached a terminal state. Set iff the status is
    /// completed or failed.
    pub finished_at: Option<DateTime<Utc>>,
    /// Records transferred successfully.
    pub records_processed: u64,
    /// Records that failed individually.
    pub records_errored: u64,
    /// Failure classification, if failed.
    pub failure: Option<FailureKind>,
    /// Short human-readable error summary, if failed.
    pub error: Option<String>,
    /// Connector-provided details.
    pub metadata: HashMap<String, JsonValue>,
}

impl SyncJob {
    /// Creates a new job in pending state.
    #[must_use]
    pub fn new(integration_id: IntegrationId, kind: SyncKind) -> Self {
        Self {
            id: SyncJobId::new(),
            integration_id,
            kind,
            status: SyncJobStatus::Pending,
            started_at: Utc::now(),
            finished_at: None,
            records_processed: 0,
            records_errored: 0,
            failure: None,
            error: None,
            metadata: HashMap::new(),
        }
    }

    /// Dispatches the job.
    pub fn start(&mut self) {
        if self.status == SyncJobStatus::Pending {
            self.status = SyncJobStatus::Running;
        }
    }

    /// Marks the job as completed with the connector's summary.
    ///
    /// No-op if the job is already terminal.
    pub fn complete(&mut self, summary: &SyncSummary) {
        if self.status.is_terminal() {
            return;
        }
        self.status = SyncJobStatus::Completed;
        self.finished_at = Some(Utc::now());
        self.records_processed = summary.processed;
        self.records_errored = summary.errors;
        self.metadata = summary.metadata.clone();
    }

    /// Marks the job as failed with a classification and summary.
    ///
    /// No-op if the job is already terminal.
    pub fn fail(&mut self, kind: FailureKind, error: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = SyncJobStatus::Failed;
        self.finished_at = Some(Utc::now());
        self.failure = Some(kind);
        self.error = Some(error.into());
    }

    /// Returns the job duration, if finished.
    #[must_use]
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_job_is_pending() {
        let job = SyncJob::new(IntegrationId::new(), SyncKind::Incremental);

        assert_eq!(job.status, SyncJobStatus::Pending);
        assert!(job.finished_at.is_none());
        assert_eq!(job.records_processed, 0);
        assert!(job.failure.is_none());
    }

    #[test]
    fn successful_lifecycle() {
        let mut job = SyncJob::new(IntegrationId::new(), SyncKind::Full);

        job.start();
        assert_eq!(job.status, SyncJobStatus::Running);
        assert!(job.finished_at.is_none());

        let summary = SyncSummary::new(42, 2).with_metadata("cursor", serde_json::json!("abc"));
        job.complete(&summary);

        assert_eq!(job.status, SyncJobStatus::Completed);
        assert!(job.finished_at.is_some());
        assert_eq!(job.records_processed, 42);
        assert_eq!(job.records_errored, 2);
        assert_eq!(job.metadata.len(), 1);
    }

    #[test]
    fn failed_lifecycle() {
        let mut job = SyncJob::new(IntegrationId::new(), SyncKind::Incremental);

        job.start();
        job.fail(FailureKind::Connector, "connection refused");

        assert_eq!(job.status, SyncJobStatus::Failed);
        assert!(job.finished_at.is_some());
        assert_eq!(job.failure, Some(FailureKind::Connector));
        assert_eq!(job.error.as_deref(), Some("connection refused"));
        assert_eq!(job.records_processed, 0);
    }

    #[test]
    fn terminal_states_are_immutable() {
        let mut job = SyncJob::new(IntegrationId::new(), SyncKind::Full);
        job.start();
        job.complete(&SyncSummary::new(10, 0));

        job.fail(FailureKind::TimedOut, "too late");
        assert_eq!(job.status, SyncJobStatus::Completed);
        assert!(job.failure.is_none());

        let mut failed = SyncJob::new(IntegrationId::new(), SyncKind::Full);
        failed.start();
        failed.fail(FailureKind::Credential, "bad key");
        failed.complete(&SyncSummary::new(99, 0));
        assert_eq!(failed.status, SyncJobStatus::Failed);
        assert_eq!(failed.records_processed, 0);
    }

    #[test]
    fn finished_at_set_iff_terminal() {
        let mut job = SyncJob::new(IntegrationId::new(), SyncKind::RealTime);
        assert!(job.finished_at.is_none());

        job.start();
        assert!(job.finished_at.is_none());

        job.complete(&SyncSummary::default());
        assert!(job.finished_at.is_some());
        assert!(job.status.is_terminal());
    }

    #[test]
    fn duration_requires_terminal_state() {
        let mut job = SyncJob::new(IntegrationId::new(), SyncKind::Full);
        assert!(job.duration().is_none());

        job.start();
        job.fail(FailureKind::Connector, "boom");
        assert!(job.duration().is_some());
    }
}
