//! Active-job tracking, bounded history, and the persistence contract.
//!
//! The active-job map is the single point of mutual exclusion for the
//! one-running-job-per-integration invariant: [`SyncJobStore::begin`] is an
//! atomic check-and-insert behind one lock, so a second job for the same
//! integration can never slip in between the check and the insert.

use async_trait::async_trait;
use cobalt_courier_core::{IntegrationId, SyncJobId};
use cobalt_courier_integration::config::IntegrationConfig;
use cobalt_courier_integration::connector::SyncSummary;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::error::{StoreError, SyncError};
use crate::job::{FailureKind, SyncJob};

/// Default cap on retained history records.
const DEFAULT_HISTORY_CAP: usize = 1000;

#[derive(Debug)]
struct Inner {
    active: HashMap<IntegrationId, SyncJob>,
    history: VecDeque<SyncJob>,
    history_cap: usize,
}

/// Tracks in-flight jobs and keeps a bounded, most-recent-first history.
#[derive(Debug)]
pub struct SyncJobStore {
    inner: Arc<Mutex<Inner>>,
}

impl SyncJobStore {
    /// Creates a store with the default history cap.
    #[must_use]
    pub fn new() -> Self {
        Self::with_history_cap(DEFAULT_HISTORY_CAP)
    }

    /// Creates a store retaining at most `cap` history records.
    #[must_use]
    pub fn with_history_cap(cap: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                active: HashMap::new(),
                history: VecDeque::new(),
                history_cap: cap.max(1),
            })),
        }
    }

    /// Dispatches a job, registering it as the running job for its
    /// integration.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyRunning` if another job is running for the same
    /// integration. The check and the insert happen under one lock.
    pub fn begin(&self, mut job: SyncJob) -> Result<SyncJobId, SyncError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.active.contains_key(&job.integration_id) {
            return Err(SyncError::AlreadyRunning {
                id: job.integration_id,
            });
        }
        job.start();
        let id = job.id;
        inner.active.insert(job.integration_id, job);
        Ok(id)
    }

    /// Completes the running job for an integration and moves it to history.
    ///
    /// # Errors
    ///
    /// Returns `NoActiveJob` if nothing is running for this integration.
    pub fn complete(
        &self,
        integration_id: IntegrationId,
        summary: &SyncSummary,
    ) -> Result<SyncJob, SyncError> {
        self.finish(integration_id, |job| job.complete(summary))
    }

    /// Fails the running job for an integration and moves it to history.
    ///
    /// # Errors
    ///
    /// Returns `NoActiveJob` if nothing is running for this integration.
    pub fn fail(
        &self,
        integration_id: IntegrationId,
        kind: FailureKind,
        error: impl Into<String>,
    ) -> Result<SyncJob, SyncError> {
        let message = error.into();
        self.finish(integration_id, move |job| job.fail(kind, message))
    }

    fn finish(
        &self,
        integration_id: IntegrationId,
        apply: impl FnOnce(&mut SyncJob),
    ) -> Result<SyncJob, SyncError> {
        let mut inner = self.inner.lock().unwrap();
        let mut job = inner
            .active
            .remove(&integration_id)
            .ok_or(SyncError::NoActiveJob { id: integration_id })?;
        apply(&mut job);
        push_history(&mut inner, job.clone());
        Ok(job)
    }

    /// Inserts a terminal job directly into history.
    ///
    /// Used when reloading persisted history at startup.
    pub fn record(&self, job: SyncJob) {
        let mut inner = self.inner.lock().unwrap();
        push_history(&mut inner, job);
    }

    /// Returns true if a job is currently running for this integration.
    #[must_use]
    pub fn has_running(&self, integration_id: IntegrationId) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.active.contains_key(&integration_id)
    }

    /// Snapshots of all in-flight jobs.
    #[must_use]
    pub fn active(&self) -> Vec<SyncJob> {
        let inner = self.inner.lock().unwrap();
        let mut jobs: Vec<_> = inner.active.values().cloned().collect();
        jobs.sort_by_key(|job| job.started_at);
        jobs
    }

    /// History records, most recent first, optionally filtered by
    /// integration and capped at `limit`.
    #[must_use]
    pub fn history(&self, integration_id: Option<IntegrationId>, limit: usize) -> Vec<SyncJob> {
        let inner = self.inner.lock().unwrap();
        inner
            .history
            .iter()
            .filter(|job| integration_id.is_none_or(|id| job.integration_id == id))
            .take(limit)
            .cloned()
            .collect()
    }
}

impl Default for SyncJobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for SyncJobStore {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

fn push_history(inner: &mut Inner, job: SyncJob) {
    inner.history.push_front(job);
    while inner.history.len() > inner.history_cap {
        inner.history.pop_back();
    }
}

/// Reconciles jobs left non-terminal by a process restart.
///
/// Running jobs do not survive a restart; any persisted record still
/// `running` (or `pending`) is marked failed with an `interrupted`
/// classification. Returns the number of records reconciled.
pub fn reconcile_interrupted(jobs: &mut [SyncJob]) -> usize {
    let mut reconciled = 0;
    for job in jobs.iter_mut() {
        if !job.status.is_terminal() {
            job.fail(FailureKind::Interrupted, "process restarted during sync");
            reconciled += 1;
        }
    }
    reconciled
}

/// Persistence contract for integration records and job history.
///
/// The durable storage engine is an external collaborator; this trait is
/// its boundary. Implementations must allow the in-memory registry and
/// history to be reconstructed at process start.
#[async_trait]
pub trait SyncStore: Send + Sync {
    /// Loads all persisted integration records.
    async fn load_integrations(&self) -> Result<Vec<IntegrationConfig>, StoreError>;

    /// Saves one integration record, replacing any previous version.
    async fn save_integration(&self, config: &IntegrationConfig) -> Result<(), StoreError>;

    /// Appends a terminal job record to history.
    async fn append_job(&self, job: &SyncJob) -> Result<(), StoreError>;

    /// Loads persisted job history, most recent last.
    async fn load_history(&self) -> Result<Vec<SyncJob>, StoreError>;
}

/// In-memory store for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct MemorySyncStore {
    integrations: Mutex<HashMap<IntegrationId, IntegrationConfig>>,
    jobs: Mutex<Vec<SyncJob>>,
}

impl MemorySyncStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SyncStore for MemorySyncStore {
    async fn load_integrations(&self) -> Result<Vec<IntegrationConfig>, StoreError> {
        let integrations = self.integrations.lock().unwrap();
        Ok(integrations.values().cloned().collect())
    }

    async fn save_integration(&self, config: &IntegrationConfig) -> Result<(), StoreError> {
        let mut integrations = self.integrations.lock().unwrap();
        integrations.insert(config.id, config.clone());
        Ok(())
    }

    async fn append_job(&self, job: &SyncJob) -> Result<(), StoreError> {
        let mut jobs = self.jobs.lock().unwrap();
        jobs.push(job.clone());
        Ok(())
    }

    async fn load_history(&self) -> Result<Vec<SyncJob>, StoreError> {
        let jobs = self.jobs.lock().unwrap();
        Ok(jobs.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::SyncJobStatus;
    use cobalt_courier_integration::connector::SyncKind;

    fn job_for(id: IntegrationId) -> SyncJob {
        SyncJob::new(id, SyncKind::Incremental)
    }

    #[test]
    fn begin_registers_a_running_job() {
        let store = SyncJobStore::new();
        let integration = IntegrationId::new();

        let job_id = store.begin(job_for(integration)).expect("should begin");

        assert!(store.has_running(integration));
        let active = store.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, job_id);
        assert_eq!(active[0].status, SyncJobStatus::Running);
    }

    #[test]
    fn second_begin_for_same_integration_is_rejected() {
        let store = SyncJobStore::new();
        let integration = IntegrationId::new();

        store.begin(job_for(integration)).expect("should begin");
        let second = store.begin(job_for(integration));

        assert!(matches!(second, Err(SyncError::AlreadyRunning { id }) if id == integration));
        assert_eq!(store.active().len(), 1);
    }

    #[test]
    fn different_integrations_run_concurrently() {
        let store = SyncJobStore::new();
        let first = IntegrationId::new();
        let second = IntegrationId::new();

        store.begin(job_for(first)).expect("should begin");
        store.begin(job_for(second)).expect("should begin");

        assert_eq!(store.active().len(), 2);
    }

    #[test]
    fn complete_moves_job_to_history() {
        let store = SyncJobStore::new();
        let integration = IntegrationId::new();

        store.begin(job_for(integration)).expect("should begin");
        let job = store
            .complete(integration, &SyncSummary::new(50, 0))
            .expect("should complete");

        assert_eq!(job.status, SyncJobStatus::Completed);
        assert_eq!(job.records_processed, 50);
        assert!(!store.has_running(integration));
        assert_eq!(store.history(None, 10).len(), 1);

        // The slot is free again.
        assert!(store.begin(job_for(integration)).is_ok());
    }

    #[test]
    fn fail_records_classification() {
        let store = SyncJobStore::new();
        let integration = IntegrationId::new();

        store.begin(job_for(integration)).expect("should begin");
        let job = store
            .fail(integration, FailureKind::TimedOut, "sync timed out after 300s")
            .expect("should fail");

        assert_eq!(job.status, SyncJobStatus::Failed);
        assert_eq!(job.failure, Some(FailureKind::TimedOut));
        assert!(!store.has_running(integration));
    }

    #[test]
    fn finish_without_active_job_errors() {
        let store = SyncJobStore::new();
        let result = store.complete(IntegrationId::new(), &SyncSummary::default());
        assert!(matches!(result, Err(SyncError::NoActiveJob { .. })));
    }

    #[test]
    fn history_is_most_recent_first_and_filterable() {
        let store = SyncJobStore::new();
        let first = IntegrationId::new();
        let second = IntegrationId::new();

        store.begin(job_for(first)).expect("should begin");
        store
            .complete(first, &SyncSummary::new(1, 0))
            .expect("should complete");
        store.begin(job_for(second)).expect("should begin");
        store
            .complete(second, &SyncSummary::new(2, 0))
            .expect("should complete");

        let all = store.history(None, 10);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].integration_id, second);
        assert_eq!(all[1].integration_id, first);

        let filtered = store.history(Some(first), 10);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].integration_id, first);

        let limited = store.history(None, 1);
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].integration_id, second);
    }

    #[test]
    fn history_is_bounded() {
        let store = SyncJobStore::with_history_cap(2);
        let integration = IntegrationId::new();

        for _ in 0..3 {
            store.begin(job_for(integration)).expect("should begin");
            store
                .complete(integration, &SyncSummary::default())
                .expect("should complete");
        }

        assert_eq!(store.history(None, 10).len(), 2);
    }

    #[test]
    fn reconcile_marks_running_jobs_interrupted() {
        let integration = IntegrationId::new();
        let mut running = job_for(integration);
        running.start();
        let mut done = job_for(integration);
        done.start();
        done.complete(&SyncSummary::new(5, 0));

        let mut jobs = vec![running, done];
        let reconciled = reconcile_interrupted(&mut jobs);

        assert_eq!(reconciled, 1);
        assert_eq!(jobs[0].status, SyncJobStatus::Failed);
        assert_eq!(jobs[0].failure, Some(FailureKind::Interrupted));
        assert_eq!(jobs[1].status, SyncJobStatus::Completed);
    }

    #[tokio::test]
    async fn memory_store_roundtrip() {
        let store = MemorySyncStore::new();
        let mut job = job_for(IntegrationId::new());
        job.start();
        job.complete(&SyncSummary::new(3, 1));

        store.append_job(&job).await.expect("should append");
        let history = store.load_history().await.expect("should load");

        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, job.id);
    }
}
