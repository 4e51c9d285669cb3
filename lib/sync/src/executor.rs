//! Sync executor: one sync attempt for one integration, end to end.
//!
//! Order of operations: rate limit (a deferral when exceeded, no job
//! record), atomic job registration (one running job per integration),
//! credential decryption, the connector call under a per-job timeout, and
//! finally job store + registry updates for every terminal outcome.
//!
//! Global outbound concurrency is bounded by a fixed worker pool; syncs
//! for different integrations run in parallel up to the pool size.

use chrono::Utc;
use cobalt_courier_core::{IntegrationId, SyncJobId};
use cobalt_courier_integration::config::{IntegrationConfig, IntegrationStatus};
use cobalt_courier_integration::connector::{ConnectorSet, SyncKind, SyncSummary};
use cobalt_courier_integration::credential::CredentialVault;
use cobalt_courier_integration::rate_limit::{RateLimitDecision, RateLimiter};
use cobalt_courier_integration::registry::IntegrationRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::error::SyncError;
use crate::job::{FailureKind, SyncJob};
use crate::store::{SyncJobStore, SyncStore};

/// Default wall-clock budget for one connector call.
const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(300);

/// Default number of syncs allowed to run concurrently across all
/// integrations.
const DEFAULT_WORKER_POOL: usize = 8;

/// Executes sync attempts.
pub struct SyncExecutor {
    registry: IntegrationRegistry,
    vault: Arc<CredentialVault>,
    limiter: RateLimiter,
    connectors: ConnectorSet,
    jobs: SyncJobStore,
    store: Arc<dyn SyncStore>,
    permits: Arc<Semaphore>,
    job_timeout: Duration,
}

impl SyncExecutor {
    /// Creates an executor with the default timeout and worker pool size.
    #[must_use]
    pub fn new(
        registry: IntegrationRegistry,
        vault: Arc<CredentialVault>,
        limiter: RateLimiter,
        connectors: ConnectorSet,
        jobs: SyncJobStore,
        store: Arc<dyn SyncStore>,
    ) -> Self {
        Self {
            registry,
            vault,
            limiter,
            connectors,
            jobs,
            store,
            permits: Arc::new(Semaphore::new(DEFAULT_WORKER_POOL)),
            job_timeout: DEFAULT_JOB_TIMEOUT,
        }
    }

    /// Sets the per-job timeout for the connector call.
    #[must_use]
    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = timeout;
        self
    }

    /// Sets the number of syncs allowed to run concurrently.
    #[must_use]
    pub fn with_worker_pool(mut self, size: usize) -> Self {
        self.permits = Arc::new(Semaphore::new(size.max(1)));
        self
    }

    /// Runs one sync attempt and returns the job id.
    ///
    /// A job id is returned for every attempt that produced a job record,
    /// including failed ones; the outcome is visible in the job store.
    ///
    /// # Errors
    ///
    /// Returns an error without creating a job for unknown or inactive
    /// integrations, a hit rate limit (deferral), or an already-running
    /// job for the same integration.
    pub async fn execute(&self, id: IntegrationId, kind: SyncKind) -> Result<SyncJobId, SyncError> {
        let config = self.registry.get(id)?;
        if config.status == IntegrationStatus::Inactive {
            return Err(SyncError::Inactive { id });
        }

        match self
            .limiter
            .check_and_increment(id, config.rate_limits.requests_per_minute)
        {
            RateLimitDecision::Allowed { .. } => {}
            RateLimitDecision::Exceeded { retry_after, .. } => {
                return Err(SyncError::RateLimitExceeded { retry_after });
            }
        }

        // The single point of mutual exclusion per integration.
        let job_id = self.jobs.begin(SyncJob::new(id, kind))?;

        let _permit = self
            .permits
            .acquire()
            .await
            .expect("worker pool semaphore closed");

        match self.run_connector(&config, kind).await {
            Ok(summary) => {
                let job = self.jobs.complete(id, &summary)?;
                self.registry.mark_synced(id, Utc::now())?;
                tracing::info!(
                    integration = %id,
                    job = %job_id,
                    processed = summary.processed,
                    errors = summary.errors,
                    "Sync completed"
                );
                self.persist_outcome(id, &job).await;
            }
            Err((failure, message)) => {
                let job = self.jobs.fail(id, failure, message.clone())?;
                self.registry.record_failure(id, &message)?;
                tracing::warn!(
                    integration = %id,
                    job = %job_id,
                    failure = %failure,
                    error = %message,
                    "Sync failed"
                );
                self.persist_outcome(id, &job).await;
            }
        }

        Ok(job_id)
    }

    /// Decrypts credentials and runs the connector under the job timeout.
    async fn run_connector(
        &self,
        config: &IntegrationConfig,
        kind: SyncKind,
    ) -> Result<SyncSummary, (FailureKind, String)> {
        let credentials = self
            .vault
            .decrypt(&config.credential)
            .map_err(|e| (FailureKind::Credential, e.to_string()))?;

        let connector = self
            .connectors
            .get(config.kind)
            .map_err(|e| (FailureKind::Connector, e.to_string()))?;

        match tokio::time::timeout(self.job_timeout, connector.sync(&credentials, kind)).await {
            Ok(Ok(summary)) => Ok(summary),
            Ok(Err(e)) => Err((FailureKind::Connector, e.to_string())),
            Err(_) => Err((
                FailureKind::TimedOut,
                format!("sync exceeded {}s", self.job_timeout.as_secs()),
            )),
        }
    }

    /// Persists the terminal job and the updated integration record.
    ///
    /// Persistence failures are logged and contained; the in-memory state
    /// remains authoritative for this process.
    async fn persist_outcome(&self, id: IntegrationId, job: &SyncJob) {
        if let Err(e) = self.store.append_job(job).await {
            tracing::warn!(integration = %id, error = %e, "Failed to persist job record");
        }
        match self.registry.get(id) {
            Ok(config) => {
                if let Err(e) = self.store.save_integration(&config).await {
                    tracing::warn!(integration = %id, error = %e, "Failed to persist integration");
                }
            }
            Err(e) => {
                tracing::warn!(integration = %id, error = %e, "Integration vanished before persist");
            }
        }
    }
}
