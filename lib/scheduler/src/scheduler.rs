//! Periodic scheduling of incremental syncs.
//!
//! Each tick considers every integration: active ones are due once their
//! sync frequency has elapsed since the last successful sync; failed ones
//! are retried with backoff proportional to the consecutive-failure count.
//! Credential failures are never retried automatically; they require
//! manual re-authorization.
//!
//! The one-running-job-per-integration rule is enforced by the executor's
//! job store, the same path manual triggers go through; the scheduler's
//! running-job check only avoids pointless dispatches.

use chrono::{DateTime, Duration, Utc};
use cobalt_courier_integration::config::{IntegrationConfig, IntegrationStatus};
use cobalt_courier_integration::connector::SyncKind;
use cobalt_courier_integration::registry::IntegrationRegistry;
use cobalt_courier_sync::error::SyncError;
use cobalt_courier_sync::executor::SyncExecutor;
use cobalt_courier_sync::job::FailureKind;
use cobalt_courier_sync::store::SyncJobStore;
use std::sync::Arc;

/// Default backoff added per consecutive failure, in seconds.
const DEFAULT_BACKOFF_BASE_SECS: i64 = 120;

/// Default upper bound on retry backoff, in seconds.
const DEFAULT_BACKOFF_CAP_SECS: i64 = 1800;

/// Decides which integrations are due and dispatches syncs.
pub struct SyncScheduler {
    registry: IntegrationRegistry,
    executor: Arc<SyncExecutor>,
    jobs: SyncJobStore,
    backoff_base: Duration,
    backoff_cap: Duration,
}

impl SyncScheduler {
    /// Creates a scheduler with the default backoff policy.
    #[must_use]
    pub fn new(
        registry: IntegrationRegistry,
        executor: Arc<SyncExecutor>,
        jobs: SyncJobStore,
    ) -> Self {
        Self {
            registry,
            executor,
            jobs,
            backoff_base: Duration::seconds(DEFAULT_BACKOFF_BASE_SECS),
            backoff_cap: Duration::seconds(DEFAULT_BACKOFF_CAP_SECS),
        }
    }

    /// Sets the retry backoff policy.
    #[must_use]
    pub fn with_backoff(mut self, base: Duration, cap: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_cap = cap;
        self
    }

    /// Runs one scheduling pass at the given instant.
    ///
    /// Dispatches an incremental sync for every due integration and waits
    /// for the attempts to settle; syncs for different integrations run
    /// concurrently. Per-integration errors are contained: deferrals are
    /// debug-logged and anything else is warned, but the pass always
    /// completes. Returns the number of dispatched attempts.
    pub async fn tick(&self, now: DateTime<Utc>) -> usize {
        let due = self.collect_due(now);
        let dispatched = due.len();

        let attempts = due.into_iter().map(|config| {
            let executor = Arc::clone(&self.executor);
            async move {
                match executor.execute(config.id, SyncKind::Incremental).await {
                    Ok(job) => {
                        tracing::debug!(integration = %config.id, job = %job, "Scheduled sync ran");
                    }
                    Err(
                        e @ (SyncError::RateLimitExceeded { .. } | SyncError::AlreadyRunning { .. }),
                    ) => {
                        // Deferrals, not failures; retried on a later tick.
                        tracing::debug!(integration = %config.id, reason = %e, "Sync deferred");
                    }
                    Err(e) => {
                        tracing::warn!(integration = %config.id, error = %e, "Scheduled sync failed");
                    }
                }
            }
        });
        futures::future::join_all(attempts).await;

        dispatched
    }

    /// Integrations due for a sync at the given instant.
    #[must_use]
    pub fn collect_due(&self, now: DateTime<Utc>) -> Vec<IntegrationConfig> {
        self.registry
            .list()
            .into_iter()
            .filter(|config| self.is_due(config, now))
            .collect()
    }

    /// When this integration next becomes due.
    ///
    /// Healthy integrations are due one sync interval after their last
    /// successful sync (never-synced ones immediately). After failures,
    /// the retry is anchored on the last attempt and delayed by the
    /// failure count times the backoff base, up to the cap.
    #[must_use]
    pub fn due_at(&self, config: &IntegrationConfig) -> DateTime<Utc> {
        if config.consecutive_failures > 0 {
            let anchor = config.last_attempt_at.unwrap_or(config.created_at);
            return anchor + self.backoff_for(config.consecutive_failures);
        }
        match config.last_sync {
            Some(last_sync) => last_sync + config.sync_interval(),
            None => config.created_at,
        }
    }

    fn is_due(&self, config: &IntegrationConfig, now: DateTime<Utc>) -> bool {
        match config.status {
            IntegrationStatus::Active => {}
            // Failed integrations stay eligible for automatic retry unless
            // the failure was a credential problem, which only manual
            // re-authorization can fix.
            IntegrationStatus::Error => {
                if self.last_failure(config) == Some(FailureKind::Credential) {
                    return false;
                }
            }
            IntegrationStatus::Inactive | IntegrationStatus::Pending => return false,
        }

        if self.jobs.has_running(config.id) {
            return false;
        }

        now >= self.due_at(config)
    }

    fn last_failure(&self, config: &IntegrationConfig) -> Option<FailureKind> {
        self.jobs
            .history(Some(config.id), 1)
            .first()
            .and_then(|job| job.failure)
    }

    fn backoff_for(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::zero();
        }
        let secs = self
            .backoff_base
            .num_seconds()
            .saturating_mul(i64::from(failures));
        Duration::seconds(secs.min(self.backoff_cap.num_seconds()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cobalt_courier_core::IntegrationId;
    use cobalt_courier_integration::config::{IntegrationKind, RateLimits, RegistrationRequest};
    use cobalt_courier_integration::connector::{
        Connector, ConnectorSet, MockConnector, SyncSummary,
    };
    use cobalt_courier_integration::credential::CredentialVault;
    use cobalt_courier_integration::rate_limit::RateLimiter;
    use cobalt_courier_sync::job::SyncJob;
    use cobalt_courier_sync::store::MemorySyncStore;

    struct Harness {
        registry: IntegrationRegistry,
        jobs: SyncJobStore,
        scheduler: SyncScheduler,
        connector: Arc<MockConnector>,
        integration: IntegrationId,
    }

    fn harness(sync_frequency_minutes: u32) -> Harness {
        let registry = IntegrationRegistry::new();
        let vault = Arc::new(CredentialVault::generate("primary"));
        let envelope = vault.encrypt(b"token").expect("should encrypt");
        let config = registry
            .register(
                &RegistrationRequest {
                    name: "Sales CRM".to_string(),
                    kind: "crm".to_string(),
                    provider: "salesforce".to_string(),
                    credentials: b"token".to_vec(),
                    endpoints: vec!["https://api.example.com".to_string()],
                    rate_limits: RateLimits::default(),
                    sync_frequency_minutes,
                },
                envelope,
            )
            .expect("should register");

        let connector = Arc::new(MockConnector::succeeding(SyncSummary::new(10, 0)));
        let mut connectors = ConnectorSet::new();
        connectors.register(
            IntegrationKind::Crm,
            Arc::clone(&connector) as Arc<dyn Connector>,
        );

        let jobs = SyncJobStore::new();
        let executor = Arc::new(SyncExecutor::new(
            registry.clone(),
            vault,
            RateLimiter::new(),
            connectors,
            jobs.clone(),
            Arc::new(MemorySyncStore::new()),
        ));
        let scheduler = SyncScheduler::new(registry.clone(), executor, jobs.clone());

        Harness {
            registry,
            jobs,
            scheduler,
            connector,
            integration: config.id,
        }
    }

    #[tokio::test]
    async fn overdue_integration_syncs_exactly_once_per_tick() {
        let h = harness(5);
        let now = Utc::now();
        h.registry
            .update_last_sync(h.integration, now - Duration::minutes(10))
            .expect("should update");

        let dispatched = h.scheduler.tick(now).await;

        assert_eq!(dispatched, 1);
        assert_eq!(h.connector.sync_calls(), 1);

        // The sync just completed, so the next tick has nothing to do.
        let dispatched = h.scheduler.tick(Utc::now()).await;
        assert_eq!(dispatched, 0);
        assert_eq!(h.connector.sync_calls(), 1);
    }

    #[tokio::test]
    async fn integration_is_not_resynced_before_frequency_elapses() {
        let h = harness(5);
        let now = Utc::now();
        h.registry
            .update_last_sync(h.integration, now - Duration::minutes(2))
            .expect("should update");

        let dispatched = h.scheduler.tick(now).await;

        assert_eq!(dispatched, 0);
        assert_eq!(h.connector.sync_calls(), 0);

        // Once the frequency has elapsed it becomes due.
        let later = now + Duration::minutes(4);
        let dispatched = h.scheduler.tick(later).await;
        assert_eq!(dispatched, 1);
    }

    #[tokio::test]
    async fn never_synced_integration_is_due_immediately() {
        let h = harness(60);

        let dispatched = h.scheduler.tick(Utc::now()).await;

        assert_eq!(dispatched, 1);
        assert_eq!(h.connector.sync_calls(), 1);
    }

    #[tokio::test]
    async fn running_job_suppresses_scheduling() {
        let h = harness(5);
        let now = Utc::now();
        h.registry
            .update_last_sync(h.integration, now - Duration::minutes(10))
            .expect("should update");
        h.jobs
            .begin(SyncJob::new(h.integration, SyncKind::Full))
            .expect("should begin");

        let dispatched = h.scheduler.tick(now).await;

        assert_eq!(dispatched, 0);
        assert_eq!(h.connector.sync_calls(), 0);
    }

    #[tokio::test]
    async fn inactive_integration_is_never_scheduled() {
        let h = harness(5);
        h.registry
            .update_status(h.integration, IntegrationStatus::Inactive)
            .expect("should update");

        let dispatched = h.scheduler.tick(Utc::now()).await;

        assert_eq!(dispatched, 0);
    }

    #[tokio::test]
    async fn connector_failure_retries_with_backoff() {
        let h = harness(5);
        let now = Utc::now();

        // Record a connector failure through the job store and registry.
        h.jobs
            .begin(SyncJob::new(h.integration, SyncKind::Incremental))
            .expect("should begin");
        h.jobs
            .fail(h.integration, FailureKind::Connector, "connection refused")
            .expect("should fail");
        h.registry
            .record_failure(h.integration, "connection refused")
            .expect("should record");

        // Within the backoff window nothing is dispatched.
        assert_eq!(h.scheduler.tick(now + Duration::seconds(30)).await, 0);

        // One failure means one backoff step (two minutes by default).
        let dispatched = h.scheduler.tick(now + Duration::minutes(3)).await;
        assert_eq!(dispatched, 1);
        assert_eq!(h.connector.sync_calls(), 1);
    }

    #[tokio::test]
    async fn credential_failure_is_not_retried_automatically() {
        let h = harness(5);

        h.jobs
            .begin(SyncJob::new(h.integration, SyncKind::Incremental))
            .expect("should begin");
        h.jobs
            .fail(h.integration, FailureKind::Credential, "unknown key")
            .expect("should fail");
        h.registry
            .record_failure(h.integration, "unknown key")
            .expect("should record");

        let dispatched = h.scheduler.tick(Utc::now() + Duration::hours(6)).await;

        assert_eq!(dispatched, 0);
        assert_eq!(h.connector.sync_calls(), 0);
    }

    #[tokio::test]
    async fn backoff_is_capped() {
        let h = harness(5);

        for _ in 0..100 {
            h.registry
                .record_failure(h.integration, "still broken")
                .expect("should record");
        }
        h.jobs
            .begin(SyncJob::new(h.integration, SyncKind::Incremental))
            .expect("should begin");
        h.jobs
            .fail(h.integration, FailureKind::Connector, "still broken")
            .expect("should fail");

        let config = h.registry.get(h.integration).expect("should exist");
        let due = h.scheduler.due_at(&config);
        let anchor = config.last_attempt_at.expect("attempt recorded");

        // 100 failures at two minutes each would be 200 minutes; the cap
        // keeps the retry within 30 minutes of the last attempt.
        assert_eq!(due, anchor + Duration::minutes(30));
    }

    #[tokio::test]
    async fn multiple_due_integrations_all_dispatch_in_one_tick() {
        let registry = IntegrationRegistry::new();
        let vault = Arc::new(CredentialVault::generate("primary"));
        let connector = Arc::new(MockConnector::succeeding(SyncSummary::new(1, 0)));
        let mut connectors = ConnectorSet::new();
        for kind in IntegrationKind::ALL {
            connectors.register(kind, Arc::clone(&connector) as Arc<dyn Connector>);
        }

        for kind in ["crm", "erp", "marketing"] {
            let envelope = vault.encrypt(b"token").expect("should encrypt");
            registry
                .register(
                    &RegistrationRequest {
                        name: format!("{kind} integration"),
                        kind: kind.to_string(),
                        provider: "vendor".to_string(),
                        credentials: b"token".to_vec(),
                        endpoints: vec!["https://api.example.com".to_string()],
                        rate_limits: RateLimits::default(),
                        sync_frequency_minutes: 5,
                    },
                    envelope,
                )
                .expect("should register");
        }

        let jobs = SyncJobStore::new();
        let executor = Arc::new(SyncExecutor::new(
            registry.clone(),
            vault,
            RateLimiter::new(),
            connectors,
            jobs.clone(),
            Arc::new(MemorySyncStore::new()),
        ));
        let scheduler = SyncScheduler::new(registry, executor, jobs.clone());

        let dispatched = scheduler.tick(Utc::now()).await;

        assert_eq!(dispatched, 3);
        assert_eq!(connector.sync_calls(), 3);
        assert_eq!(jobs.history(None, 10).len(), 3);
    }
}
