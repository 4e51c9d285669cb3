//! The assembled sync service.
//!
//! Owns the registry, vault, limiter, job store, executor, scheduler, and
//! health monitor, constructed once at process start. External callers
//! such as an operator UI go through this facade: registration,
//! manual sync triggers, queries, and lifecycle. Manual triggers share the
//! executor's active-job map with the scheduler, so the one-running-job
//! rule holds no matter where a sync came from.

use chrono::Utc;
use cobalt_courier_core::{IntegrationId, SyncJobId};
use cobalt_courier_integration::config::{
    IntegrationConfig, IntegrationStatus, RegistrationRequest,
};
use cobalt_courier_integration::connector::{ConnectorSet, SyncKind};
use cobalt_courier_integration::credential::CredentialVault;
use cobalt_courier_integration::error::RegistryError;
use cobalt_courier_integration::rate_limit::RateLimiter;
use cobalt_courier_integration::registry::IntegrationRegistry;
use cobalt_courier_sync::error::SyncError;
use cobalt_courier_sync::executor::SyncExecutor;
use cobalt_courier_sync::health::HealthMonitor;
use cobalt_courier_sync::job::SyncJob;
use cobalt_courier_sync::store::{SyncJobStore, SyncStore, reconcile_interrupted};
use std::sync::Arc;
use std::time::Duration;

use crate::error::OrchestratorError;
use crate::runtime::{ShutdownHandle, spawn_loops};
use crate::scheduler::SyncScheduler;

/// Tunables for the assembled service.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Cadence of the scheduler loop.
    pub tick_interval: Duration,
    /// Cadence of the health monitor loop.
    pub probe_interval: Duration,
    /// Bound on one health probe's round trip.
    pub probe_timeout: Duration,
    /// Wall-clock budget for one connector sync call.
    pub job_timeout: Duration,
    /// Syncs allowed to run concurrently across all integrations.
    pub worker_pool_size: usize,
    /// Retained job history records.
    pub history_cap: usize,
    /// Retry backoff added per consecutive failure.
    pub backoff_base: Duration,
    /// Upper bound on retry backoff.
    pub backoff_cap: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(60),
            probe_interval: Duration::from_secs(300),
            probe_timeout: Duration::from_secs(5),
            job_timeout: Duration::from_secs(300),
            worker_pool_size: 8,
            history_cap: 1000,
            backoff_base: Duration::from_secs(120),
            backoff_cap: Duration::from_secs(1800),
        }
    }
}

/// The integration sync service.
pub struct SyncOrchestrator {
    registry: IntegrationRegistry,
    vault: Arc<CredentialVault>,
    jobs: SyncJobStore,
    store: Arc<dyn SyncStore>,
    executor: Arc<SyncExecutor>,
    scheduler: Arc<SyncScheduler>,
    monitor: Arc<HealthMonitor>,
    config: OrchestratorConfig,
    runtime: Option<ShutdownHandle>,
}

impl SyncOrchestrator {
    /// Assembles the service from its collaborators.
    #[must_use]
    pub fn new(
        vault: CredentialVault,
        connectors: ConnectorSet,
        store: Arc<dyn SyncStore>,
        config: OrchestratorConfig,
    ) -> Self {
        let registry = IntegrationRegistry::new();
        let vault = Arc::new(vault);
        let jobs = SyncJobStore::with_history_cap(config.history_cap);

        let executor = Arc::new(
            SyncExecutor::new(
                registry.clone(),
                Arc::clone(&vault),
                RateLimiter::new(),
                connectors.clone(),
                jobs.clone(),
                Arc::clone(&store),
            )
            .with_job_timeout(config.job_timeout)
            .with_worker_pool(config.worker_pool_size),
        );

        let scheduler = Arc::new(
            SyncScheduler::new(registry.clone(), Arc::clone(&executor), jobs.clone())
                .with_backoff(
                    chrono::Duration::from_std(config.backoff_base)
                        .unwrap_or_else(|_| chrono::Duration::seconds(120)),
                    chrono::Duration::from_std(config.backoff_cap)
                        .unwrap_or_else(|_| chrono::Duration::seconds(1800)),
                ),
        );

        let monitor = Arc::new(
            HealthMonitor::new(registry.clone(), connectors)
                .with_probe_timeout(config.probe_timeout),
        );

        Self {
            registry,
            vault,
            jobs,
            store,
            executor,
            scheduler,
            monitor,
            config,
            runtime: None,
        }
    }

    /// Reloads persisted state into the in-memory registry and history.
    ///
    /// The active-job map starts empty on a cold start; persisted jobs
    /// still marked running did not survive the previous process and are
    /// reconciled to failed-interrupted.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn bootstrap(&self) -> Result<(), OrchestratorError> {
        let integrations = self.store.load_integrations().await?;
        let loaded = integrations.len();
        for config in integrations {
            self.registry.restore(config);
        }

        let mut history = self.store.load_history().await?;
        let interrupted = reconcile_interrupted(&mut history);
        for job in history {
            self.jobs.record(job);
        }

        if interrupted > 0 {
            tracing::warn!(interrupted, "Reconciled jobs interrupted by restart");
        }
        tracing::info!(integrations = loaded, "Bootstrap complete");
        Ok(())
    }

    /// Registers a new integration and returns its id.
    ///
    /// The plaintext credential in the request is sealed into the vault's
    /// active key before the record is stored; it is never persisted.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad input, a credential error if
    /// sealing fails, or a store error if the record cannot be persisted.
    pub async fn register_integration(
        &self,
        request: &RegistrationRequest,
    ) -> Result<IntegrationId, OrchestratorError> {
        let envelope = self.vault.encrypt(&request.credentials)?;
        let config = self.registry.register(request, envelope)?;
        self.store.save_integration(&config).await?;
        tracing::info!(
            integration = %config.id,
            kind = %config.kind,
            provider = %config.provider,
            "Integration registered"
        );
        Ok(config.id)
    }

    /// Triggers a sync for an integration.
    ///
    /// Shares the scheduler's execution path, so the one-running-job rule
    /// and the rate limit apply identically to manual triggers.
    ///
    /// # Errors
    ///
    /// See [`SyncExecutor::execute`].
    pub async fn execute_sync(
        &self,
        id: IntegrationId,
        kind: SyncKind,
    ) -> Result<SyncJobId, SyncError> {
        self.executor.execute(id, kind).await
    }

    /// Snapshots of all integrations.
    #[must_use]
    pub fn integrations(&self) -> Vec<IntegrationConfig> {
        self.registry.list()
    }

    /// Snapshot of one integration.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id.
    pub fn integration(&self, id: IntegrationId) -> Result<IntegrationConfig, RegistryError> {
        self.registry.get(id)
    }

    /// Updates an integration's lifecycle status (operator action, e.g.
    /// re-enabling after a credential fix).
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id.
    pub fn update_integration_status(
        &self,
        id: IntegrationId,
        status: IntegrationStatus,
    ) -> Result<(), RegistryError> {
        self.registry.update_status(id, status)
    }

    /// Jobs currently running.
    #[must_use]
    pub fn active_syncs(&self) -> Vec<SyncJob> {
        self.jobs.active()
    }

    /// Job history, most recent first.
    #[must_use]
    pub fn sync_history(&self, id: Option<IntegrationId>, limit: usize) -> Vec<SyncJob> {
        self.jobs.history(id, limit)
    }

    /// Runs one health probe pass immediately.
    pub async fn probe_now(&self) {
        self.monitor.probe_all().await;
    }

    /// Runs one scheduling pass immediately; returns dispatched count.
    pub async fn tick_now(&self) -> usize {
        self.scheduler.tick(Utc::now()).await
    }

    /// Starts the scheduler and health monitor loops.
    pub fn start(&mut self) {
        if self.runtime.is_some() {
            return;
        }
        self.runtime = Some(spawn_loops(
            Arc::clone(&self.scheduler),
            Arc::clone(&self.monitor),
            self.config.tick_interval,
            self.config.probe_interval,
        ));
        tracing::info!(
            tick_interval_secs = self.config.tick_interval.as_secs(),
            probe_interval_secs = self.config.probe_interval.as_secs(),
            "Sync loops started"
        );
    }

    /// Stops both loops and waits for them to finish.
    pub async fn shutdown(&mut self) {
        if let Some(handle) = self.runtime.take() {
            handle.shutdown().await;
            tracing::info!("Sync loops stopped");
        }
    }
}
