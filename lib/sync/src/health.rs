//! Periodic health probing for integrations.
//!
//! Probes are liveness checks, distinct from syncs: they measure round-trip
//! time against the connector with a bounded timeout and update only the
//! health fields of an integration. A probe failure for one integration
//! never prevents probing of the others, and never escapes the monitor.

use chrono::Utc;
use cobalt_courier_integration::config::{HealthState, HealthStatus, IntegrationConfig};
use cobalt_courier_integration::connector::ConnectorSet;
use cobalt_courier_integration::registry::IntegrationRegistry;
use std::time::Duration;
use tokio::time::Instant;

/// Probes slower than this respond but are classified degraded.
const DEGRADED_THRESHOLD_MS: u64 = 1000;

/// Default bound on one probe's round trip, distinct from sync timeouts.
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Periodic prober updating integration health in the registry.
pub struct HealthMonitor {
    registry: IntegrationRegistry,
    connectors: ConnectorSet,
    probe_timeout: Duration,
}

impl HealthMonitor {
    /// Creates a monitor with the default probe timeout.
    #[must_use]
    pub fn new(registry: IntegrationRegistry, connectors: ConnectorSet) -> Self {
        Self {
            registry,
            connectors,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Sets the per-probe timeout.
    #[must_use]
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Probes every integration regardless of status and records the
    /// results. Failures are contained per integration.
    pub async fn probe_all(&self) {
        for config in self.registry.list() {
            let health = self.probe(&config).await;
            if let Err(e) = self.registry.update_health(config.id, health) {
                tracing::warn!(integration = %config.id, error = %e, "Failed to record health");
            }
        }
    }

    /// Probes one integration and classifies the result.
    ///
    /// Under 1000ms round trip is healthy; a slower response is degraded;
    /// a timeout or error is down.
    pub async fn probe(&self, config: &IntegrationConfig) -> HealthState {
        let started = Instant::now();

        let outcome = match self.connectors.get(config.kind) {
            Ok(connector) => {
                match tokio::time::timeout(self.probe_timeout, connector.probe()).await {
                    Ok(result) => result.map_err(|e| e.to_string()),
                    Err(_) => Err(format!(
                        "probe exceeded {}ms",
                        self.probe_timeout.as_millis()
                    )),
                }
            }
            Err(e) => Err(e.to_string()),
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let last_check = Some(Utc::now());

        match outcome {
            Ok(()) => HealthState {
                last_check,
                status: if elapsed_ms < DEGRADED_THRESHOLD_MS {
                    HealthStatus::Healthy
                } else {
                    HealthStatus::Degraded
                },
                response_time_ms: Some(elapsed_ms),
            },
            Err(reason) => {
                tracing::debug!(integration = %config.id, reason = %reason, "Probe failed");
                HealthState {
                    last_check,
                    status: HealthStatus::Down,
                    response_time_ms: None,
                }
            }
        }
    }
}
