//! Centralized daemon configuration.
//!
//! This module provides strongly-typed configuration for the sync daemon,
//! loaded via the `config` crate from environment variables.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use cobalt_courier_scheduler::OrchestratorConfig;
use serde::Deserialize;
use std::time::Duration;

/// Daemon configuration.
#[derive(Debug, Deserialize)]
pub struct DaemonConfig {
    /// Cadence of the scheduler loop, in seconds.
    #[serde(default = "default_tick_interval_seconds")]
    pub tick_interval_seconds: u64,

    /// Cadence of the health monitor loop, in seconds.
    #[serde(default = "default_probe_interval_seconds")]
    pub probe_interval_seconds: u64,

    /// Bound on one health probe's round trip, in seconds.
    #[serde(default = "default_probe_timeout_seconds")]
    pub probe_timeout_seconds: u64,

    /// Wall-clock budget for one connector sync call, in seconds.
    #[serde(default = "default_job_timeout_seconds")]
    pub job_timeout_seconds: u64,

    /// Syncs allowed to run concurrently across all integrations.
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,

    /// Retained job history records.
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,

    /// Retry backoff added per consecutive failure, in seconds.
    #[serde(default = "default_backoff_base_seconds")]
    pub backoff_base_seconds: u64,

    /// Upper bound on retry backoff, in seconds.
    #[serde(default = "default_backoff_cap_seconds")]
    pub backoff_cap_seconds: u64,

    /// Id of the active credential sealing key.
    #[serde(default = "default_credential_key_id")]
    pub credential_key_id: String,

    /// Base64-encoded 32-byte credential key. When unset, an ephemeral
    /// key is generated and sealed credentials will not survive a restart.
    #[serde(default)]
    pub credential_key: Option<String>,
}

fn default_tick_interval_seconds() -> u64 {
    60
}

fn default_probe_interval_seconds() -> u64 {
    300
}

fn default_probe_timeout_seconds() -> u64 {
    5
}

fn default_job_timeout_seconds() -> u64 {
    300
}

fn default_worker_pool_size() -> usize {
    8
}

fn default_history_cap() -> usize {
    1000
}

fn default_backoff_base_seconds() -> u64 {
    120
}

fn default_backoff_cap_seconds() -> u64 {
    1800
}

fn default_credential_key_id() -> String {
    "primary".to_string()
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            tick_interval_seconds: default_tick_interval_seconds(),
            probe_interval_seconds: default_probe_interval_seconds(),
            probe_timeout_seconds: default_probe_timeout_seconds(),
            job_timeout_seconds: default_job_timeout_seconds(),
            worker_pool_size: default_worker_pool_size(),
            history_cap: default_history_cap(),
            backoff_base_seconds: default_backoff_base_seconds(),
            backoff_cap_seconds: default_backoff_cap_seconds(),
            credential_key_id: default_credential_key_id(),
            credential_key: None,
        }
    }
}

impl DaemonConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration values fail to parse.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// The orchestrator tunables derived from this configuration.
    #[must_use]
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            tick_interval: Duration::from_secs(self.tick_interval_seconds),
            probe_interval: Duration::from_secs(self.probe_interval_seconds),
            probe_timeout: Duration::from_secs(self.probe_timeout_seconds),
            job_timeout: Duration::from_secs(self.job_timeout_seconds),
            worker_pool_size: self.worker_pool_size,
            history_cap: self.history_cap,
            backoff_base: Duration::from_secs(self.backoff_base_seconds),
            backoff_cap: Duration::from_secs(self.backoff_cap_seconds),
        }
    }

    /// Decodes the configured credential key, if one is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not valid base64 or not 32 bytes.
    pub fn credential_key_bytes(&self) -> Result<Option<[u8; 32]>, String> {
        let Some(encoded) = &self.credential_key else {
            return Ok(None);
        };
        let decoded = STANDARD
            .decode(encoded)
            .map_err(|e| format!("credential_key is not valid base64: {e}"))?;
        let key: [u8; 32] = decoded
            .try_into()
            .map_err(|_| "credential_key must decode to exactly 32 bytes".to_string())?;
        Ok(Some(key))
    }
}
