//! Connector trait and related types.
//!
//! Each integration kind has one connector implementation performing the
//! actual data transfer against the vendor API. Connectors report partial
//! failures through the `errors` count in their summary and return an error
//! only for unexpected or unrecoverable conditions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::config::IntegrationKind;
use crate::error::ConnectorError;

/// The scope of a sync attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncKind {
    /// Transfer the full dataset.
    Full,
    /// Transfer changes since the last sync.
    Incremental,
    /// Near-real-time delta push.
    RealTime,
}

impl fmt::Display for SyncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Full => "full",
            Self::Incremental => "incremental",
            Self::RealTime => "real_time",
        };
        f.write_str(name)
    }
}

/// The result of a completed connector sync.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncSummary {
    /// Records transferred successfully.
    pub processed: u64,
    /// Records that failed individually. Partial failures are reported
    /// here rather than by returning an error.
    pub errors: u64,
    /// Connector-specific details (cursor positions, API call counts).
    pub metadata: HashMap<String, JsonValue>,
}

impl SyncSummary {
    /// Creates a summary with the given counts and no metadata.
    #[must_use]
    pub fn new(processed: u64, errors: u64) -> Self {
        Self {
            processed,
            errors,
            metadata: HashMap::new(),
        }
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Trait for per-vendor sync implementations.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Runs one data transfer with decrypted credentials.
    ///
    /// # Errors
    ///
    /// Returns an error only for unrecoverable conditions; per-record
    /// failures belong in the summary's `errors` count.
    async fn sync(&self, credentials: &[u8], kind: SyncKind) -> Result<SyncSummary, ConnectorError>;

    /// Lightweight liveness check used by the health monitor.
    async fn probe(&self) -> Result<(), ConnectorError>;
}

/// Maps each integration kind to its connector implementation.
#[derive(Clone, Default)]
pub struct ConnectorSet {
    connectors: HashMap<IntegrationKind, Arc<dyn Connector>>,
}

impl ConnectorSet {
    /// Creates an empty connector set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the connector for a kind, replacing any existing one.
    pub fn register(&mut self, kind: IntegrationKind, connector: Arc<dyn Connector>) {
        self.connectors.insert(kind, connector);
    }

    /// Looks up the connector for a kind.
    ///
    /// # Errors
    ///
    /// Returns `NotRegistered` if no connector covers this kind.
    pub fn get(&self, kind: IntegrationKind) -> Result<Arc<dyn Connector>, ConnectorError> {
        self.connectors
            .get(&kind)
            .cloned()
            .ok_or(ConnectorError::NotRegistered { kind })
    }

    /// Returns a set with a default mock connector for every kind.
    ///
    /// Stand-in wiring until vendor implementations are registered.
    #[must_use]
    pub fn mocked() -> Self {
        let mut set = Self::new();
        for kind in IntegrationKind::ALL {
            set.register(kind, Arc::new(MockConnector::succeeding(SyncSummary::new(0, 0))));
        }
        set
    }
}

impl fmt::Debug for ConnectorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorSet")
            .field("kinds", &self.connectors.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A deterministic connector for tests and stand-in wiring.
///
/// Outcome, probe behavior, and artificial latency are fixed at
/// construction; call counters let tests assert exactly how many syncs ran.
pub struct MockConnector {
    summary: SyncSummary,
    fail_with: Option<ConnectorError>,
    probe_failure: Option<ConnectorError>,
    latency: Option<Duration>,
    sync_calls: AtomicU64,
    probe_calls: AtomicU64,
}

impl MockConnector {
    /// Creates a mock that succeeds with the given summary.
    #[must_use]
    pub fn succeeding(summary: SyncSummary) -> Self {
        Self {
            summary,
            fail_with: None,
            probe_failure: None,
            latency: None,
            sync_calls: AtomicU64::new(0),
            probe_calls: AtomicU64::new(0),
        }
    }

    /// Creates a mock whose syncs fail with the given error.
    #[must_use]
    pub fn failing(error: ConnectorError) -> Self {
        Self {
            summary: SyncSummary::default(),
            fail_with: Some(error),
            probe_failure: None,
            latency: None,
            sync_calls: AtomicU64::new(0),
            probe_calls: AtomicU64::new(0),
        }
    }

    /// Adds artificial latency to both syncs and probes.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Makes probes fail with the given error.
    #[must_use]
    pub fn with_probe_failure(mut self, error: ConnectorError) -> Self {
        self.probe_failure = Some(error);
        self
    }

    /// Number of sync calls made against this mock.
    #[must_use]
    pub fn sync_calls(&self) -> u64 {
        self.sync_calls.load(Ordering::SeqCst)
    }

    /// Number of probe calls made against this mock.
    #[must_use]
    pub fn probe_calls(&self) -> u64 {
        self.probe_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn sync(
        &self,
        _credentials: &[u8],
        _kind: SyncKind,
    ) -> Result<SyncSummary, ConnectorError> {
        self.sync_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        match &self.fail_with {
            Some(e) => Err(e.clone()),
            None => Ok(self.summary.clone()),
        }
    }

    async fn probe(&self) -> Result<(), ConnectorError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        match &self.probe_failure {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}
