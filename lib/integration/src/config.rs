//! Integration configuration types.
//!
//! An integration is one configured connection to an external enterprise
//! system (CRM, ERP, marketing platform, etc.). Configuration records are
//! owned by the [`IntegrationRegistry`](crate::registry::IntegrationRegistry)
//! and mutated only through its accessor methods.

use chrono::{DateTime, Duration, Utc};
use cobalt_courier_core::IntegrationId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// The category of external system an integration connects to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationKind {
    /// Customer relationship management.
    Crm,
    /// Enterprise resource planning.
    Erp,
    /// Marketing automation.
    Marketing,
    /// Analytics and BI platforms.
    Analytics,
    /// Communication tools (email, chat).
    Communication,
    /// File and object storage.
    Storage,
}

impl IntegrationKind {
    /// All supported kinds, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Crm,
        Self::Erp,
        Self::Marketing,
        Self::Analytics,
        Self::Communication,
        Self::Storage,
    ];

    /// Returns the wire name of this kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Crm => "crm",
            Self::Erp => "erp",
            Self::Marketing => "marketing",
            Self::Analytics => "analytics",
            Self::Communication => "communication",
            Self::Storage => "storage",
        }
    }
}

impl fmt::Display for IntegrationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntegrationKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownKind {
                kind: s.to_string(),
            })
    }
}

/// Lifecycle status of an integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationStatus {
    /// Eligible for scheduled syncs.
    Active,
    /// Excluded from scheduling; manual syncs are rejected.
    Inactive,
    /// Last sync attempt failed; details in `last_error`.
    Error,
    /// Registered but not yet enabled.
    Pending,
}

/// Health classification from the most recent probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Responded within the healthy latency threshold.
    Healthy,
    /// Responded, but slower than the healthy threshold.
    Degraded,
    /// Probe timed out or errored.
    Down,
    /// Not yet probed.
    Unknown,
}

/// Health fields for an integration.
///
/// Written only by the health monitor, never by the sync executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthState {
    /// When the last probe ran.
    pub last_check: Option<DateTime<Utc>>,
    /// Classification of the last probe.
    pub status: HealthStatus,
    /// Round-trip time of the last probe, if it responded.
    pub response_time_ms: Option<u64>,
}

impl Default for HealthState {
    fn default() -> Self {
        Self {
            last_check: None,
            status: HealthStatus::Unknown,
            response_time_ms: None,
        }
    }
}

/// Outbound rate limits for an integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimits {
    /// Maximum sync attempts per 60-second window.
    pub requests_per_minute: u32,
    /// Hourly budget. Reserved; the fixed-window limiter only consults
    /// the per-minute limit.
    pub requests_per_hour: u32,
    /// Burst allowance. Reserved for a token-bucket upgrade.
    pub burst_limit: u32,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            requests_per_hour: 1000,
            burst_limit: 10,
        }
    }
}

/// An encrypted credential reference: opaque ciphertext plus the id of the
/// key that sealed it. The plaintext never appears in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialEnvelope {
    /// Versioned, base64-encoded ciphertext.
    pub cipher: String,
    /// Identifier of the sealing key.
    pub key_id: String,
}

/// Input to integration registration.
///
/// Carries the plaintext credential, which is encrypted during registration
/// and never stored. `kind` is a free-form string validated against
/// [`IntegrationKind`] at registration time.
#[derive(Clone)]
pub struct RegistrationRequest {
    /// Human-readable integration name.
    pub name: String,
    /// Integration kind; must match one of [`IntegrationKind::ALL`].
    pub kind: String,
    /// Vendor identifier (e.g. "salesforce", "sap").
    pub provider: String,
    /// Plaintext credential blob, encrypted at registration.
    pub credentials: Vec<u8>,
    /// Endpoint URLs the connector will call.
    pub endpoints: Vec<String>,
    /// Outbound rate limits.
    pub rate_limits: RateLimits,
    /// Minutes between scheduled syncs.
    pub sync_frequency_minutes: u32,
}

impl fmt::Debug for RegistrationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationRequest")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("provider", &self.provider)
            .field("credentials", &"<redacted>")
            .field("endpoints", &self.endpoints)
            .field("rate_limits", &self.rate_limits)
            .field("sync_frequency_minutes", &self.sync_frequency_minutes)
            .finish()
    }
}

/// A registered integration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationConfig {
    /// Unique identifier.
    pub id: IntegrationId,
    /// Human-readable name.
    pub name: String,
    /// Category of external system.
    pub kind: IntegrationKind,
    /// Vendor identifier.
    pub provider: String,
    /// Lifecycle status.
    pub status: IntegrationStatus,
    /// Encrypted credential reference.
    pub credential: CredentialEnvelope,
    /// Endpoint URLs.
    pub endpoints: Vec<String>,
    /// Outbound rate limits.
    pub rate_limits: RateLimits,
    /// Completion time of the last successful sync. Never moves backwards.
    pub last_sync: Option<DateTime<Utc>>,
    /// Completion time of the last sync attempt, successful or not.
    /// Anchors retry backoff after failures.
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// Minutes between scheduled syncs.
    pub sync_frequency_minutes: u32,
    /// Health fields, owned by the health monitor.
    pub health: HealthState,
    /// Short human-readable summary of the last failure.
    pub last_error: Option<String>,
    /// Failures since the last successful sync; drives retry backoff.
    pub consecutive_failures: u32,
    /// When the integration was registered.
    pub created_at: DateTime<Utc>,
    /// When any field last changed.
    pub updated_at: DateTime<Utc>,
}

impl IntegrationConfig {
    /// Returns true if the integration is eligible for scheduled syncs.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == IntegrationStatus::Active
    }

    /// The configured sync interval.
    #[must_use]
    pub fn sync_interval(&self) -> Duration {
        Duration::minutes(i64::from(self.sync_frequency_minutes))
    }
}
