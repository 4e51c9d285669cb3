//! Error types for the sync crate.
//!
//! The `SyncError` taxonomy distinguishes deferrals (`RateLimitExceeded`,
//! `AlreadyRunning`), which create no job record, from attempt failures
//! (`Credential`, `Connector`, `TimedOut`), which are recorded in history.

use chrono::Duration;
use cobalt_courier_core::IntegrationId;
use cobalt_courier_integration::error::{ConnectorError, CredentialError, RegistryError};
use std::fmt;

/// Errors from sync execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Integration not found.
    NotFound { id: IntegrationId },
    /// Integration is inactive; syncs are rejected until it is re-enabled.
    Inactive { id: IntegrationId },
    /// Outbound rate limit reached. A deferral, not a failure: the attempt
    /// is retried on a later scheduler tick without recording a job.
    RateLimitExceeded { retry_after: Duration },
    /// A job is already running for this integration.
    AlreadyRunning { id: IntegrationId },
    /// No running job exists to finish for this integration.
    NoActiveJob { id: IntegrationId },
    /// Credential decryption failed; manual re-authorization required.
    Credential(CredentialError),
    /// The connector reported an unrecoverable failure.
    Connector(ConnectorError),
    /// The connector call exceeded the per-job timeout.
    TimedOut { after_secs: u64 },
    /// Registry lookup or update failed.
    Registry(RegistryError),
    /// Persistence failed.
    Store(StoreError),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { id } => write!(f, "integration not found: {id}"),
            Self::Inactive { id } => write!(f, "integration is inactive: {id}"),
            Self::RateLimitExceeded { retry_after } => {
                write!(
                    f,
                    "rate limit exceeded, retry in {}s",
                    retry_after.num_seconds().max(0)
                )
            }
            Self::AlreadyRunning { id } => {
                write!(f, "a sync job is already running for {id}")
            }
            Self::NoActiveJob { id } => write!(f, "no active sync job for {id}"),
            Self::Credential(e) => write!(f, "credential error: {e}"),
            Self::Connector(e) => write!(f, "connector error: {e}"),
            Self::TimedOut { after_secs } => {
                write!(f, "sync timed out after {after_secs}s")
            }
            Self::Registry(e) => write!(f, "registry error: {e}"),
            Self::Store(e) => write!(f, "store error: {e}"),
        }
    }
}

impl std::error::Error for SyncError {}

impl From<CredentialError> for SyncError {
    fn from(e: CredentialError) -> Self {
        Self::Credential(e)
    }
}

impl From<ConnectorError> for SyncError {
    fn from(e: ConnectorError) -> Self {
        Self::Connector(e)
    }
}

impl From<RegistryError> for SyncError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::NotFound { id } => Self::NotFound { id },
            other => Self::Registry(other),
        }
    }
}

impl From<StoreError> for SyncError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

/// Errors from the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Failed to load persisted state.
    LoadFailed { message: String },
    /// Failed to save state.
    SaveFailed { message: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoadFailed { message } => write!(f, "store load failed: {message}"),
            Self::SaveFailed { message } => write!(f, "store save failed: {message}"),
        }
    }
}

impl std::error::Error for StoreError {}
