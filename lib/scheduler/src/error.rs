//! Error types for the scheduler crate.

use cobalt_courier_integration::error::{CredentialError, RegistryError};
use cobalt_courier_sync::error::StoreError;
use std::fmt;

/// Errors from orchestrator operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorError {
    /// Registry operation failed (including registration validation).
    Registry(RegistryError),
    /// Credential sealing failed during registration.
    Credential(CredentialError),
    /// Persistence failed.
    Store(StoreError),
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registry(e) => write!(f, "registry error: {e}"),
            Self::Credential(e) => write!(f, "credential error: {e}"),
            Self::Store(e) => write!(f, "store error: {e}"),
        }
    }
}

impl std::error::Error for OrchestratorError {}

impl From<RegistryError> for OrchestratorError {
    fn from(e: RegistryError) -> Self {
        Self::Registry(e)
    }
}

impl From<CredentialError> for OrchestratorError {
    fn from(e: CredentialError) -> Self {
        Self::Credential(e)
    }
}

impl From<StoreError> for OrchestratorError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}
