//! Error types for the integration crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `ValidationError`: Rejected registration input
//! - `RegistryError`: Errors from registry operations
//! - `CredentialError`: Errors from credential sealing/unsealing
//! - `ConnectorError`: Errors from connector operations

use cobalt_courier_core::IntegrationId;
use std::fmt;

use crate::config::IntegrationKind;

/// Errors from registration input validation.
///
/// Validation failures are rejected immediately and never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field was empty.
    MissingField { field: &'static str },
    /// The integration kind is not one of the supported kinds.
    UnknownKind { kind: String },
    /// No endpoint URLs were supplied.
    NoEndpoints,
    /// The sync frequency must be at least one minute.
    ZeroSyncFrequency,
    /// The per-minute rate limit must be at least one request.
    ZeroRateLimit,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField { field } => write!(f, "missing required field: {field}"),
            Self::UnknownKind { kind } => write!(f, "unknown integration kind: {kind}"),
            Self::NoEndpoints => write!(f, "at least one endpoint is required"),
            Self::ZeroSyncFrequency => write!(f, "sync frequency must be at least one minute"),
            Self::ZeroRateLimit => {
                write!(f, "per-minute rate limit must be at least one request")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Errors from registry operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Integration not found.
    NotFound { id: IntegrationId },
    /// Registration input failed validation.
    Validation(ValidationError),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { id } => write!(f, "integration not found: {id}"),
            Self::Validation(e) => write!(f, "invalid registration: {e}"),
        }
    }
}

impl std::error::Error for RegistryError {}

impl From<ValidationError> for RegistryError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

/// Errors from credential operations.
///
/// Decryption never silently returns corrupted data; a wrong key or a
/// tampered envelope always surfaces as an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// No key with this id is loaded in the vault.
    UnknownKey { key_id: String },
    /// Encryption failed.
    EncryptionFailed { reason: String },
    /// Decryption failed (wrong key, tampered ciphertext).
    DecryptionFailed { reason: String },
    /// The envelope is not in the expected format.
    InvalidFormat { reason: String },
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownKey { key_id } => write!(f, "unknown credential key: {key_id}"),
            Self::EncryptionFailed { reason } => write!(f, "encryption failed: {reason}"),
            Self::DecryptionFailed { reason } => write!(f, "decryption failed: {reason}"),
            Self::InvalidFormat { reason } => {
                write!(f, "invalid credential envelope: {reason}")
            }
        }
    }
}

impl std::error::Error for CredentialError {}

/// Errors from connector operations.
///
/// Connectors report partial failures through the `errors` count in their
/// summary; these variants cover unexpected or unrecoverable conditions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectorError {
    /// Connection to the external service failed.
    ConnectionFailed { reason: String },
    /// The external service rejected the credentials.
    AuthenticationFailed { reason: String },
    /// The external service reported its own rate limit.
    RateLimited { retry_after_secs: Option<u64> },
    /// Protocol-level error in the vendor API.
    ProtocolError { reason: String },
    /// No connector is registered for this integration kind.
    NotRegistered { kind: IntegrationKind },
    /// The vendor side timed out.
    Timeout,
}

impl fmt::Display for ConnectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionFailed { reason } => write!(f, "connection failed: {reason}"),
            Self::AuthenticationFailed { reason } => {
                write!(f, "authentication failed: {reason}")
            }
            Self::RateLimited { retry_after_secs } => {
                if let Some(secs) = retry_after_secs {
                    write!(f, "rate limited, retry after {secs}s")
                } else {
                    write!(f, "rate limited")
                }
            }
            Self::ProtocolError { reason } => write!(f, "protocol error: {reason}"),
            Self::NotRegistered { kind } => {
                write!(f, "no connector registered for kind: {kind}")
            }
            Self::Timeout => write!(f, "operation timed out"),
        }
    }
}

impl std::error::Error for ConnectorError {}
