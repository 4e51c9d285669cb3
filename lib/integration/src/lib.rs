//! Integration framework for the cobalt-courier platform.
//!
//! This crate provides:
//!
//! - **Integration registry**: In-memory source of truth for integration configuration
//! - **Credential vault**: Encrypted storage for integration credentials
//! - **Rate limiter**: Per-integration fixed-window rate limiting
//! - **Connector trait**: Common interface for per-vendor sync implementations

pub mod config;
pub mod connector;
pub mod credential;
pub mod error;
pub mod rate_limit;
pub mod registry;

pub use config::{
    CredentialEnvelope, HealthState, HealthStatus, IntegrationConfig, IntegrationKind,
    IntegrationStatus, RateLimits, RegistrationRequest,
};
pub use connector::{Connector, ConnectorSet, MockConnector, SyncKind, SyncSummary};
pub use credential::CredentialVault;
pub use error::{ConnectorError, CredentialError, RegistryError, ValidationError};
pub use rate_limit::{RateLimitDecision, RateLimiter};
pub use registry::IntegrationRegistry;
