//! Sync job execution for the cobalt-courier platform.
//!
//! This crate provides:
//!
//! - **Sync jobs**: The job state machine and audit records
//! - **Job store**: Active-job tracking and bounded history
//! - **Sync executor**: One sync attempt end to end, with rate limiting,
//!   credential decryption, timeouts, and a bounded worker pool
//! - **Health monitor**: Periodic liveness probing, isolated per integration

pub mod error;
pub mod executor;
pub mod health;
pub mod job;
pub mod store;

pub use error::{StoreError, SyncError};
pub use executor::SyncExecutor;
pub use health::HealthMonitor;
pub use job::{FailureKind, SyncJob, SyncJobStatus};
pub use store::{MemorySyncStore, SyncJobStore, SyncStore, reconcile_interrupted};
