//! Periodic sync scheduling for the cobalt-courier platform.
//!
//! This crate provides:
//!
//! - **Sync scheduler**: Decides which integrations are due each tick and
//!   dispatches incremental syncs with failure-proportional backoff
//! - **Runtime loops**: The scheduler and health monitor as independent
//!   periodic tasks with coordinated shutdown
//! - **Orchestrator**: The assembled service facade: registration, manual
//!   syncs, queries, and lifecycle

pub mod error;
pub mod orchestrator;
pub mod runtime;
pub mod scheduler;

pub use error::OrchestratorError;
pub use orchestrator::{OrchestratorConfig, SyncOrchestrator};
pub use runtime::{ShutdownHandle, spawn_loops};
pub use scheduler::SyncScheduler;
