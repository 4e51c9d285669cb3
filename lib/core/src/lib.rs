//! Core domain types and utilities for the cobalt-courier platform.
//!
//! This crate provides the foundational types, error handling, and shared
//! utilities used throughout the cobalt-courier integration sync service.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{IntegrationId, ParseIdError, SyncJobId};
