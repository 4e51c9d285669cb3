//! In-memory source of truth for integration configuration.
//!
//! All mutation of a record goes through the registry's accessor methods,
//! which serialize writes behind a single lock. Readers get cloned
//! snapshots and never observe a record mid-update.

use chrono::{DateTime, Utc};
use cobalt_courier_core::IntegrationId;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::config::{
    CredentialEnvelope, HealthState, IntegrationConfig, IntegrationKind, IntegrationStatus,
    RegistrationRequest,
};
use crate::error::{RegistryError, ValidationError};

/// Registry of all configured integrations.
#[derive(Debug, Default)]
pub struct IntegrationRegistry {
    records: Arc<RwLock<HashMap<IntegrationId, IntegrationConfig>>>,
}

impl IntegrationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new integration.
    ///
    /// Validates the request and builds the configuration record with the
    /// supplied credential envelope. The plaintext credential from the
    /// request is not stored.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an unknown kind, missing fields, or
    /// zero-valued limits.
    pub fn register(
        &self,
        request: &RegistrationRequest,
        credential: CredentialEnvelope,
    ) -> Result<IntegrationConfig, RegistryError> {
        let kind = validate(request)?;
        let now = Utc::now();

        let config = IntegrationConfig {
            id: IntegrationId::new(),
            name: request.name.clone(),
            kind,
            provider: request.provider.clone(),
            status: IntegrationStatus::Active,
            credential,
            endpoints: request.endpoints.clone(),
            rate_limits: request.rate_limits,
            last_sync: None,
            last_attempt_at: None,
            sync_frequency_minutes: request.sync_frequency_minutes,
            health: HealthState::default(),
            last_error: None,
            consecutive_failures: 0,
            created_at: now,
            updated_at: now,
        };

        let mut records = self.records.write().unwrap();
        records.insert(config.id, config.clone());
        Ok(config)
    }

    /// Inserts an already-validated record, preserving its id and state.
    ///
    /// Used when reloading persisted integrations at startup.
    pub fn restore(&self, config: IntegrationConfig) {
        let mut records = self.records.write().unwrap();
        records.insert(config.id, config);
    }

    /// Returns a snapshot of one integration.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the id is not registered.
    pub fn get(&self, id: IntegrationId) -> Result<IntegrationConfig, RegistryError> {
        let records = self.records.read().unwrap();
        records
            .get(&id)
            .cloned()
            .ok_or(RegistryError::NotFound { id })
    }

    /// Returns snapshots of all integrations, oldest registration first.
    #[must_use]
    pub fn list(&self) -> Vec<IntegrationConfig> {
        let records = self.records.read().unwrap();
        let mut all: Vec<_> = records.values().cloned().collect();
        all.sort_by_key(|config| config.id.as_ulid());
        all
    }

    /// Updates the lifecycle status of an integration.
    pub fn update_status(
        &self,
        id: IntegrationId,
        status: IntegrationStatus,
    ) -> Result<(), RegistryError> {
        self.mutate(id, |config| {
            config.status = status;
        })
    }

    /// Updates the health fields of an integration.
    ///
    /// Only the health monitor calls this; sync outcomes never touch
    /// health state.
    pub fn update_health(&self, id: IntegrationId, health: HealthState) -> Result<(), RegistryError> {
        self.mutate(id, |config| {
            config.health = health;
        })
    }

    /// Advances the last-sync timestamp.
    ///
    /// `last_sync` never moves backwards: a timestamp older than the
    /// current value leaves the record unchanged.
    pub fn update_last_sync(
        &self,
        id: IntegrationId,
        timestamp: DateTime<Utc>,
    ) -> Result<(), RegistryError> {
        self.mutate(id, |config| {
            if config.last_sync.is_none_or(|current| timestamp > current) {
                config.last_sync = Some(timestamp);
            }
        })
    }

    /// Records a successful sync: advances `last_sync`, reactivates the
    /// integration, and clears the failure counter.
    pub fn mark_synced(
        &self,
        id: IntegrationId,
        timestamp: DateTime<Utc>,
    ) -> Result<(), RegistryError> {
        self.mutate(id, |config| {
            if config.last_sync.is_none_or(|current| timestamp > current) {
                config.last_sync = Some(timestamp);
            }
            config.last_attempt_at = Some(timestamp);
            config.status = IntegrationStatus::Active;
            config.consecutive_failures = 0;
            config.last_error = None;
        })
    }

    /// Records a failed sync: bumps the failure counter, stores a short
    /// error summary, and moves the integration to error status.
    pub fn record_failure(&self, id: IntegrationId, summary: &str) -> Result<(), RegistryError> {
        self.mutate(id, |config| {
            config.status = IntegrationStatus::Error;
            config.last_attempt_at = Some(Utc::now());
            config.consecutive_failures = config.consecutive_failures.saturating_add(1);
            config.last_error = Some(summary.to_string());
        })
    }

    fn mutate(
        &self,
        id: IntegrationId,
        apply: impl FnOnce(&mut IntegrationConfig),
    ) -> Result<(), RegistryError> {
        let mut records = self.records.write().unwrap();
        let config = records.get_mut(&id).ok_or(RegistryError::NotFound { id })?;
        apply(config);
        config.updated_at = Utc::now();
        Ok(())
    }
}

impl Clone for IntegrationRegistry {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
        }
    }
}

fn validate(request: &RegistrationRequest) -> Result<IntegrationKind, ValidationError> {
    if request.name.trim().is_empty() {
        return Err(ValidationError::MissingField { field: "name" });
    }
    if request.provider.trim().is_empty() {
        return Err(ValidationError::MissingField { field: "provider" });
    }
    let kind: IntegrationKind = request.kind.parse()?;
    if request.endpoints.is_empty() {
        return Err(ValidationError::NoEndpoints);
    }
    if request.sync_frequency_minutes == 0 {
        return Err(ValidationError::ZeroSyncFrequency);
    }
    if request.rate_limits.requests_per_minute == 0 {
        return Err(ValidationError::ZeroRateLimit);
    }
    Ok(kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HealthStatus, RateLimits};
    use chrono::Duration;

    fn request(kind: &str) -> RegistrationRequest {
        RegistrationRequest {
            name: "Sales CRM".to_string(),
            kind: kind.to_string(),
            provider: "salesforce".to_string(),
            credentials: b"token".to_vec(),
            endpoints: vec!["https://api.example.com".to_string()],
            rate_limits: RateLimits::default(),
            sync_frequency_minutes: 15,
        }
    }

    fn envelope() -> CredentialEnvelope {
        CredentialEnvelope {
            cipher: "v1:AAAA:BBBB".to_string(),
            key_id: "primary".to_string(),
        }
    }

    #[test]
    fn register_valid_integration() {
        let registry = IntegrationRegistry::new();
        let config = registry
            .register(&request("crm"), envelope())
            .expect("should register");

        assert_eq!(config.kind, IntegrationKind::Crm);
        assert_eq!(config.status, IntegrationStatus::Active);
        assert_eq!(config.health.status, HealthStatus::Unknown);
        assert!(config.last_sync.is_none());

        let fetched = registry.get(config.id).expect("should exist");
        assert_eq!(fetched.name, "Sales CRM");
    }

    #[test]
    fn register_rejects_unknown_kind() {
        let registry = IntegrationRegistry::new();
        let result = registry.register(&request("blockchain"), envelope());

        match result {
            Err(RegistryError::Validation(ValidationError::UnknownKind { kind })) => {
                assert_eq!(kind, "blockchain");
            }
            other => panic!("expected UnknownKind, got {other:?}"),
        }
    }

    #[test]
    fn register_rejects_empty_name() {
        let registry = IntegrationRegistry::new();
        let mut bad = request("erp");
        bad.name = "   ".to_string();

        let result = registry.register(&bad, envelope());
        assert!(matches!(
            result,
            Err(RegistryError::Validation(ValidationError::MissingField {
                field: "name"
            }))
        ));
    }

    #[test]
    fn register_rejects_zero_frequency() {
        let registry = IntegrationRegistry::new();
        let mut bad = request("marketing");
        bad.sync_frequency_minutes = 0;

        let result = registry.register(&bad, envelope());
        assert!(matches!(
            result,
            Err(RegistryError::Validation(ValidationError::ZeroSyncFrequency))
        ));
    }

    #[test]
    fn get_unknown_id_is_not_found() {
        let registry = IntegrationRegistry::new();
        let result = registry.get(IntegrationId::new());
        assert!(matches!(result, Err(RegistryError::NotFound { .. })));
    }

    #[test]
    fn last_sync_never_moves_backwards() {
        let registry = IntegrationRegistry::new();
        let config = registry
            .register(&request("analytics"), envelope())
            .expect("should register");

        let newer = Utc::now();
        let older = newer - Duration::minutes(10);

        registry
            .update_last_sync(config.id, newer)
            .expect("should update");
        registry
            .update_last_sync(config.id, older)
            .expect("should accept but ignore");

        let fetched = registry.get(config.id).expect("should exist");
        assert_eq!(fetched.last_sync, Some(newer));
    }

    #[test]
    fn failure_and_recovery_cycle() {
        let registry = IntegrationRegistry::new();
        let config = registry
            .register(&request("storage"), envelope())
            .expect("should register");

        registry
            .record_failure(config.id, "connection refused")
            .expect("should record");
        registry
            .record_failure(config.id, "connection refused")
            .expect("should record");

        let failed = registry.get(config.id).expect("should exist");
        assert_eq!(failed.status, IntegrationStatus::Error);
        assert_eq!(failed.consecutive_failures, 2);
        assert_eq!(failed.last_error.as_deref(), Some("connection refused"));

        registry
            .mark_synced(config.id, Utc::now())
            .expect("should mark");

        let recovered = registry.get(config.id).expect("should exist");
        assert_eq!(recovered.status, IntegrationStatus::Active);
        assert_eq!(recovered.consecutive_failures, 0);
        assert!(recovered.last_error.is_none());
        assert!(recovered.last_sync.is_some());
    }

    #[test]
    fn update_health_touches_only_health_fields() {
        let registry = IntegrationRegistry::new();
        let config = registry
            .register(&request("communication"), envelope())
            .expect("should register");

        let health = HealthState {
            last_check: Some(Utc::now()),
            status: HealthStatus::Degraded,
            response_time_ms: Some(1500),
        };
        registry
            .update_health(config.id, health.clone())
            .expect("should update");

        let fetched = registry.get(config.id).expect("should exist");
        assert_eq!(fetched.health, health);
        assert_eq!(fetched.status, IntegrationStatus::Active);
        assert!(fetched.last_sync.is_none());
    }

    #[test]
    fn list_returns_registration_order() {
        let registry = IntegrationRegistry::new();
        let first = registry
            .register(&request("crm"), envelope())
            .expect("should register");
        let second = registry
            .register(&request("erp"), envelope())
            .expect("should register");

        let all = registry.list();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, first.id);
        assert_eq!(all[1].id, second.id);
    }
}
