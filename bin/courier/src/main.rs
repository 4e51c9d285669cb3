//! Sync daemon entry point.
//!
//! Wires the orchestrator together from configuration, reloads persisted
//! state, starts the scheduler and health monitor loops, and shuts both
//! down on SIGINT.

mod config;

use cobalt_courier_integration::connector::ConnectorSet;
use cobalt_courier_integration::credential::CredentialVault;
use cobalt_courier_scheduler::SyncOrchestrator;
use cobalt_courier_sync::store::MemorySyncStore;
use std::sync::Arc;

use crate::config::DaemonConfig;

#[tokio::main]
async fn main() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = DaemonConfig::from_env().expect("failed to load configuration");
    tracing::info!("Loaded configuration");

    let vault = match config
        .credential_key_bytes()
        .expect("invalid credential key configuration")
    {
        Some(key) => CredentialVault::new(&config.credential_key_id, key),
        None => {
            tracing::warn!(
                "No credential key configured; using an ephemeral key, so sealed credentials will not survive a restart"
            );
            CredentialVault::generate(&config.credential_key_id)
        }
    };

    // Vendor connectors are external collaborators registered by the
    // embedding application; the stand-in mocks keep the daemon operable
    // without them.
    let connectors = ConnectorSet::mocked();

    let store = Arc::new(MemorySyncStore::new());
    let mut orchestrator = SyncOrchestrator::new(
        vault,
        connectors,
        store,
        config.orchestrator_config(),
    );

    orchestrator
        .bootstrap()
        .await
        .expect("failed to reload persisted state");

    orchestrator.start();

    tokio::signal::ctrl_c()
        .await
        .expect("failed to listen for shutdown signal");
    tracing::info!("Shutdown signal received");

    orchestrator.shutdown().await;
}
