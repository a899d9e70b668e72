//! Agendo Server — runs the license sweep against the store.

mod config;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use agendo_core::clock::SystemClock;
use agendo_session::{LicenseManager, spawn_license_sweeper};
use agendo_store::MemoryStore;
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("agendo=info")),
        )
        .json()
        .init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        namespace = %config.store.namespace,
        sweep_interval_secs = config.session.sweep_interval_secs,
        "Starting Agendo server..."
    );

    let store = MemoryStore::new(config.store);
    let manager = Arc::new(LicenseManager::new(store, Arc::new(SystemClock)));
    let sweeper = spawn_license_sweeper(
        manager,
        Duration::from_secs(config.session.sweep_interval_secs),
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "could not listen for shutdown signal");
    }
    sweeper.abort();

    tracing::info!("Agendo server stopped.");
    ExitCode::SUCCESS
}
