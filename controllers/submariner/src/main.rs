//! Submariner Operator
//!
//! Deploys the Submariner multi-cluster networking components from the
//! `Submariner`, `ServiceDiscovery` and `Broker` CRDs, and tears the
//! privileged host-networking components down through uninstall workloads
//! when their CR is deleted.

mod apply;
mod backoff;
mod client;
mod config;
mod controller;
mod error;
mod metrics;
mod reconciler;
mod resources;
mod retry;
mod uninstall;
mod watcher;
mod web;
#[cfg(test)]
mod test_utils;

use crate::config::OperatorConfig;
use crate::error::ControllerError;
use controller::Controller;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = rustls::crypto::CryptoProvider::install_default(
        rustls::crypto::ring::default_provider(),
    ) {
        debug!(?e, "CryptoProvider already installed; proceeding");
    }

    info!("Starting Submariner operator");

    let config = OperatorConfig::from_env()?;

    info!("Configuration:");
    info!("  Namespace: {}", config.watch_namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Metrics address: {}", config.metrics_addr);
    info!("  Network plugin: {}", config.network_plugin);
    info!("  Pause image: {}", config.pause_image);

    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
