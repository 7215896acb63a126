//! Switch Controller
//!
//! Reconciles switch CRDs against the devices they describe:
//! - Switch: checks the device and creates one SwitchPort per allowed port
//! - SwitchPort: applies a tenant's SwitchPortConfiguration to the device
//! - SwitchResource: splits the VLAN pool into per-tenant SwitchResourceLimits
//!
//! Every kind is driven through its own state machine.

mod config;
mod context;
mod controller;
mod error;
mod finalizer;
mod provider;
mod reconciler;
mod store;
mod watcher;

#[cfg(test)]
mod test_utils;

use crate::config::Config;
use crate::error::ControllerError;
use controller::Controller;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// kube's rustls transport needs a process-wide crypto provider
fn install_crypto_provider() {
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        debug!("rustls crypto provider already installed");
    }
}

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    install_crypto_provider();

    info!("Starting Switch Controller");

    let config = Config::from_env()?;
    config.log();

    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
