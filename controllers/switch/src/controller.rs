//! Main controller implementation.
//!
//! This module contains the `Controller` struct that wires the store, the
//! backend registry, and one watcher per kind:
//! - Switch: device reachability and SwitchPort children
//! - SwitchPort: port configuration on the device and tenant quota
//! - SwitchResource: VLAN pool split into tenant limits

use crate::config::Config;
use crate::context::Context;
use crate::error::ControllerError;
use crate::store::KubeStore;
use crate::watcher::Watcher;
use kube::Client;
use std::sync::Arc;
use switch_backend::{BackendRegistry, FakeBackend};
use tokio::task::JoinHandle;
use tracing::info;

/// Main controller for switch resource management.
pub struct Controller {
    switch_watcher: JoinHandle<Result<(), ControllerError>>,
    switch_port_watcher: JoinHandle<Result<(), ControllerError>>,
    switch_resource_watcher: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance and starts its watchers.
    pub async fn new(config: Config) -> Result<Self, ControllerError> {
        info!("Initializing Switch Controller");

        let client = Client::try_default().await?;
        let store = Arc::new(KubeStore::new(client.clone()));

        // TestSwitch providers resolve to the in-memory backend; vendor
        // drivers are registered here by deployments that ship them
        let backends = BackendRegistry::new().with_fake(&FakeBackend::new());
        info!("Registered switch backends: {:?}", backends);

        let ctx = Arc::new(Context::new(store, backends, &config));
        let watcher_instance = Arc::new(Watcher::new(client, ctx, config));

        let switch_watcher = {
            let watcher = watcher_instance.clone();
            tokio::spawn(async move { watcher.watch_switches().await })
        };
        let switch_port_watcher = {
            let watcher = watcher_instance.clone();
            tokio::spawn(async move { watcher.watch_switch_ports().await })
        };
        let switch_resource_watcher = {
            let watcher = watcher_instance.clone();
            tokio::spawn(async move { watcher.watch_switch_resources().await })
        };

        Ok(Self {
            switch_watcher,
            switch_port_watcher,
            switch_resource_watcher,
        })
    }

    /// Runs until any watcher exits.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("Switch Controller running");

        tokio::select! {
            result = &mut self.switch_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("Switch watcher panicked: {}", e)))??;
            }
            result = &mut self.switch_port_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("SwitchPort watcher panicked: {}", e)))??;
            }
            result = &mut self.switch_resource_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("SwitchResource watcher panicked: {}", e)))??;
            }
        }

        Err(ControllerError::Watch("a watcher stopped unexpectedly".to_string()))
    }
}
