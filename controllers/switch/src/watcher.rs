//! Kubernetes resource watchers.
//!
//! One `kube_runtime::Controller` per managed kind. Every watcher funnels
//! into [`reconcile_resource`], so the reconcile loop, persistence, and
//! error policy are the same for all kinds.

use crate::config::Config;
use crate::context::Context;
use crate::error::ControllerError;
use crate::reconciler::{Managed, error_policy, reconcile_resource};
use crds::{Switch, SwitchPort, SwitchResource};
use futures::StreamExt;
use kube::core::NamespaceResourceScope;
use kube::{Api, Client, Resource};
use kube_runtime::controller::Config as ControllerConfig;
use kube_runtime::{Controller, watcher};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Drives `controller` until its watch stream ends.
async fn watch_resource<K>(
    controller: Controller<K>,
    ctx: Arc<Context>,
    config: &Config,
    resource_name: &'static str,
) -> Result<(), ControllerError>
where
    K: Managed + Debug + DeserializeOwned,
{
    info!("Starting {} watcher", resource_name);

    let controller_config = ControllerConfig::default()
        .debounce(config.debounce)
        .concurrency(config.concurrency);

    controller
        .with_config(controller_config)
        .run(reconcile_resource::<K>, error_policy::<K>, ctx)
        .for_each(|res| async move {
            match res {
                Ok((object, action)) => debug!("Reconciled {} {}: {:?}", resource_name, object, action),
                Err(e) => error!("Controller error for {}: {}", resource_name, e),
            }
        })
        .await;

    info!("{} watcher stopped", resource_name);
    Ok(())
}

/// Watches the managed kinds in one namespace, or cluster-wide.
pub struct Watcher {
    client: Client,
    ctx: Arc<Context>,
    config: Config,
}

impl Watcher {
    /// Creates a watcher scoped by `config.namespace`
    pub fn new(client: Client, ctx: Arc<Context>, config: Config) -> Self {
        Self { client, ctx, config }
    }

    fn api<K>(&self) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    {
        match &self.config.namespace {
            Some(namespace) => Api::namespaced(self.client.clone(), namespace),
            None => Api::all(self.client.clone()),
        }
    }

    /// Starts watching Switch resources and the SwitchPorts they own.
    pub async fn watch_switches(&self) -> Result<(), ControllerError> {
        let controller = Controller::new(self.api::<Switch>(), watcher::Config::default())
            .owns(self.api::<SwitchPort>(), watcher::Config::default());
        watch_resource(controller, self.ctx.clone(), &self.config, "Switch").await
    }

    /// Starts watching SwitchPort resources.
    pub async fn watch_switch_ports(&self) -> Result<(), ControllerError> {
        let controller = Controller::new(self.api::<SwitchPort>(), watcher::Config::default());
        watch_resource(controller, self.ctx.clone(), &self.config, "SwitchPort").await
    }

    /// Starts watching SwitchResource resources.
    pub async fn watch_switch_resources(&self) -> Result<(), ControllerError> {
        let controller = Controller::new(self.api::<SwitchResource>(), watcher::Config::default());
        watch_resource(controller, self.ctx.clone(), &self.config, "SwitchResource").await
    }
}
