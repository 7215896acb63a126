//! Switch reconciler
//!
//! `None → Verifying → Configuring → Running`, with `Deleting` reachable
//! from every state once a deletion timestamp is set.

use super::{StepResult, namespace_of};
use crate::context::Context;
use crate::finalizer;
use crate::provider;
use crate::store::{Optional, ignore_already_exists, ignore_not_found};
use async_trait::async_trait;
use crds::{Switch, SwitchPort, SwitchPortSpec, SwitchState, SwitchStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Resource;
use state_machine::{Instance, Transition, Workflow};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Handlers for every [`SwitchState`].
pub struct SwitchWorkflow {
    ctx: Arc<Context>,
}

impl SwitchWorkflow {
    /// Handlers for Switch objects, sharing `ctx`
    pub fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    async fn on_none(&self, switch: &mut Switch) -> StepResult<SwitchState> {
        if finalizer::is_deleting(switch) {
            return Ok(Transition::continue_now(SwitchState::Deleting));
        }
        finalizer::add(switch);
        Ok(Transition::continue_now(SwitchState::Verifying))
    }

    /// Checks the device and commits the provider and port policies
    async fn verify(&self, switch: &mut Switch) -> StepResult<SwitchState> {
        if finalizer::is_deleting(switch) {
            return Ok(Transition::continue_now(SwitchState::Deleting));
        }

        let backend = provider::backend_for(&self.ctx, switch).await?;
        backend.is_available().await?;

        // SwitchPorts whose policy was removed or changed are deleted; Configuring
        // recreates the ones that are still listed
        let namespace = namespace_of(switch);
        let stale: Vec<String> = switch
            .committed_ports()
            .map(|committed| {
                committed
                    .iter()
                    .filter(|(name, policy)| switch.spec.ports.get(*name) != Some(*policy))
                    .map(|(name, _)| name.clone())
                    .collect()
            })
            .unwrap_or_default();
        for name in stale {
            info!("Port policy {} of {} changed, deleting SwitchPort", name, switch.key());
            ignore_not_found(self.ctx.store.delete_switch_port(&namespace, &name).await)?;
        }

        let key = switch.key();
        let status = switch.status.get_or_insert_with(SwitchStatus::default);
        if status.provider.is_none() {
            status.provider = switch.spec.provider.clone();
        } else if status.provider != switch.spec.provider {
            warn!("Provider of {} is already committed, ignoring the change", key);
        }
        status.ports = switch.spec.ports.clone();

        Ok(Transition::continue_now(SwitchState::Configuring))
    }

    /// Creates one SwitchPort per committed port policy
    async fn configure(&self, switch: &mut Switch) -> StepResult<SwitchState> {
        if finalizer::is_deleting(switch) {
            return Ok(Transition::continue_now(SwitchState::Deleting));
        }

        let owner = switch
            .controller_owner_ref(&())
            .ok_or("switch has no uid, cannot own SwitchPorts")?;
        let namespace = namespace_of(switch);
        for name in switch.committed_ports().into_iter().flat_map(|ports| ports.keys()) {
            let port = SwitchPort {
                metadata: ObjectMeta {
                    name: Some(name.clone()),
                    namespace: Some(namespace.clone()),
                    owner_references: Some(vec![owner.clone()]),
                    ..Default::default()
                },
                spec: SwitchPortSpec::default(),
                status: None,
            };
            debug!("Ensuring SwitchPort {}/{}", namespace, name);
            ignore_already_exists(self.ctx.store.create_switch_port(&port).await)?;
        }

        Ok(Transition::continue_now(SwitchState::Running))
    }

    /// Watches for policy edits, missing SwitchPorts, and device reachability
    async fn run(&self, switch: &mut Switch) -> StepResult<SwitchState> {
        if finalizer::is_deleting(switch) {
            return Ok(Transition::continue_now(SwitchState::Deleting));
        }

        if switch.committed_ports() != Some(&switch.spec.ports) {
            info!("Port policies of {} changed", switch.key());
            return Ok(Transition::continue_now(SwitchState::Verifying));
        }

        let namespace = namespace_of(switch);
        for name in switch.committed_ports().into_iter().flat_map(|ports| ports.keys()) {
            if self.ctx.store.get_switch_port(&namespace, name).await.optional()?.is_none() {
                info!("SwitchPort {}/{} is missing, recreating", namespace, name);
                return Ok(Transition::continue_now(SwitchState::Configuring));
            }
        }

        provider::backend_for(&self.ctx, switch).await?.is_available().await?;
        Ok(Transition::continue_after(SwitchState::Running, self.ctx.requeue_after))
    }

    /// Deletes the Switch together with its SwitchPorts, then releases it
    async fn delete(&self, switch: &mut Switch) -> StepResult<SwitchState> {
        let pending = self.ctx.store.delete_switch(switch, true).await.optional()?.flatten();
        if let Some(current) = pending {
            // Carry the server's view forward so the finalizer update does not conflict
            let meta = switch.meta_mut();
            meta.resource_version = current.metadata.resource_version;
            meta.finalizers = current.metadata.finalizers;
            meta.deletion_timestamp = current.metadata.deletion_timestamp;
        }

        if finalizer::remove(switch) {
            info!("Released {}", switch.key());
        }
        Ok(Transition::complete(SwitchState::Deleting))
    }
}

#[async_trait]
impl Workflow<Switch> for SwitchWorkflow {
    async fn step(&self, state: SwitchState, switch: &mut Switch) -> Transition<SwitchState> {
        let result = match state {
            SwitchState::None => self.on_none(switch).await,
            SwitchState::Verifying => self.verify(switch).await,
            SwitchState::Configuring => self.configure(switch).await,
            SwitchState::Running => self.run(switch).await,
            SwitchState::Deleting => self.delete(switch).await,
        };
        result.unwrap_or_else(|err| Transition::retry(state, self.ctx.requeue_after, err))
    }
}
