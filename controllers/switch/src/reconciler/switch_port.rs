//! SwitchPort reconciler
//!
//! A port waits in `Idle` until a tenant points it at a configuration.
//! `Verifying` checks the configuration against the owning Switch's port
//! policy and the tenant's VLAN quota, then snapshots it into status;
//! `Configuring` pushes the snapshot to the device and charges the quota;
//! `Active` watches for edits and out-of-band changes; `Cleaning` undoes
//! both the device change and the quota charge.

use super::{StepResult, namespace_of};
use crate::context::Context;
use crate::finalizer;
use crate::provider;
use crate::store::Optional;
use async_trait::async_trait;
use crds::{
    RangeSet, SWITCH_KIND, Switch, SwitchPort, SwitchPortConfigurationSpec, SwitchPortState, SwitchPortStatus,
    SwitchResourceLimit, TENANT_LIMIT_NAME,
};
use kube::ResourceExt;
use state_machine::{HandlerError, Instance, Transition, Workflow};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Handlers for every [`SwitchPortState`].
pub struct SwitchPortWorkflow {
    ctx: Arc<Context>,
}

impl SwitchPortWorkflow {
    /// Handlers for SwitchPort objects, sharing `ctx`
    pub fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    /// The Switch listed as this port's owner, if it still exists
    async fn owner(&self, port: &SwitchPort) -> Result<Option<Switch>, HandlerError> {
        let Some(owner) = port.owner_references().iter().find(|owner| owner.kind == SWITCH_KIND) else {
            return Ok(None);
        };
        Ok(self
            .ctx
            .store
            .get_switch(&namespace_of(port), &owner.name)
            .await
            .optional()?)
    }

    /// Quota object of `tenant_namespace`, if the tenant has one
    async fn tenant_limit(&self, tenant_namespace: Option<String>) -> Result<Option<SwitchResourceLimit>, HandlerError> {
        let Some(namespace) = tenant_namespace else {
            return Ok(None);
        };
        Ok(self
            .ctx
            .store
            .get_switch_resource_limit(&namespace, TENANT_LIMIT_NAME)
            .await
            .optional()?)
    }

    /// VLANs that the other ports of `tenant_namespace` have configured
    async fn vlans_in_use(&self, port: &SwitchPort, tenant_namespace: &str) -> Result<RangeSet, HandlerError> {
        let mut in_use = RangeSet::new();
        for other in self.ctx.store.list_switch_ports().await? {
            if other.key() == port.key() || other.committed_tenant_namespace().as_deref() != Some(tenant_namespace) {
                continue;
            }
            if let Some(configuration) = other.committed_configuration() {
                in_use = in_use.union(&configuration.vlans()?);
            }
        }
        Ok(in_use)
    }

    /// Device port name recorded in Verifying
    fn device_port(port: &SwitchPort) -> String {
        port.port_name().map_or_else(|| port.name_any(), str::to_string)
    }

    async fn fetch_configuration(&self, port: &SwitchPort) -> Result<Option<SwitchPortConfigurationSpec>, HandlerError> {
        let Some(reference) = port.spec.configuration.as_ref() else {
            return Ok(None);
        };
        let namespace = namespace_of(port);
        let configuration = self
            .ctx
            .store
            .get_switch_port_configuration(reference.namespace_or(&namespace), &reference.name)
            .await
            .optional()?;
        Ok(configuration.map(|configuration| configuration.spec))
    }

    async fn on_none(&self, port: &mut SwitchPort) -> StepResult<SwitchPortState> {
        if finalizer::is_deleting(port) {
            return Ok(Transition::continue_now(SwitchPortState::Deleting));
        }
        finalizer::add(port);
        Ok(Transition::continue_now(SwitchPortState::Idle))
    }

    /// Waits for a configuration reference and an owning Switch
    async fn idle(&self, port: &mut SwitchPort) -> StepResult<SwitchPortState> {
        if finalizer::is_deleting(port) {
            return Ok(Transition::continue_now(SwitchPortState::Deleting));
        }
        let owned = port.owner_references().iter().any(|owner| owner.kind == SWITCH_KIND);
        if port.spec.configuration.is_none() || !owned {
            debug!("{} has nothing to configure", port.key());
            return Ok(Transition::continue_after(SwitchPortState::Idle, self.ctx.requeue_after));
        }
        Ok(Transition::continue_now(SwitchPortState::Verifying))
    }

    /// Checks the referenced configuration and snapshots it
    async fn verify(&self, port: &mut SwitchPort) -> StepResult<SwitchPortState> {
        if finalizer::is_deleting(port) || port.spec.configuration.is_none() {
            return Ok(Transition::continue_now(SwitchPortState::Idle));
        }

        let name = port.name_any();
        let switch = self.owner(port).await?.ok_or("owning switch not found")?;
        let policy = switch
            .committed_ports()
            .and_then(|ports| ports.get(&name))
            .ok_or_else(|| format!("port {} is not listed by switch {}", name, switch.name_any()))?;

        let configuration = self
            .fetch_configuration(port)
            .await?
            .ok_or("referenced SwitchPortConfiguration not found")?;
        policy.verify(&configuration)?;

        let tenant_namespace = port.tenant_namespace();
        match self.tenant_limit(tenant_namespace.clone()).await? {
            Some(limit) => limit.verify_configuration(&configuration)?,
            None => debug!("No tenant limit for {}, skipping quota check", port.key()),
        }

        provider::backend_for(&self.ctx, &switch).await?.is_available().await?;

        let status = port.status.get_or_insert_with(SwitchPortStatus::default);
        status.port_name = Some(policy.physical_name(&name).to_string());
        status.configuration = Some(configuration);
        status.tenant_namespace = tenant_namespace;
        Ok(Transition::continue_now(SwitchPortState::Configuring))
    }

    /// Pushes the snapshot to the device and charges the tenant quota
    async fn configure(&self, port: &mut SwitchPort) -> StepResult<SwitchPortState> {
        if finalizer::is_deleting(port) || port.spec.configuration.is_none() {
            return Ok(Transition::continue_now(SwitchPortState::Cleaning));
        }
        let Some(configuration) = port.committed_configuration().cloned() else {
            return Ok(Transition::continue_now(SwitchPortState::Verifying));
        };

        let switch = self.owner(port).await?.ok_or("owning switch not found")?;
        let device_port = Self::device_port(port);
        provider::backend_for(&self.ctx, &switch)
            .await?
            .set_port_attr(&device_port, &configuration)
            .await?;
        info!("Configured port {} for {}", device_port, port.key());

        if let Some(mut limit) = self.tenant_limit(port.committed_tenant_namespace()).await? {
            limit.expansion(&configuration)?;
            self.ctx.store.update_switch_resource_limit_status(&limit).await?;
        }

        Ok(Transition::continue_now(SwitchPortState::Active))
    }

    /// Watches for configuration edits and out-of-band device changes
    async fn active(&self, port: &mut SwitchPort) -> StepResult<SwitchPortState> {
        if finalizer::is_deleting(port) || port.spec.configuration.is_none() {
            return Ok(Transition::continue_now(SwitchPortState::Cleaning));
        }
        let Some(configuration) = port.committed_configuration().cloned() else {
            return Ok(Transition::continue_now(SwitchPortState::Verifying));
        };

        let desired = self.fetch_configuration(port).await?;
        if desired.as_ref() != Some(&configuration) {
            info!("Configuration of {} changed, cleaning before reapplying", port.key());
            return Ok(Transition::continue_now(SwitchPortState::Cleaning));
        }

        let switch = self.owner(port).await?.ok_or("owning switch not found")?;
        let device_port = Self::device_port(port);
        let live = provider::backend_for(&self.ctx, &switch)
            .await?
            .get_port_attr(&device_port)
            .await?;
        if live != configuration {
            warn!("Port {} of {} was changed externally, reapplying", device_port, port.key());
            return Ok(Transition::continue_now(SwitchPortState::Configuring));
        }

        Ok(Transition::continue_after(SwitchPortState::Active, self.ctx.requeue_after))
    }

    /// Resets the device port and returns the VLANs to the tenant quota
    async fn clean(&self, port: &mut SwitchPort) -> StepResult<SwitchPortState> {
        if let Some(configuration) = port.committed_configuration().cloned() {
            let device_port = Self::device_port(port);
            match self.owner(port).await? {
                Some(switch) => {
                    provider::backend_for(&self.ctx, &switch)
                        .await?
                        .reset_port(&device_port, &configuration)
                        .await?;
                    info!("Reset port {} for {}", device_port, port.key());
                }
                None => warn!("Owning switch of {} is gone, skipping device reset", port.key()),
            }

            if let Some(mut limit) = self.tenant_limit(port.committed_tenant_namespace()).await? {
                let in_use = self.vlans_in_use(port, &namespace_of(&limit)).await?;
                limit.shrink(&configuration, &in_use)?;
                self.ctx.store.update_switch_resource_limit_status(&limit).await?;
            }
        }

        let status = port.status.get_or_insert_with(SwitchPortStatus::default);
        status.configuration = None;
        status.port_name = None;
        status.tenant_namespace = None;

        if finalizer::is_deleting(port) {
            Ok(Transition::continue_now(SwitchPortState::Deleting))
        } else {
            Ok(Transition::continue_now(SwitchPortState::Idle))
        }
    }

    async fn delete(&self, port: &mut SwitchPort) -> StepResult<SwitchPortState> {
        if finalizer::remove(port) {
            info!("Released {}", port.key());
        }
        Ok(Transition::complete(SwitchPortState::Deleting))
    }
}

#[async_trait]
impl Workflow<SwitchPort> for SwitchPortWorkflow {
    async fn step(&self, state: SwitchPortState, port: &mut SwitchPort) -> Transition<SwitchPortState> {
        let result = match state {
            SwitchPortState::None => self.on_none(port).await,
            SwitchPortState::Idle => self.idle(port).await,
            SwitchPortState::Verifying => self.verify(port).await,
            SwitchPortState::Configuring => self.configure(port).await,
            SwitchPortState::Active => self.active(port).await,
            SwitchPortState::Cleaning => self.clean(port).await,
            SwitchPortState::Deleting => self.delete(port).await,
        };
        result.unwrap_or_else(|err| Transition::retry(state, self.ctx.requeue_after, err))
    }
}
