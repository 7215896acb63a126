//! SwitchResource reconciler
//!
//! Splits the VLAN pool into per-tenant grants. `Verifying` releases grants
//! that were removed or changed and allocates new ones; `Creating` makes
//! sure every committed grant has its SwitchResourceLimit in the tenant's
//! namespace; `Running` watches for edits, lost limits, and drift of the
//! available set.

use super::{StepResult, namespace_of};
use crate::context::Context;
use crate::finalizer;
use crate::store::{Optional, ignore_already_exists, ignore_not_found};
use async_trait::async_trait;
use crds::{
    SwitchResource, SwitchResourceLimit, SwitchResourceLimitSpec, SwitchResourceReference, SwitchResourceState,
    SwitchResourceStatus, TENANT_LIMIT_NAME, TenantLimit,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;
use state_machine::{HandlerError, Instance, Transition, Workflow};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Handlers for every [`SwitchResourceState`].
pub struct SwitchResourceWorkflow {
    ctx: Arc<Context>,
}

impl SwitchResourceWorkflow {
    /// Handlers for SwitchResource objects, sharing `ctx`
    pub fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    async fn limit(&self, grant: &TenantLimit) -> Result<Option<SwitchResourceLimit>, HandlerError> {
        Ok(self
            .ctx
            .store
            .get_switch_resource_limit(&grant.namespace, TENANT_LIMIT_NAME)
            .await
            .optional()?)
    }

    async fn on_none(&self, resource: &mut SwitchResource) -> StepResult<SwitchResourceState> {
        if finalizer::is_deleting(resource) {
            return Ok(Transition::continue_now(SwitchResourceState::Deleting));
        }
        resource.initialize_available()?;
        finalizer::add(resource);
        Ok(Transition::continue_now(SwitchResourceState::Verifying))
    }

    /// Releases grants that left the spec, then allocates the new ones
    async fn verify(&self, resource: &mut SwitchResource) -> StepResult<SwitchResourceState> {
        if finalizer::is_deleting(resource) {
            return Ok(Transition::continue_now(SwitchResourceState::Deleting));
        }

        for (tenant, grant) in resource.committed_limits() {
            if resource.spec.tenant_limits.get(&tenant) == Some(&grant) {
                continue;
            }
            if let Some(limit) = self.limit(&grant).await? {
                let used = limit.used_vlans()?;
                if !used.is_empty() {
                    return Err(format!(
                        "tenant limit {} is in use by vlans {}, release them before changing the grant",
                        tenant, used
                    )
                    .into());
                }
                ignore_not_found(
                    self.ctx
                        .store
                        .delete_switch_resource_limit(&grant.namespace, TENANT_LIMIT_NAME)
                        .await,
                )?;
            }
            resource.release(&grant)?;
            if let Some(status) = resource.status.as_mut() {
                status.tenant_limits.remove(&tenant);
            }
            info!("Released grant {} ({}) of {}", tenant, grant.vlan_range, resource.key());
        }

        resource.spec.verify_tenant_limits()?;

        let committed = resource.committed_limits();
        let added: Vec<(String, TenantLimit)> = resource
            .spec
            .tenant_limits
            .iter()
            .filter(|(tenant, _)| !committed.contains_key(*tenant))
            .map(|(tenant, grant)| (tenant.clone(), grant.clone()))
            .collect();
        for (tenant, grant) in added {
            resource.allocate(&grant)?;
            debug!("Allocated grant {} ({}) of {}", tenant, grant.vlan_range, resource.key());
            resource
                .status
                .get_or_insert_with(SwitchResourceStatus::default)
                .tenant_limits
                .insert(tenant, grant);
        }

        Ok(Transition::continue_now(SwitchResourceState::Creating))
    }

    /// Creates the SwitchResourceLimit of every committed grant that lacks one
    async fn create(&self, resource: &mut SwitchResource) -> StepResult<SwitchResourceState> {
        if finalizer::is_deleting(resource) {
            return Ok(Transition::continue_now(SwitchResourceState::Deleting));
        }

        let owner = SwitchResourceReference {
            name: resource.name_any(),
            namespace: namespace_of(resource),
        };
        for (tenant, grant) in resource.committed_limits() {
            if self.limit(&grant).await?.is_some() {
                continue;
            }
            let limit = SwitchResourceLimit {
                metadata: ObjectMeta {
                    name: Some(TENANT_LIMIT_NAME.to_string()),
                    namespace: Some(grant.namespace.clone()),
                    ..Default::default()
                },
                spec: SwitchResourceLimitSpec {
                    vlan_range: grant.vlan_range.clone(),
                    switch_resource_ref: owner.clone(),
                },
                status: None,
            };
            ignore_already_exists(self.ctx.store.create_switch_resource_limit(&limit).await)?;
            info!("Created tenant limit {} in {} for {}", tenant, grant.namespace, resource.key());
        }

        Ok(Transition::continue_now(SwitchResourceState::Running))
    }

    /// Watches for grant edits, lost limits, pool edits, and drift of the available set
    async fn run(&self, resource: &mut SwitchResource) -> StepResult<SwitchResourceState> {
        if finalizer::is_deleting(resource) {
            return Ok(Transition::continue_now(SwitchResourceState::Deleting));
        }

        let committed = resource.committed_limits();
        if committed != resource.spec.tenant_limits {
            info!("Tenant limits of {} changed", resource.key());
            return Ok(Transition::continue_now(SwitchResourceState::Verifying));
        }

        for (tenant, grant) in &committed {
            if self.limit(grant).await?.is_none() {
                info!("Tenant limit {} of {} is missing, recreating", tenant, resource.key());
                return Ok(Transition::continue_now(SwitchResourceState::Creating));
            }
        }

        // A shrunk pool must still hold every grant
        let pool = resource.spec.pool()?;
        for (tenant, grant) in &committed {
            grant
                .verify_within(&pool)
                .map_err(|err| format!("tenant limit {} no longer fits the pool: {}", tenant, err))?;
        }

        let expected = resource.expected_available()?;
        if resource.available()? != expected {
            warn!("Available VLANs of {} drifted, resetting to {}", resource.key(), expected);
            resource
                .status
                .get_or_insert_with(SwitchResourceStatus::default)
                .available_vlan = expected.to_string();
        }

        Ok(Transition::continue_after(SwitchResourceState::Running, self.ctx.requeue_after))
    }

    /// Deletes every tenant limit, then releases the resource
    async fn delete(&self, resource: &mut SwitchResource) -> StepResult<SwitchResourceState> {
        let committed = resource.committed_limits();
        for grant in committed.values() {
            ignore_not_found(
                self.ctx
                    .store
                    .delete_switch_resource_limit(&grant.namespace, TENANT_LIMIT_NAME)
                    .await,
            )?;
        }
        for (tenant, grant) in &committed {
            if self.limit(grant).await?.is_some() {
                debug!("Waiting for tenant limit {} of {} to go away", tenant, resource.key());
                return Ok(Transition::continue_after(SwitchResourceState::Deleting, self.ctx.requeue_after));
            }
        }

        if finalizer::remove(resource) {
            info!("Released {}", resource.key());
        }
        Ok(Transition::complete(SwitchResourceState::Deleting))
    }
}

#[async_trait]
impl Workflow<SwitchResource> for SwitchResourceWorkflow {
    async fn step(&self, state: SwitchResourceState, resource: &mut SwitchResource) -> Transition<SwitchResourceState> {
        let result = match state {
            SwitchResourceState::None => self.on_none(resource).await,
            SwitchResourceState::Verifying => self.verify(resource).await,
            SwitchResourceState::Creating => self.create(resource).await,
            SwitchResourceState::Running => self.run(resource).await,
            SwitchResourceState::Deleting => self.delete(resource).await,
        };
        result.unwrap_or_else(|err| Transition::retry(state, self.ctx.requeue_after, err))
    }
}
