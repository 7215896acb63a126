//! Reconciliation logic for switch CRDs.
//!
//! Each kind has a [`Workflow`](state_machine::Workflow) with one handler per
//! state:
//! - `switch`: Switch (device reachability, SwitchPort children)
//! - `switch_port`: SwitchPort (policy and quota checks, device configuration)
//! - `switch_resource`: SwitchResource (VLAN pool split into tenant limits)
//!
//! [`reconcile_resource`] is the glue between `kube_runtime` and the state
//! machine: it runs one handler and persists the zones the handler changed.

pub mod switch;
pub mod switch_port;
pub mod switch_resource;

#[cfg(test)]
mod switch_port_test;

use crate::context::Context;
use crate::error::{ControllerError, StoreError};
use crate::finalizer;
use crate::store::ResourceStore;
use crds::{Switch, SwitchPort, SwitchResource};
use kube::{Resource, ResourceExt};
use kube_runtime::controller::Action;
use state_machine::{Handlers, HandlerError, Instance, Machine, MachineError, Requeue, Transition};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

pub use self::switch::SwitchWorkflow;
pub use self::switch_port::SwitchPortWorkflow;
pub use self::switch_resource::SwitchResourceWorkflow;

/// Result type of the per-state handler methods
pub type StepResult<S> = Result<Transition<S>, HandlerError>;

/// A kind the controller drives through a state machine.
#[async_trait::async_trait]
pub trait Managed: Instance + Resource<DynamicType = ()> + 'static {
    /// Machine with this kind's handlers bound to `ctx`
    fn machine(ctx: &Arc<Context>) -> Machine<Self>;

    /// Persist metadata and spec
    async fn update(store: &dyn ResourceStore, object: &Self) -> Result<Self, StoreError>;

    /// Persist status
    async fn update_status(store: &dyn ResourceStore, object: &Self) -> Result<Self, StoreError>;
}

#[async_trait::async_trait]
impl Managed for Switch {
    fn machine(ctx: &Arc<Context>) -> Machine<Self> {
        let handlers = Handlers::for_workflow(SwitchWorkflow::new(ctx.clone()), crds::SwitchState::ALL);
        Machine::new(handlers).with_error_requeue(ctx.error_requeue)
    }

    async fn update(store: &dyn ResourceStore, object: &Self) -> Result<Self, StoreError> {
        store.update_switch(object).await
    }

    async fn update_status(store: &dyn ResourceStore, object: &Self) -> Result<Self, StoreError> {
        store.update_switch_status(object).await
    }
}

#[async_trait::async_trait]
impl Managed for SwitchPort {
    fn machine(ctx: &Arc<Context>) -> Machine<Self> {
        let handlers = Handlers::for_workflow(SwitchPortWorkflow::new(ctx.clone()), crds::SwitchPortState::ALL);
        Machine::new(handlers).with_error_requeue(ctx.error_requeue)
    }

    async fn update(store: &dyn ResourceStore, object: &Self) -> Result<Self, StoreError> {
        store.update_switch_port(object).await
    }

    async fn update_status(store: &dyn ResourceStore, object: &Self) -> Result<Self, StoreError> {
        store.update_switch_port_status(object).await
    }
}

#[async_trait::async_trait]
impl Managed for SwitchResource {
    fn machine(ctx: &Arc<Context>) -> Machine<Self> {
        let handlers =
            Handlers::for_workflow(SwitchResourceWorkflow::new(ctx.clone()), crds::SwitchResourceState::ALL);
        Machine::new(handlers).with_error_requeue(ctx.error_requeue)
    }

    async fn update(store: &dyn ResourceStore, object: &Self) -> Result<Self, StoreError> {
        store.update_switch_resource(object).await
    }

    async fn update_status(store: &dyn ResourceStore, object: &Self) -> Result<Self, StoreError> {
        store.update_switch_resource_status(object).await
    }
}

/// Map a requeue hint onto a controller action
pub fn requeue_action(requeue: Requeue) -> Action {
    match requeue {
        Requeue::Immediate => Action::requeue(Duration::ZERO),
        Requeue::After(delay) => Action::requeue(delay),
        Requeue::None => Action::await_change(),
    }
}

/// Runs one state handler for `object` and persists what it changed.
///
/// Metadata/spec is written first; the status write carries the
/// resourceVersion returned by it. Once the finalizer is gone the object
/// may vanish under us, which is not an error.
pub async fn reconcile_resource<K: Managed>(object: Arc<K>, ctx: Arc<Context>) -> Result<Action, ControllerError> {
    let mut instance = (*object).clone();
    let key = instance.key();
    info!("Reconciling {} ({})", key, instance.state());

    let outcome = K::machine(&ctx).reconcile(&mut instance).await;
    match outcome.error {
        Some(err) if err.is_reconcile_error() => return Err(ControllerError::Reconcile(err)),
        Some(err) => debug!("{} will be retried: {}", key, err),
        None => {}
    }

    if outcome.dirty.metadata_and_spec() {
        match K::update(ctx.store.as_ref(), &instance).await {
            Ok(updated) => instance.meta_mut().resource_version = updated.meta().resource_version.clone(),
            Err(err) if err.is_not_found() && !finalizer::has(&instance) => {
                debug!("{} is gone", key);
                return Ok(Action::await_change());
            }
            Err(err) => return Err(err.into()),
        }
    }

    if outcome.dirty.status() {
        match K::update_status(ctx.store.as_ref(), &instance).await {
            Ok(_) => {}
            Err(err) if err.is_not_found() && !finalizer::has(&instance) => {
                debug!("{} is gone", key);
                return Ok(Action::await_change());
            }
            Err(err) => return Err(err.into()),
        }
    }

    Ok(requeue_action(outcome.requeue))
}

/// Decides what happens after `reconcile_resource` fails
pub fn error_policy<K: Managed>(object: Arc<K>, err: &ControllerError, ctx: Arc<Context>) -> Action {
    error!("Reconciliation error for {}: {}", object.key(), err);
    match err {
        // A missing handler is a defect, retrying will not help
        ControllerError::Reconcile(MachineError::NoHandlers | MachineError::NoHandler(_)) => Action::await_change(),
        _ => Action::requeue(ctx.error_requeue),
    }
}

/// Namespace of `object`, empty for cluster-scoped objects
pub(crate) fn namespace_of<K: ResourceExt>(object: &K) -> String {
    object.namespace().unwrap_or_default()
}
