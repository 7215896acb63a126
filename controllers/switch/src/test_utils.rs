//! Test utilities for unit testing reconcilers
//!
//! Builders for test objects plus helpers that drive one reconcile against
//! a [`MockStore`].

use crate::config::Config;
use crate::context::Context;
use crate::reconciler::{Managed, reconcile_resource};
use crate::store::MockStore;
use crate::store::mock::now;
use crds::*;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Resource;
use kube_runtime::controller::Action;
use state_machine::Reconciled;
use std::sync::Arc;
use switch_backend::{BackendRegistry, FakeBackend};

fn meta(name: &str, namespace: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        ..Default::default()
    }
}

/// Helper to create a test Switch using the `TestSwitch` provider `lab`
pub fn create_test_switch(name: &str, namespace: &str, ports: &[(&str, PortPolicy)]) -> Switch {
    Switch {
        metadata: meta(name, namespace),
        spec: SwitchSpec {
            provider: Some(SwitchProviderReference::new(TEST_SWITCH_KIND, "lab")),
            ports: ports
                .iter()
                .map(|(port, policy)| ((*port).to_string(), policy.clone()))
                .collect(),
        },
        status: None,
    }
}

/// Helper to create a test SwitchPort
pub fn create_test_switch_port(
    name: &str,
    namespace: &str,
    configuration: Option<SwitchPortConfigurationReference>,
) -> SwitchPort {
    SwitchPort {
        metadata: meta(name, namespace),
        spec: SwitchPortSpec { configuration },
        status: None,
    }
}

/// Helper to create a test SwitchPortConfiguration
pub fn create_test_configuration(
    name: &str,
    namespace: &str,
    untagged_vlan: Option<u32>,
    tagged_vlan_range: &str,
) -> SwitchPortConfiguration {
    SwitchPortConfiguration {
        metadata: meta(name, namespace),
        spec: SwitchPortConfigurationSpec {
            untagged_vlan,
            tagged_vlan_range: tagged_vlan_range.to_string(),
            ..Default::default()
        },
    }
}

/// Reference to a configuration in `namespace`
pub fn configuration_ref(name: &str, namespace: &str) -> SwitchPortConfigurationReference {
    SwitchPortConfigurationReference {
        name: name.to_string(),
        namespace: Some(namespace.to_string()),
    }
}

/// Helper to create a test SwitchResource; `limits` are `(tenant, namespace, vlans)`
pub fn create_test_switch_resource(
    name: &str,
    namespace: &str,
    vlan_range: &str,
    limits: &[(&str, &str, &str)],
) -> SwitchResource {
    SwitchResource {
        metadata: meta(name, namespace),
        spec: SwitchResourceSpec {
            vlan_range: vlan_range.to_string(),
            tenant_limits: limits
                .iter()
                .map(|(tenant, ns, vlans)| {
                    (
                        (*tenant).to_string(),
                        TenantLimit {
                            namespace: (*ns).to_string(),
                            vlan_range: (*vlans).to_string(),
                        },
                    )
                })
                .collect(),
        },
        status: None,
    }
}

/// Helper to create a tenant limit granting `vlan_range`, with `used` VLANs in status
pub fn create_test_limit(namespace: &str, vlan_range: &str, used: Option<&str>) -> SwitchResourceLimit {
    SwitchResourceLimit {
        metadata: meta(TENANT_LIMIT_NAME, namespace),
        spec: SwitchResourceLimitSpec {
            vlan_range: vlan_range.to_string(),
            switch_resource_ref: SwitchResourceReference {
                name: "fabric".to_string(),
                namespace: "infra".to_string(),
            },
        },
        status: used.map(|used| SwitchResourceLimitStatus {
            used_vlan: used.to_string(),
        }),
    }
}

/// Sets `deletionTimestamp`, as a delete request would
pub fn mark_deleting<K: Resource>(object: &mut K) {
    object.meta_mut().deletion_timestamp = Some(now());
}

/// Context over `store` whose only backend is `fake`
pub fn create_test_context(store: MockStore, fake: &FakeBackend) -> Arc<Context> {
    Arc::new(Context::new(
        Arc::new(store),
        BackendRegistry::new().with_fake(fake),
        &Config::default(),
    ))
}

/// Runs one handler against `object` without persisting anything
pub async fn step<K: Managed>(ctx: &Arc<Context>, object: &mut K) -> Reconciled {
    K::machine(ctx).reconcile(object).await
}

/// Runs one full reconcile (handler plus writes) for the stored copy of `object`
pub async fn reconcile<K: Managed>(ctx: &Arc<Context>, object: K) -> Action {
    reconcile_resource(Arc::new(object), ctx.clone())
        .await
        .expect("reconcile_resource failed")
}
