//! Provider resolution.
//!
//! Turns a Switch's provider reference into a [`ProviderConfig`] by reading
//! the provider object and its credentials Secret, then builds the backend
//! from the registry. SwitchPorts reach their backend through the owning
//! Switch.

use crate::context::Context;
use crate::error::ProviderError;
use crate::store::ResourceStore;
use crds::{
    ANSIBLE_SWITCH_KIND, OVS_SWITCH_KIND, Switch, SwitchOs, SwitchProviderReference, TEST_SWITCH_KIND,
};
use kube::ResourceExt;
use std::sync::Arc;
use switch_backend::{FAKE_BACKEND, ProviderConfig, SwitchBackend};
use tracing::debug;

/// Backend name for Open vSwitch hosts driven over SSH
pub const SSH_BACKEND: &str = "ssh";

/// Backend name for devices driven through Ansible
pub const ANSIBLE_BACKEND: &str = "ansible";

/// Option key naming the OVS bridge
pub const BRIDGE_OPTION: &str = "bridge";

/// Resolve `reference` (relative to `namespace`) to a provider configuration
pub async fn resolve(
    store: &dyn ResourceStore,
    reference: &SwitchProviderReference,
    namespace: &str,
) -> Result<ProviderConfig, ProviderError> {
    if !reference.is_complete() {
        return Err(ProviderError::Missing);
    }
    let provider_namespace = reference.namespace_or(namespace);
    let key = format!("{} {}/{}", reference.kind, provider_namespace, reference.name);
    debug!("Resolving provider {}", key);

    match reference.kind.as_str() {
        TEST_SWITCH_KIND => Ok(ProviderConfig::new(FAKE_BACKEND, "fake", reference.name.clone())),
        OVS_SWITCH_KIND => {
            let ovs = store.get_ovs_switch(provider_namespace, &reference.name).await?;
            if ovs.spec.bridge.is_empty() {
                return Err(ProviderError::MissingBridge(key));
            }
            let credentials = store.get_credentials(&ovs.spec.credentials, provider_namespace).await?;
            Ok(ProviderConfig::new(SSH_BACKEND, SwitchOs::Openvswitch.as_str(), ovs.spec.host)
                .with_credentials(credentials)
                .with_option(BRIDGE_OPTION, ovs.spec.bridge))
        }
        ANSIBLE_SWITCH_KIND => {
            let ansible = store.get_ansible_switch(provider_namespace, &reference.name).await?;
            let bridge = ansible.spec.bridge.filter(|bridge| !bridge.is_empty());
            if ansible.spec.os == SwitchOs::Openvswitch && bridge.is_none() {
                return Err(ProviderError::MissingBridge(key));
            }
            let credentials = store.get_credentials(&ansible.spec.credentials, provider_namespace).await?;
            let config = ProviderConfig::new(ANSIBLE_BACKEND, ansible.spec.os.as_str(), ansible.spec.host)
                .with_credentials(credentials);
            Ok(match bridge {
                Some(bridge) => config.with_option(BRIDGE_OPTION, bridge),
                None => config,
            })
        }
        other => Err(ProviderError::UnknownKind(other.to_string())),
    }
}

/// Backend for `switch`, using its committed provider (or the desired one before the first commit)
pub async fn backend_for(ctx: &Context, switch: &Switch) -> Result<Arc<dyn SwitchBackend>, ProviderError> {
    let reference = switch.effective_provider().ok_or(ProviderError::Missing)?;
    let namespace = switch.namespace().unwrap_or_default();
    let config = resolve(ctx.store.as_ref(), reference, &namespace).await?;
    Ok(ctx.backends.build(&config)?)
}
