//! Resource store contract.
//!
//! Handlers read and write objects only through [`ResourceStore`], so the
//! state machines can run against the Kubernetes API or an in-memory store.
//! Metadata/spec and status are written separately; `update_*` never
//! changes status and `update_*_status` never changes anything else.

pub mod kubernetes;
#[cfg(test)]
pub mod mock;

pub use kubernetes::KubeStore;
#[cfg(test)]
pub use mock::MockStore;

use crate::error::StoreError;
use crds::{
    AnsibleSwitch, OVSSwitch, SecretReference, Switch, SwitchPort, SwitchPortConfiguration,
    SwitchResource, SwitchResourceLimit,
};
use switch_backend::Credentials;

/// CRUD access to every kind the controller touches.
#[async_trait::async_trait]
pub trait ResourceStore: Send + Sync {
    // Switch

    /// Fetch a Switch
    async fn get_switch(&self, namespace: &str, name: &str) -> Result<Switch, StoreError>;
    /// Write metadata and spec of a Switch
    async fn update_switch(&self, switch: &Switch) -> Result<Switch, StoreError>;
    /// Write the status of a Switch
    async fn update_switch_status(&self, switch: &Switch) -> Result<Switch, StoreError>;
    /// Delete a Switch, together with its SwitchPorts when `cascade` is set.
    /// Returns the object if it is still pending removal
    async fn delete_switch(&self, switch: &Switch, cascade: bool) -> Result<Option<Switch>, StoreError>;

    // SwitchPort

    /// Fetch a SwitchPort
    async fn get_switch_port(&self, namespace: &str, name: &str) -> Result<SwitchPort, StoreError>;
    /// Every SwitchPort in every namespace
    async fn list_switch_ports(&self) -> Result<Vec<SwitchPort>, StoreError>;
    /// Create a SwitchPort
    async fn create_switch_port(&self, port: &SwitchPort) -> Result<SwitchPort, StoreError>;
    /// Write metadata and spec of a SwitchPort
    async fn update_switch_port(&self, port: &SwitchPort) -> Result<SwitchPort, StoreError>;
    /// Write the status of a SwitchPort
    async fn update_switch_port_status(&self, port: &SwitchPort) -> Result<SwitchPort, StoreError>;
    /// Delete a SwitchPort
    async fn delete_switch_port(&self, namespace: &str, name: &str) -> Result<(), StoreError>;

    // SwitchPortConfiguration

    /// Fetch a SwitchPortConfiguration
    async fn get_switch_port_configuration(&self, namespace: &str, name: &str) -> Result<SwitchPortConfiguration, StoreError>;

    // SwitchResource

    /// Write metadata and spec of a SwitchResource
    async fn update_switch_resource(&self, resource: &SwitchResource) -> Result<SwitchResource, StoreError>;
    /// Write the status of a SwitchResource
    async fn update_switch_resource_status(&self, resource: &SwitchResource) -> Result<SwitchResource, StoreError>;

    // SwitchResourceLimit

    /// Fetch a tenant's SwitchResourceLimit
    async fn get_switch_resource_limit(&self, namespace: &str, name: &str) -> Result<SwitchResourceLimit, StoreError>;
    /// Create a SwitchResourceLimit
    async fn create_switch_resource_limit(&self, limit: &SwitchResourceLimit) -> Result<SwitchResourceLimit, StoreError>;
    /// Write the status (used VLANs) of a SwitchResourceLimit
    async fn update_switch_resource_limit_status(&self, limit: &SwitchResourceLimit) -> Result<SwitchResourceLimit, StoreError>;
    /// Delete a SwitchResourceLimit
    async fn delete_switch_resource_limit(&self, namespace: &str, name: &str) -> Result<(), StoreError>;

    // Providers

    /// Fetch an OVSSwitch provider
    async fn get_ovs_switch(&self, namespace: &str, name: &str) -> Result<OVSSwitch, StoreError>;
    /// Fetch an AnsibleSwitch provider
    async fn get_ansible_switch(&self, namespace: &str, name: &str) -> Result<AnsibleSwitch, StoreError>;
    /// Reads `username` and `password` from the referenced Secret
    async fn get_credentials(&self, secret: &SecretReference, default_namespace: &str) -> Result<Credentials, StoreError>;
}

/// Turns a NotFound into `Ok(None)`.
pub trait Optional<T> {
    /// `Ok(None)` for NotFound, every other result unchanged
    fn optional(self) -> Result<Option<T>, StoreError>;
}

impl<T> Optional<T> for Result<T, StoreError> {
    fn optional(self) -> Result<Option<T>, StoreError> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }
}

/// Treats NotFound as success, for deletes.
pub fn ignore_not_found(result: Result<(), StoreError>) -> Result<(), StoreError> {
    match result {
        Err(err) if err.is_not_found() => Ok(()),
        other => other,
    }
}

/// Treats AlreadyExists as success, for creates.
pub fn ignore_already_exists<T>(result: Result<T, StoreError>) -> Result<(), StoreError> {
    match result {
        Ok(_) => Ok(()),
        Err(err) if err.is_already_exists() => Ok(()),
        Err(err) => Err(err),
    }
}
