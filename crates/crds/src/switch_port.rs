//! SwitchPort CRD
//!
//! One SwitchPort exists per port listed in a Switch's policy map. Tenants
//! bind a port by pointing its spec at a SwitchPortConfiguration; the
//! controller snapshots that configuration into status once verified and
//! keeps the device in line with the snapshot.

use crate::references::SwitchPortConfigurationReference;
use crate::switch_port_configuration::SwitchPortConfigurationSpec;
use chrono::{DateTime, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use state_machine::Instance;
use std::fmt;

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[kube(
    group = "dcops.microscaler.io",
    version = "v1alpha1",
    kind = "SwitchPort",
    namespaced,
    status = "SwitchPortStatus",
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.state"}"#,
    printcolumn = r#"{"name":"Port","type":"string","jsonPath":".status.portName"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SwitchPortSpec {
    /// Configuration to apply to this port
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<SwitchPortConfigurationReference>,
}

/// SwitchPort lifecycle states.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash, Default)]
pub enum SwitchPortState {
    /// Just created
    #[default]
    #[serde(rename = "")]
    None,
    /// Waiting for a configuration reference
    Idle,
    /// Checking the configuration against policy and quota
    Verifying,
    /// Pushing the configuration to the device
    Configuring,
    /// Device matches the configuration
    Active,
    /// Removing the configuration from the device
    Cleaning,
    /// Being removed
    Deleting,
}

impl SwitchPortState {
    /// Every state, in lifecycle order
    pub const ALL: [Self; 7] = [
        Self::None,
        Self::Idle,
        Self::Verifying,
        Self::Configuring,
        Self::Active,
        Self::Cleaning,
        Self::Deleting,
    ];
}

impl fmt::Display for SwitchPortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SwitchPortStatus {
    /// Current lifecycle state
    #[serde(default)]
    pub state: SwitchPortState,

    /// Error message if reconciliation failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Verified configuration snapshot (a copy, not a reference)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<SwitchPortConfigurationSpec>,

    /// Port name on the device
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_name: Option<String>,

    /// Tenant namespace the snapshot is charged against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_namespace: Option<String>,

    /// When the state last changed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
}

impl SwitchPort {
    /// Verified configuration snapshot, if any
    pub fn committed_configuration(&self) -> Option<&SwitchPortConfigurationSpec> {
        self.status.as_ref().and_then(|status| status.configuration.as_ref())
    }

    /// Resolved device port name, if any
    pub fn port_name(&self) -> Option<&str> {
        self.status.as_ref().and_then(|status| status.port_name.as_deref())
    }

    /// Tenant namespace recorded with the snapshot, falling back to the current reference
    pub fn committed_tenant_namespace(&self) -> Option<String> {
        self.status
            .as_ref()
            .and_then(|status| status.tenant_namespace.clone())
            .or_else(|| self.tenant_namespace())
    }

    /// Namespace whose tenant quota this port is charged against
    pub fn tenant_namespace(&self) -> Option<String> {
        let own = self.namespace().unwrap_or_default();
        self.spec
            .configuration
            .as_ref()
            .map(|reference| reference.namespace_or(&own).to_string())
    }
}

impl Instance for SwitchPort {
    type State = SwitchPortState;
    type MetadataAndSpec = (ObjectMeta, SwitchPortSpec);
    type Status = Option<SwitchPortStatus>;

    fn key(&self) -> String {
        format!("SwitchPort {}/{}", self.namespace().unwrap_or_default(), self.name_any())
    }

    fn state(&self) -> SwitchPortState {
        self.status.as_ref().map(|status| status.state).unwrap_or_default()
    }

    fn set_state(&mut self, state: SwitchPortState) {
        if self.state() != state {
            let status = self.status.get_or_insert_with(SwitchPortStatus::default);
            status.state = state;
            status.last_transition_time = Some(Utc::now());
        }
    }

    fn set_error(&mut self, error: Option<String>) {
        if self.status.as_ref().and_then(|status| status.error.as_ref()) != error.as_ref() {
            self.status.get_or_insert_with(SwitchPortStatus::default).error = error;
        }
    }

    fn metadata_and_spec(&self) -> (ObjectMeta, SwitchPortSpec) {
        (self.metadata.clone(), self.spec.clone())
    }

    fn status(&self) -> Option<SwitchPortStatus> {
        self.status.clone()
    }
}
