//! Switch CRD
//!
//! A Switch describes one physical or virtual switch: how to reach it
//! (provider reference) and which of its ports tenants may use, with the
//! restrictions that apply to each port.

use crate::error::ValidationError;
use crate::references::SwitchProviderReference;
use crate::switch_port_configuration::SwitchPortConfigurationSpec;
use crate::vlan_range::RangeSet;
use chrono::{DateTime, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use state_machine::Instance;
use std::collections::BTreeMap;
use std::fmt;

/// Kind name used in SwitchPort owner references
pub const SWITCH_KIND: &str = "Switch";

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[kube(
    group = "dcops.microscaler.io",
    version = "v1alpha1",
    kind = "Switch",
    namespaced,
    status = "SwitchStatus",
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.state"}"#,
    printcolumn = r#"{"name":"Error","type":"string","jsonPath":".status.error"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SwitchSpec {
    /// Provider object describing how to reach the device.
    /// Only the first committed value is used; later edits are ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<SwitchProviderReference>,

    /// Ports tenants may use, keyed by SwitchPort name
    #[serde(default)]
    pub ports: BTreeMap<String, PortPolicy>,
}

/// Restrictions on a single switch port.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PortPolicy {
    /// Port name on the device (defaults to the map key)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// The port may not be configured at all
    #[serde(default)]
    pub disabled: bool,

    /// The port may not carry tagged VLANs
    #[serde(default)]
    pub trunk_disabled: bool,

    /// VLANs the port may carry, in range syntax. Empty means unrestricted.
    #[serde(default = "default_allowed_vlan_range")]
    pub allowed_vlan_range: String,
}

fn default_allowed_vlan_range() -> String {
    "1-4096".to_string()
}

impl Default for PortPolicy {
    fn default() -> Self {
        Self {
            name: String::new(),
            disabled: false,
            trunk_disabled: false,
            allowed_vlan_range: default_allowed_vlan_range(),
        }
    }
}

impl PortPolicy {
    /// Physical port name, falling back to the policy key
    pub fn physical_name<'a>(&'a self, key: &'a str) -> &'a str {
        if self.name.is_empty() { key } else { &self.name }
    }

    /// Checks a port configuration against this policy
    pub fn verify(&self, configuration: &SwitchPortConfigurationSpec) -> Result<(), ValidationError> {
        if self.disabled {
            return Err(ValidationError::PortDisabled);
        }

        configuration.validate()?;

        if self.trunk_disabled && !configuration.tagged_vlans()?.is_empty() {
            return Err(ValidationError::TrunkDisabled);
        }

        if !self.allowed_vlan_range.is_empty() {
            let allowed = RangeSet::parse(&self.allowed_vlan_range)?;
            if let Some(vlan) = configuration.vlans()?.difference(&allowed).first() {
                return Err(ValidationError::OutOfRange(vlan));
            }
        }

        Ok(())
    }
}

/// Switch lifecycle states.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash, Default)]
pub enum SwitchState {
    /// Just created
    #[default]
    #[serde(rename = "")]
    None,
    /// Checking the device and committing the port policies
    Verifying,
    /// Creating SwitchPorts
    Configuring,
    /// All SwitchPorts exist
    Running,
    /// Being removed
    Deleting,
}

impl SwitchState {
    /// Every state, in lifecycle order
    pub const ALL: [Self; 5] = [
        Self::None,
        Self::Verifying,
        Self::Configuring,
        Self::Running,
        Self::Deleting,
    ];
}

impl fmt::Display for SwitchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SwitchStatus {
    /// Current lifecycle state
    #[serde(default)]
    pub state: SwitchState,

    /// Committed provider reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<SwitchProviderReference>,

    /// Committed port policies (snapshot of spec.ports taken in Verifying)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ports: BTreeMap<String, PortPolicy>,

    /// Error message if reconciliation failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// When the state last changed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
}

impl Switch {
    /// Provider to use: the committed one, or the desired one before the first commit
    pub fn effective_provider(&self) -> Option<&SwitchProviderReference> {
        self.status
            .as_ref()
            .and_then(|status| status.provider.as_ref())
            .or(self.spec.provider.as_ref())
    }

    /// Committed port policies
    pub fn committed_ports(&self) -> Option<&BTreeMap<String, PortPolicy>> {
        self.status.as_ref().map(|status| &status.ports)
    }
}

impl Instance for Switch {
    type State = SwitchState;
    type MetadataAndSpec = (ObjectMeta, SwitchSpec);
    type Status = Option<SwitchStatus>;

    fn key(&self) -> String {
        format!("Switch {}/{}", self.namespace().unwrap_or_default(), self.name_any())
    }

    fn state(&self) -> SwitchState {
        self.status.as_ref().map(|status| status.state).unwrap_or_default()
    }

    fn set_state(&mut self, state: SwitchState) {
        if self.state() != state {
            let status = self.status.get_or_insert_with(SwitchStatus::default);
            status.state = state;
            status.last_transition_time = Some(Utc::now());
        }
    }

    fn set_error(&mut self, error: Option<String>) {
        if self.status.as_ref().and_then(|status| status.error.as_ref()) != error.as_ref() {
            self.status.get_or_insert_with(SwitchStatus::default).error = error;
        }
    }

    fn metadata_and_spec(&self) -> (ObjectMeta, SwitchSpec) {
        (self.metadata.clone(), self.spec.clone())
    }

    fn status(&self) -> Option<SwitchStatus> {
        self.status.clone()
    }
}
