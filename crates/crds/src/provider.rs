//! Switch provider CRDs
//!
//! A provider object tells the controller how to reach a switch: address,
//! credentials, and driver-specific options. A Switch points at one through
//! its `provider` reference.

use crate::references::SecretReference;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Provider kind for [`OVSSwitch`]
pub const OVS_SWITCH_KIND: &str = "OVSSwitch";

/// Provider kind for [`AnsibleSwitch`]
pub const ANSIBLE_SWITCH_KIND: &str = "AnsibleSwitch";

/// Provider kind that needs no object and always uses the fake backend
pub const TEST_SWITCH_KIND: &str = "TestSwitch";

/// Open vSwitch host managed over SSH.
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[kube(group = "dcops.microscaler.io", version = "v1alpha1", kind = "OVSSwitch", namespaced)]
#[serde(rename_all = "camelCase")]
pub struct OVSSwitchSpec {
    /// Host address
    pub host: String,

    /// OVS bridge the ports belong to
    pub bridge: String,

    /// Secret with `username` and `password`
    pub credentials: SecretReference,
}

/// Switch managed through Ansible network modules.
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[kube(group = "dcops.microscaler.io", version = "v1alpha1", kind = "AnsibleSwitch", namespaced)]
#[serde(rename_all = "camelCase")]
pub struct AnsibleSwitchSpec {
    /// Network OS of the device
    pub os: SwitchOs,

    /// Host address
    pub host: String,

    /// Secret with `username` and `password`
    pub credentials: SecretReference,

    /// OVS bridge (required when `os` is `openvswitch`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bridge: Option<String>,
}

/// Network operating systems the Ansible backend understands.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SwitchOs {
    /// Open vSwitch
    #[default]
    Openvswitch,
    /// Juniper Junos
    Junos,
    /// Cisco NX-OS
    Nxos,
    /// Arista EOS
    Eos,
    /// Lenovo ENOS
    Enos,
    /// Cumulus Linux
    Cumulus,
    /// Dell OS10
    Dellos10,
    /// Fortinet FortiOS
    Fos,
}

impl SwitchOs {
    /// Wire name of the OS
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Openvswitch => "openvswitch",
            Self::Junos => "junos",
            Self::Nxos => "nxos",
            Self::Eos => "eos",
            Self::Enos => "enos",
            Self::Cumulus => "cumulus",
            Self::Dellos10 => "dellos10",
            Self::Fos => "fos",
        }
    }
}

impl fmt::Display for SwitchOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
