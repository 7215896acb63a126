//! SwitchPortConfiguration CRD
//!
//! Tenant-owned description of what a switch port should look like:
//! ACL rules, an optional untagged VLAN, a tagged VLAN range, and an
//! administrative disable flag.

use crate::error::ValidationError;
use crate::vlan_range::{RangeError, RangeSet};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Maximum number of ACL rules in one configuration
pub const MAX_ACLS: usize = 10;

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "dcops.microscaler.io",
    version = "v1alpha1",
    kind = "SwitchPortConfiguration",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct SwitchPortConfigurationSpec {
    /// ACL rules applied to the port (at most 10)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub acls: Vec<Acl>,

    /// Untagged (access) VLAN
    #[serde(default, rename = "untaggedVLAN", skip_serializing_if = "Option::is_none")]
    pub untagged_vlan: Option<u32>,

    /// Tagged (trunk) VLANs in range syntax, e.g. "100-110,200"
    #[serde(default, rename = "taggedVLANRange")]
    pub tagged_vlan_range: String,

    /// Administratively disable the port
    #[serde(default)]
    pub disable: bool,
}

/// A single ACL rule.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Acl {
    /// "ipv4" or "ipv6"
    #[serde(default)]
    pub ip_version: String,

    /// "allow" or "deny"
    #[serde(default)]
    pub action: String,

    /// "TCP", "UDP", "ICMP" or "ALL"
    #[serde(default)]
    pub protocol: String,

    /// Source address or CIDR
    #[serde(default, rename = "sourceIP")]
    pub source_ip: String,

    /// Source ports in range syntax
    #[serde(default)]
    pub source_port_range: String,

    /// Destination address or CIDR
    #[serde(default, rename = "destinationIP")]
    pub destination_ip: String,

    /// Destination ports in range syntax
    #[serde(default)]
    pub destination_port_range: String,
}

impl SwitchPortConfigurationSpec {
    /// Parsed tagged VLAN set
    pub fn tagged_vlans(&self) -> Result<RangeSet, RangeError> {
        RangeSet::parse(&self.tagged_vlan_range)
    }

    /// Every VLAN this configuration touches: untagged ∪ tagged
    pub fn vlans(&self) -> Result<RangeSet, RangeError> {
        let tagged = self.tagged_vlans()?;
        Ok(match self.untagged_vlan {
            Some(vlan) => tagged.union(&RangeSet::single(vlan)),
            None => tagged,
        })
    }

    /// Structural checks that do not depend on any policy
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.acls.len() > MAX_ACLS {
            return Err(ValidationError::TooManyAcls(self.acls.len()));
        }
        self.vlans()?;
        Ok(())
    }
}

/// Equality is VLAN-set aware: `"1-3,4"` and `"1-4"` are the same range.
/// Unparseable ranges fall back to comparing the raw text.
impl PartialEq for SwitchPortConfigurationSpec {
    fn eq(&self, other: &Self) -> bool {
        if self.acls != other.acls
            || self.untagged_vlan != other.untagged_vlan
            || self.disable != other.disable
        {
            return false;
        }

        match (self.tagged_vlans(), other.tagged_vlans()) {
            (Ok(left), Ok(right)) => left == right,
            _ => self.tagged_vlan_range == other.tagged_vlan_range,
        }
    }
}
