//! SwitchResourceLimit CRD
//!
//! Per-tenant VLAN quota. The SwitchResource controller writes the grant
//! (spec); SwitchPort reconciliation records which VLANs of the grant are
//! in use (status).

use crate::error::ValidationError;
use crate::references::SwitchResourceReference;
use crate::switch_port_configuration::SwitchPortConfigurationSpec;
use crate::vlan_range::{RangeError, RangeSet};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Every tenant namespace holds exactly one limit, under this name
pub const TENANT_LIMIT_NAME: &str = "user-limit";

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[kube(
    group = "dcops.microscaler.io",
    version = "v1alpha1",
    kind = "SwitchResourceLimit",
    namespaced,
    status = "SwitchResourceLimitStatus",
    printcolumn = r#"{"name":"Granted","type":"string","jsonPath":".spec.vlanRange"}"#,
    printcolumn = r#"{"name":"Used","type":"string","jsonPath":".status.usedVLAN"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SwitchResourceLimitSpec {
    /// VLANs granted to the tenant, in range syntax
    #[serde(default)]
    pub vlan_range: String,

    /// SwitchResource that granted this limit
    pub switch_resource_ref: SwitchResourceReference,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SwitchResourceLimitStatus {
    /// VLANs currently configured on the tenant's ports, in range syntax
    #[serde(default, rename = "usedVLAN")]
    pub used_vlan: String,
}

impl SwitchResourceLimit {
    /// VLANs currently in use
    pub fn used_vlans(&self) -> Result<RangeSet, RangeError> {
        match &self.status {
            Some(status) => RangeSet::parse(&status.used_vlan),
            None => Ok(RangeSet::new()),
        }
    }

    /// Records the VLANs of `configuration` as used
    pub fn expansion(&mut self, configuration: &SwitchPortConfigurationSpec) -> Result<(), RangeError> {
        let used = self.used_vlans()?.union(&configuration.vlans()?);
        self.status.get_or_insert_with(SwitchResourceLimitStatus::default).used_vlan = used.to_string();
        Ok(())
    }

    /// Releases the VLANs of `configuration`, except those other ports of
    /// the tenant still have configured (`in_use`)
    pub fn shrink(&mut self, configuration: &SwitchPortConfigurationSpec, in_use: &RangeSet) -> Result<(), RangeError> {
        let released = configuration.vlans()?.difference(in_use);
        let used = self.used_vlans()?.difference(&released);
        self.status.get_or_insert_with(SwitchResourceLimitStatus::default).used_vlan = used.to_string();
        Ok(())
    }

    /// Checks that every VLAN of `configuration` lies inside the grant
    pub fn verify_configuration(&self, configuration: &SwitchPortConfigurationSpec) -> Result<(), ValidationError> {
        let granted = RangeSet::parse(&self.spec.vlan_range)?;
        match configuration.vlans()?.difference(&granted).first() {
            Some(vlan) => Err(ValidationError::OutOfRange(vlan)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limit(granted: &str) -> SwitchResourceLimit {
        SwitchResourceLimit::new(
            TENANT_LIMIT_NAME,
            SwitchResourceLimitSpec {
                vlan_range: granted.to_string(),
                switch_resource_ref: SwitchResourceReference {
                    name: "pool".to_string(),
                    namespace: "infra".to_string(),
                },
            },
        )
    }

    fn configuration(untagged: Option<u32>, tagged: &str) -> SwitchPortConfigurationSpec {
        SwitchPortConfigurationSpec {
            untagged_vlan: untagged,
            tagged_vlan_range: tagged.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_verify_configuration_rejects_out_of_range_untagged() {
        let err = limit("1-10")
            .verify_configuration(&configuration(Some(20), ""))
            .unwrap_err();
        assert_eq!(err, ValidationError::OutOfRange(20));
        assert_eq!(err.to_string(), "vlan 20 is out of permissible range");
    }

    #[test]
    fn test_verify_configuration_accepts_in_range_untagged() {
        assert_eq!(limit("1-10").verify_configuration(&configuration(Some(5), "")), Ok(()));
    }

    #[test]
    fn test_verify_configuration_checks_tagged_range() {
        assert_eq!(
            limit("1-10").verify_configuration(&configuration(Some(5), "8-12")),
            Err(ValidationError::OutOfRange(11))
        );
        assert_eq!(
            limit("").verify_configuration(&configuration(None, "1")),
            Err(ValidationError::OutOfRange(1))
        );
    }

    #[test]
    fn test_expansion_and_shrink_are_set_operations() {
        let mut tenant = limit("1-100");
        let web = configuration(Some(10), "20-22");

        tenant.expansion(&web).unwrap();
        assert_eq!(tenant.status.as_ref().unwrap().used_vlan, "10,20-22");

        // Re-running after a crash must not change the result
        tenant.expansion(&web).unwrap();
        assert_eq!(tenant.status.as_ref().unwrap().used_vlan, "10,20-22");

        tenant.expansion(&configuration(None, "23")).unwrap();
        assert_eq!(tenant.status.as_ref().unwrap().used_vlan, "10,20-23");

        tenant.shrink(&web, &RangeSet::new()).unwrap();
        assert_eq!(tenant.status.as_ref().unwrap().used_vlan, "23");
        tenant.shrink(&web, &RangeSet::new()).unwrap();
        assert_eq!(tenant.status.as_ref().unwrap().used_vlan, "23");
    }

    #[test]
    fn test_shrink_keeps_vlans_other_ports_use() {
        let mut tenant = limit("1-100");
        let web = configuration(Some(10), "20-22");
        tenant.expansion(&web).unwrap();
        tenant.expansion(&configuration(None, "21-23")).unwrap();

        let other_port = RangeSet::parse("21-23").unwrap();
        tenant.shrink(&web, &other_port).unwrap();
        assert_eq!(tenant.status.as_ref().unwrap().used_vlan, "21-23");
    }
}
