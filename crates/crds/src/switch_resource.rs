//! SwitchResource CRD
//!
//! The VLAN pool of a switch fabric, and how it is split between tenants.
//!
//! Allocation works on range text through [`RangeSet`]: a committed tenant
//! grant is subtracted from `status.availableVLAN` when its limit object is
//! created and added back when the grant is released. At rest,
//! `available = pool − ⋃ committed grants`.

use crate::error::ValidationError;
use crate::vlan_range::{RangeError, RangeSet};
use chrono::{DateTime, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use state_machine::Instance;
use std::collections::BTreeMap;
use std::fmt;

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[kube(
    group = "dcops.microscaler.io",
    version = "v1alpha1",
    kind = "SwitchResource",
    namespaced,
    status = "SwitchResourceStatus",
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.state"}"#,
    printcolumn = r#"{"name":"Available","type":"string","jsonPath":".status.availableVLAN"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SwitchResourceSpec {
    /// Total allocatable VLAN pool, in range syntax
    #[serde(default)]
    pub vlan_range: String,

    /// Grants keyed by tenant name
    #[serde(default)]
    pub tenant_limits: BTreeMap<String, TenantLimit>,
}

/// A tenant's share of the pool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TenantLimit {
    /// Tenant namespace; the SwitchResourceLimit is created here
    pub namespace: String,

    /// Granted VLANs, in range syntax
    #[serde(default)]
    pub vlan_range: String,
}

impl TenantLimit {
    /// Parsed grant
    pub fn vlans(&self) -> Result<RangeSet, RangeError> {
        RangeSet::parse(&self.vlan_range)
    }

    /// Checks that the grant lies inside `pool`
    pub fn verify_within(&self, pool: &RangeSet) -> Result<(), ValidationError> {
        match self.vlans()?.difference(pool).first() {
            Some(vlan) => Err(ValidationError::OutOfRange(vlan)),
            None => Ok(()),
        }
    }
}

impl SwitchResourceSpec {
    /// Parsed pool
    pub fn pool(&self) -> Result<RangeSet, RangeError> {
        RangeSet::parse(&self.vlan_range)
    }

    /// Checks every grant against the pool and against each other
    pub fn verify_tenant_limits(&self) -> Result<(), ValidationError> {
        let pool = self.pool()?;
        let mut claimed: Vec<(&str, &TenantLimit, RangeSet)> = Vec::with_capacity(self.tenant_limits.len());

        for (tenant, limit) in &self.tenant_limits {
            if limit.namespace.is_empty() {
                return Err(ValidationError::MissingNamespace(tenant.clone()));
            }
            limit.verify_within(&pool)?;

            let vlans = limit.vlans()?;
            for (other, other_limit, other_vlans) in &claimed {
                if other_limit.namespace == limit.namespace {
                    return Err(ValidationError::DuplicateNamespace(
                        (*other).to_string(),
                        tenant.clone(),
                        limit.namespace.clone(),
                    ));
                }
                if let Some(vlan) = vlans.intersection(other_vlans).first() {
                    return Err(ValidationError::Overlap((*other).to_string(), tenant.clone(), vlan));
                }
            }
            claimed.push((tenant.as_str(), limit, vlans));
        }

        Ok(())
    }
}

/// SwitchResource lifecycle states.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash, Default)]
pub enum SwitchResourceState {
    /// Just created
    #[default]
    #[serde(rename = "")]
    None,
    /// Releasing removed grants and checking new ones
    Verifying,
    /// Creating SwitchResourceLimits
    Creating,
    /// All grants materialized
    Running,
    /// Being removed
    Deleting,
}

impl SwitchResourceState {
    /// Every state, in lifecycle order
    pub const ALL: [Self; 5] = [
        Self::None,
        Self::Verifying,
        Self::Creating,
        Self::Running,
        Self::Deleting,
    ];
}

impl fmt::Display for SwitchResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SwitchResourceStatus {
    /// Current lifecycle state
    #[serde(default)]
    pub state: SwitchResourceState,

    /// VLANs not granted to any tenant, in range syntax
    #[serde(default, rename = "availableVLAN")]
    pub available_vlan: String,

    /// Committed grants
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tenant_limits: BTreeMap<String, TenantLimit>,

    /// Error message if reconciliation failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// When the state last changed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
}

impl SwitchResource {
    fn status_mut(&mut self) -> &mut SwitchResourceStatus {
        self.status.get_or_insert_with(SwitchResourceStatus::default)
    }

    /// VLANs not yet granted
    pub fn available(&self) -> Result<RangeSet, RangeError> {
        match &self.status {
            Some(status) => RangeSet::parse(&status.available_vlan),
            None => Ok(RangeSet::new()),
        }
    }

    /// Committed grants
    pub fn committed_limits(&self) -> BTreeMap<String, TenantLimit> {
        self.status
            .as_ref()
            .map(|status| status.tenant_limits.clone())
            .unwrap_or_default()
    }

    /// Resets the available set to the whole pool
    pub fn initialize_available(&mut self) -> Result<(), RangeError> {
        let pool = self.spec.pool()?;
        self.status_mut().available_vlan = pool.to_string();
        Ok(())
    }

    /// Returns a grant to the available set
    pub fn release(&mut self, limit: &TenantLimit) -> Result<(), RangeError> {
        let available = self.available()?.union(&limit.vlans()?);
        self.status_mut().available_vlan = available.to_string();
        Ok(())
    }

    /// Takes a grant out of the available set, failing if any of it is taken
    pub fn allocate(&mut self, limit: &TenantLimit) -> Result<(), ValidationError> {
        let available = self.available()?;
        limit.verify_within(&available)?;
        self.status_mut().available_vlan = available.difference(&limit.vlans()?).to_string();
        Ok(())
    }

    /// `pool − ⋃ committed grants`
    pub fn expected_available(&self) -> Result<RangeSet, RangeError> {
        let mut available = self.spec.pool()?;
        if let Some(status) = &self.status {
            for limit in status.tenant_limits.values() {
                available = available.difference(&limit.vlans()?);
            }
        }
        Ok(available)
    }
}

impl Instance for SwitchResource {
    type State = SwitchResourceState;
    type MetadataAndSpec = (ObjectMeta, SwitchResourceSpec);
    type Status = Option<SwitchResourceStatus>;

    fn key(&self) -> String {
        format!("SwitchResource {}/{}", self.namespace().unwrap_or_default(), self.name_any())
    }

    fn state(&self) -> SwitchResourceState {
        self.status.as_ref().map(|status| status.state).unwrap_or_default()
    }

    fn set_state(&mut self, state: SwitchResourceState) {
        if self.state() != state {
            let status = self.status_mut();
            status.state = state;
            status.last_transition_time = Some(Utc::now());
        }
    }

    fn set_error(&mut self, error: Option<String>) {
        if self.status.as_ref().and_then(|status| status.error.as_ref()) != error.as_ref() {
            self.status_mut().error = error;
        }
    }

    fn metadata_and_spec(&self) -> (ObjectMeta, SwitchResourceSpec) {
        (self.metadata.clone(), self.spec.clone())
    }

    fn status(&self) -> Option<SwitchResourceStatus> {
        self.status.clone()
    }
}
