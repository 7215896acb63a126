//! Validation errors for switch CRDs

use crate::vlan_range::RangeError;
use thiserror::Error;

/// Errors raised when a port configuration is checked against a port
/// policy, a tenant quota, or a resource pool.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A range field could not be parsed
    #[error(transparent)]
    Range(#[from] RangeError),

    /// The port policy disables the port
    #[error("the port is disabled")]
    PortDisabled,

    /// The port policy forbids tagged VLANs
    #[error("trunk mode is disabled on the port, tagged vlans are not allowed")]
    TrunkDisabled,

    /// A VLAN falls outside the permitted range
    #[error("vlan {0} is out of permissible range")]
    OutOfRange(u32),

    /// Too many ACL rules in a configuration
    #[error("too many ACL rules: {0} (at most {max} allowed)", max = crate::MAX_ACLS)]
    TooManyAcls(usize),

    /// A tenant limit has no namespace
    #[error("tenant limit {0} has an empty namespace")]
    MissingNamespace(String),

    /// Two tenant limits target the same namespace
    #[error("tenant limits {0} and {1} share namespace {2}")]
    DuplicateNamespace(String, String, String),

    /// Two tenant limits grant the same VLAN
    #[error("tenant limits {0} and {1} overlap on vlan {2}")]
    Overlap(String, String, u32),
}
