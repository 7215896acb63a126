//! DCops Switch CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the DCops switch controller,
//! together with the value logic they carry:
//! - VLAN range text codec (`vlan_range`)
//! - port-policy and tenant-quota verification
//! - VLAN pool allocation for SwitchResource
//! - state-machine bindings for Switch, SwitchPort and SwitchResource

pub mod error;
pub mod provider;
pub mod references;
pub mod switch;
pub mod switch_port;
pub mod switch_port_configuration;
pub mod switch_resource;
pub mod switch_resource_limit;
pub mod vlan_range;

pub use error::*;
pub use provider::*;
pub use references::*;
pub use switch::*;
pub use switch_port::*;
pub use switch_port_configuration::*;
pub use switch_resource::*;
pub use switch_resource_limit::*;
pub use vlan_range::{RangeError, RangeSet};
