//! Kubernetes object references for switch CRDs
//!
//! All cross-resource links are name-based lookups resolved on demand,
//! never embedded objects.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Reference to the provider object describing how to reach a switch.
///
/// `kind` selects the provider type (`OVSSwitch`, `AnsibleSwitch`, or
/// `TestSwitch`). `namespace` defaults to the namespace of the Switch.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SwitchProviderReference {
    /// Provider kind
    pub kind: String,

    /// Provider object name
    pub name: String,

    /// Provider object namespace (defaults to the Switch namespace)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl SwitchProviderReference {
    /// Create a reference in the same namespace as the referencing object
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            namespace: None,
        }
    }

    /// True when both kind and name are set
    pub fn is_complete(&self) -> bool {
        !self.kind.is_empty() && !self.name.is_empty()
    }

    /// Namespace of the provider, falling back to `default_namespace`
    pub fn namespace_or<'a>(&'a self, default_namespace: &'a str) -> &'a str {
        self.namespace.as_deref().unwrap_or(default_namespace)
    }
}

/// Reference from a SwitchPort to a SwitchPortConfiguration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SwitchPortConfigurationReference {
    /// Configuration name
    pub name: String,

    /// Configuration namespace (defaults to the SwitchPort namespace).
    /// This namespace identifies the tenant whose quota is charged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl SwitchPortConfigurationReference {
    /// Namespace of the configuration, falling back to `default_namespace`
    pub fn namespace_or<'a>(&'a self, default_namespace: &'a str) -> &'a str {
        self.namespace.as_deref().unwrap_or(default_namespace)
    }
}

/// Back-reference from a SwitchResourceLimit to its SwitchResource.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SwitchResourceReference {
    /// SwitchResource name
    pub name: String,

    /// SwitchResource namespace
    pub namespace: String,
}

/// Reference to a core Secret holding switch credentials.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SecretReference {
    /// Secret name
    pub name: String,

    /// Secret namespace (defaults to the provider object namespace)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}
