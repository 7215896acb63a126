//! Controller-specific error types.
//!
//! `StoreError` covers the resource store contract, `ProviderError` the
//! lookup from a Switch to a live backend, and `ControllerError` whatever
//! reaches the watcher loop.

use kube::Error as KubeError;
use state_machine::MachineError;
use switch_backend::BackendError;
use thiserror::Error;

/// Errors returned by the resource store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The object does not exist
    #[error("{kind} {key} not found")]
    NotFound {
        /// Kind of the object
        kind: String,
        /// `namespace/name` of the object
        key: String,
    },

    /// An object with the same name already exists
    #[error("{kind} {key} already exists")]
    AlreadyExists {
        /// Kind of the object
        kind: String,
        /// `namespace/name` of the object
        key: String,
    },

    /// The object changed since it was read
    #[error("{kind} {key} was modified concurrently")]
    Conflict {
        /// Kind of the object
        kind: String,
        /// `namespace/name` of the object
        key: String,
    },

    /// The stored object cannot be used
    #[error("invalid {kind} {key}: {reason}")]
    Invalid {
        /// Kind of the object
        kind: String,
        /// `namespace/name` of the object
        key: String,
        /// What is wrong with it
        reason: String,
    },

    /// Any other Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Request body could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}

/// Errors resolving a Switch's provider to a backend.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The Switch names no usable provider
    #[error("provider is nil or empty")]
    Missing,

    /// The provider kind is not one the controller knows
    #[error("unknown provider kind `{0}`")]
    UnknownKind(String),

    /// Open vSwitch hosts need a bridge
    #[error("provider {0} uses openvswitch but sets no bridge")]
    MissingBridge(String),

    /// Credentials could not be read
    #[error("credentials secret {key}: {reason}")]
    Credentials { key: String, reason: String },

    /// Store lookup failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Backend could not be built
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Errors that can occur in the Switch Controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Persisting a reconciled object failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The state machine could not dispatch the object
    #[error("{0}")]
    Reconcile(MachineError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A watcher task stopped unexpectedly
    #[error("Resource watch failed: {0}")]
    Watch(String),
}

