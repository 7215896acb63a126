//! SwitchBackend trait
//!
//! One implementation exists per provider and protocol pair. Calls may block
//! on network I/O; the caller owns timeouts and cancellation.

use crate::error::BackendError;
use crds::SwitchPortConfigurationSpec;

/// Operations the state machines need from a switch.
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait SwitchBackend: Send + Sync {
    /// Check that the switch is reachable
    async fn is_available(&self) -> Result<(), BackendError>;

    /// Read the live configuration of `port`
    async fn get_port_attr(&self, port: &str) -> Result<SwitchPortConfigurationSpec, BackendError>;

    /// Apply `configuration` to `port`
    async fn set_port_attr(&self, port: &str, configuration: &SwitchPortConfigurationSpec) -> Result<(), BackendError>;

    /// Remove `configuration` from `port`, returning it to its default state
    async fn reset_port(&self, port: &str, configuration: &SwitchPortConfigurationSpec) -> Result<(), BackendError>;
}
