//! Switch backend errors

use thiserror::Error;

/// Errors that can occur when talking to a switch
#[derive(Debug, Error)]
pub enum BackendError {
    /// The switch could not be reached
    #[error("switch {host} is unavailable: {reason}")]
    Unavailable { host: String, reason: String },

    /// A port operation was rejected by the switch
    #[error("port {port}: {reason}")]
    Port { port: String, reason: String },

    /// No constructor registered under the requested backend name
    #[error("backend `{0}` is not registered")]
    UnknownBackend(String),

    /// The provider configuration cannot be used by this backend
    #[error("invalid provider configuration: {0}")]
    InvalidConfig(String),
}
