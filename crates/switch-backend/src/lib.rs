//! Switch Backend Contract
//!
//! The interface the switch state machines use to talk to a physical or
//! virtual switch, plus the registry that turns a resolved provider into a
//! live backend.
//!
//! # Example
//!
//! ```ignore
//! use switch_backend::{BackendRegistry, ProviderConfig};
//!
//! let registry = BackendRegistry::new().register("ssh", |config| {
//!     Ok(std::sync::Arc::new(MySshBackend::connect(config)?))
//! });
//! let backend = registry.build(&ProviderConfig::new("ssh", "openvswitch", "10.0.0.1"))?;
//! backend.is_available().await?;
//! ```

pub mod config;
pub mod error;
pub mod registry;
#[path = "trait.rs"]
pub mod backend_trait;
pub mod mock;

pub use backend_trait::SwitchBackend;
pub use config::{Credentials, ProviderConfig};
pub use error::BackendError;
pub use registry::{BackendFactory, BackendRegistry};
pub use mock::{FAKE_BACKEND, FakeBackend, FakeCall};
