//! Backend registry
//!
//! Maps a backend name to the constructor that builds a live backend from a
//! [`ProviderConfig`]. Vendor drivers register themselves at start-up.

use crate::backend_trait::SwitchBackend;
use crate::config::ProviderConfig;
use crate::error::BackendError;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Constructor for one backend kind
pub type BackendFactory = Arc<dyn Fn(&ProviderConfig) -> Result<Arc<dyn SwitchBackend>, BackendError> + Send + Sync>;

/// Backend constructors keyed by backend name.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    factories: HashMap<String, BackendFactory>,
}

impl BackendRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` under `name`, replacing any previous entry
    #[must_use]
    pub fn register<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&ProviderConfig) -> Result<Arc<dyn SwitchBackend>, BackendError> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
        self
    }

    /// True when a backend is registered under `name`
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Build a backend for `config`
    pub fn build(&self, config: &ProviderConfig) -> Result<Arc<dyn SwitchBackend>, BackendError> {
        let factory = self
            .factories
            .get(&config.backend)
            .ok_or_else(|| BackendError::UnknownBackend(config.backend.clone()))?;

        debug!("Building {} backend for {} ({})", config.backend, config.host, config.os);
        factory(config)
    }
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("BackendRegistry").field("backends", &names).finish()
    }
}
