//! Shared state handed to every handler.

use crate::config::Config;
use crate::store::ResourceStore;
use std::sync::Arc;
use std::time::Duration;
use switch_backend::BackendRegistry;

/// What handlers need to reach the outside world.
pub struct Context {
    /// Resource store for every kind
    pub store: Arc<dyn ResourceStore>,
    /// Backend constructors by name
    pub backends: BackendRegistry,
    /// Delay for polling states and handler retries
    pub requeue_after: Duration,
    /// Delay after a handler error or a failed write
    pub error_requeue: Duration,
}

impl Context {
    /// Bundles the store and backends with the delays from `config`
    pub fn new(store: Arc<dyn ResourceStore>, backends: BackendRegistry, config: &Config) -> Self {
        Self {
            store,
            backends,
            requeue_after: config.requeue_after,
            error_requeue: config.error_requeue,
        }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("backends", &self.backends)
            .field("requeue_after", &self.requeue_after)
            .field("error_requeue", &self.error_requeue)
            .finish_non_exhaustive()
    }
}
