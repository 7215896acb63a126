//! Controller configuration from environment variables.

use crate::error::ControllerError;
use std::env;
use std::time::Duration;
use tracing::info;

const DEFAULT_REQUEUE_AFTER_SECONDS: u64 = 10;
const DEFAULT_ERROR_REQUEUE_SECONDS: u64 = 10;
const DEFAULT_CONCURRENCY: u16 = 3;
const DEFAULT_DEBOUNCE_MILLISECONDS: u64 = 500;

/// Runtime settings for the Switch Controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Namespace to watch (all namespaces when unset)
    pub namespace: Option<String>,
    /// Delay for polling states and handler retries
    pub requeue_after: Duration,
    /// Delay after a handler error or a failed write
    pub error_requeue: Duration,
    /// Concurrent reconciliations per watcher
    pub concurrency: u16,
    /// Quiet period before reconciling after an event
    pub debounce: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: None,
            requeue_after: Duration::from_secs(DEFAULT_REQUEUE_AFTER_SECONDS),
            error_requeue: Duration::from_secs(DEFAULT_ERROR_REQUEUE_SECONDS),
            concurrency: DEFAULT_CONCURRENCY,
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MILLISECONDS),
        }
    }
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which returns a variable's value if set
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            namespace: lookup("WATCH_NAMESPACE").filter(|ns| !ns.is_empty()),
            requeue_after: parse(&lookup, "REQUEUE_AFTER_SECONDS")?
                .map_or(defaults.requeue_after, Duration::from_secs),
            error_requeue: parse(&lookup, "ERROR_REQUEUE_SECONDS")?
                .map_or(defaults.error_requeue, Duration::from_secs),
            concurrency: parse(&lookup, "RECONCILE_CONCURRENCY")?.unwrap_or(defaults.concurrency),
            debounce: parse(&lookup, "DEBOUNCE_MILLISECONDS")?
                .map_or(defaults.debounce, Duration::from_millis),
        })
    }

    /// Log the effective configuration
    pub fn log(&self) {
        info!("Configuration:");
        info!("  Namespace: {}", self.namespace.as_deref().unwrap_or("all namespaces"));
        info!("  Requeue after: {:?}", self.requeue_after);
        info!("  Error requeue: {:?}", self.error_requeue);
        info!("  Concurrency: {}", self.concurrency);
        info!("  Debounce: {:?}", self.debounce);
    }
}

fn parse<F, T>(lookup: &F, key: &str) -> Result<Option<T>, ControllerError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value.trim().parse().map(Some).map_err(|_| {
            ControllerError::InvalidConfig(format!("{} must be a non-negative integer, got `{}`", key, value))
        }),
    }
}
