//! In-memory fake backend
//!
//! Stores port configuration in memory so the state machines can be driven
//! end to end without a switch. Clones share state, so a test can keep a
//! handle and inspect what the controller pushed.

use crate::backend_trait::SwitchBackend;
use crate::error::BackendError;
use crate::registry::BackendRegistry;
use crds::SwitchPortConfigurationSpec;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Backend name the fake is registered under
pub const FAKE_BACKEND: &str = "fake";

/// A call the fake has served
#[derive(Debug, Clone, PartialEq)]
pub enum FakeCall {
    /// Reachability check
    IsAvailable,
    /// Read of a port
    GetPortAttr(String),
    /// Configuration pushed to a port
    SetPortAttr(String, SwitchPortConfigurationSpec),
    /// Reset of a port
    ResetPort(String, SwitchPortConfigurationSpec),
}

/// Fake switch, used by tests and by `TestSwitch` providers
#[derive(Debug, Clone)]
pub struct FakeBackend {
    host: String,
    available: Arc<AtomicBool>,
    ports: Arc<Mutex<HashMap<String, SwitchPortConfigurationSpec>>>,
    calls: Arc<Mutex<Vec<FakeCall>>>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBackend {
    /// A reachable fake switch with no configured ports
    pub fn new() -> Self {
        Self {
            host: "fake-switch".to_string(),
            available: Arc::new(AtomicBool::new(true)),
            ports: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Make every call succeed or fail with `Unavailable`
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Overwrite a port's live configuration (simulates an out-of-band change)
    pub fn set_port(&self, port: &str, configuration: SwitchPortConfigurationSpec) {
        self.ports.lock().unwrap_or_else(PoisonError::into_inner).insert(port.to_string(), configuration);
    }

    /// Live configuration of `port`, if it was ever configured
    pub fn port(&self, port: &str) -> Option<SwitchPortConfigurationSpec> {
        self.ports.lock().unwrap_or_else(PoisonError::into_inner).get(port).cloned()
    }

    /// Calls served so far, oldest first
    pub fn calls(&self) -> Vec<FakeCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn record(&self, call: FakeCall) -> Result<(), BackendError> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(call);
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BackendError::Unavailable {
                host: self.host.clone(),
                reason: "switch is offline".to_string(),
            })
        }
    }
}

#[async_trait::async_trait]
impl SwitchBackend for FakeBackend {
    async fn is_available(&self) -> Result<(), BackendError> {
        self.record(FakeCall::IsAvailable)
    }

    async fn get_port_attr(&self, port: &str) -> Result<SwitchPortConfigurationSpec, BackendError> {
        self.record(FakeCall::GetPortAttr(port.to_string()))?;
        Ok(self.port(port).unwrap_or_default())
    }

    async fn set_port_attr(&self, port: &str, configuration: &SwitchPortConfigurationSpec) -> Result<(), BackendError> {
        self.record(FakeCall::SetPortAttr(port.to_string(), configuration.clone()))?;
        self.set_port(port, configuration.clone());
        Ok(())
    }

    async fn reset_port(&self, port: &str, configuration: &SwitchPortConfigurationSpec) -> Result<(), BackendError> {
        self.record(FakeCall::ResetPort(port.to_string(), configuration.clone()))?;
        self.ports.lock().unwrap_or_else(PoisonError::into_inner).remove(port);
        Ok(())
    }
}

impl BackendRegistry {
    /// Register `fake` under [`FAKE_BACKEND`]; every build returns a clone sharing its state
    #[must_use]
    pub fn with_fake(self, fake: &FakeBackend) -> Self {
        let fake = fake.clone();
        self.register(FAKE_BACKEND, move |_| Ok(Arc::new(fake.clone()) as Arc<dyn SwitchBackend>))
    }
}
