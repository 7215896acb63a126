//! The reconcile loop

use crate::error::MachineError;
use crate::handler::Handlers;
use crate::instance::{Dirty, Instance};
use crate::transition::Requeue;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Delay applied after a handler error when the handler did not ask for one
pub const DEFAULT_ERROR_REQUEUE: Duration = Duration::from_secs(10);

/// Outcome of one reconcile call.
#[derive(Debug)]
pub struct Reconciled {
    /// Zones the caller must persist
    pub dirty: Dirty,
    /// When to call again
    pub requeue: Requeue,
    /// Failure, if any
    pub error: Option<MachineError>,
}

impl Reconciled {
    fn rejected(error: MachineError) -> Self {
        Self {
            dirty: Dirty::None,
            requeue: Requeue::None,
            error: Some(error),
        }
    }
}

/// Dispatches instances of `K` to their state handlers.
///
/// A machine holds no per-instance state; the caller guarantees that a
/// given instance is never reconciled by two calls at once.
#[derive(Debug)]
pub struct Machine<K: Instance> {
    handlers: Handlers<K>,
    error_requeue: Duration,
}

impl<K: Instance + 'static> Machine<K> {
    /// Creates a machine over `handlers`
    pub fn new(handlers: Handlers<K>) -> Self {
        Self {
            handlers,
            error_requeue: DEFAULT_ERROR_REQUEUE,
        }
    }

    /// Overrides the delay used after handler errors
    #[must_use]
    pub fn with_error_requeue(mut self, delay: Duration) -> Self {
        self.error_requeue = delay;
        self
    }

    /// Runs the handler for the instance's current state.
    ///
    /// On success the status error is cleared. On a handler error the next
    /// state is still applied and the error text is recorded. A panicking
    /// handler leaves the instance exactly as it was, apart from the error.
    pub async fn reconcile(&self, instance: &mut K) -> Reconciled {
        if self.handlers.is_empty() {
            return Reconciled::rejected(MachineError::NoHandlers);
        }

        let state = instance.state();
        let Some(handler) = self.handlers.get(state) else {
            return Reconciled::rejected(MachineError::NoHandler(state.to_string()));
        };

        let key = instance.key();
        let before = instance.clone();
        let metadata_and_spec = instance.metadata_and_spec();
        let status = instance.status();

        debug!("Running {} handler for {}", state, key);
        let outcome = AssertUnwindSafe(handler.handle(instance)).catch_unwind().await;

        let (requeue, failure) = match outcome {
            Ok(transition) => {
                if transition.next != state {
                    info!("{} moved from {} to {}", key, state, transition.next);
                }
                instance.set_state(transition.next);

                match transition.error {
                    None => {
                        instance.set_error(None);
                        (transition.requeue, None)
                    }
                    Some(err) => {
                        let err = MachineError::Handler(err);
                        warn!("{} in state {}: {}", key, state, err);
                        instance.set_error(Some(err.to_string()));
                        (self.error_requeue(transition.requeue), Some(err))
                    }
                }
            }
            Err(payload) => {
                *instance = before;
                let err = MachineError::Panic(panic_message(&*payload));
                error!("{} in state {}: {}", key, state, err);
                instance.set_error(Some(err.to_string()));
                (Requeue::After(self.error_requeue), Some(err))
            }
        };

        Reconciled {
            dirty: Dirty::from_zones(
                metadata_and_spec != instance.metadata_and_spec(),
                status != instance.status(),
            ),
            requeue,
            error: failure,
        }
    }

    fn error_requeue(&self, requested: Requeue) -> Requeue {
        match requested {
            Requeue::After(delay) if !delay.is_zero() => requested,
            _ => Requeue::After(self.error_requeue),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
