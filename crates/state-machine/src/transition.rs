//! Handler results

use crate::error::HandlerError;
use std::time::Duration;

/// When the scheduler should reconcile the instance again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requeue {
    /// As soon as possible
    Immediate,
    /// No sooner than the given delay
    After(Duration),
    /// Only when the instance changes
    None,
}

/// What a handler decided: the next state, when to run again, and an
/// optional error to surface in status.
#[derive(Debug)]
pub struct Transition<S> {
    /// State to move to (may equal the current state)
    pub next: S,
    /// Requeue hint
    pub requeue: Requeue,
    /// Error to record, if any
    pub error: Option<HandlerError>,
}

impl<S> Transition<S> {
    /// Move to `next` and reconcile again immediately
    pub fn continue_now(next: S) -> Self {
        Self {
            next,
            requeue: Requeue::Immediate,
            error: None,
        }
    }

    /// Move to `next` and reconcile again after `delay`
    pub fn continue_after(next: S, delay: Duration) -> Self {
        Self {
            next,
            requeue: Requeue::After(delay),
            error: None,
        }
    }

    /// Move to `next` and stop requeueing
    pub fn complete(next: S) -> Self {
        Self {
            next,
            requeue: Requeue::None,
            error: None,
        }
    }

    /// Stay in (or move to) `state`, record `error`, and try again after `delay`
    pub fn retry(state: S, delay: Duration, error: impl Into<HandlerError>) -> Self {
        Self {
            next: state,
            requeue: Requeue::After(delay),
            error: Some(error.into()),
        }
    }

    /// Attach an error to this transition
    #[must_use]
    pub fn with_error(mut self, error: impl Into<HandlerError>) -> Self {
        self.error = Some(error.into());
        self
    }
}
