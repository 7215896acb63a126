//! Engine errors

use thiserror::Error;

/// Domain error returned by a handler.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Errors reported by [`crate::Machine::reconcile`].
///
/// `NoHandlers` and `NoHandler` are reconcile errors: the handler table is
/// wrong, retrying will not help. `Handler` and `Panic` are handler errors:
/// they are written to the instance status and always retried.
#[derive(Debug, Error)]
pub enum MachineError {
    /// The handler table is empty
    #[error("reconcile error: no handlers registered")]
    NoHandlers,

    /// No handler for the instance's current state
    #[error("reconcile error: no handler registered for state {0}")]
    NoHandler(String),

    /// A handler reported a failure
    #[error("handler error: {0}")]
    Handler(#[source] HandlerError),

    /// A handler panicked
    #[error("handler error: handler panicked: {0}")]
    Panic(String),
}

impl MachineError {
    /// True for table defects that the engine does not retry
    pub fn is_reconcile_error(&self) -> bool {
        matches!(self, Self::NoHandlers | Self::NoHandler(_))
    }

    /// True for failures raised while running a handler
    pub fn is_handler_error(&self) -> bool {
        !self.is_reconcile_error()
    }
}
