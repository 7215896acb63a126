//! State Machine Reconciliation Engine
//!
//! Drives any managed resource through a per-kind state graph. Each call to
//! [`Machine::reconcile`] runs exactly one handler (the one registered for the
//! instance's current state) and reports back:
//!
//! - which zones of the instance changed ([`Dirty`]), so the caller persists
//!   only what it must
//! - when to run again ([`Requeue`])
//! - what went wrong, if anything ([`MachineError`])
//!
//! The engine knows nothing about where instances are stored. Handlers reach
//! external systems through whatever context they were constructed with.
//!
//! # Example
//!
//! ```ignore
//! let handlers = Handlers::for_workflow(SwitchWorkflow::new(ctx), SwitchState::ALL);
//! let outcome = Machine::new(handlers).reconcile(&mut switch).await;
//! if outcome.dirty.status() {
//!     store.update_switch_status(&switch).await?;
//! }
//! ```

pub mod error;
pub mod handler;
pub mod instance;
pub mod machine;
pub mod transition;

pub use error::{HandlerError, MachineError};
pub use handler::{Handler, Handlers, Workflow};
pub use instance::{Dirty, Instance};
pub use machine::{Machine, Reconciled, DEFAULT_ERROR_REQUEUE};
pub use transition::{Requeue, Transition};
