//! Handler registration
//!
//! A handler table maps each state of a kind to the code that runs in that
//! state. Tables are usually built from a [`Workflow`], whose `step` matches
//! exhaustively on the state enum, so every state has a handler by
//! construction. Individual handlers can still be registered or replaced
//! one at a time with [`Handlers::register`].

use crate::instance::Instance;
use crate::transition::Transition;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Code that runs for one state.
#[async_trait]
pub trait Handler<K: Instance>: Send + Sync {
    /// Runs the handler against `instance`, mutating it in place
    async fn handle(&self, instance: &mut K) -> Transition<K::State>;
}

/// All handlers of a kind, dispatched by state.
#[async_trait]
pub trait Workflow<K: Instance>: Send + Sync + 'static {
    /// Runs the handler for `state`
    async fn step(&self, state: K::State, instance: &mut K) -> Transition<K::State>;
}

/// Binds a workflow to one of its states.
struct Step<W, S> {
    workflow: Arc<W>,
    state: S,
}

#[async_trait]
impl<K, W> Handler<K> for Step<W, K::State>
where
    K: Instance + 'static,
    W: Workflow<K>,
{
    async fn handle(&self, instance: &mut K) -> Transition<K::State> {
        self.workflow.step(self.state, instance).await
    }
}

/// Table of handlers keyed by state.
pub struct Handlers<K: Instance> {
    table: HashMap<K::State, Arc<dyn Handler<K>>>,
}

impl<K: Instance + 'static> Handlers<K> {
    /// Creates an empty table
    pub fn new() -> Self {
        Self {
            table: HashMap::new(),
        }
    }

    /// Registers every state in `states` against `workflow`
    pub fn for_workflow<W, I>(workflow: W, states: I) -> Self
    where
        W: Workflow<K>,
        I: IntoIterator<Item = K::State>,
    {
        let workflow = Arc::new(workflow);
        states.into_iter().fold(Self::new(), |handlers, state| {
            handlers.register(
                state,
                Step {
                    workflow: Arc::clone(&workflow),
                    state,
                },
            )
        })
    }

    /// Registers `handler` for `state`, replacing any previous one
    #[must_use]
    pub fn register(mut self, state: K::State, handler: impl Handler<K> + 'static) -> Self {
        self.table.insert(state, Arc::new(handler));
        self
    }

    /// Handler for `state`
    pub fn get(&self, state: K::State) -> Option<&Arc<dyn Handler<K>>> {
        self.table.get(&state)
    }

    /// Number of registered states
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// True when no handler is registered
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl<K: Instance + 'static> Default for Handlers<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Instance> fmt::Debug for Handlers<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.table.keys()).finish()
    }
}
