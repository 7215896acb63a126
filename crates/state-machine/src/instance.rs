//! Managed instance contract and dirty tracking

use std::fmt;
use std::hash::Hash;

/// A resource the engine can drive.
///
/// The instance is split into two zones that are persisted independently:
/// metadata + spec, and status. Both are snapshotted before a handler runs
/// and compared afterwards to work out what needs writing back.
pub trait Instance: Clone + Send + Sync {
    /// Closed set of states for this kind
    type State: Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static;

    /// Snapshot of metadata and spec
    type MetadataAndSpec: PartialEq + Send + Sync;

    /// Snapshot of status
    type Status: PartialEq + Send + Sync;

    /// Human readable identity used in logs, e.g. `namespace/name`
    fn key(&self) -> String;

    /// Current state
    fn state(&self) -> Self::State;

    /// Moves the instance to `state`
    fn set_state(&mut self, state: Self::State);

    /// Records (or clears) the error message shown in status
    fn set_error(&mut self, error: Option<String>);

    /// Current metadata and spec
    fn metadata_and_spec(&self) -> Self::MetadataAndSpec;

    /// Current status
    fn status(&self) -> Self::Status;
}

/// Which zones of an instance changed during a reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dirty {
    /// Nothing to persist
    #[default]
    None,
    /// Metadata and/or spec changed
    MetadataAndSpec,
    /// Status changed
    Status,
    /// Both zones changed
    All,
}

impl Dirty {
    /// Combines per-zone change flags
    pub fn from_zones(metadata_and_spec: bool, status: bool) -> Self {
        match (metadata_and_spec, status) {
            (false, false) => Self::None,
            (true, false) => Self::MetadataAndSpec,
            (false, true) => Self::Status,
            (true, true) => Self::All,
        }
    }

    /// True when metadata or spec must be written
    pub fn metadata_and_spec(self) -> bool {
        matches!(self, Self::MetadataAndSpec | Self::All)
    }

    /// True when status must be written
    pub fn status(self) -> bool {
        matches!(self, Self::Status | Self::All)
    }
}
