//! Deletion guard helpers.
//!
//! Every managed kind carries [`FINALIZER`] while the controller still has
//! cleanup to do; the store keeps the object until it is removed.

use kube::Resource;

/// Finalizer installed on Switch, SwitchPort and SwitchResource objects
pub const FINALIZER: &str = "dcops.microscaler.io/switch-controller";

/// True when `object` carries [`FINALIZER`]
pub fn has<K: Resource>(object: &K) -> bool {
    object
        .meta()
        .finalizers
        .as_ref()
        .is_some_and(|finalizers| finalizers.iter().any(|f| f == FINALIZER))
}

/// Install the finalizer; returns false if it was already present
pub fn add<K: Resource>(object: &mut K) -> bool {
    if has(object) {
        return false;
    }
    object
        .meta_mut()
        .finalizers
        .get_or_insert_with(Vec::new)
        .push(FINALIZER.to_string());
    true
}

/// Remove the finalizer; returns false if it was not present
pub fn remove<K: Resource>(object: &mut K) -> bool {
    let meta = object.meta_mut();
    let Some(finalizers) = meta.finalizers.as_mut() else {
        return false;
    };
    let before = finalizers.len();
    finalizers.retain(|f| f != FINALIZER);
    let removed = finalizers.len() != before;
    if finalizers.is_empty() {
        meta.finalizers = None;
    }
    removed
}

/// True once the store has been asked to delete the object
pub fn is_deleting<K: Resource>(object: &K) -> bool {
    object.meta().deletion_timestamp.is_some()
}
