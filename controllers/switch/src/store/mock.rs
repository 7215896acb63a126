//! In-memory resource store for unit tests
//!
//! Behaves like the API server where the state machines can tell the
//! difference: resourceVersion conflicts, status written only through the
//! status calls, and finalizer-guarded deletion (a delete only sets
//! `deletionTimestamp` while finalizers remain; the update that clears the
//! last finalizer removes the object).

use super::ResourceStore;
use crate::error::StoreError;
use crds::{
    AnsibleSwitch, OVSSwitch, SecretReference, Switch, SwitchPort, SwitchPortConfiguration,
    SwitchResource, SwitchResourceLimit,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::{Resource, ResourceExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use switch_backend::Credentials;

/// Copies the status subresource between two objects of the same kind
pub trait HasStatus {
    /// Replace this object's status with `other`'s
    fn copy_status_from(&mut self, other: &Self);
}

macro_rules! has_status {
    ($($kind:ty),*) => {
        $(impl HasStatus for $kind {
            fn copy_status_from(&mut self, other: &Self) {
                self.status = other.status.clone();
            }
        })*
    };
}

has_status!(Switch, SwitchPort, SwitchResource, SwitchResourceLimit);

/// Timestamp used for `deletionTimestamp`
pub fn now() -> Time {
    serde_json::from_value(serde_json::json!(
        chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    ))
    .unwrap()
}

/// Objects of one kind keyed by namespace and name.
#[derive(Clone)]
pub struct Table<K> {
    kind: &'static str,
    objects: Arc<Mutex<HashMap<(String, String), K>>>,
    versions: Arc<AtomicU64>,
}

impl<K> Table<K>
where
    K: Resource<DynamicType = ()> + Clone,
{
    fn new(kind: &'static str, versions: Arc<AtomicU64>) -> Self {
        Self {
            kind,
            objects: Arc::new(Mutex::new(HashMap::new())),
            versions,
        }
    }

    fn key(namespace: &str, name: &str) -> (String, String) {
        (namespace.to_string(), name.to_string())
    }

    fn not_found(&self, namespace: &str, name: &str) -> StoreError {
        StoreError::NotFound {
            kind: self.kind.to_string(),
            key: format!("{}/{}", namespace, name),
        }
    }

    fn next_version(&self) -> String {
        (self.versions.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    /// Store `object` as-is apart from a fresh resourceVersion and uid (for test setup)
    pub fn insert(&self, mut object: K) -> K {
        let meta = object.meta_mut();
        meta.resource_version = Some(self.next_version());
        if meta.uid.is_none() {
            meta.uid = Some(format!("uid-{}", self.versions.load(Ordering::SeqCst)));
        }
        let key = Self::key(&object.namespace().unwrap_or_default(), &object.name_any());
        self.objects.lock().unwrap().insert(key, object.clone());
        object
    }

    /// Current stored object
    pub fn find(&self, namespace: &str, name: &str) -> Option<K> {
        self.objects.lock().unwrap().get(&Self::key(namespace, name)).cloned()
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    /// Every stored object
    pub fn all(&self) -> Vec<K> {
        self.objects.lock().unwrap().values().cloned().collect()
    }

    fn get(&self, namespace: &str, name: &str) -> Result<K, StoreError> {
        self.find(namespace, name).ok_or_else(|| self.not_found(namespace, name))
    }

    fn create(&self, object: &K) -> Result<K, StoreError> {
        let namespace = object.namespace().unwrap_or_default();
        let name = object.name_any();
        if self.find(&namespace, &name).is_some() {
            return Err(StoreError::AlreadyExists {
                kind: self.kind.to_string(),
                key: format!("{}/{}", namespace, name),
            });
        }
        let mut object = object.clone();
        object.meta_mut().uid = None;
        Ok(self.insert(object))
    }

    /// Checks `object` against the stored copy and returns the stored copy
    fn current(&self, object: &K) -> Result<K, StoreError> {
        let namespace = object.namespace().unwrap_or_default();
        let name = object.name_any();
        let stored = self.get(&namespace, &name)?;
        if object.meta().resource_version.is_some() && object.meta().resource_version != stored.meta().resource_version {
            return Err(StoreError::Conflict {
                kind: self.kind.to_string(),
                key: format!("{}/{}", namespace, name),
            });
        }
        Ok(stored)
    }

    fn write(&self, object: K) -> K {
        let key = Self::key(&object.namespace().unwrap_or_default(), &object.name_any());
        let mut object = object;
        object.meta_mut().resource_version = Some(self.next_version());

        let mut objects = self.objects.lock().unwrap();
        let released = object.meta().deletion_timestamp.is_some()
            && object.meta().finalizers.as_ref().is_none_or(Vec::is_empty);
        if released {
            objects.remove(&key);
        } else {
            objects.insert(key, object.clone());
        }
        object
    }

    fn delete(&self, namespace: &str, name: &str) -> Result<Option<K>, StoreError> {
        let mut object = self.get(namespace, name)?;
        if object.meta().deletion_timestamp.is_none() {
            object.meta_mut().deletion_timestamp = Some(now());
        }
        let object = self.write(object);
        Ok(self.find(namespace, name).map(|_| object))
    }
}

impl<K> Table<K>
where
    K: Resource<DynamicType = ()> + Clone + HasStatus,
{
    fn update(&self, object: &K) -> Result<K, StoreError> {
        let stored = self.current(object)?;
        let mut updated = object.clone();
        updated.copy_status_from(&stored);
        let meta = updated.meta_mut();
        meta.deletion_timestamp = stored.meta().deletion_timestamp.clone();
        meta.uid = stored.meta().uid.clone();
        Ok(self.write(updated))
    }

    fn update_status(&self, object: &K) -> Result<K, StoreError> {
        let mut stored = self.current(object)?;
        stored.copy_status_from(object);
        Ok(self.write(stored))
    }
}

/// In-memory [`ResourceStore`].
#[derive(Clone)]
pub struct MockStore {
    pub switches: Table<Switch>,
    pub switch_ports: Table<SwitchPort>,
    pub configurations: Table<SwitchPortConfiguration>,
    pub resources: Table<SwitchResource>,
    pub limits: Table<SwitchResourceLimit>,
    pub ovs_switches: Table<OVSSwitch>,
    pub ansible_switches: Table<AnsibleSwitch>,
    secrets: Arc<Mutex<HashMap<(String, String), Credentials>>>,
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStore {
    pub fn new() -> Self {
        let versions = Arc::new(AtomicU64::new(0));
        Self {
            switches: Table::new("Switch", versions.clone()),
            switch_ports: Table::new("SwitchPort", versions.clone()),
            configurations: Table::new("SwitchPortConfiguration", versions.clone()),
            resources: Table::new("SwitchResource", versions.clone()),
            limits: Table::new("SwitchResourceLimit", versions.clone()),
            ovs_switches: Table::new("OVSSwitch", versions.clone()),
            ansible_switches: Table::new("AnsibleSwitch", versions),
            secrets: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Add a Secret with `username`/`password` (for test setup)
    pub fn add_secret(&self, namespace: &str, name: &str, credentials: Credentials) {
        self.secrets
            .lock()
            .unwrap()
            .insert((namespace.to_string(), name.to_string()), credentials);
    }
}

impl std::fmt::Debug for MockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockStore")
            .field("switches", &self.switches.len())
            .field("switch_ports", &self.switch_ports.len())
            .field("limits", &self.limits.len())
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl ResourceStore for MockStore {
    async fn get_switch(&self, namespace: &str, name: &str) -> Result<Switch, StoreError> {
        self.switches.get(namespace, name)
    }

    async fn update_switch(&self, switch: &Switch) -> Result<Switch, StoreError> {
        self.switches.update(switch)
    }

    async fn update_switch_status(&self, switch: &Switch) -> Result<Switch, StoreError> {
        self.switches.update_status(switch)
    }

    async fn delete_switch(&self, switch: &Switch, cascade: bool) -> Result<Option<Switch>, StoreError> {
        let namespace = switch.namespace().unwrap_or_default();
        if cascade {
            let uid = self.switches.get(&namespace, &switch.name_any())?.metadata.uid;
            for port in self.switch_ports.all() {
                let owned = port.owner_references().iter().any(|owner| Some(&owner.uid) == uid.as_ref());
                if owned {
                    self.switch_ports.delete(&namespace, &port.name_any())?;
                }
            }
        }
        self.switches.delete(&namespace, &switch.name_any())
    }

    async fn get_switch_port(&self, namespace: &str, name: &str) -> Result<SwitchPort, StoreError> {
        self.switch_ports.get(namespace, name)
    }

    async fn create_switch_port(&self, port: &SwitchPort) -> Result<SwitchPort, StoreError> {
        self.switch_ports.create(port)
    }

    async fn update_switch_port(&self, port: &SwitchPort) -> Result<SwitchPort, StoreError> {
        self.switch_ports.update(port)
    }

    async fn update_switch_port_status(&self, port: &SwitchPort) -> Result<SwitchPort, StoreError> {
        self.switch_ports.update_status(port)
    }

    async fn delete_switch_port(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.switch_ports.delete(namespace, name).map(|_| ())
    }

    async fn list_switch_ports(&self) -> Result<Vec<SwitchPort>, StoreError> {
        Ok(self.switch_ports.all())
    }

    async fn get_switch_port_configuration(&self, namespace: &str, name: &str) -> Result<SwitchPortConfiguration, StoreError> {
        self.configurations.get(namespace, name)
    }

    async fn update_switch_resource(&self, resource: &SwitchResource) -> Result<SwitchResource, StoreError> {
        self.resources.update(resource)
    }

    async fn update_switch_resource_status(&self, resource: &SwitchResource) -> Result<SwitchResource, StoreError> {
        self.resources.update_status(resource)
    }

    async fn get_switch_resource_limit(&self, namespace: &str, name: &str) -> Result<SwitchResourceLimit, StoreError> {
        self.limits.get(namespace, name)
    }

    async fn create_switch_resource_limit(&self, limit: &SwitchResourceLimit) -> Result<SwitchResourceLimit, StoreError> {
        self.limits.create(limit)
    }

    async fn update_switch_resource_limit_status(&self, limit: &SwitchResourceLimit) -> Result<SwitchResourceLimit, StoreError> {
        self.limits.update_status(limit)
    }

    async fn delete_switch_resource_limit(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.limits.delete(namespace, name).map(|_| ())
    }

    async fn get_ovs_switch(&self, namespace: &str, name: &str) -> Result<OVSSwitch, StoreError> {
        self.ovs_switches.get(namespace, name)
    }

    async fn get_ansible_switch(&self, namespace: &str, name: &str) -> Result<AnsibleSwitch, StoreError> {
        self.ansible_switches.get(namespace, name)
    }

    async fn get_credentials(&self, secret: &SecretReference, default_namespace: &str) -> Result<Credentials, StoreError> {
        let namespace = secret.namespace.as_deref().unwrap_or(default_namespace);
        self.secrets
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), secret.name.clone()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: "Secret".to_string(),
                key: format!("{}/{}", namespace, secret.name),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finalizer;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_update_ignores_status_and_checks_version() {
        let store = MockStore::new();
        let stored = store.switches.insert(create_test_switch("sw1", "default", &[]));

        let mut edited = stored.clone();
        edited.spec.ports.insert("eth1".to_string(), Default::default());
        edited.status = Some(Default::default());
        let updated = store.update_switch(&edited).await.unwrap();
        assert!(updated.status.is_none());
        assert_ne!(updated.metadata.resource_version, stored.metadata.resource_version);

        // Writing the stale copy again is a conflict
        let err = store.update_switch(&edited).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_delete_waits_for_finalizers() {
        let store = MockStore::new();
        let mut switch = create_test_switch("sw1", "default", &[]);
        finalizer::add(&mut switch);
        let switch = store.switches.insert(switch);

        let pending = store.delete_switch(&switch, false).await.unwrap();
        let mut pending = pending.expect("finalizer keeps the object");
        assert!(finalizer::is_deleting(&pending));

        finalizer::remove(&mut pending);
        store.update_switch(&pending).await.unwrap();
        assert!(store.switches.find("default", "sw1").is_none());
    }

    #[tokio::test]
    async fn test_create_already_exists() {
        let store = MockStore::new();
        let port = create_test_switch_port("eth1", "default", None);
        store.create_switch_port(&port).await.unwrap();
        let err = store.create_switch_port(&port).await.unwrap_err();
        assert!(err.is_already_exists());
    }
}
