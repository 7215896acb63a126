//! Resource store over the Kubernetes API.

use super::ResourceStore;
use crate::error::StoreError;
use crds::{
    AnsibleSwitch, OVSSwitch, SecretReference, Switch, SwitchPort, SwitchPortConfiguration,
    SwitchResource, SwitchResourceLimit,
};
use k8s_openapi::api::core::v1::Secret;
use kube::api::{DeleteParams, ListParams, PostParams};
use kube::core::NamespaceResourceScope;
use kube::{Api, Client, Resource, ResourceExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use switch_backend::Credentials;
use tracing::debug;

/// [`ResourceStore`] backed by a Kubernetes client.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

/// Kind name of `K`, for error messages
fn kind_of<K: Resource<DynamicType = ()>>() -> String {
    K::kind(&()).into_owned()
}

/// Map a Kubernetes error onto the store contract
fn store_error(kind: String, key: String, err: kube::Error) -> StoreError {
    match err {
        kube::Error::Api(ref response) if response.code == 404 => StoreError::NotFound { kind, key },
        kube::Error::Api(ref response) if response.code == 409 && response.reason == "AlreadyExists" => {
            StoreError::AlreadyExists { kind, key }
        }
        kube::Error::Api(ref response) if response.code == 409 => StoreError::Conflict { kind, key },
        other => StoreError::Kube(other),
    }
}

fn key_of<K: ResourceExt>(object: &K) -> (String, String) {
    (object.namespace().unwrap_or_default(), object.name_any())
}

impl KubeStore {
    /// Creates a store that talks to the cluster through `client`
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn get<K>(&self, namespace: &str, name: &str) -> Result<K, StoreError>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()> + Clone + DeserializeOwned + Debug,
    {
        let key = format!("{}/{}", namespace, name);
        match self.api::<K>(namespace).get_opt(name).await {
            Ok(Some(object)) => Ok(object),
            Ok(None) => Err(StoreError::NotFound { kind: kind_of::<K>(), key }),
            Err(err) => Err(store_error(kind_of::<K>(), key, err)),
        }
    }

    async fn create<K>(&self, object: &K) -> Result<K, StoreError>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()> + Clone + Serialize + DeserializeOwned + Debug,
    {
        let (namespace, name) = key_of(object);
        debug!("Creating {} {}/{}", kind_of::<K>(), namespace, name);
        self.api::<K>(&namespace)
            .create(&PostParams::default(), object)
            .await
            .map_err(|err| store_error(kind_of::<K>(), format!("{}/{}", namespace, name), err))
    }

    async fn replace<K>(&self, object: &K) -> Result<K, StoreError>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()> + Clone + Serialize + DeserializeOwned + Debug,
    {
        let (namespace, name) = key_of(object);
        self.api::<K>(&namespace)
            .replace(&name, &PostParams::default(), object)
            .await
            .map_err(|err| store_error(kind_of::<K>(), format!("{}/{}", namespace, name), err))
    }

    async fn replace_status<K>(&self, object: &K) -> Result<K, StoreError>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()> + Clone + Serialize + DeserializeOwned + Debug,
    {
        let (namespace, name) = key_of(object);
        let body = serde_json::to_vec(object)?;
        self.api::<K>(&namespace)
            .replace_status(&name, &PostParams::default(), body)
            .await
            .map_err(|err| store_error(kind_of::<K>(), format!("{}/{}", namespace, name), err))
    }

    async fn delete<K>(&self, namespace: &str, name: &str, params: &DeleteParams) -> Result<Option<K>, StoreError>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()> + Clone + DeserializeOwned + Debug,
    {
        debug!("Deleting {} {}/{}", kind_of::<K>(), namespace, name);
        let deleted = self
            .api::<K>(namespace)
            .delete(name, params)
            .await
            .map_err(|err| store_error(kind_of::<K>(), format!("{}/{}", namespace, name), err))?;

        // The API answers with the object while finalizers still hold it
        Ok(deleted
            .left()
            .filter(|object| object.meta().finalizers.as_ref().is_some_and(|f| !f.is_empty())))
    }
}

#[async_trait::async_trait]
impl ResourceStore for KubeStore {
    async fn get_switch(&self, namespace: &str, name: &str) -> Result<Switch, StoreError> {
        self.get(namespace, name).await
    }

    async fn update_switch(&self, switch: &Switch) -> Result<Switch, StoreError> {
        self.replace(switch).await
    }

    async fn update_switch_status(&self, switch: &Switch) -> Result<Switch, StoreError> {
        self.replace_status(switch).await
    }

    async fn delete_switch(&self, switch: &Switch, cascade: bool) -> Result<Option<Switch>, StoreError> {
        let params = if cascade {
            DeleteParams::foreground()
        } else {
            DeleteParams::default()
        };
        let (namespace, name) = key_of(switch);
        self.delete(&namespace, &name, &params).await
    }

    async fn get_switch_port(&self, namespace: &str, name: &str) -> Result<SwitchPort, StoreError> {
        self.get(namespace, name).await
    }

    async fn create_switch_port(&self, port: &SwitchPort) -> Result<SwitchPort, StoreError> {
        self.create(port).await
    }

    async fn update_switch_port(&self, port: &SwitchPort) -> Result<SwitchPort, StoreError> {
        self.replace(port).await
    }

    async fn update_switch_port_status(&self, port: &SwitchPort) -> Result<SwitchPort, StoreError> {
        self.replace_status(port).await
    }

    async fn delete_switch_port(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.delete::<SwitchPort>(namespace, name, &DeleteParams::default()).await.map(|_| ())
    }

    async fn list_switch_ports(&self) -> Result<Vec<SwitchPort>, StoreError> {
        let ports = Api::<SwitchPort>::all(self.client.clone())
            .list(&ListParams::default())
            .await?;
        Ok(ports.items)
    }

    async fn get_switch_port_configuration(&self, namespace: &str, name: &str) -> Result<SwitchPortConfiguration, StoreError> {
        self.get(namespace, name).await
    }

    async fn update_switch_resource(&self, resource: &SwitchResource) -> Result<SwitchResource, StoreError> {
        self.replace(resource).await
    }

    async fn update_switch_resource_status(&self, resource: &SwitchResource) -> Result<SwitchResource, StoreError> {
        self.replace_status(resource).await
    }

    async fn get_switch_resource_limit(&self, namespace: &str, name: &str) -> Result<SwitchResourceLimit, StoreError> {
        self.get(namespace, name).await
    }

    async fn create_switch_resource_limit(&self, limit: &SwitchResourceLimit) -> Result<SwitchResourceLimit, StoreError> {
        self.create(limit).await
    }

    async fn update_switch_resource_limit_status(&self, limit: &SwitchResourceLimit) -> Result<SwitchResourceLimit, StoreError> {
        self.replace_status(limit).await
    }

    async fn delete_switch_resource_limit(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.delete::<SwitchResourceLimit>(namespace, name, &DeleteParams::default())
            .await
            .map(|_| ())
    }

    async fn get_ovs_switch(&self, namespace: &str, name: &str) -> Result<OVSSwitch, StoreError> {
        self.get(namespace, name).await
    }

    async fn get_ansible_switch(&self, namespace: &str, name: &str) -> Result<AnsibleSwitch, StoreError> {
        self.get(namespace, name).await
    }

    async fn get_credentials(&self, secret: &SecretReference, default_namespace: &str) -> Result<Credentials, StoreError> {
        let namespace = secret.namespace.as_deref().unwrap_or(default_namespace);
        let key = format!("{}/{}", namespace, secret.name);
        let object: Secret = self.get(namespace, &secret.name).await?;

        let field = |name: &str| -> Result<String, StoreError> {
            let bytes = object
                .data
                .as_ref()
                .and_then(|data| data.get(name))
                .ok_or_else(|| StoreError::Invalid {
                    kind: "Secret".to_string(),
                    key: key.clone(),
                    reason: format!("missing `{}`", name),
                })?;
            String::from_utf8(bytes.0.clone()).map_err(|_| StoreError::Invalid {
                kind: "Secret".to_string(),
                key: key.clone(),
                reason: format!("`{}` is not UTF-8", name),
            })
        };

        Ok(Credentials::new(field("username")?, field("password")?))
    }
}
