//! ObjectStore backed by the Kubernetes API server.

use crate::error::ClusterError;
use crate::store::ObjectStore;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Api, Client, Resource};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::marker::PhantomData;
use tracing::debug;

/// `ObjectStore` implementation that issues one API request per call
pub struct KubeStore<K> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

impl<K> Clone for KubeStore<K> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            _kind: PhantomData,
        }
    }
}

impl<K> KubeStore<K>
where
    K: Resource<Scope = NamespaceResourceScope>,
    K::DynamicType: Default,
{
    /// Create a store sharing the given client
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }

    fn api(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait::async_trait]
impl<K> ObjectStore<K> for KubeStore<K>
where
    K: Resource<Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
    K::DynamicType: Default,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<K, ClusterError> {
        debug!("GET {} {}/{}", K::kind(&K::DynamicType::default()), namespace, name);
        Ok(self.api(namespace).get(name).await?)
    }

    async fn list(&self, namespace: &str, label_selector: &str) -> Result<Vec<K>, ClusterError> {
        let params = if label_selector.is_empty() {
            ListParams::default()
        } else {
            ListParams::default().labels(label_selector)
        };
        let list = self.api(namespace).list(&params).await?;
        Ok(list.items)
    }

    async fn create(&self, namespace: &str, object: &K) -> Result<K, ClusterError> {
        Ok(self.api(namespace).create(&PostParams::default(), object).await?)
    }

    async fn replace(&self, namespace: &str, name: &str, object: &K) -> Result<K, ClusterError> {
        Ok(self
            .api(namespace)
            .replace(name, &PostParams::default(), object)
            .await?)
    }

    async fn patch(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<K, ClusterError> {
        Ok(self
            .api(namespace)
            .patch(name, &PatchParams::default(), &Patch::Merge(patch))
            .await?)
    }

    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<K, ClusterError> {
        Ok(self
            .api(namespace)
            .patch_status(name, &PatchParams::default(), &Patch::Merge(patch))
            .await?)
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        debug!("DELETE {} {}/{}", K::kind(&K::DynamicType::default()), namespace, name);
        self.api(namespace)
            .delete(name, &DeleteParams::background())
            .await?;
        Ok(())
    }
}
