//! Idempotent create-or-update of child objects.
//!
//! `apply` creates the desired object when it is absent. When it exists, only
//! the fields the operator owns are overwritten (see [`Managed`]); everything
//! the API server or other controllers set is kept. Conflicting writes are
//! retried, and updates rejected as invalid (immutable fields such as a
//! workload selector) fall back to delete and re-create.

use crate::client::ClusterClient;
use crate::error::ControllerError;
use crate::retry::{RetryConfig, retry_with_backoff};
use cluster_client::{ClusterError, ObjectStore, ignore_not_found};
use crds::{ServiceDiscovery, Submariner};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::Resource;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

/// A kind the operator creates and keeps in its desired state
pub trait Managed:
    Resource<DynamicType = ()> + Clone + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Store for this kind
    fn store(client: &dyn ClusterClient) -> &dyn ObjectStore<Self>;

    /// Copy the operator-owned fields of `desired` onto `existing`
    fn overwrite_managed(existing: &mut Self, desired: &Self);
}

impl Managed for DaemonSet {
    fn store(client: &dyn ClusterClient) -> &dyn ObjectStore<Self> {
        client.daemon_sets()
    }

    fn overwrite_managed(existing: &mut Self, desired: &Self) {
        existing.spec = desired.spec.clone();
    }
}

impl Managed for Deployment {
    fn store(client: &dyn ClusterClient) -> &dyn ObjectStore<Self> {
        client.deployments()
    }

    fn overwrite_managed(existing: &mut Self, desired: &Self) {
        existing.spec = desired.spec.clone();
    }
}

impl Managed for Service {
    fn store(client: &dyn ClusterClient) -> &dyn ObjectStore<Self> {
        client.services()
    }

    fn overwrite_managed(existing: &mut Self, desired: &Self) {
        // clusterIP is allocated by the API server and immutable
        let allocated = existing
            .spec
            .as_ref()
            .map(|spec| (spec.cluster_ip.clone(), spec.cluster_ips.clone()));
        existing.spec = desired.spec.clone();
        if let (Some(spec), Some((cluster_ip, cluster_ips))) = (existing.spec.as_mut(), allocated) {
            spec.cluster_ip = cluster_ip;
            spec.cluster_ips = cluster_ips;
        }
    }
}

impl Managed for ConfigMap {
    fn store(client: &dyn ClusterClient) -> &dyn ObjectStore<Self> {
        client.config_maps()
    }

    fn overwrite_managed(existing: &mut Self, desired: &Self) {
        existing.data = desired.data.clone();
        existing.binary_data = desired.binary_data.clone();
    }
}

impl Managed for ServiceDiscovery {
    fn store(client: &dyn ClusterClient) -> &dyn ObjectStore<Self> {
        client.service_discoveries()
    }

    fn overwrite_managed(existing: &mut Self, desired: &Self) {
        existing.spec = desired.spec.clone();
    }
}

impl Managed for Submariner {
    fn store(client: &dyn ClusterClient) -> &dyn ObjectStore<Self> {
        client.submariners()
    }

    fn overwrite_managed(existing: &mut Self, desired: &Self) {
        existing.spec = desired.spec.clone();
    }
}

/// Kind name of a managed type, for logs and errors
pub fn kind_of<K: Managed>() -> String {
    K::kind(&()).to_string()
}

/// Create or update `desired` and return the server's copy.
///
/// When `owner` is given it becomes the object's only owner reference, making
/// the object garbage-collected with its owner.
pub async fn apply<K: Managed>(
    client: &dyn ClusterClient,
    owner: Option<&OwnerReference>,
    mut desired: K,
) -> Result<K, ControllerError> {
    if let Some(owner) = owner {
        desired.meta_mut().owner_references = Some(vec![owner.clone()]);
    }

    let kind = kind_of::<K>();
    let namespace = desired
        .meta()
        .namespace
        .clone()
        .ok_or_else(|| ControllerError::MissingField(format!("{} metadata.namespace", kind)))?;
    let name = desired
        .meta()
        .name
        .clone()
        .ok_or_else(|| ControllerError::MissingField(format!("{} metadata.name", kind)))?;

    let store = K::store(client);
    let operation = format!("apply {} {}/{}", kind, namespace, name);
    let (ns, nm, target) = (namespace.as_str(), name.as_str(), &desired);

    retry_with_backoff(
        &RetryConfig::conflict(),
        &operation,
        ClusterError::is_conflict,
        move || apply_once(store, ns, nm, target),
    )
    .await
    .map_err(|source| ControllerError::Apply {
        kind,
        namespace: namespace.clone(),
        name: name.clone(),
        source,
    })
}

async fn apply_once<K: Managed>(
    store: &dyn ObjectStore<K>,
    namespace: &str,
    name: &str,
    desired: &K,
) -> Result<K, ClusterError> {
    let Some(existing) = ignore_not_found(store.get(namespace, name).await)? else {
        store.create(namespace, desired).await?;
        info!("Created {} {}/{}", kind_of::<K>(), namespace, name);
        return store.get(namespace, name).await;
    };

    let mut updated = existing.clone();
    K::overwrite_managed(&mut updated, desired);
    merge_metadata(updated.meta_mut(), desired.meta());

    if serde_json::to_value(&updated)? == serde_json::to_value(&existing)? {
        debug!("{} {}/{} is up to date", kind_of::<K>(), namespace, name);
        return Ok(existing);
    }

    match store.replace(namespace, name, &updated).await {
        Ok(_) => {
            info!("Updated {} {}/{}", kind_of::<K>(), namespace, name);
        }
        Err(e) if e.is_invalid() => {
            warn!(
                "Update of {} {}/{} rejected ({}), re-creating it",
                kind_of::<K>(),
                namespace,
                name,
                e
            );
            ignore_not_found(store.delete(namespace, name).await)?;
            store.create(namespace, desired).await?;
        }
        Err(e) => return Err(e),
    }

    store.get(namespace, name).await
}

/// Merge desired labels/annotations into existing ones and take desired owner references
fn merge_metadata(existing: &mut ObjectMeta, desired: &ObjectMeta) {
    if let Some(labels) = &desired.labels {
        existing
            .labels
            .get_or_insert_with(Default::default)
            .extend(labels.clone());
    }
    if let Some(annotations) = &desired.annotations {
        existing
            .annotations
            .get_or_insert_with(Default::default)
            .extend(annotations.clone());
    }
    if desired.owner_references.is_some() {
        existing.owner_references = desired.owner_references.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockClusterClient;
    use cluster_client::{Failure, Verb};
    use k8s_openapi::api::core::v1::ServiceSpec;
    use std::collections::BTreeMap;

    fn config_map(data: &[(&str, &str)]) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some("settings".to_string()),
                namespace: Some("submariner-operator".to_string()),
                labels: Some(BTreeMap::from([("app".to_string(), "settings".to_string())])),
                ..Default::default()
            },
            data: Some(
                data.iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
            ..Default::default()
        }
    }

    fn owner() -> OwnerReference {
        OwnerReference {
            api_version: "submariner.io/v1alpha1".to_string(),
            kind: "Broker".to_string(),
            name: "submariner-broker".to_string(),
            uid: "uid-broker".to_string(),
            controller: Some(true),
            block_owner_deletion: Some(true),
        }
    }

    #[tokio::test]
    async fn test_apply_creates_missing_object_with_owner() {
        let client = MockClusterClient::new();

        let applied = apply(&client, Some(&owner()), config_map(&[("a", "1")]))
            .await
            .unwrap();

        assert!(applied.metadata.uid.is_some());
        assert_eq!(applied.metadata.owner_references.unwrap()[0].name, "submariner-broker");
        assert_eq!(client.config_maps.count(Verb::Create, "submariner-operator", "settings"), 1);
    }

    #[tokio::test]
    async fn test_apply_updates_only_managed_fields() {
        let client = MockClusterClient::new();
        let mut existing = config_map(&[("a", "1")]);
        existing
            .metadata
            .labels
            .as_mut()
            .unwrap()
            .insert("foreign".to_string(), "kept".to_string());
        client.config_maps.insert(existing);

        let applied = apply(&client, None, config_map(&[("a", "2")])).await.unwrap();

        assert_eq!(applied.data.unwrap()["a"], "2");
        assert_eq!(applied.metadata.labels.unwrap()["foreign"], "kept");
    }

    #[tokio::test]
    async fn test_apply_twice_writes_once() {
        let client = MockClusterClient::new();

        apply(&client, None, config_map(&[("a", "1")])).await.unwrap();
        apply(&client, None, config_map(&[("a", "1")])).await.unwrap();

        let ns = "submariner-operator";
        assert_eq!(client.config_maps.count(Verb::Create, ns, "settings"), 1);
        assert_eq!(client.config_maps.count(Verb::Replace, ns, "settings"), 0);
    }

    #[tokio::test]
    async fn test_apply_retries_conflicts() {
        let client = MockClusterClient::new();
        client.config_maps.insert(config_map(&[("a", "1")]));
        client.config_maps.fail_next(Verb::Replace, Failure::Conflict);
        client.config_maps.fail_next(Verb::Replace, Failure::Conflict);

        let applied = apply(&client, None, config_map(&[("a", "2")])).await.unwrap();

        assert_eq!(applied.data.unwrap()["a"], "2");
        assert_eq!(
            client.config_maps.count(Verb::Replace, "submariner-operator", "settings"),
            3
        );
    }

    #[tokio::test]
    async fn test_apply_recreates_on_invalid_update() {
        let client = MockClusterClient::new();
        client.config_maps.insert(config_map(&[("a", "1")]));
        client.config_maps.fail_next(Verb::Replace, Failure::Invalid);

        let applied = apply(&client, None, config_map(&[("a", "2")])).await.unwrap();

        let ns = "submariner-operator";
        assert_eq!(applied.data.unwrap()["a"], "2");
        assert_eq!(client.config_maps.count(Verb::Delete, ns, "settings"), 1);
        assert_eq!(client.config_maps.count(Verb::Create, ns, "settings"), 1);
    }

    #[tokio::test]
    async fn test_apply_surfaces_other_errors_with_identity() {
        let client = MockClusterClient::new();
        client.config_maps.fail_next(Verb::Get, Failure::Server);

        let err = apply(&client, None, config_map(&[])).await.unwrap_err();

        match err {
            ControllerError::Apply { kind, namespace, name, .. } => {
                assert_eq!(kind, "ConfigMap");
                assert_eq!(namespace, "submariner-operator");
                assert_eq!(name, "settings");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_apply_keeps_allocated_cluster_ip() {
        let client = MockClusterClient::new();
        let service = |cluster_ip: Option<&str>, port: i32| Service {
            metadata: ObjectMeta {
                name: Some("dns".to_string()),
                namespace: Some("submariner-operator".to_string()),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                cluster_ip: cluster_ip.map(str::to_string),
                ports: Some(vec![k8s_openapi::api::core::v1::ServicePort {
                    port,
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        };
        client.services.insert(service(Some("10.96.0.53"), 53));

        let applied = apply(&client, None, service(None, 5353)).await.unwrap();

        let spec = applied.spec.unwrap();
        assert_eq!(spec.cluster_ip.as_deref(), Some("10.96.0.53"));
        assert_eq!(spec.ports.unwrap()[0].port, 5353);
    }
}
