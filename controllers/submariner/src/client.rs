//! Per-kind object stores used by the reconcilers.
//!
//! `ClusterClient` hands out one `ObjectStore` per Kubernetes kind the
//! operator touches. Production code uses `KubeClusterClient`; unit tests use
//! `MockClusterClient`, whose stores are in-memory and inspectable.

use cluster_client::{KubeStore, ObjectStore};
use crds::{Broker, ServiceDiscovery, Submariner};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::{ConfigMap, Pod, Service};

/// Access to every object kind the operator reads or writes
pub trait ClusterClient: Send + Sync {
    fn daemon_sets(&self) -> &dyn ObjectStore<DaemonSet>;
    fn deployments(&self) -> &dyn ObjectStore<Deployment>;
    fn pods(&self) -> &dyn ObjectStore<Pod>;
    fn services(&self) -> &dyn ObjectStore<Service>;
    fn config_maps(&self) -> &dyn ObjectStore<ConfigMap>;
    fn submariners(&self) -> &dyn ObjectStore<Submariner>;
    fn service_discoveries(&self) -> &dyn ObjectStore<ServiceDiscovery>;
    fn brokers(&self) -> &dyn ObjectStore<Broker>;
}

/// `ClusterClient` backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeClusterClient {
    daemon_sets: KubeStore<DaemonSet>,
    deployments: KubeStore<Deployment>,
    pods: KubeStore<Pod>,
    services: KubeStore<Service>,
    config_maps: KubeStore<ConfigMap>,
    submariners: KubeStore<Submariner>,
    service_discoveries: KubeStore<ServiceDiscovery>,
    brokers: KubeStore<Broker>,
}

impl KubeClusterClient {
    /// Creates stores sharing one Kubernetes client.
    pub fn new(client: kube::Client) -> Self {
        Self {
            daemon_sets: KubeStore::new(client.clone()),
            deployments: KubeStore::new(client.clone()),
            pods: KubeStore::new(client.clone()),
            services: KubeStore::new(client.clone()),
            config_maps: KubeStore::new(client.clone()),
            submariners: KubeStore::new(client.clone()),
            service_discoveries: KubeStore::new(client.clone()),
            brokers: KubeStore::new(client),
        }
    }
}

impl ClusterClient for KubeClusterClient {
    fn daemon_sets(&self) -> &dyn ObjectStore<DaemonSet> {
        &self.daemon_sets
    }

    fn deployments(&self) -> &dyn ObjectStore<Deployment> {
        &self.deployments
    }

    fn pods(&self) -> &dyn ObjectStore<Pod> {
        &self.pods
    }

    fn services(&self) -> &dyn ObjectStore<Service> {
        &self.services
    }

    fn config_maps(&self) -> &dyn ObjectStore<ConfigMap> {
        &self.config_maps
    }

    fn submariners(&self) -> &dyn ObjectStore<Submariner> {
        &self.submariners
    }

    fn service_discoveries(&self) -> &dyn ObjectStore<ServiceDiscovery> {
        &self.service_discoveries
    }

    fn brokers(&self) -> &dyn ObjectStore<Broker> {
        &self.brokers
    }
}

/// In-memory `ClusterClient` for unit tests
#[cfg(test)]
#[derive(Clone, Default)]
pub struct MockClusterClient {
    pub daemon_sets: cluster_client::MockStore<DaemonSet>,
    pub deployments: cluster_client::MockStore<Deployment>,
    pub pods: cluster_client::MockStore<Pod>,
    pub services: cluster_client::MockStore<Service>,
    pub config_maps: cluster_client::MockStore<ConfigMap>,
    pub submariners: cluster_client::MockStore<Submariner>,
    pub service_discoveries: cluster_client::MockStore<ServiceDiscovery>,
    pub brokers: cluster_client::MockStore<Broker>,
}

#[cfg(test)]
impl MockClusterClient {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl ClusterClient for MockClusterClient {
    fn daemon_sets(&self) -> &dyn ObjectStore<DaemonSet> {
        &self.daemon_sets
    }

    fn deployments(&self) -> &dyn ObjectStore<Deployment> {
        &self.deployments
    }

    fn pods(&self) -> &dyn ObjectStore<Pod> {
        &self.pods
    }

    fn services(&self) -> &dyn ObjectStore<Service> {
        &self.services
    }

    fn config_maps(&self) -> &dyn ObjectStore<ConfigMap> {
        &self.config_maps
    }

    fn submariners(&self) -> &dyn ObjectStore<Submariner> {
        &self.submariners
    }

    fn service_discoveries(&self) -> &dyn ObjectStore<ServiceDiscovery> {
        &self.service_discoveries
    }

    fn brokers(&self) -> &dyn ObjectStore<Broker> {
        &self.brokers
    }
}
