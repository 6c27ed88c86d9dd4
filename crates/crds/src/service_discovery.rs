//! ServiceDiscovery CRD
//!
//! Deploys Lighthouse (multi-cluster service discovery) into a cluster.

use crate::common::{BrokerConnection, Toleration};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "submariner.io",
    version = "v1alpha1",
    kind = "ServiceDiscovery",
    namespaced,
    status = "ServiceDiscoveryStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDiscoverySpec {
    /// Broker API server connection
    #[serde(flatten)]
    pub broker_connection: BrokerConnection,

    /// Cluster identifier
    #[serde(rename = "clusterID")]
    pub cluster_id: String,

    /// Namespace the Lighthouse components are deployed into
    pub namespace: String,

    /// Image repository
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,

    /// Image version; also gates which uninstall protocol is used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Per-component image overrides, keyed by component name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub image_overrides: BTreeMap<String, String>,

    /// Whether globalnet is enabled in the cluster set
    #[serde(default)]
    pub globalnet_enabled: bool,

    /// Custom DNS domains served by Lighthouse CoreDNS
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_domains: Vec<String>,

    /// Enable debug logging
    #[serde(default)]
    pub debug: bool,

    /// Node selector applied to the Lighthouse workloads
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,

    /// Tolerations applied to the Lighthouse workloads
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<Toleration>,

    /// Stop components when their certificates fail verification
    #[serde(default)]
    pub halt_on_certificate_error: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDiscoveryStatus {
    /// ClusterIP of the Lighthouse CoreDNS service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coredns_cluster_ip: Option<String>,

    /// Ready Lighthouse agent replicas
    #[serde(default)]
    pub agent_ready_replicas: i32,
}
