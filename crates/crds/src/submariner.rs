//! Submariner CRD
//!
//! Describes one cluster's participation in a Submariner deployment: which
//! broker to join, the cluster's CIDRs, and how the dataplane components run.

use crate::common::{BrokerConnection, Toleration};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "submariner.io",
    version = "v1alpha1",
    kind = "Submariner",
    namespaced,
    status = "SubmarinerStatus",
    shortname = "sm"
)]
#[serde(rename_all = "camelCase")]
pub struct SubmarinerSpec {
    /// Broker type (only `k8s` is supported)
    #[serde(default = "default_broker")]
    pub broker: String,

    /// Broker API server connection
    #[serde(flatten)]
    pub broker_connection: BrokerConnection,

    /// Cluster identifier, unique across the cluster set
    #[serde(rename = "clusterID")]
    pub cluster_id: String,

    /// Namespace the dataplane components are deployed into
    pub namespace: String,

    /// Pod CIDR of this cluster (discovered when empty)
    #[serde(default, rename = "clusterCIDR")]
    pub cluster_cidr: String,

    /// Service CIDR of this cluster (discovered when empty)
    #[serde(default, rename = "serviceCIDR")]
    pub service_cidr: String,

    /// Globalnet CIDR assigned to this cluster; globalnet is installed only when set
    #[serde(default, rename = "globalCIDR")]
    pub global_cidr: String,

    /// Image repository
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,

    /// Image version; also gates which uninstall protocol is used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Per-component image overrides, keyed by component name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub image_overrides: BTreeMap<String, String>,

    /// Cable driver used by the gateway (`libreswan`, `wireguard`, `vxlan`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cable_driver: Option<String>,

    /// Pre-shared key for IPsec
    #[serde(default, rename = "ceIPSecPSK")]
    pub ce_ipsec_psk: String,

    /// Secret holding the IPsec pre-shared key
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "ceIPSecPSKSecret")]
    pub ce_ipsec_psk_secret: Option<String>,

    /// IPsec NAT-T port
    #[serde(default = "default_natt_port", rename = "ceIPSecNATTPort")]
    pub ce_ipsec_natt_port: i32,

    /// IPsec IKE port
    #[serde(default = "default_ike_port", rename = "ceIPSecIKEPort")]
    pub ce_ipsec_ike_port: i32,

    /// Enable IPsec debug logging
    #[serde(default, rename = "ceIPSecDebug")]
    pub ce_ipsec_debug: bool,

    /// Force UDP encapsulation for IPsec
    #[serde(default, rename = "ceIPSecForceUDPEncaps")]
    pub ce_ipsec_force_udp_encaps: bool,

    /// Enable NAT traversal between clusters
    #[serde(default)]
    pub nat_enabled: bool,

    /// Expose the gateway through a LoadBalancer service
    #[serde(default)]
    pub load_balancer_enabled: bool,

    /// Deploy service discovery (Lighthouse)
    #[serde(default)]
    pub service_discovery_enabled: bool,

    /// Enable debug logging for all components
    #[serde(default)]
    pub debug: bool,

    /// Deprecated color codes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_codes: Option<String>,

    /// Custom DNS domains served by Lighthouse
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_domains: Vec<String>,

    /// Health checking of inter-cluster connections
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_health_check: Option<HealthCheckSpec>,

    /// Node selector applied to every dataplane workload
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,

    /// Tolerations applied to every dataplane workload
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<Toleration>,

    /// Stop components when their certificates fail verification
    #[serde(default)]
    pub halt_on_certificate_error: bool,
}

fn default_broker() -> String {
    "k8s".to_string()
}

fn default_natt_port() -> i32 {
    4500
}

fn default_ike_port() -> i32 {
    500
}

/// Connection health check configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckSpec {
    /// Enable health checks
    #[serde(default)]
    pub enabled: bool,

    /// Interval between pings, in seconds
    #[serde(default)]
    pub interval_seconds: u64,

    /// Lost pings before a connection is marked unhealthy
    #[serde(default)]
    pub max_packet_loss_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubmarinerStatus {
    /// Whether NAT traversal is enabled
    #[serde(default)]
    pub nat_enabled: bool,

    /// Cluster identifier
    #[serde(default, rename = "clusterID")]
    pub cluster_id: String,

    /// Effective pod CIDR
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "clusterCIDR")]
    pub cluster_cidr: Option<String>,

    /// Effective service CIDR
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "serviceCIDR")]
    pub service_cidr: Option<String>,

    /// Effective globalnet CIDR
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "globalCIDR")]
    pub global_cidr: Option<String>,

    /// Network plugin the dataplane was configured for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_plugin: Option<String>,

    /// Gateway DaemonSet status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_daemon_set_status: Option<DaemonSetSummary>,

    /// Route agent DaemonSet status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_agent_daemon_set_status: Option<DaemonSetSummary>,

    /// Globalnet DaemonSet status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub globalnet_daemon_set_status: Option<DaemonSetSummary>,
}

/// Condensed DaemonSet status recorded on the Submariner CR
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DaemonSetSummary {
    /// Nodes that should run the daemon pod
    pub desired_number_scheduled: i32,

    /// Nodes running a ready daemon pod
    pub number_ready: i32,

    /// Most recent generation observed by the DaemonSet controller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Container images that differ from the desired ones
    #[serde(default)]
    pub mismatched_container_images: bool,
}
