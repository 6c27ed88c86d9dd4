//! Broker CRD
//!
//! Configures the broker cluster that member clusters exchange metadata through.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "submariner.io",
    version = "v1alpha1",
    kind = "Broker",
    namespaced,
    status = "BrokerStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct BrokerSpec {
    /// Components enabled on the broker (`connectivity`, `service-discovery`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<String>,

    /// Default globalnet CIDR size handed to joining clusters
    #[serde(default)]
    pub default_globalnet_cluster_size: u32,

    /// Whether globalnet is enabled for the cluster set
    #[serde(default)]
    pub globalnet_enabled: bool,

    /// Global CIDR range clusters get their globalnet CIDRs from
    #[serde(default, rename = "globalnetCIDRRange")]
    pub globalnet_cidr_range: String,

    /// Custom domains used by default for service discovery
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub default_custom_domains: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BrokerStatus {
    /// Name of the globalnet info ConfigMap, once written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub globalnet_config_map: Option<String>,
}
