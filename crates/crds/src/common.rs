//! Types shared between the Submariner and ServiceDiscovery CRDs.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Pod toleration applied to the managed workloads.
///
/// Mirrors the core `Toleration` fields so the CRD schema stays self-contained.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Toleration {
    /// Taint key the toleration applies to (empty matches all keys)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// `Exists` or `Equal`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,

    /// Taint value the toleration matches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Taint effect to match (`NoSchedule`, `PreferNoSchedule`, `NoExecute`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<String>,

    /// Period for which a `NoExecute` taint is tolerated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toleration_seconds: Option<i64>,
}

/// Broker connection settings shared by the Submariner and ServiceDiscovery specs.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BrokerConnection {
    /// Broker Kubernetes API server URL
    #[serde(default)]
    pub broker_k8s_api_server: String,

    /// Token used to authenticate against the broker API server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broker_k8s_api_server_token: Option<String>,

    /// Base64 encoded CA bundle of the broker API server
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "brokerK8sCA")]
    pub broker_k8s_ca: Option<String>,

    /// Namespace on the broker cluster holding shared resources
    #[serde(default)]
    pub broker_k8s_remote_namespace: String,

    /// Skip TLS verification of the broker API server
    #[serde(default)]
    pub broker_k8s_insecure: bool,

    /// Name of a local Secret carrying the broker credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broker_k8s_secret: Option<String>,
}
