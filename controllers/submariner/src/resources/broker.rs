//! Broker globalnet info ConfigMap.

use super::{app_labels, metadata};
use crds::Broker;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::ResourceExt;
use std::collections::BTreeMap;

pub const GLOBALNET_CONFIG_MAP: &str = "submariner-globalnet-info";

/// Globalnet settings joining clusters read from the broker namespace
pub fn globalnet_config_map(broker: &Broker) -> ConfigMap {
    let namespace = broker.namespace().unwrap_or_default();
    let spec = &broker.spec;

    ConfigMap {
        metadata: metadata(GLOBALNET_CONFIG_MAP, &namespace, app_labels(GLOBALNET_CONFIG_MAP)),
        data: Some(BTreeMap::from([
            ("globalnetEnabled".to_string(), spec.globalnet_enabled.to_string()),
            ("globalnetCidrRange".to_string(), spec.globalnet_cidr_range.clone()),
            (
                "globalnetClusterSize".to_string(),
                spec.default_globalnet_cluster_size.to_string(),
            ),
        ])),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::broker;

    #[test]
    fn test_globalnet_config_map_carries_broker_settings() {
        let config_map = globalnet_config_map(&broker("submariner-broker"));

        assert_eq!(
            config_map.metadata.namespace.as_deref(),
            Some("submariner-k8s-broker")
        );
        let data = config_map.data.unwrap();
        assert_eq!(data["globalnetEnabled"], "true");
        assert_eq!(data["globalnetCidrRange"], "242.0.0.0/8");
        assert_eq!(data["globalnetClusterSize"], "8192");
    }
}
