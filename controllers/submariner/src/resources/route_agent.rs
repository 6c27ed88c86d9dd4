//! Route agent DaemonSet, runs on every node.

use super::{
    Images, Placement, ROUTE_AGENT, container, env, metadata, orchestrated_labels, pod_template,
    selector, submariner_env,
};
use crds::Submariner;
use k8s_openapi::api::apps::v1::{DaemonSet, DaemonSetSpec, DaemonSetUpdateStrategy, RollingUpdateDaemonSet};
use k8s_openapi::api::core::v1::Toleration;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

pub fn daemon_set(sm: &Submariner, network_plugin: &str) -> DaemonSet {
    let spec = &sm.spec;

    let mut vars = submariner_env(spec);
    vars.push(env("SUBMARINER_NETWORKPLUGIN", network_plugin));

    let agent = container(
        ROUTE_AGENT,
        Images::for_submariner(spec).image(ROUTE_AGENT, "submariner-route-agent"),
        vars,
        true,
    );

    // Routes must be programmed on tainted nodes too
    let mut placement = Placement::new(&spec.node_selector, &spec.tolerations);
    placement.tolerations.push(Toleration {
        operator: Some("Exists".to_string()),
        ..Default::default()
    });

    DaemonSet {
        metadata: metadata(ROUTE_AGENT, &spec.namespace, orchestrated_labels(ROUTE_AGENT)),
        spec: Some(DaemonSetSpec {
            selector: selector(ROUTE_AGENT),
            template: pod_template(ROUTE_AGENT, agent, true, &placement, &[]),
            update_strategy: Some(DaemonSetUpdateStrategy {
                type_: Some("RollingUpdate".to_string()),
                rolling_update: Some(RollingUpdateDaemonSet {
                    max_unavailable: Some(IntOrString::String("100%".to_string())),
                    ..Default::default()
                }),
            }),
            ..Default::default()
        }),
        status: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::submariner;

    #[test]
    fn test_route_agent_tolerates_every_taint() {
        let ds = daemon_set(&submariner("submariner"), "generic");

        let pod = ds.spec.unwrap().template.spec.unwrap();
        let tolerations = pod.tolerations.unwrap();
        assert_eq!(tolerations.len(), 1);
        assert_eq!(tolerations[0].operator.as_deref(), Some("Exists"));
        assert!(tolerations[0].key.is_none());
        assert!(pod.node_selector.is_none());
    }

    #[test]
    fn test_route_agent_gets_network_plugin() {
        let ds = daemon_set(&submariner("submariner"), "OVNKubernetes");

        let pod = ds.spec.unwrap().template.spec.unwrap();
        let plugin = pod.containers[0]
            .env
            .as_ref()
            .unwrap()
            .iter()
            .find(|v| v.name == "SUBMARINER_NETWORKPLUGIN")
            .and_then(|v| v.value.clone());
        assert_eq!(plugin.as_deref(), Some("OVNKubernetes"));
        assert_eq!(
            pod.containers[0].image.as_deref(),
            Some("quay.io/submariner/submariner-route-agent:0.18.0")
        );
    }
}
