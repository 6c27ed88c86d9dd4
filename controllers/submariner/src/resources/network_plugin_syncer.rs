//! Network plugin syncer Deployment, only needed for OVN-Kubernetes.

use super::{
    Images, NETWORK_PLUGIN_SYNCER, Placement, broker_env, container, env, metadata,
    orchestrated_labels, pod_template, selector, submariner_env,
};
use crds::Submariner;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};

/// Network plugin name for which the syncer is deployed
pub const OVN_KUBERNETES: &str = "OVNKubernetes";

pub fn enabled(network_plugin: &str) -> bool {
    network_plugin == OVN_KUBERNETES
}

pub fn deployment(sm: &Submariner, network_plugin: &str) -> Deployment {
    let spec = &sm.spec;

    let mut vars = submariner_env(spec);
    vars.extend(broker_env(&spec.broker_connection));
    vars.push(env("SUBMARINER_NETWORKPLUGIN", network_plugin));

    let syncer = container(
        NETWORK_PLUGIN_SYNCER,
        Images::for_submariner(spec).image(NETWORK_PLUGIN_SYNCER, "submariner-networkplugin-syncer"),
        vars,
        false,
    );

    Deployment {
        metadata: metadata(
            NETWORK_PLUGIN_SYNCER,
            &spec.namespace,
            orchestrated_labels(NETWORK_PLUGIN_SYNCER),
        ),
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: selector(NETWORK_PLUGIN_SYNCER),
            template: pod_template(
                NETWORK_PLUGIN_SYNCER,
                syncer,
                false,
                &Placement::new(&spec.node_selector, &spec.tolerations),
                &[],
            ),
            ..Default::default()
        }),
        status: None,
    }
}
