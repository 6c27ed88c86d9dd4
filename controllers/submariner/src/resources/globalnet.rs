//! Globalnet DaemonSet, runs next to the gateway.

use super::gateway::GATEWAY_NODE_LABEL;
use super::{
    GLOBALNET, Images, Placement, container, env, metadata, orchestrated_labels, pod_template,
    selector, submariner_env,
};
use crds::Submariner;
use k8s_openapi::api::apps::v1::{DaemonSet, DaemonSetSpec};

/// Whether the CR asks for globalnet
pub fn enabled(sm: &Submariner) -> bool {
    !sm.spec.global_cidr.is_empty()
}

pub fn daemon_set(sm: &Submariner) -> DaemonSet {
    let spec = &sm.spec;

    let mut vars = submariner_env(spec);
    vars.push(env("SUBMARINER_EXCLUDENS", "submariner-operator,kube-system,operators"));

    let globalnet = container(
        GLOBALNET,
        Images::for_submariner(spec).image(GLOBALNET, "submariner-globalnet"),
        vars,
        true,
    );

    DaemonSet {
        metadata: metadata(GLOBALNET, &spec.namespace, orchestrated_labels(GLOBALNET)),
        spec: Some(DaemonSetSpec {
            selector: selector(GLOBALNET),
            template: pod_template(
                GLOBALNET,
                globalnet,
                true,
                &Placement::new(&spec.node_selector, &spec.tolerations),
                &[(GATEWAY_NODE_LABEL, "true")],
            ),
            ..Default::default()
        }),
        status: None,
    }
}
