//! Lighthouse: the ServiceDiscovery CR a Submariner CR spawns, plus the
//! agent and CoreDNS objects a ServiceDiscovery CR is reconciled into.

use super::{
    Images, LIGHTHOUSE_AGENT, LIGHTHOUSE_COREDNS, Placement, app_labels, broker_env, container,
    env, metadata, orchestrated_labels, pod_template, selector,
};
use crds::{ServiceDiscovery, ServiceDiscoverySpec, Submariner};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, KeyToPath, Service, ServicePort, ServiceSpec, Volume,
    VolumeMount,
};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;
use std::collections::BTreeMap;

/// Name of the ServiceDiscovery CR created for a Submariner CR
pub const SERVICE_DISCOVERY_NAME: &str = "service-discovery";

/// Zone every cluster set answers for
pub const CLUSTERSET_DOMAIN: &str = "clusterset.local";

const COREFILE_KEY: &str = "Corefile";

/// ServiceDiscovery CR mirroring the Submariner CR's broker and image settings
pub fn service_discovery_for(sm: &Submariner) -> ServiceDiscovery {
    let spec = &sm.spec;
    let mut sd = ServiceDiscovery::new(
        SERVICE_DISCOVERY_NAME,
        ServiceDiscoverySpec {
            broker_connection: spec.broker_connection.clone(),
            cluster_id: spec.cluster_id.clone(),
            namespace: spec.namespace.clone(),
            repository: spec.repository.clone(),
            version: spec.version.clone(),
            image_overrides: spec.image_overrides.clone(),
            globalnet_enabled: !spec.global_cidr.is_empty(),
            custom_domains: spec.custom_domains.clone(),
            debug: spec.debug,
            node_selector: spec.node_selector.clone(),
            tolerations: spec.tolerations.clone(),
            halt_on_certificate_error: spec.halt_on_certificate_error,
        },
    );
    sd.metadata.namespace = sm.namespace();
    sd
}

pub fn agent_deployment(sd: &ServiceDiscovery) -> Deployment {
    let spec = &sd.spec;

    let mut vars = vec![
        env("SUBMARINER_NAMESPACE", &spec.namespace),
        env("SUBMARINER_CLUSTERID", &spec.cluster_id),
        env("SUBMARINER_DEBUG", spec.debug),
        env("SUBMARINER_GLOBALNET_ENABLED", spec.globalnet_enabled),
        env("SUBMARINER_HALTONCERTERROR", spec.halt_on_certificate_error),
    ];
    vars.extend(broker_env(&spec.broker_connection));

    let agent = container(
        LIGHTHOUSE_AGENT,
        Images::for_service_discovery(spec).image(LIGHTHOUSE_AGENT, "lighthouse-agent"),
        vars,
        false,
    );

    Deployment {
        metadata: metadata(
            LIGHTHOUSE_AGENT,
            &spec.namespace,
            orchestrated_labels(LIGHTHOUSE_AGENT),
        ),
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: selector(LIGHTHOUSE_AGENT),
            template: pod_template(
                LIGHTHOUSE_AGENT,
                agent,
                false,
                &Placement::new(&spec.node_selector, &spec.tolerations),
                &[],
            ),
            ..Default::default()
        }),
        status: None,
    }
}

/// CoreDNS configuration answering for the cluster set and custom domains
pub fn corefile(custom_domains: &[String]) -> String {
    let mut zones = vec![CLUSTERSET_DOMAIN.to_string()];
    zones.extend(custom_domains.iter().cloned());

    let mut corefile = String::new();
    for zone in zones {
        corefile.push_str(&format!(
            "{zone}:53 {{\n    lighthouse\n    errors\n    health\n    ready\n}}\n"
        ));
    }
    corefile
}

pub fn coredns_config_map(sd: &ServiceDiscovery) -> ConfigMap {
    ConfigMap {
        metadata: metadata(
            LIGHTHOUSE_COREDNS,
            &sd.spec.namespace,
            app_labels(LIGHTHOUSE_COREDNS),
        ),
        data: Some(BTreeMap::from([(
            COREFILE_KEY.to_string(),
            corefile(&sd.spec.custom_domains),
        )])),
        ..Default::default()
    }
}

pub fn coredns_deployment(sd: &ServiceDiscovery) -> Deployment {
    let spec = &sd.spec;

    let mut coredns = container(
        LIGHTHOUSE_COREDNS,
        Images::for_service_discovery(spec).image(LIGHTHOUSE_COREDNS, "lighthouse-coredns"),
        Vec::new(),
        false,
    );
    coredns.args = Some(vec!["-conf".to_string(), "/etc/coredns/Corefile".to_string()]);
    coredns.volume_mounts = Some(vec![VolumeMount {
        name: "config-volume".to_string(),
        mount_path: "/etc/coredns".to_string(),
        read_only: Some(true),
        ..Default::default()
    }]);

    let mut template = pod_template(
        LIGHTHOUSE_COREDNS,
        coredns,
        false,
        &Placement::new(&spec.node_selector, &spec.tolerations),
        &[],
    );
    if let Some(pod) = template.spec.as_mut() {
        pod.volumes = Some(vec![Volume {
            name: "config-volume".to_string(),
            config_map: Some(ConfigMapVolumeSource {
                name: LIGHTHOUSE_COREDNS.to_string().into(),
                items: Some(vec![KeyToPath {
                    key: COREFILE_KEY.to_string(),
                    path: COREFILE_KEY.to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }]);
    }

    Deployment {
        metadata: metadata(LIGHTHOUSE_COREDNS, &spec.namespace, app_labels(LIGHTHOUSE_COREDNS)),
        spec: Some(DeploymentSpec {
            replicas: Some(2),
            selector: selector(LIGHTHOUSE_COREDNS),
            template,
            ..Default::default()
        }),
        status: None,
    }
}

pub fn coredns_service(sd: &ServiceDiscovery) -> Service {
    let port = |name: &str, protocol: &str| ServicePort {
        name: Some(name.to_string()),
        port: 53,
        protocol: Some(protocol.to_string()),
        target_port: Some(IntOrString::Int(53)),
        ..Default::default()
    };

    Service {
        metadata: metadata(
            LIGHTHOUSE_COREDNS,
            &sd.spec.namespace,
            app_labels(LIGHTHOUSE_COREDNS),
        ),
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            selector: Some(app_labels(LIGHTHOUSE_COREDNS)),
            ports: Some(vec![port("udp", "UDP"), port("tcp", "TCP")]),
            ..Default::default()
        }),
        status: None,
    }
}
