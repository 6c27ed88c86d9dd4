//! Gateway DaemonSet and load balancer Service.

use super::{
    GATEWAY, Images, Placement, app_labels, container, env, metadata, orchestrated_labels,
    pod_template, selector, submariner_env, broker_env,
};
use crds::Submariner;
use k8s_openapi::api::apps::v1::{DaemonSet, DaemonSetSpec};
use k8s_openapi::api::core::v1::{
    ContainerPort, EnvVar, EnvVarSource, SecretKeySelector, Service, ServicePort, ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

/// Label selecting the nodes that may run the gateway
pub const GATEWAY_NODE_LABEL: &str = "submariner.io/gateway";

/// UDP port used for NAT discovery between gateways
pub const NAT_DISCOVERY_PORT: i32 = 4490;

/// Gateway DaemonSet; runs on nodes labelled `submariner.io/gateway=true`
pub fn daemon_set(sm: &Submariner) -> DaemonSet {
    let spec = &sm.spec;

    let mut vars = submariner_env(spec);
    vars.extend(broker_env(&spec.broker_connection));
    vars.push(env("SUBMARINER_BROKER", &spec.broker));
    vars.push(env("SUBMARINER_NATENABLED", spec.nat_enabled));
    vars.push(env(
        "SUBMARINER_CABLEDRIVER",
        spec.cable_driver.as_deref().unwrap_or("libreswan"),
    ));
    if let Some(color_codes) = &spec.color_codes {
        vars.push(env("SUBMARINER_COLORCODES", color_codes));
    }
    if let Some(health_check) = &spec.connection_health_check {
        vars.push(env("SUBMARINER_HEALTHCHECKENABLED", health_check.enabled));
        vars.push(env("SUBMARINER_HEALTHCHECKINTERVAL", health_check.interval_seconds));
        vars.push(env(
            "SUBMARINER_HEALTHCHECKMAXPACKETLOSSCOUNT",
            health_check.max_packet_loss_count,
        ));
    }
    vars.push(psk_env(sm));
    vars.push(env("CE_IPSEC_DEBUG", spec.ce_ipsec_debug));
    vars.push(env("CE_IPSEC_NATTPORT", spec.ce_ipsec_natt_port));
    vars.push(env("CE_IPSEC_IKEPORT", spec.ce_ipsec_ike_port));
    vars.push(env("CE_IPSEC_FORCEENCAPS", spec.ce_ipsec_force_udp_encaps));

    let mut gateway = container(
        GATEWAY,
        Images::for_submariner(spec).image(GATEWAY, "submariner-gateway"),
        vars,
        true,
    );
    gateway.ports = Some(vec![
        udp_port("cable-encaps", spec.ce_ipsec_natt_port),
        udp_port("ike", spec.ce_ipsec_ike_port),
        udp_port("natt-discovery", NAT_DISCOVERY_PORT),
    ]);

    DaemonSet {
        metadata: metadata(GATEWAY, &spec.namespace, orchestrated_labels(GATEWAY)),
        spec: Some(DaemonSetSpec {
            selector: selector(GATEWAY),
            template: pod_template(
                GATEWAY,
                gateway,
                true,
                &Placement::new(&spec.node_selector, &spec.tolerations),
                &[(GATEWAY_NODE_LABEL, "true")],
            ),
            ..Default::default()
        }),
        status: None,
    }
}

fn psk_env(sm: &Submariner) -> EnvVar {
    match &sm.spec.ce_ipsec_psk_secret {
        Some(secret) => EnvVar {
            name: "CE_IPSEC_PSK".to_string(),
            value: None,
            value_from: Some(EnvVarSource {
                secret_key_ref: Some(SecretKeySelector {
                    key: "psk".to_string(),
                    name: secret.clone().into(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
        },
        None => env("CE_IPSEC_PSK", &sm.spec.ce_ipsec_psk),
    }
}

fn udp_port(name: &str, port: i32) -> ContainerPort {
    ContainerPort {
        name: Some(name.to_string()),
        container_port: port,
        protocol: Some("UDP".to_string()),
        ..Default::default()
    }
}

/// LoadBalancer Service exposing the gateway's tunnel ports
pub fn load_balancer_service(sm: &Submariner) -> Service {
    let spec = &sm.spec;
    let port = |name: &str, port: i32| ServicePort {
        name: Some(name.to_string()),
        port,
        protocol: Some("UDP".to_string()),
        target_port: Some(IntOrString::Int(port)),
        ..Default::default()
    };

    Service {
        metadata: metadata(GATEWAY, &spec.namespace, app_labels(GATEWAY)),
        spec: Some(ServiceSpec {
            type_: Some("LoadBalancer".to_string()),
            external_traffic_policy: Some("Local".to_string()),
            selector: Some(app_labels(GATEWAY)),
            ports: Some(vec![
                port("cable-encaps", spec.ce_ipsec_natt_port),
                port("natt-discovery", NAT_DISCOVERY_PORT),
            ]),
            ..Default::default()
        }),
        status: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{MANAGED_BY_LABEL, ROUTE_AGENT};
    use crate::test_utils::{TEST_NAMESPACE, submariner};

    fn env_value<'a>(vars: &'a [EnvVar], name: &str) -> Option<&'a str> {
        vars.iter()
            .find(|v| v.name == name)
            .and_then(|v| v.value.as_deref())
    }

    #[test]
    fn test_gateway_daemon_set_is_orchestrated_and_privileged() {
        let ds = daemon_set(&submariner("submariner"));

        let labels = ds.metadata.labels.unwrap();
        assert_eq!(labels["app"], GATEWAY);
        assert_eq!(labels[MANAGED_BY_LABEL], "submariner-operator");
        assert!(ds.metadata.owner_references.is_none());
        assert_eq!(ds.metadata.namespace.as_deref(), Some(TEST_NAMESPACE));

        let pod = ds.spec.unwrap().template.spec.unwrap();
        assert_eq!(pod.host_network, Some(true));
        assert_eq!(pod.node_selector.unwrap()[GATEWAY_NODE_LABEL], "true");

        let gateway = &pod.containers[0];
        assert_eq!(
            gateway.security_context.as_ref().and_then(|s| s.privileged),
            Some(true)
        );
        assert_eq!(
            gateway.image.as_deref(),
            Some("quay.io/submariner/submariner-gateway:0.18.0")
        );
    }

    #[test]
    fn test_gateway_env_carries_cluster_and_ipsec_settings() {
        let mut sm = submariner("submariner");
        sm.spec.nat_enabled = true;
        sm.spec.cable_driver = Some("wireguard".to_string());
        let ds = daemon_set(&sm);

        let pod = ds.spec.unwrap().template.spec.unwrap();
        let vars = pod.containers[0].env.clone().unwrap();
        assert_eq!(env_value(&vars, "SUBMARINER_CLUSTERID"), Some("east"));
        assert_eq!(env_value(&vars, "SUBMARINER_NATENABLED"), Some("true"));
        assert_eq!(env_value(&vars, "SUBMARINER_CABLEDRIVER"), Some("wireguard"));
        assert_eq!(env_value(&vars, "CE_IPSEC_PSK"), Some("secret"));
        assert_eq!(env_value(&vars, "CE_IPSEC_NATTPORT"), Some("4500"));
        assert_eq!(
            env_value(&vars, "BROKER_K8S_APISERVER"),
            Some("https://broker.example.com:6443")
        );
    }

    #[test]
    fn test_psk_secret_is_referenced_not_inlined() {
        let mut sm = submariner("submariner");
        sm.spec.ce_ipsec_psk_secret = Some("submariner-ipsec-psk".to_string());

        let psk = psk_env(&sm);

        assert!(psk.value.is_none());
        let secret_ref = psk.value_from.unwrap().secret_key_ref.unwrap();
        assert_eq!(secret_ref.key, "psk");
    }

    #[test]
    fn test_image_override_applies_to_its_component_only() {
        let mut sm = submariner("submariner");
        sm.spec
            .image_overrides
            .insert(ROUTE_AGENT.to_string(), "example.com/ra:dev".to_string());

        let ds = daemon_set(&sm);

        let pod = ds.spec.unwrap().template.spec.unwrap();
        assert_eq!(
            pod.containers[0].image.as_deref(),
            Some("quay.io/submariner/submariner-gateway:0.18.0")
        );
    }

    #[test]
    fn test_load_balancer_service_selects_gateway_pods() {
        let service = load_balancer_service(&submariner("submariner"));

        let spec = service.spec.unwrap();
        assert_eq!(spec.type_.as_deref(), Some("LoadBalancer"));
        assert_eq!(spec.selector.unwrap()["app"], GATEWAY);
        assert_eq!(spec.ports.unwrap()[0].port, 4500);
    }
}
