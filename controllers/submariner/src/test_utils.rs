//! Test utilities for unit testing reconcilers and the uninstall orchestrator
//!
//! This module provides helpers for creating test data and setting up test scenarios.

#[cfg(test)]
use crds::*;
#[cfg(test)]
use k8s_openapi::api::apps::v1::{
    DaemonSet, DaemonSetSpec, DaemonSetStatus, Deployment, DeploymentSpec, DeploymentStatus,
};
#[cfg(test)]
use k8s_openapi::api::core::v1::{Container, Pod, PodSpec, PodTemplateSpec};
#[cfg(test)]
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, Time};
#[cfg(test)]
use std::collections::BTreeMap;

/// Namespace used by every fixture
#[cfg(test)]
pub const TEST_NAMESPACE: &str = "submariner-operator";

#[cfg(test)]
pub fn app_labels(app: &str) -> BTreeMap<String, String> {
    BTreeMap::from([("app".to_string(), app.to_string())])
}

/// Kubernetes timestamp from an RFC 3339 string
#[cfg(test)]
pub fn time(rfc3339: &str) -> Time {
    Time(utc(rfc3339))
}

#[cfg(test)]
pub fn utc(rfc3339: &str) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::parse_from_rfc3339(rfc3339)
        .unwrap()
        .with_timezone(&chrono::Utc)
}

#[cfg(test)]
fn template(app: &str) -> PodTemplateSpec {
    PodTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: Some(app_labels(app)),
            ..Default::default()
        }),
        spec: Some(PodSpec {
            containers: vec![Container {
                name: app.to_string(),
                image: Some(format!("quay.io/submariner/{}:0.18.0", app)),
                ..Default::default()
            }],
            ..Default::default()
        }),
    }
}

/// Minimal steady-state DaemonSet selecting `app=<name>`
#[cfg(test)]
pub fn daemon_set(name: &str) -> DaemonSet {
    DaemonSet {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(TEST_NAMESPACE.to_string()),
            labels: Some(app_labels(name)),
            ..Default::default()
        },
        spec: Some(DaemonSetSpec {
            selector: LabelSelector {
                match_labels: Some(app_labels(name)),
                match_expressions: None,
            },
            template: template(name),
            ..Default::default()
        }),
        status: None,
    }
}

/// Minimal steady-state Deployment selecting `app=<name>`, replicas unset
#[cfg(test)]
pub fn deployment(name: &str) -> Deployment {
    Deployment {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(TEST_NAMESPACE.to_string()),
            labels: Some(app_labels(name)),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            selector: LabelSelector {
                match_labels: Some(app_labels(name)),
                match_expressions: None,
            },
            template: template(name),
            ..Default::default()
        }),
        status: None,
    }
}

/// Running pod labelled `app=<app>`
#[cfg(test)]
pub fn pod(name: &str, app: &str) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(TEST_NAMESPACE.to_string()),
            labels: Some(app_labels(app)),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// DaemonSet status as reported once the controller rolled it out everywhere
#[cfg(test)]
pub fn daemon_set_status(observed_generation: i64, desired: i32, ready: i32) -> DaemonSetStatus {
    DaemonSetStatus {
        observed_generation: Some(observed_generation),
        desired_number_scheduled: desired,
        number_ready: ready,
        ..Default::default()
    }
}

#[cfg(test)]
pub fn deployment_status(available: i32) -> DeploymentStatus {
    DeploymentStatus {
        available_replicas: Some(available),
        ..Default::default()
    }
}

/// Submariner CR joining cluster `east`
#[cfg(test)]
pub fn submariner(name: &str) -> Submariner {
    let mut sm = Submariner::new(
        name,
        SubmarinerSpec {
            broker: "k8s".to_string(),
            broker_connection: BrokerConnection {
                broker_k8s_api_server: "https://broker.example.com:6443".to_string(),
                broker_k8s_api_server_token: Some("token".to_string()),
                broker_k8s_ca: Some("ca-data".to_string()),
                broker_k8s_remote_namespace: "submariner-k8s-broker".to_string(),
                broker_k8s_insecure: false,
                broker_k8s_secret: None,
            },
            cluster_id: "east".to_string(),
            namespace: TEST_NAMESPACE.to_string(),
            cluster_cidr: "10.42.0.0/16".to_string(),
            service_cidr: "10.43.0.0/16".to_string(),
            ce_ipsec_psk: "secret".to_string(),
            ce_ipsec_natt_port: 4500,
            ce_ipsec_ike_port: 500,
            ..Default::default()
        },
    );
    sm.metadata.namespace = Some(TEST_NAMESPACE.to_string());
    sm
}

/// ServiceDiscovery CR for cluster `east`
#[cfg(test)]
pub fn service_discovery(name: &str) -> ServiceDiscovery {
    let mut sd = ServiceDiscovery::new(
        name,
        ServiceDiscoverySpec {
            broker_connection: BrokerConnection {
                broker_k8s_api_server: "https://broker.example.com:6443".to_string(),
                broker_k8s_remote_namespace: "submariner-k8s-broker".to_string(),
                ..Default::default()
            },
            cluster_id: "east".to_string(),
            namespace: TEST_NAMESPACE.to_string(),
            ..Default::default()
        },
    );
    sd.metadata.namespace = Some(TEST_NAMESPACE.to_string());
    sd
}

#[cfg(test)]
pub fn broker(name: &str) -> Broker {
    let mut broker = Broker::new(
        name,
        BrokerSpec {
            components: vec!["connectivity".to_string(), "service-discovery".to_string()],
            default_globalnet_cluster_size: 8192,
            globalnet_enabled: true,
            globalnet_cidr_range: "242.0.0.0/8".to_string(),
            default_custom_domains: vec![],
        },
    );
    broker.metadata.namespace = Some("submariner-k8s-broker".to_string());
    broker
}
