//! Desired child objects computed from the Submariner CRs.
//!
//! Builders are pure: they take a CR (and operator settings) and return the
//! object to hand to [`crate::apply::apply`].
//!
//! - `gateway.rs` - gateway DaemonSet and its load balancer Service
//! - `route_agent.rs` - route agent DaemonSet
//! - `globalnet.rs` - globalnet DaemonSet
//! - `network_plugin_syncer.rs` - network plugin syncer Deployment
//! - `lighthouse.rs` - ServiceDiscovery CR, Lighthouse agent and CoreDNS
//! - `broker.rs` - broker globalnet info ConfigMap

pub mod broker;
pub mod gateway;
pub mod globalnet;
pub mod lighthouse;
pub mod network_plugin_syncer;
pub mod route_agent;

use crds::{ServiceDiscoverySpec, SubmarinerSpec};
use k8s_openapi::api::core::v1::{
    Container, EnvVar, EnvVarSource, ObjectFieldSelector, PodSpec, PodTemplateSpec,
    SecurityContext, Toleration,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use std::collections::BTreeMap;

/// Image repository used when the CR does not name one
pub const DEFAULT_REPOSITORY: &str = "quay.io/submariner";

/// Image version used when the CR does not name one
pub const DEFAULT_VERSION: &str = "0.18.0";

/// Label marking workloads torn down by the uninstall orchestrator instead of GC
pub const MANAGED_BY_LABEL: &str = "submariner.io/managed-by";

/// Value of [`MANAGED_BY_LABEL`]
pub const MANAGED_BY: &str = "submariner-operator";

pub const GATEWAY: &str = "submariner-gateway";
pub const ROUTE_AGENT: &str = "submariner-routeagent";
pub const GLOBALNET: &str = "submariner-globalnet";
pub const NETWORK_PLUGIN_SYNCER: &str = "submariner-networkplugin-syncer";
pub const LIGHTHOUSE_AGENT: &str = "submariner-lighthouse-agent";
pub const LIGHTHOUSE_COREDNS: &str = "submariner-lighthouse-coredns";

/// Image settings shared by every component of one CR
#[derive(Debug, Clone, Copy)]
pub struct Images<'a> {
    pub repository: Option<&'a str>,
    pub version: Option<&'a str>,
    pub overrides: &'a BTreeMap<String, String>,
}

impl<'a> Images<'a> {
    pub fn for_submariner(spec: &'a SubmarinerSpec) -> Self {
        Self {
            repository: spec.repository.as_deref(),
            version: spec.version.as_deref(),
            overrides: &spec.image_overrides,
        }
    }

    pub fn for_service_discovery(spec: &'a ServiceDiscoverySpec) -> Self {
        Self {
            repository: spec.repository.as_deref(),
            version: spec.version.as_deref(),
            overrides: &spec.image_overrides,
        }
    }

    /// `<repository>/<image>:<version>`, unless overridden for `component`
    pub fn image(&self, component: &str, image: &str) -> String {
        if let Some(image) = self.overrides.get(component) {
            return image.clone();
        }
        format!(
            "{}/{}:{}",
            self.repository.unwrap_or(DEFAULT_REPOSITORY).trim_end_matches('/'),
            image,
            self.version.unwrap_or(DEFAULT_VERSION)
        )
    }
}

/// Scheduling constraints copied from the CR onto every pod
#[derive(Debug, Clone, Default)]
pub struct Placement {
    pub node_selector: BTreeMap<String, String>,
    pub tolerations: Vec<Toleration>,
}

impl Placement {
    pub fn new(node_selector: &BTreeMap<String, String>, tolerations: &[crds::Toleration]) -> Self {
        Self {
            node_selector: node_selector.clone(),
            tolerations: tolerations.iter().map(toleration).collect(),
        }
    }
}

fn toleration(t: &crds::Toleration) -> Toleration {
    Toleration {
        key: t.key.clone(),
        operator: t.operator.clone(),
        value: t.value.clone(),
        effect: t.effect.clone(),
        toleration_seconds: t.toleration_seconds,
    }
}

/// `app=<app>`
pub fn app_labels(app: &str) -> BTreeMap<String, String> {
    BTreeMap::from([("app".to_string(), app.to_string())])
}

/// Labels of a workload owned by the uninstall orchestrator
pub fn orchestrated_labels(app: &str) -> BTreeMap<String, String> {
    let mut labels = app_labels(app);
    labels.insert(MANAGED_BY_LABEL.to_string(), MANAGED_BY.to_string());
    labels
}

pub fn metadata(name: &str, namespace: &str, labels: BTreeMap<String, String>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        labels: Some(labels),
        ..Default::default()
    }
}

pub fn selector(app: &str) -> LabelSelector {
    LabelSelector {
        match_labels: Some(app_labels(app)),
        match_expressions: None,
    }
}

pub fn env(name: &str, value: impl ToString) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        value_from: None,
    }
}

/// Env var filled from a field of the pod, e.g. `spec.nodeName`
pub fn field_env(name: &str, field_path: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: None,
        value_from: Some(EnvVarSource {
            field_ref: Some(ObjectFieldSelector {
                api_version: None,
                field_path: field_path.to_string(),
            }),
            ..Default::default()
        }),
    }
}

/// Env vars every dataplane component of a Submariner CR gets
pub fn submariner_env(spec: &SubmarinerSpec) -> Vec<EnvVar> {
    vec![
        env("SUBMARINER_NAMESPACE", &spec.namespace),
        env("SUBMARINER_CLUSTERID", &spec.cluster_id),
        env("SUBMARINER_CLUSTERCIDR", &spec.cluster_cidr),
        env("SUBMARINER_SERVICECIDR", &spec.service_cidr),
        env("SUBMARINER_GLOBALCIDR", &spec.global_cidr),
        env("SUBMARINER_DEBUG", spec.debug),
        env("SUBMARINER_HALTONCERTERROR", spec.halt_on_certificate_error),
        field_env("NODE_NAME", "spec.nodeName"),
        field_env("POD_NAME", "metadata.name"),
    ]
}

/// Container running one Submariner binary
pub fn container(name: &str, image: String, env: Vec<EnvVar>, privileged: bool) -> Container {
    Container {
        name: name.to_string(),
        image: Some(image),
        image_pull_policy: Some("IfNotPresent".to_string()),
        env: Some(env),
        security_context: privileged.then(|| SecurityContext {
            privileged: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Pod template labelled `app=<app>` running `container`
pub fn pod_template(
    app: &str,
    container: Container,
    host_network: bool,
    placement: &Placement,
    extra_node_selector: &[(&str, &str)],
) -> PodTemplateSpec {
    let mut node_selector = placement.node_selector.clone();
    node_selector.extend(
        extra_node_selector
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string())),
    );

    PodTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: Some(app_labels(app)),
            ..Default::default()
        }),
        spec: Some(PodSpec {
            containers: vec![container],
            host_network: host_network.then_some(true),
            dns_policy: host_network.then(|| "ClusterFirstWithHostNet".to_string()),
            service_account_name: Some(app.to_string()),
            node_selector: (!node_selector.is_empty()).then_some(node_selector),
            tolerations: (!placement.tolerations.is_empty()).then(|| placement.tolerations.clone()),
            termination_grace_period_seconds: Some(1),
            ..Default::default()
        }),
    }
}

/// Env vars telling a component how to reach the broker
pub fn broker_env(connection: &crds::BrokerConnection) -> Vec<EnvVar> {
    let mut vars = vec![
        env("BROKER_K8S_APISERVER", &connection.broker_k8s_api_server),
        env("BROKER_K8S_REMOTENAMESPACE", &connection.broker_k8s_remote_namespace),
        env("BROKER_K8S_INSECURE", connection.broker_k8s_insecure),
    ];
    if let Some(token) = &connection.broker_k8s_api_server_token {
        vars.push(env("BROKER_K8S_APISERVERTOKEN", token));
    }
    if let Some(ca) = &connection.broker_k8s_ca {
        vars.push(env("BROKER_K8S_CA", ca));
    }
    if let Some(secret) = &connection.broker_k8s_secret {
        vars.push(env("BROKER_K8S_SECRET", secret));
    }
    vars
}
