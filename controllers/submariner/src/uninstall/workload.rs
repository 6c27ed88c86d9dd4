//! Workload kinds that can be torn down with an uninstall variant.

use crate::apply::Managed;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::{Container, EnvVar, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use std::collections::BTreeMap;
use tracing::info;

/// Env var telling a component binary to clean up and exit
pub const UNINSTALL_ENV: &str = "SUBMARINER_UNINSTALL";

/// Suffix of uninstall workload names
pub const UNINSTALL_SUFFIX: &str = "-uninstall";

/// A DaemonSet or Deployment running a Submariner component
pub trait Workload: Managed {
    fn pod_template_mut(&mut self) -> Option<&mut PodTemplateSpec>;

    fn selector_mut(&mut self) -> Option<&mut LabelSelector>;

    /// Drop status and spec fields that must not be copied into a new object
    fn reset_for_copy(&mut self);

    /// Whether an uninstall workload has finished its one-shot task everywhere
    fn is_uninstall_ready(&self) -> bool;

    /// Build the `<name>-uninstall` variant of this workload.
    ///
    /// The original containers become init containers with
    /// `SUBMARINER_UNINSTALL=true`, so each pod runs the cleanup once and then
    /// idles in a pause container. Labels and selector are rewritten to
    /// `app=<name>-uninstall` so the variant never adopts the original pods.
    fn uninstall_variant(&self, pause_image: &str) -> Self {
        let name = format!(
            "{}{}",
            self.meta().name.clone().unwrap_or_default(),
            UNINSTALL_SUFFIX
        );
        let mut labels = self.meta().labels.clone().unwrap_or_default();
        labels.insert("app".to_string(), name.clone());

        let mut variant = self.clone();
        *variant.meta_mut() = ObjectMeta {
            name: Some(name.clone()),
            namespace: self.meta().namespace.clone(),
            labels: Some(labels),
            ..Default::default()
        };
        variant.reset_for_copy();

        let app = BTreeMap::from([("app".to_string(), name)]);
        if let Some(selector) = variant.selector_mut() {
            *selector = LabelSelector {
                match_labels: Some(app.clone()),
                match_expressions: None,
            };
        }
        if let Some(template) = variant.pod_template_mut() {
            template.metadata.get_or_insert_with(Default::default).labels = Some(app);
            if let Some(pod) = template.spec.as_mut() {
                let mut init_containers = pod.init_containers.take().unwrap_or_default();
                init_containers.extend(
                    std::mem::take(&mut pod.containers)
                        .into_iter()
                        .map(with_uninstall_env),
                );
                pod.init_containers = Some(init_containers);
                pod.containers = vec![Container {
                    name: "pause".to_string(),
                    image: Some(pause_image.to_string()),
                    ..Default::default()
                }];
            }
        }
        variant
    }
}

fn with_uninstall_env(mut container: Container) -> Container {
    let env = container.env.get_or_insert_with(Vec::new);
    env.retain(|var| var.name != UNINSTALL_ENV);
    env.push(EnvVar {
        name: UNINSTALL_ENV.to_string(),
        value: Some("true".to_string()),
        value_from: None,
    });
    // Probes target the long-running process, which the cleanup run is not
    container.liveness_probe = None;
    container.readiness_probe = None;
    container.startup_probe = None;
    container
}

impl Workload for DaemonSet {
    fn pod_template_mut(&mut self) -> Option<&mut PodTemplateSpec> {
        self.spec.as_mut().map(|spec| &mut spec.template)
    }

    fn selector_mut(&mut self) -> Option<&mut LabelSelector> {
        self.spec.as_mut().map(|spec| &mut spec.selector)
    }

    fn reset_for_copy(&mut self) {
        self.status = None;
    }

    fn is_uninstall_ready(&self) -> bool {
        let name = self.metadata.name.as_deref().unwrap_or_default();
        let status = self.status.clone().unwrap_or_default();
        let observed = status.observed_generation.unwrap_or(0);
        let generation = self.metadata.generation.unwrap_or(0);

        if observed == 0 || observed < generation {
            info!(
                "Uninstall DaemonSet {} not ready yet: observed generation {} of {}",
                name, observed, generation
            );
            return false;
        }

        if status.desired_number_scheduled == 0 {
            info!("Uninstall DaemonSet {} has no nodes to run on", name);
            return true;
        }

        if status.number_ready != status.desired_number_scheduled {
            info!(
                "Uninstall DaemonSet {} not ready yet: {} of {} pods ready",
                name, status.number_ready, status.desired_number_scheduled
            );
            return false;
        }

        true
    }
}

impl Workload for Deployment {
    fn pod_template_mut(&mut self) -> Option<&mut PodTemplateSpec> {
        self.spec.as_mut().map(|spec| &mut spec.template)
    }

    fn selector_mut(&mut self) -> Option<&mut LabelSelector> {
        self.spec.as_mut().map(|spec| &mut spec.selector)
    }

    fn reset_for_copy(&mut self) {
        self.status = None;
    }

    fn is_uninstall_ready(&self) -> bool {
        let desired = self.spec.as_ref().and_then(|spec| spec.replicas).unwrap_or(1);
        let available = self
            .status
            .as_ref()
            .and_then(|status| status.available_replicas)
            .unwrap_or(0);

        if available != desired {
            info!(
                "Uninstall Deployment {} not ready yet: {} of {} replicas available",
                self.metadata.name.as_deref().unwrap_or_default(),
                available,
                desired
            );
            return false;
        }
        true
    }
}
