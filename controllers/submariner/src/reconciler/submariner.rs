//! Submariner reconciliation.

use super::{Reconciler, has_finalizer, owner_reference, resource_key};
use crate::apply::{Managed, apply};
use crate::error::ControllerError;
use crate::resources::lighthouse::{self, SERVICE_DISCOVERY_NAME};
use crate::resources::{
    GATEWAY, GLOBALNET, NETWORK_PLUGIN_SYNCER, gateway, globalnet, network_plugin_syncer,
    route_agent,
};
use crate::uninstall::Component;
use cluster_client::ignore_not_found;
use crds::{DaemonSetSummary, Submariner, SubmarinerStatus};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::Service;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use tracing::{debug, info};

const KIND: &str = "Submariner";

impl Reconciler {
    /// Reconcile one Submariner CR
    pub async fn reconcile_submariner(&self, sm: &Submariner) -> Result<Action, ControllerError> {
        let result = if sm.metadata.deletion_timestamp.is_some() {
            self.finalize_submariner(sm).await
        } else {
            self.apply_submariner(sm).await
        };
        self.finish(KIND, &resource_key(sm), result)
    }

    /// Uninstall registry for a Submariner CR, in teardown order
    pub fn submariner_components(&self, sm: &Submariner) -> Vec<Component> {
        let pause_image = self.config.pause_image.as_str();
        let network_plugin = self.config.network_plugin.as_str();
        let globalnet_installed = globalnet::enabled(sm);
        let syncer_installed = network_plugin_syncer::enabled(network_plugin);

        vec![
            Component::new(&gateway::daemon_set(sm), pause_image),
            Component::new(&route_agent::daemon_set(sm, network_plugin), pause_image),
            Component::new(&globalnet::daemon_set(sm), pause_image)
                .with_check_installed(move || globalnet_installed),
            Component::new(&network_plugin_syncer::deployment(sm, network_plugin), pause_image)
                .with_check_installed(move || syncer_installed),
        ]
    }

    async fn finalize_submariner(&self, sm: &Submariner) -> Result<Action, ControllerError> {
        if !has_finalizer(&sm.metadata) {
            debug!("Submariner {} has no finalizer, nothing to clean up", sm.name_any());
            return Ok(Action::await_change());
        }

        // The child CR's own finalizer tears down Lighthouse
        let namespace = sm.namespace().unwrap_or_default();
        ignore_not_found(
            self.client
                .service_discoveries()
                .delete(&namespace, SERVICE_DISCOVERY_NAME)
                .await,
        )?;

        self.finalize(sm, sm.spec.version.as_deref(), self.submariner_components(sm))
            .await
    }

    async fn apply_submariner(&self, sm: &Submariner) -> Result<Action, ControllerError> {
        self.ensure_finalizer(sm).await?;

        let client = self.client.as_ref();
        let owner = owner_reference(sm);
        let namespace = sm.spec.namespace.as_str();
        let network_plugin = self.config.network_plugin.as_str();

        let gateway = apply(client, None, gateway::daemon_set(sm)).await?;
        if sm.spec.load_balancer_enabled {
            apply(client, owner.as_ref(), gateway::load_balancer_service(sm)).await?;
        } else {
            delete_if_present::<Service>(self, namespace, GATEWAY).await?;
        }

        let route_agent = apply(client, None, route_agent::daemon_set(sm, network_plugin)).await?;

        let globalnet = if globalnet::enabled(sm) {
            Some(apply(client, None, globalnet::daemon_set(sm)).await?)
        } else {
            delete_if_present::<DaemonSet>(self, namespace, GLOBALNET).await?;
            None
        };

        if network_plugin_syncer::enabled(network_plugin) {
            apply(client, None, network_plugin_syncer::deployment(sm, network_plugin)).await?;
        } else {
            delete_if_present::<Deployment>(self, namespace, NETWORK_PLUGIN_SYNCER).await?;
        }

        let cr_namespace = sm.namespace().unwrap_or_default();
        if sm.spec.service_discovery_enabled {
            apply(client, owner.as_ref(), lighthouse::service_discovery_for(sm)).await?;
        } else {
            ignore_not_found(
                client
                    .service_discoveries()
                    .delete(&cr_namespace, SERVICE_DISCOVERY_NAME)
                    .await,
            )?;
        }

        let status = SubmarinerStatus {
            nat_enabled: sm.spec.nat_enabled,
            cluster_id: sm.spec.cluster_id.clone(),
            cluster_cidr: non_empty(&sm.spec.cluster_cidr),
            service_cidr: non_empty(&sm.spec.service_cidr),
            global_cidr: non_empty(&sm.spec.global_cidr),
            network_plugin: Some(network_plugin.to_string()),
            gateway_daemon_set_status: Some(summarize(&gateway)),
            route_agent_daemon_set_status: Some(summarize(&route_agent)),
            globalnet_daemon_set_status: globalnet.as_ref().map(summarize),
        };
        if sm.status.as_ref() != Some(&status) {
            client
                .submariners()
                .patch_status(&cr_namespace, &sm.name_any(), &status_patch(&status)?)
                .await?;
            debug!("Updated status of Submariner {}/{}", cr_namespace, sm.name_any());
        }

        let gateways = gateway
            .status
            .as_ref()
            .map_or(0, |s| i64::from(s.desired_number_scheduled));
        self.metrics.gateways(gateways);

        Ok(Action::requeue(self.config.steady_state_requeue))
    }
}

/// Delete a child the CR no longer asks for
pub(crate) async fn delete_if_present<K: Managed>(
    reconciler: &Reconciler,
    namespace: &str,
    name: &str,
) -> Result<(), ControllerError> {
    let deleted = ignore_not_found(K::store(reconciler.client.as_ref()).delete(namespace, name).await)?;
    if deleted.is_some() {
        info!("Deleted {} {}/{}", K::kind(&()), namespace, name);
    }
    Ok(())
}

/// Merge patch for `status`; optional fields that are unset are nulled out
fn status_patch(status: &SubmarinerStatus) -> Result<serde_json::Value, ControllerError> {
    let mut value = serde_json::to_value(status)?;
    if let Some(map) = value.as_object_mut() {
        for field in [
            "clusterCIDR",
            "serviceCIDR",
            "globalCIDR",
            "networkPlugin",
            "gatewayDaemonSetStatus",
            "routeAgentDaemonSetStatus",
            "globalnetDaemonSetStatus",
        ] {
            map.entry(field).or_insert(serde_json::Value::Null);
        }
    }
    Ok(serde_json::json!({ "status": value }))
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn summarize(ds: &DaemonSet) -> DaemonSetSummary {
    let status = ds.status.clone().unwrap_or_default();
    DaemonSetSummary {
        desired_number_scheduled: status.desired_number_scheduled,
        number_ready: status.number_ready,
        observed_generation: status.observed_generation,
        mismatched_container_images: status.updated_number_scheduled.unwrap_or(0)
            < status.desired_number_scheduled,
    }
}
