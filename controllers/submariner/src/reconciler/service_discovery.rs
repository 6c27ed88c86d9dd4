//! ServiceDiscovery reconciliation.

use super::{Reconciler, has_finalizer, owner_reference, resource_key};
use crate::apply::apply;
use crate::error::ControllerError;
use crate::resources::lighthouse;
use crate::uninstall::Component;
use crds::{ServiceDiscovery, ServiceDiscoveryStatus};
use kube::ResourceExt;
use kube_runtime::controller::Action;
use tracing::debug;

const KIND: &str = "ServiceDiscovery";

impl Reconciler {
    /// Reconcile one ServiceDiscovery CR
    pub async fn reconcile_service_discovery(
        &self,
        sd: &ServiceDiscovery,
    ) -> Result<Action, ControllerError> {
        let result = if sd.metadata.deletion_timestamp.is_some() {
            self.finalize_service_discovery(sd).await
        } else {
            self.apply_service_discovery(sd).await
        };
        self.finish(KIND, &resource_key(sd), result)
    }

    pub fn service_discovery_components(&self, sd: &ServiceDiscovery) -> Vec<Component> {
        vec![Component::new(
            &lighthouse::agent_deployment(sd),
            &self.config.pause_image,
        )]
    }

    async fn finalize_service_discovery(
        &self,
        sd: &ServiceDiscovery,
    ) -> Result<Action, ControllerError> {
        if !has_finalizer(&sd.metadata) {
            return Ok(Action::await_change());
        }
        self.finalize(
            sd,
            sd.spec.version.as_deref(),
            self.service_discovery_components(sd),
        )
        .await
    }

    async fn apply_service_discovery(
        &self,
        sd: &ServiceDiscovery,
    ) -> Result<Action, ControllerError> {
        self.ensure_finalizer(sd).await?;

        let client = self.client.as_ref();
        let owner = owner_reference(sd);

        let agent = apply(client, None, lighthouse::agent_deployment(sd)).await?;
        apply(client, owner.as_ref(), lighthouse::coredns_config_map(sd)).await?;
        apply(client, owner.as_ref(), lighthouse::coredns_deployment(sd)).await?;
        let service = apply(client, owner.as_ref(), lighthouse::coredns_service(sd)).await?;

        let status = ServiceDiscoveryStatus {
            coredns_cluster_ip: service
                .spec
                .and_then(|spec| spec.cluster_ip)
                .filter(|ip| !ip.is_empty() && ip != "None"),
            agent_ready_replicas: agent
                .status
                .and_then(|status| status.ready_replicas)
                .unwrap_or(0),
        };
        if sd.status.as_ref() != Some(&status) {
            let namespace = sd.namespace().unwrap_or_default();
            client
                .service_discoveries()
                .patch_status(
                    &namespace,
                    &sd.name_any(),
                    &serde_json::json!({ "status": status }),
                )
                .await?;
            debug!("Updated status of ServiceDiscovery {}/{}", namespace, sd.name_any());
        }

        Ok(Action::requeue(self.config.steady_state_requeue))
    }
}
