//! Broker reconciliation.
//!
//! Broker children are all owner-referenced, so deletion needs no finalizer.

use super::{Reconciler, owner_reference, resource_key};
use crate::apply::apply;
use crate::error::ControllerError;
use crate::resources::broker::{GLOBALNET_CONFIG_MAP, globalnet_config_map};
use crds::{Broker, BrokerStatus};
use kube::ResourceExt;
use kube_runtime::controller::Action;

const KIND: &str = "Broker";

impl Reconciler {
    /// Reconcile one Broker CR
    pub async fn reconcile_broker(&self, broker: &Broker) -> Result<Action, ControllerError> {
        let result = if broker.metadata.deletion_timestamp.is_some() {
            Ok(Action::await_change())
        } else {
            self.apply_broker(broker).await
        };
        self.finish(KIND, &resource_key(broker), result)
    }

    async fn apply_broker(&self, broker: &Broker) -> Result<Action, ControllerError> {
        let client = self.client.as_ref();
        let owner = owner_reference(broker);

        apply(client, owner.as_ref(), globalnet_config_map(broker)).await?;

        let status = BrokerStatus {
            globalnet_config_map: Some(GLOBALNET_CONFIG_MAP.to_string()),
        };
        if broker.status.as_ref() != Some(&status) {
            client
                .brokers()
                .patch_status(
                    &broker.namespace().unwrap_or_default(),
                    &broker.name_any(),
                    &serde_json::json!({ "status": status }),
                )
                .await?;
        }

        Ok(Action::requeue(self.config.steady_state_requeue))
    }
}
