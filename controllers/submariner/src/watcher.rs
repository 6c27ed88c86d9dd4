//! Kubernetes resource watchers.
//!
//! Each CRD gets a `kube_runtime::Controller` through the generic
//! `watch_resource()` helper, which handles reconnects and requeues. Failed
//! reconciles are requeued with the reconciler's per-object Fibonacci backoff.

use crate::error::ControllerError;
use crate::reconciler::{Reconciler, resource_key};
use crds::{Broker, ServiceDiscovery, Submariner};
use futures::StreamExt;
use kube::Api;
use kube_runtime::{Controller, controller::{Action, Config as ControllerConfig}, watcher};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, error, warn};

type ReconcileFuture = Pin<Box<dyn Future<Output = Result<Action, ControllerError>> + Send>>;

/// Run a controller for `K` until its watch stream ends
async fn watch_resource<K, F>(
    api: Api<K>,
    reconciler: Arc<Reconciler>,
    reconcile_fn: F,
    resource_name: &'static str,
) -> Result<(), ControllerError>
where
    K: kube::Resource<DynamicType = ()>
        + Clone
        + Send
        + Sync
        + 'static
        + std::fmt::Debug
        + serde::de::DeserializeOwned,
    F: Fn(Arc<Reconciler>, Arc<K>) -> ReconcileFuture + Send + Sync + Clone + 'static,
{
    debug!("Starting {} watcher", resource_name);

    let error_policy = move |obj: Arc<K>, error: &ControllerError, ctx: Arc<Reconciler>| {
        let key = resource_key(obj.as_ref());
        let (delay, error_count) = ctx.backoff_for_error(&key);
        warn!(
            "Reconciliation of {} failed ({} consecutive errors), retrying in {:?}: {}",
            key, error_count, delay, error
        );
        Action::requeue(delay)
    };

    let reconcile = move |obj: Arc<K>, ctx: Arc<Reconciler>| {
        let reconcile_fn = reconcile_fn.clone();
        async move {
            debug!("Reconciling {} {}", resource_name, resource_key(obj.as_ref()));
            reconcile_fn(ctx, obj).await
        }
    };

    // Uninstall requeues are sub-second, so no debounce
    let controller_config = ControllerConfig::default().concurrency(3);

    Controller::new(api, watcher::Config::default())
        .with_config(controller_config)
        .run(reconcile, error_policy, reconciler)
        .for_each(|res| async move {
            if let Err(e) = res {
                error!("Controller error for {}: {}", resource_name, e);
            }
        })
        .await;

    Ok(())
}

/// Watches the Submariner CRDs.
pub struct Watcher {
    reconciler: Arc<Reconciler>,
    submariner_api: Api<Submariner>,
    service_discovery_api: Api<ServiceDiscovery>,
    broker_api: Api<Broker>,
}

impl Watcher {
    pub fn new(
        reconciler: Arc<Reconciler>,
        submariner_api: Api<Submariner>,
        service_discovery_api: Api<ServiceDiscovery>,
        broker_api: Api<Broker>,
    ) -> Self {
        Self {
            reconciler,
            submariner_api,
            service_discovery_api,
            broker_api,
        }
    }

    pub async fn watch_submariners(&self) -> Result<(), ControllerError> {
        watch_resource(
            self.submariner_api.clone(),
            self.reconciler.clone(),
            |reconciler, resource| {
                Box::pin(async move { reconciler.reconcile_submariner(&resource).await })
            },
            "Submariner",
        )
        .await
    }

    pub async fn watch_service_discoveries(&self) -> Result<(), ControllerError> {
        watch_resource(
            self.service_discovery_api.clone(),
            self.reconciler.clone(),
            |reconciler, resource| {
                Box::pin(async move { reconciler.reconcile_service_discovery(&resource).await })
            },
            "ServiceDiscovery",
        )
        .await
    }

    pub async fn watch_brokers(&self) -> Result<(), ControllerError> {
        watch_resource(
            self.broker_api.clone(),
            self.reconciler.clone(),
            |reconciler, resource| {
                Box::pin(async move { reconciler.reconcile_broker(&resource).await })
            },
            "Broker",
        )
        .await
    }
}
