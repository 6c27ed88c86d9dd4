//! Main controller implementation.
//!
//! Wires the Kubernetes client, reconciler, watchers and the metrics/probe
//! server together and runs them until one of them exits.

use crate::client::KubeClusterClient;
use crate::config::OperatorConfig;
use crate::error::ControllerError;
use crate::metrics::PrometheusMetrics;
use crate::reconciler::Reconciler;
use crate::watcher::Watcher;
use crate::web::{self, WebState};
use crds::{Broker, ServiceDiscovery, Submariner};
use kube::{Api, Client};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Main controller for the Submariner CRDs.
#[derive(Debug)]
pub struct Controller {
    submariner_watcher: JoinHandle<Result<(), ControllerError>>,
    service_discovery_watcher: JoinHandle<Result<(), ControllerError>>,
    broker_watcher: JoinHandle<Result<(), ControllerError>>,
    web_server: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance and starts its tasks.
    pub async fn new(config: OperatorConfig) -> Result<Self, ControllerError> {
        info!("Initializing Submariner operator");

        let kube_client = Client::try_default().await?;

        let (submariner_api, service_discovery_api, broker_api) = match &config.watch_namespace {
            Some(ns) => (
                Api::<Submariner>::namespaced(kube_client.clone(), ns),
                Api::<ServiceDiscovery>::namespaced(kube_client.clone(), ns),
                Api::<Broker>::namespaced(kube_client.clone(), ns),
            ),
            None => (
                Api::<Submariner>::all(kube_client.clone()),
                Api::<ServiceDiscovery>::all(kube_client.clone()),
                Api::<Broker>::all(kube_client.clone()),
            ),
        };

        let metrics = Arc::new(PrometheusMetrics::new()?);
        let web_state = WebState::new(metrics.clone());
        let metrics_addr = config.metrics_addr;

        let reconciler = Arc::new(Reconciler::new(
            Arc::new(KubeClusterClient::new(kube_client)),
            config,
            metrics,
        ));
        let watcher_instance = Arc::new(Watcher::new(
            reconciler,
            submariner_api,
            service_discovery_api,
            broker_api,
        ));

        let submariner_watcher = {
            let watcher = watcher_instance.clone();
            tokio::spawn(async move { watcher.watch_submariners().await })
        };
        let service_discovery_watcher = {
            let watcher = watcher_instance.clone();
            tokio::spawn(async move { watcher.watch_service_discoveries().await })
        };
        let broker_watcher = {
            let watcher = watcher_instance;
            tokio::spawn(async move { watcher.watch_brokers().await })
        };
        let web_server = {
            let state = web_state.clone();
            tokio::spawn(async move { web::serve(metrics_addr, state).await })
        };
        web_state.mark_ready();

        Ok(Self {
            submariner_watcher,
            service_discovery_watcher,
            broker_watcher,
            web_server,
        })
    }

    /// Runs the controller until shutdown.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("Submariner operator running");

        // Every task runs forever; the first to exit stops the operator
        tokio::select! {
            result = &mut self.submariner_watcher => exited("Submariner watcher", result)?,
            result = &mut self.service_discovery_watcher => exited("ServiceDiscovery watcher", result)?,
            result = &mut self.broker_watcher => exited("Broker watcher", result)?,
            result = &mut self.web_server => exited("Metrics server", result)?,
        }

        Ok(())
    }
}

fn exited(
    task: &str,
    result: Result<Result<(), ControllerError>, tokio::task::JoinError>,
) -> Result<(), ControllerError> {
    result
        .map_err(|e| ControllerError::Watch(format!("{} panicked: {}", task, e)))?
        .map_err(|e| ControllerError::Watch(format!("{} error: {}", task, e)))?;
    info!("{} stopped", task);
    Ok(())
}
