//! Reconciliation logic for the Submariner CRDs.
//!
//! - `submariner`: dataplane DaemonSets/Deployments, the ServiceDiscovery child CR
//! - `service_discovery`: Lighthouse agent and CoreDNS
//! - `broker`: globalnet info ConfigMap
//!
//! Orchestrated workloads (see [`crate::resources::MANAGED_BY_LABEL`]) are torn
//! down by [`crate::uninstall`] behind the CR's finalizer; everything else is
//! owner-referenced and left to garbage collection.

pub mod broker;
pub mod service_discovery;
pub mod submariner;

mod reconciler_test;

use crate::apply::Managed;
use crate::backoff::FibonacciBackoff;
use crate::client::ClusterClient;
use crate::config::OperatorConfig;
use crate::error::ControllerError;
use crate::metrics::MetricsRecorder;
use crate::resources::DEFAULT_VERSION;
use crate::uninstall::{Component, Info, Outcome};
use chrono::{DateTime, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::Resource;
use kube_runtime::controller::Action;
use semver::Version;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Finalizer guarding the uninstall of orchestrated workloads
pub const FINALIZER: &str = "submariner.io/submariner-operator";

/// First component version whose binaries honour `SUBMARINER_UNINSTALL`
pub const MINIMUM_UNINSTALL_VERSION: Version = Version::new(0, 12, 0);

/// Source of the current time
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Backoff state for a resource
#[derive(Debug, Clone)]
struct BackoffState {
    backoff: FibonacciBackoff,
    error_count: u32,
}

impl BackoffState {
    fn new() -> Self {
        Self {
            backoff: FibonacciBackoff::new(1, 300),
            error_count: 0,
        }
    }

    fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// Reconciles Submariner, ServiceDiscovery and Broker CRs.
pub struct Reconciler {
    pub(crate) client: Arc<dyn ClusterClient>,
    pub(crate) config: OperatorConfig,
    pub(crate) metrics: Arc<dyn MetricsRecorder>,
    clock: Clock,
    /// Error tracking per resource (kind/namespace/name -> BackoffState)
    backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl Reconciler {
    pub fn new(
        client: Arc<dyn ClusterClient>,
        config: OperatorConfig,
        metrics: Arc<dyn MetricsRecorder>,
    ) -> Self {
        Self {
            client,
            config,
            metrics,
            clock: Arc::new(Utc::now),
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Replace the wall clock with a fixed instant
    #[cfg(test)]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Next requeue delay for a resource whose reconcile failed
    ///
    /// Returns (delay, consecutive error count)
    pub fn backoff_for_error(&self, resource_key: &str) -> (Duration, u32) {
        match self.backoff_states.lock() {
            Ok(mut states) => {
                let state = states
                    .entry(resource_key.to_string())
                    .or_insert_with(BackoffState::new);
                state.error_count += 1;
                (state.backoff.next_backoff(), state.error_count)
            }
            Err(e) => {
                warn!("Failed to lock backoff_states: {}, using default backoff", e);
                (Duration::from_secs(60), 0)
            }
        }
    }

    /// Reset error tracking for a resource (on successful reconciliation)
    pub fn reset_error(&self, resource_key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            if let Some(state) = states.get_mut(resource_key) {
                state.reset();
            }
        }
    }

    /// Record the result of one reconcile of `resource_key`
    pub(crate) fn finish(
        &self,
        kind: &str,
        resource_key: &str,
        result: Result<Action, ControllerError>,
    ) -> Result<Action, ControllerError> {
        self.metrics.reconcile_result(kind, result.is_ok());
        if result.is_ok() {
            self.reset_error(resource_key);
        }
        result
    }

    /// Add [`FINALIZER`] to the object unless it is already there
    pub(crate) async fn ensure_finalizer<K: Managed>(&self, obj: &K) -> Result<(), ControllerError> {
        if has_finalizer(obj.meta()) {
            return Ok(());
        }
        let (namespace, name) = identity(obj)?;
        let mut finalizers = obj.meta().finalizers.clone().unwrap_or_default();
        finalizers.push(FINALIZER.to_string());

        K::store(self.client.as_ref())
            .patch(
                &namespace,
                &name,
                &serde_json::json!({ "metadata": { "finalizers": finalizers } }),
            )
            .await?;
        debug!("Added finalizer to {} {}/{}", K::kind(&()), namespace, name);
        Ok(())
    }

    /// Remove [`FINALIZER`] from the object, letting the API server delete it
    pub(crate) async fn remove_finalizer<K: Managed>(&self, obj: &K) -> Result<(), ControllerError> {
        let (namespace, name) = identity(obj)?;
        let finalizers: Vec<String> = obj
            .meta()
            .finalizers
            .iter()
            .flatten()
            .filter(|f| f.as_str() != FINALIZER)
            .cloned()
            .collect();

        let result = K::store(self.client.as_ref())
            .patch(
                &namespace,
                &name,
                &serde_json::json!({ "metadata": { "finalizers": finalizers } }),
            )
            .await;
        cluster_client::ignore_not_found(result)?;
        info!("Removed finalizer from {} {}/{}", K::kind(&()), namespace, name);
        Ok(())
    }

    /// Tear down `components` for an object being deleted.
    ///
    /// Returns the action to take: requeue while the orchestrator is still
    /// working, otherwise the finalizer has been removed.
    pub(crate) async fn finalize<K: Managed>(
        &self,
        obj: &K,
        version: Option<&str>,
        components: Vec<Component>,
    ) -> Result<Action, ControllerError> {
        let kind = K::kind(&()).to_string();
        let (namespace, name) = identity(obj)?;

        if version_supports_uninstall(version) {
            let start = deletion_start(obj.meta()).ok_or_else(|| {
                ControllerError::MissingField(format!("{} metadata.deletionTimestamp", kind))
            })?;
            let outcome = Info::new(components, start)
                .run(self.client.as_ref(), self.now())
                .await?;
            self.metrics.uninstall_outcome(&kind, outcome);

            if outcome.requeue() {
                debug!("Uninstall of {} {}/{} in progress", kind, namespace, name);
                return Ok(Action::requeue(self.config.uninstall_requeue));
            }
            if outcome == Outcome::TimedOut {
                info!("Uninstall of {} {}/{} timed out, removing finalizer", kind, namespace, name);
            } else {
                info!("Uninstall of {} {}/{} complete", kind, namespace, name);
            }
        } else {
            info!(
                "{} {}/{} runs version {:?} without uninstall support, deleting workloads",
                kind, namespace, name, version
            );
            for component in components.iter().filter(|c| c.is_installed()) {
                let target = component.target();
                target
                    .delete_resource(self.client.as_ref())
                    .await
                    .map_err(|source| ControllerError::Uninstall {
                        component: format!("{} {}/{}", target.kind(), target.namespace(), target.name()),
                        source,
                    })?;
            }
        }

        self.remove_finalizer(obj).await?;
        Ok(Action::await_change())
    }
}

/// `kind/namespace/name`, the key of a resource in the backoff table
pub fn resource_key<K: Resource<DynamicType = ()>>(obj: &K) -> String {
    format!(
        "{}/{}/{}",
        K::kind(&()),
        obj.meta().namespace.as_deref().unwrap_or_default(),
        obj.meta().name.as_deref().unwrap_or_default()
    )
}

fn identity<K: Resource<DynamicType = ()>>(obj: &K) -> Result<(String, String), ControllerError> {
    let namespace = obj.meta().namespace.clone().ok_or_else(|| {
        ControllerError::MissingField(format!("{} metadata.namespace", K::kind(&())))
    })?;
    let name = obj
        .meta()
        .name
        .clone()
        .ok_or_else(|| ControllerError::MissingField(format!("{} metadata.name", K::kind(&()))))?;
    Ok((namespace, name))
}

pub fn has_finalizer(meta: &ObjectMeta) -> bool {
    meta.finalizers.iter().flatten().any(|f| f == FINALIZER)
}

/// Controller owner reference pointing at `obj`, once it has a uid
pub fn owner_reference<K: Resource<DynamicType = ()>>(obj: &K) -> Option<OwnerReference> {
    obj.controller_owner_ref(&())
}

/// The deletion timestamp as a UTC instant
pub fn deletion_start(meta: &ObjectMeta) -> Option<DateTime<Utc>> {
    meta.deletion_timestamp.as_ref().map(|timestamp| timestamp.0)
}

/// Whether components at `version` can run an uninstall workload.
///
/// Unset versions use the operator default. Versions that do not parse
/// (`devel`, branch names) are assumed to be recent.
pub fn version_supports_uninstall(version: Option<&str>) -> bool {
    let raw = version.unwrap_or(DEFAULT_VERSION);
    let trimmed = raw.trim_start_matches('v');
    let parsed = Version::parse(trimmed).or_else(|_| Version::parse(&format!("{}.0", trimmed)));
    match parsed {
        Ok(version) => version >= MINIMUM_UNINSTALL_VERSION,
        Err(_) => {
            debug!("Version {:?} is not semver, assuming uninstall support", raw);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{submariner, time, utc};

    #[test]
    fn test_version_gating() {
        assert!(version_supports_uninstall(None));
        assert!(version_supports_uninstall(Some("0.12.0")));
        assert!(version_supports_uninstall(Some("v0.18.1")));
        assert!(version_supports_uninstall(Some("0.13")));
        assert!(version_supports_uninstall(Some("devel")));
        assert!(!version_supports_uninstall(Some("0.11.2")));
        assert!(!version_supports_uninstall(Some("v0.9.0")));
        assert!(!version_supports_uninstall(Some("0.12.0-rc1")));
    }

    #[test]
    fn test_deletion_start_reads_timestamp() {
        let mut sm = submariner("submariner");
        assert!(deletion_start(&sm.metadata).is_none());

        sm.metadata.deletion_timestamp = Some(time("2026-03-01T10:00:00Z"));
        assert_eq!(deletion_start(&sm.metadata), Some(utc("2026-03-01T10:00:00Z")));
    }

    #[test]
    fn test_owner_reference_requires_uid() {
        let mut sm = submariner("submariner");
        assert!(owner_reference(&sm).is_none());

        sm.metadata.uid = Some("uid-1".to_string());
        let owner = owner_reference(&sm).unwrap();
        assert_eq!(owner.kind, "Submariner");
        assert_eq!(owner.name, "submariner");
        assert_eq!(owner.controller, Some(true));
    }

    #[test]
    fn test_has_finalizer() {
        let mut sm = submariner("submariner");
        assert!(!has_finalizer(&sm.metadata));

        sm.metadata.finalizers = Some(vec!["other".to_string(), FINALIZER.to_string()]);
        assert!(has_finalizer(&sm.metadata));
    }

    #[test]
    fn test_resource_key() {
        assert_eq!(
            resource_key(&submariner("submariner")),
            "Submariner/submariner-operator/submariner"
        );
    }
}
