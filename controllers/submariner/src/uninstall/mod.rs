//! Uninstall orchestration
//!
//! Tearing down a Submariner component is more than deleting its workload:
//! gateway, route agent and globalnet pods program the host (routes, iptables,
//! tunnels) and must undo that on every node. Each component therefore gets a
//! transient `<name>-uninstall` workload running the same binaries once with
//! `SUBMARINER_UNINSTALL=true`.
//!
//! [`Info::run`] drives every installed component through
//! delete → wait for pods to drain → create uninstall workload → wait for it to
//! be ready → delete it. A run never blocks: it reports whether the caller must
//! requeue, and the whole teardown is bounded by
//! [`COMPONENT_READY_TIMEOUT`] measured from the CR's deletion timestamp.
//!
//! - `component.rs` - registry entries (`Component`, `UninstallTarget`)
//! - `workload.rs` - DaemonSet/Deployment uninstall variants and readiness

mod component;
mod workload;

pub use component::{Component, UninstallTarget};
#[cfg(test)]
pub use workload::Workload;

use crate::client::ClusterClient;
use crate::error::ControllerError;
use chrono::{DateTime, Utc};
use cluster_client::ClusterError;
use std::time::Duration;
use tracing::{info, warn};

/// How long a teardown may take before it is abandoned
pub const COMPONENT_READY_TIMEOUT: Duration = Duration::from_secs(120);

/// Result of one orchestrator run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Work is in flight; call `run` again shortly
    Requeue,
    /// Every installed component is uninstalled and cleaned up
    Complete,
    /// The timeout elapsed; steady-state and uninstall workloads were
    /// removed best-effort
    TimedOut,
}

impl Outcome {
    /// Whether the caller must requeue before removing its finalizer
    pub fn requeue(self) -> bool {
        matches!(self, Outcome::Requeue)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Requeue => "requeue",
            Outcome::Complete => "complete",
            Outcome::TimedOut => "timed_out",
        }
    }
}

/// Context of one teardown: the registry and when the teardown started
#[derive(Debug)]
pub struct Info {
    pub components: Vec<Component>,
    pub start_time: DateTime<Utc>,
}

impl Info {
    pub fn new(components: Vec<Component>, start_time: DateTime<Utc>) -> Self {
        Self {
            components,
            start_time,
        }
    }

    /// Whether the teardown has run for at least [`COMPONENT_READY_TIMEOUT`]
    pub fn timed_out(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.start_time)
            .to_std()
            .is_ok_and(|elapsed| elapsed >= COMPONENT_READY_TIMEOUT)
    }

    /// Advance the teardown as far as the cluster state allows.
    ///
    /// Safe to call any number of times; every step tolerates having been
    /// done already. Components progress independently within a run.
    pub async fn run(
        &self,
        client: &dyn ClusterClient,
        now: DateTime<Utc>,
    ) -> Result<Outcome, ControllerError> {
        let installed: Vec<&dyn UninstallTarget> = self
            .components
            .iter()
            .filter(|component| component.is_installed())
            .map(Component::target)
            .collect();

        if self.timed_out(now) {
            info!(
                "Uninstall timed out after {:?}, removing remaining workloads",
                COMPONENT_READY_TIMEOUT
            );
            // Orchestrated workloads have no owner reference, so nothing else
            // deletes them once the finalizer is gone
            delete_workloads(client, &installed).await;
            delete_uninstall_workloads(client, &installed).await;
            return Ok(Outcome::TimedOut);
        }

        for target in &installed {
            target
                .delete_resource(client)
                .await
                .map_err(|e| uninstall_error(*target, e))?;
        }

        let mut complete = true;

        for target in &installed {
            let selector = format!("app={}", target.name());
            let pods = client
                .pods()
                .list(target.namespace(), &selector)
                .await
                .map_err(|e| uninstall_error(*target, e))?;
            if !pods.is_empty() {
                info!(
                    "Waiting for {} pods of {} {}/{} to terminate",
                    pods.len(),
                    target.kind(),
                    target.namespace(),
                    target.name()
                );
                complete = false;
            }
        }

        for target in &installed {
            target
                .create_uninstall(client)
                .await
                .map_err(|e| uninstall_error(*target, e))?;
        }

        for target in &installed {
            let ready = target
                .uninstall_ready(client)
                .await
                .map_err(|e| uninstall_error(*target, e))?;
            if !ready {
                complete = false;
            }
        }

        if !complete {
            return Ok(Outcome::Requeue);
        }

        info!("All uninstall workloads completed, cleaning up");
        delete_uninstall_workloads(client, &installed).await;
        Ok(Outcome::Complete)
    }
}

async fn delete_workloads(client: &dyn ClusterClient, targets: &[&dyn UninstallTarget]) {
    for target in targets {
        if let Err(e) = target.delete_resource(client).await {
            warn!(
                "Failed to delete {} {}/{}: {}",
                target.kind(),
                target.namespace(),
                target.name(),
                e
            );
        }
    }
}

async fn delete_uninstall_workloads(client: &dyn ClusterClient, targets: &[&dyn UninstallTarget]) {
    for target in targets {
        if let Err(e) = target.delete_uninstall(client).await {
            warn!(
                "Failed to delete uninstall {} {}/{}: {}",
                target.kind(),
                target.namespace(),
                target.uninstall_name(),
                e
            );
        }
    }
}

fn uninstall_error(target: &dyn UninstallTarget, source: ClusterError) -> ControllerError {
    ControllerError::Uninstall {
        component: format!("{} {}/{}", target.kind(), target.namespace(), target.name()),
        source,
    }
}
