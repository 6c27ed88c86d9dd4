//! Operator configuration loaded from environment variables.

use crate::error::ControllerError;
use std::net::SocketAddr;
use std::time::Duration;

/// Pause image used as the no-op main container of uninstall workloads
pub const DEFAULT_PAUSE_IMAGE: &str = "registry.k8s.io/pause:3.9";

/// Network plugin assumed when none is configured
pub const DEFAULT_NETWORK_PLUGIN: &str = "generic";

const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_UNINSTALL_REQUEUE_MS: u64 = 200;
const DEFAULT_STEADY_STATE_REQUEUE_SECS: u64 = 60;
const UNINSTALL_REQUEUE_RANGE_MS: std::ops::RangeInclusive<u64> = 100..=500;

/// Runtime settings of the operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Namespace to watch CRs in (`None` watches all namespaces)
    pub watch_namespace: Option<String>,
    /// Listen address of the metrics and probe server
    pub metrics_addr: SocketAddr,
    /// Requeue delay while an uninstall is in progress
    pub uninstall_requeue: Duration,
    /// Requeue delay after a successful steady-state reconcile
    pub steady_state_requeue: Duration,
    /// Image of the no-op container in uninstall workloads
    pub pause_image: String,
    /// Network plugin of the cluster (e.g. `OVNKubernetes`)
    pub network_plugin: String,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            watch_namespace: None,
            metrics_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            uninstall_requeue: Duration::from_millis(DEFAULT_UNINSTALL_REQUEUE_MS),
            steady_state_requeue: Duration::from_secs(DEFAULT_STEADY_STATE_REQUEUE_SECS),
            pause_image: DEFAULT_PAUSE_IMAGE.to_string(),
            network_plugin: DEFAULT_NETWORK_PLUGIN.to_string(),
        }
    }
}

impl OperatorConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ControllerError> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let metrics_addr = non_empty("METRICS_ADDR")
            .unwrap_or_else(|| DEFAULT_METRICS_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ControllerError::InvalidConfig(format!("METRICS_ADDR: {}", e)))?;

        let uninstall_requeue_ms = parse_u64(
            "UNINSTALL_REQUEUE_MS",
            non_empty("UNINSTALL_REQUEUE_MS"),
            DEFAULT_UNINSTALL_REQUEUE_MS,
        )?;
        if !UNINSTALL_REQUEUE_RANGE_MS.contains(&uninstall_requeue_ms) {
            return Err(ControllerError::InvalidConfig(format!(
                "UNINSTALL_REQUEUE_MS must be between {} and {}, got {}",
                UNINSTALL_REQUEUE_RANGE_MS.start(),
                UNINSTALL_REQUEUE_RANGE_MS.end(),
                uninstall_requeue_ms
            )));
        }

        let steady_state_secs = parse_u64(
            "STEADY_STATE_REQUEUE_SECS",
            non_empty("STEADY_STATE_REQUEUE_SECS"),
            DEFAULT_STEADY_STATE_REQUEUE_SECS,
        )?;
        if steady_state_secs == 0 {
            return Err(ControllerError::InvalidConfig(
                "STEADY_STATE_REQUEUE_SECS must be positive".to_string(),
            ));
        }

        Ok(Self {
            watch_namespace: non_empty("WATCH_NAMESPACE"),
            metrics_addr,
            uninstall_requeue: Duration::from_millis(uninstall_requeue_ms),
            steady_state_requeue: Duration::from_secs(steady_state_secs),
            pause_image: non_empty("PAUSE_IMAGE").unwrap_or_else(|| DEFAULT_PAUSE_IMAGE.to_string()),
            network_plugin: non_empty("NETWORK_PLUGIN")
                .unwrap_or_else(|| DEFAULT_NETWORK_PLUGIN.to_string()),
        })
    }
}

fn parse_u64(key: &str, value: Option<String>, default: u64) -> Result<u64, ControllerError> {
    match value {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse()
            .map_err(|e| ControllerError::InvalidConfig(format!("{}={}: {}", key, v, e))),
    }
}
