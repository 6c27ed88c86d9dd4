//! Controller-specific error types.
//!
//! This module defines error types specific to the Submariner operator
//! that are not covered by upstream library errors.

use cluster_client::ClusterError;
use kube::Error as KubeError;
use thiserror::Error;

/// Errors that can occur in the Submariner operator.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes client error (client construction, watches)
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Object store error outside of apply/uninstall
    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),

    /// Create-or-update of a child object failed
    #[error("Failed to apply {kind} {namespace}/{name}: {source}")]
    Apply {
        kind: String,
        namespace: String,
        name: String,
        #[source]
        source: ClusterError,
    },

    /// An uninstall step failed for a component
    #[error("Uninstall of {component} failed: {source}")]
    Uninstall {
        component: String,
        #[source]
        source: ClusterError,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Required object field is missing
    #[error("Missing field: {0}")]
    MissingField(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),

    /// Metrics registration or encoding failed
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
