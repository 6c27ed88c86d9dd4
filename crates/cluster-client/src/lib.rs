//! Typed Kubernetes object access
//!
//! A small abstraction over namespaced Kubernetes objects that the Submariner
//! operator programs against, so reconcilers and the uninstall orchestrator can
//! run against the real API server or an in-memory store in tests.
//!
//! # Example
//!
//! ```no_run
//! use cluster_client::{KubeStore, ObjectStore, ignore_not_found};
//! use k8s_openapi::api::apps::v1::DaemonSet;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = kube::Client::try_default().await?;
//! let daemon_sets = KubeStore::<DaemonSet>::new(client);
//!
//! // Absence is not an error for most callers
//! let gateway = ignore_not_found(daemon_sets.get("submariner-operator", "submariner-gateway").await)?;
//! println!("gateway present: {}", gateway.is_some());
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Error taxonomy**: not-found, already-exists, conflict and invalid are
//!   distinguished from other API failures
//! - **Merge patches**: metadata and status subresource patches
//! - **Mocking**: `MockStore` behind the `test-util` feature

pub mod error;
pub mod kube_store;
pub mod store;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use error::{ClusterError, ignore_not_found};
pub use kube_store::KubeStore;
pub use store::ObjectStore;
#[cfg(any(test, feature = "test-util"))]
pub use mock::{Call, Failure, LabelSelector, MockStore, Verb, merge_patch};
