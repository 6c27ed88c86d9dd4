//! ObjectStore trait for mocking
//!
//! This trait abstracts typed access to namespaced Kubernetes objects so the
//! operator can run against the real API server or an in-memory mock.

use crate::error::ClusterError;

/// Typed CRUD operations on one kind of namespaced Kubernetes object
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait ObjectStore<K>: Send + Sync
where
    K: Clone + Send + Sync + 'static,
{
    /// Fetch one object by name
    async fn get(&self, namespace: &str, name: &str) -> Result<K, ClusterError>;

    /// List objects matching a label selector (`""` lists everything)
    async fn list(&self, namespace: &str, label_selector: &str) -> Result<Vec<K>, ClusterError>;

    /// Create an object; fails with `AlreadyExists` when the name is taken
    async fn create(&self, namespace: &str, object: &K) -> Result<K, ClusterError>;

    /// Replace an object; fails with `Conflict` when its resourceVersion is stale
    async fn replace(&self, namespace: &str, name: &str, object: &K) -> Result<K, ClusterError>;

    /// Apply a JSON merge patch to the object
    async fn patch(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<K, ClusterError>;

    /// Apply a JSON merge patch to the status subresource
    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<K, ClusterError>;

    /// Delete an object by name
    async fn delete(&self, namespace: &str, name: &str) -> Result<(), ClusterError>;
}
