//! Mock ObjectStore for unit testing
//!
//! This module provides an in-memory implementation of `ObjectStore` that
//! behaves like the API server for the subset the operator relies on:
//! - resourceVersion checks on replace (optimistic concurrency)
//! - generation bumps when `spec` changes
//! - status subresource separation (replace/patch keep the stored status)
//! - label selector filtering on list
//! - objects pending deletion disappear once their last finalizer is removed
//!
//! Tests can inject one-shot failures per verb and inspect a call log.
//!
//! - `merge.rs` - JSON merge patch
//! - `selector.rs` - label selector matching

mod merge;
mod selector;

pub use merge::merge_patch;
pub use selector::LabelSelector;

use crate::error::ClusterError;
use crate::store::ObjectStore;
use kube::Resource;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Store operation, used for failure injection and the call log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    List,
    Create,
    Replace,
    Patch,
    PatchStatus,
    Delete,
}

/// Failure a test can inject into the next call of a verb
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    NotFound,
    AlreadyExists,
    Conflict,
    Invalid,
    Server,
}

impl Failure {
    fn into_error(self, key: &str) -> ClusterError {
        let message = format!("injected failure for {}", key);
        match self {
            Failure::NotFound => ClusterError::NotFound(message),
            Failure::AlreadyExists => ClusterError::AlreadyExists(message),
            Failure::Conflict => ClusterError::Conflict(message),
            Failure::Invalid => ClusterError::Invalid(message),
            Failure::Server => ClusterError::Api(message),
        }
    }
}

/// One recorded store call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub verb: Verb,
    pub namespace: String,
    /// Object name, or the label selector for `List`
    pub target: String,
}

type Key = (String, String);

/// Mock ObjectStore for testing
///
/// Clones share the same backing storage.
pub struct MockStore<K> {
    objects: Arc<Mutex<BTreeMap<Key, K>>>,
    failures: Arc<Mutex<VecDeque<(Verb, Failure)>>>,
    calls: Arc<Mutex<Vec<Call>>>,
    revision: Arc<AtomicU64>,
}

impl<K> Clone for MockStore<K> {
    fn clone(&self) -> Self {
        Self {
            objects: Arc::clone(&self.objects),
            failures: Arc::clone(&self.failures),
            calls: Arc::clone(&self.calls),
            revision: Arc::clone(&self.revision),
        }
    }
}

impl<K> Default for MockStore<K> {
    fn default() -> Self {
        Self {
            objects: Arc::new(Mutex::new(BTreeMap::new())),
            failures: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            revision: Arc::new(AtomicU64::new(1)),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

fn not_found(namespace: &str, name: &str) -> ClusterError {
    ClusterError::NotFound(format!("{}/{}", namespace, name))
}

impl<K> MockStore<K>
where
    K: Resource + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Create an empty mock store
    pub fn new() -> Self {
        Self::default()
    }

    fn next_revision(&self) -> String {
        self.revision.fetch_add(1, Ordering::SeqCst).to_string()
    }

    fn record(&self, verb: Verb, namespace: &str, target: &str) -> Result<(), ClusterError> {
        lock(&self.calls).push(Call {
            verb,
            namespace: namespace.to_string(),
            target: target.to_string(),
        });
        let mut failures = lock(&self.failures);
        if let Some(index) = failures.iter().position(|(v, _)| *v == verb) {
            if let Some((_, failure)) = failures.remove(index) {
                return Err(failure.into_error(&format!("{}/{}", namespace, target)));
            }
        }
        Ok(())
    }

    /// Make the next call of `verb` fail with `failure`
    pub fn fail_next(&self, verb: Verb, failure: Failure) {
        lock(&self.failures).push_back((verb, failure));
    }

    /// Add an object directly (for test setup); status is kept as given
    pub fn insert(&self, mut object: K) -> K {
        let namespace = object.meta().namespace.clone().unwrap_or_default();
        let name = object.meta().name.clone().unwrap_or_default();
        let revision = self.next_revision();
        let meta = object.meta_mut();
        meta.resource_version = Some(revision);
        if meta.uid.is_none() {
            meta.uid = Some(format!("uid-{}-{}", namespace, name));
        }
        if meta.generation.is_none() {
            meta.generation = Some(1);
        }
        lock(&self.objects).insert(key(&namespace, &name), object.clone());
        object
    }

    /// Mutate a stored object in place (for simulating controllers and status changes)
    pub fn update(&self, namespace: &str, name: &str, mutate: impl FnOnce(&mut K)) -> bool {
        let revision = self.next_revision();
        let mut objects = lock(&self.objects);
        match objects.get_mut(&key(namespace, name)) {
            Some(object) => {
                mutate(object);
                object.meta_mut().resource_version = Some(revision);
                true
            }
            None => false,
        }
    }

    /// Remove an object without recording a call (for simulating garbage collection)
    pub fn remove(&self, namespace: &str, name: &str) -> Option<K> {
        lock(&self.objects).remove(&key(namespace, name))
    }

    /// Stored copy of an object, if present
    pub fn stored(&self, namespace: &str, name: &str) -> Option<K> {
        lock(&self.objects).get(&key(namespace, name)).cloned()
    }

    /// Whether an object is present
    pub fn contains(&self, namespace: &str, name: &str) -> bool {
        lock(&self.objects).contains_key(&key(namespace, name))
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        lock(&self.objects).len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        lock(&self.objects).is_empty()
    }

    /// All recorded calls, oldest first
    pub fn calls(&self) -> Vec<Call> {
        lock(&self.calls).clone()
    }

    /// Number of recorded calls of `verb` against `namespace/target`
    pub fn count(&self, verb: Verb, namespace: &str, target: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| c.verb == verb && c.namespace == namespace && c.target == target)
            .count()
    }

    /// Forget the call log
    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    /// Store `value` as the new state of `stored`, keeping identity and the status subresource
    fn commit(
        &self,
        objects: &mut BTreeMap<Key, K>,
        object_key: Key,
        stored: &K,
        mut value: Value,
    ) -> Result<Option<K>, ClusterError> {
        let stored_value = serde_json::to_value(stored)?;
        if let Some(map) = value.as_object_mut() {
            match stored_value.get("status") {
                Some(status) => {
                    map.insert("status".to_string(), status.clone());
                }
                None => {
                    map.remove("status");
                }
            }
        }
        let spec_changed = stored_value.get("spec") != value.get("spec");

        let mut updated: K = serde_json::from_value(value)?;
        let stored_meta = stored.meta();
        let meta = updated.meta_mut();
        meta.name = stored_meta.name.clone();
        meta.namespace = stored_meta.namespace.clone();
        meta.uid = stored_meta.uid.clone();
        meta.creation_timestamp = stored_meta.creation_timestamp.clone();
        meta.deletion_timestamp = stored_meta.deletion_timestamp.clone();
        let generation = stored_meta.generation.unwrap_or(1);
        meta.generation = Some(if spec_changed { generation + 1 } else { generation });
        meta.resource_version = Some(self.next_revision());

        let finalizers_cleared = meta.finalizers.as_ref().is_none_or(|f| f.is_empty());
        if meta.deletion_timestamp.is_some() && finalizers_cleared {
            objects.remove(&object_key);
            return Ok(None);
        }
        objects.insert(object_key, updated.clone());
        Ok(Some(updated))
    }
}

#[async_trait::async_trait]
impl<K> ObjectStore<K> for MockStore<K>
where
    K: Resource + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<K, ClusterError> {
        self.record(Verb::Get, namespace, name)?;
        self.stored(namespace, name)
            .ok_or_else(|| not_found(namespace, name))
    }

    async fn list(&self, namespace: &str, label_selector: &str) -> Result<Vec<K>, ClusterError> {
        self.record(Verb::List, namespace, label_selector)?;
        let selector = LabelSelector::parse(label_selector);
        Ok(lock(&self.objects)
            .iter()
            .filter(|((ns, _), object)| {
                ns == namespace && selector.matches(object.meta().labels.as_ref())
            })
            .map(|(_, object)| object.clone())
            .collect())
    }

    async fn create(&self, namespace: &str, object: &K) -> Result<K, ClusterError> {
        let name = object
            .meta()
            .name
            .clone()
            .ok_or_else(|| ClusterError::Invalid("metadata.name is required".to_string()))?;
        self.record(Verb::Create, namespace, &name)?;

        let mut objects = lock(&self.objects);
        let object_key = key(namespace, &name);
        if objects.contains_key(&object_key) {
            return Err(ClusterError::AlreadyExists(format!("{}/{}", namespace, name)));
        }

        let mut value = serde_json::to_value(object)?;
        if let Some(map) = value.as_object_mut() {
            map.remove("status");
        }
        let mut created: K = serde_json::from_value(value)?;
        let meta = created.meta_mut();
        meta.namespace = Some(namespace.to_string());
        meta.uid = Some(format!("uid-{}-{}", namespace, name));
        meta.generation = Some(1);
        meta.resource_version = Some(self.next_revision());
        objects.insert(object_key, created.clone());
        Ok(created)
    }

    async fn replace(&self, namespace: &str, name: &str, object: &K) -> Result<K, ClusterError> {
        self.record(Verb::Replace, namespace, name)?;
        let mut objects = lock(&self.objects);
        let object_key = key(namespace, name);
        let stored = objects
            .get(&object_key)
            .cloned()
            .ok_or_else(|| not_found(namespace, name))?;

        if let Some(version) = object.meta().resource_version.as_ref() {
            if stored.meta().resource_version.as_ref() != Some(version) {
                return Err(ClusterError::Conflict(format!(
                    "{}/{}: resourceVersion {} is stale",
                    namespace, name, version
                )));
            }
        }

        let value = serde_json::to_value(object)?;
        self.commit(&mut objects, object_key, &stored, value)?
            .ok_or_else(|| not_found(namespace, name))
    }

    async fn patch(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<K, ClusterError> {
        self.record(Verb::Patch, namespace, name)?;
        let mut objects = lock(&self.objects);
        let object_key = key(namespace, name);
        let stored = objects
            .get(&object_key)
            .cloned()
            .ok_or_else(|| not_found(namespace, name))?;

        let mut value = serde_json::to_value(&stored)?;
        merge_patch(&mut value, patch);
        match self.commit(&mut objects, object_key, &stored, value)? {
            Some(updated) => Ok(updated),
            // Last finalizer removed from an object pending deletion
            None => Ok(stored),
        }
    }

    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<K, ClusterError> {
        self.record(Verb::PatchStatus, namespace, name)?;
        let revision = self.next_revision();
        let mut objects = lock(&self.objects);
        let object = objects
            .get_mut(&key(namespace, name))
            .ok_or_else(|| not_found(namespace, name))?;

        let mut value = serde_json::to_value(&*object)?;
        if let Some(status) = patch.get("status") {
            let mut merged = value.get("status").cloned().unwrap_or(Value::Null);
            merge_patch(&mut merged, status);
            if let Some(map) = value.as_object_mut() {
                map.insert("status".to_string(), merged);
            }
        }
        let mut updated: K = serde_json::from_value(value)?;
        updated.meta_mut().resource_version = Some(revision);
        *object = updated.clone();
        Ok(updated)
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        self.record(Verb::Delete, namespace, name)?;
        lock(&self.objects)
            .remove(&key(namespace, name))
            .map(|_| ())
            .ok_or_else(|| not_found(namespace, name))
    }
}
