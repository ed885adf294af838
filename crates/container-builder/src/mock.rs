//! An in-memory cluster client for testing without a real cluster.
//!
//! Objects are stored as JSON keyed by kind, namespace and name. Nothing
//! acts on stored objects: a created pod stays without status until a test
//! changes it with [`InMemoryClient::modify`].

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use kube::core::ErrorResponse;
use parking_lot::Mutex;
use serde_json::Value;

use crate::client::{object_identity, ClusterClient, ClusterObject};
use crate::{BuildError, Result};

/// A client operation that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `create`
    Create,
    /// `get`
    Get,
    /// `update`
    Update,
    /// `update_status`
    UpdateStatus,
    /// `delete`
    Delete,
}

type ObjectKey = (String, String, String);

/// A cluster client that stores objects in memory.
#[derive(Default)]
pub struct InMemoryClient {
    objects: Mutex<BTreeMap<ObjectKey, Value>>,
    failures: Mutex<Vec<Operation>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    resource_version: AtomicU64,
}

fn key<K: ClusterObject>(namespace: &str, name: &str) -> ObjectKey {
    (
        K::kind(&()).to_string(),
        namespace.to_string(),
        name.to_string(),
    )
}

fn not_found<K: ClusterObject>(namespace: &str, name: &str) -> BuildError {
    BuildError::NotFound {
        kind: K::kind(&()).to_string(),
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}

impl InMemoryClient {
    /// Create an empty client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call of `operation` fail with a transient API error.
    pub fn fail_next(&self, operation: Operation) {
        self.failures.lock().push(operation);
    }

    /// Number of successful and failed reads so far.
    #[must_use]
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of successful and failed writes so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of stored objects of kind `K`.
    #[must_use]
    pub fn count<K: ClusterObject>(&self) -> usize {
        let kind = K::kind(&());
        self.objects
            .lock()
            .keys()
            .filter(|(k, _, _)| *k == kind)
            .count()
    }

    /// Check whether an object is stored.
    #[must_use]
    pub fn contains<K: ClusterObject>(&self, namespace: &str, name: &str) -> bool {
        self.objects.lock().contains_key(&key::<K>(namespace, name))
    }

    /// Mutate a stored object in place, as an external actor would.
    ///
    /// Does not count as a client read or write.
    ///
    /// # Errors
    ///
    /// Returns `BuildError::NotFound` if the object is absent.
    pub fn modify<K: ClusterObject>(
        &self,
        namespace: &str,
        name: &str,
        f: impl FnOnce(&mut K),
    ) -> Result<()> {
        let mut objects = self.objects.lock();
        let slot = objects
            .get_mut(&key::<K>(namespace, name))
            .ok_or_else(|| not_found::<K>(namespace, name))?;

        let mut object: K = serde_json::from_value(slot.clone())?;
        f(&mut object);
        *slot = serde_json::to_value(&object)?;
        Ok(())
    }

    /// Remove a stored object, as an external actor would.
    pub fn remove<K: ClusterObject>(&self, namespace: &str, name: &str) -> bool {
        self.objects
            .lock()
            .remove(&key::<K>(namespace, name))
            .is_some()
    }

    fn check_failure(&self, operation: Operation) -> Result<()> {
        let mut failures = self.failures.lock();
        let Some(index) = failures.iter().position(|op| *op == operation) else {
            return Ok(());
        };
        failures.remove(index);

        Err(BuildError::Kube(kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: format!("injected {operation:?} failure"),
            reason: "ServiceUnavailable".to_string(),
            code: 503,
        })))
    }

    fn next_version(&self) -> String {
        (self.resource_version.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    fn record_read(&self, operation: Operation) -> Result<()> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.check_failure(operation)
    }

    fn record_write(&self, operation: Operation) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.check_failure(operation)
    }
}

#[async_trait]
impl ClusterClient for InMemoryClient {
    async fn create<K: ClusterObject>(&self, object: &K) -> Result<K> {
        self.record_write(Operation::Create)?;
        let (namespace, name) = object_identity(object)?;

        let mut objects = self.objects.lock();
        let key = key::<K>(&namespace, &name);
        if objects.contains_key(&key) {
            return Err(BuildError::AlreadyExists {
                kind: K::kind(&()).to_string(),
                namespace,
                name,
            });
        }

        let mut stored = object.clone();
        let meta = stored.meta_mut();
        meta.uid = Some(uuid::Uuid::new_v4().to_string());
        meta.resource_version = Some(self.next_version());

        objects.insert(key, serde_json::to_value(&stored)?);
        Ok(stored)
    }

    async fn get<K: ClusterObject>(&self, namespace: &str, name: &str) -> Result<K> {
        self.record_read(Operation::Get)?;

        let objects = self.objects.lock();
        let value = objects
            .get(&key::<K>(namespace, name))
            .ok_or_else(|| not_found::<K>(namespace, name))?;
        Ok(serde_json::from_value(value.clone())?)
    }

    async fn update<K: ClusterObject>(&self, object: &K) -> Result<K> {
        self.record_write(Operation::Update)?;
        let (namespace, name) = object_identity(object)?;

        let mut objects = self.objects.lock();
        let slot = objects
            .get_mut(&key::<K>(&namespace, &name))
            .ok_or_else(|| not_found::<K>(&namespace, &name))?;

        let mut stored = object.clone();
        stored.meta_mut().resource_version = Some(self.next_version());
        *slot = serde_json::to_value(&stored)?;
        Ok(stored)
    }

    async fn update_status<K: ClusterObject>(&self, object: &K) -> Result<K> {
        self.record_write(Operation::UpdateStatus)?;
        let (namespace, name) = object_identity(object)?;

        let mut objects = self.objects.lock();
        let slot = objects
            .get_mut(&key::<K>(&namespace, &name))
            .ok_or_else(|| not_found::<K>(&namespace, &name))?;

        let status = serde_json::to_value(object)?
            .get("status")
            .cloned()
            .unwrap_or(Value::Null);

        let mut stored: K = serde_json::from_value(slot.clone())?;
        stored.meta_mut().resource_version = Some(self.next_version());
        let mut value = serde_json::to_value(&stored)?;
        if let Some(fields) = value.as_object_mut() {
            fields.insert("status".to_string(), status);
        }

        let stored = serde_json::from_value(value.clone())?;
        *slot = value;
        Ok(stored)
    }

    async fn delete<K: ClusterObject>(&self, namespace: &str, name: &str) -> Result<()> {
        self.record_write(Operation::Delete)?;

        self.objects
            .lock()
            .remove(&key::<K>(namespace, name))
            .map(|_| ())
            .ok_or_else(|| not_found::<K>(namespace, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{ConfigMap, Pod, PodStatus};
    use kube::api::ObjectMeta;

    fn test_pod(name: &str) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("test".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_get_and_conflict() {
        let client = InMemoryClient::new();

        let created = client.create(&test_pod("p1")).await.unwrap();
        assert!(created.metadata.uid.is_some());
        assert_eq!(client.count::<Pod>(), 1);
        assert_eq!(client.count::<ConfigMap>(), 0);

        let fetched: Pod = client.get("test", "p1").await.unwrap();
        assert_eq!(fetched.metadata.uid, created.metadata.uid);

        let err = client.create(&test_pod("p1")).await.unwrap_err();
        assert!(err.is_already_exists());

        let err = client.get::<Pod>("test", "missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn update_status_keeps_spec() {
        let client = InMemoryClient::new();
        client.create(&test_pod("p1")).await.unwrap();

        let mut changed = test_pod("p1");
        changed.metadata.labels = Some([("a".to_string(), "b".to_string())].into());
        changed.status = Some(PodStatus {
            phase: Some("Running".to_string()),
            ..Default::default()
        });

        let stored = client.update_status(&changed).await.unwrap();
        assert_eq!(
            stored.status.and_then(|s| s.phase).as_deref(),
            Some("Running")
        );
        assert!(stored.metadata.labels.is_none());
    }

    #[tokio::test]
    async fn injected_failure_fires_once() {
        let client = InMemoryClient::new();
        client.fail_next(Operation::Create);

        let err = client.create(&test_pod("p1")).await.unwrap_err();
        assert!(err.is_retriable());
        assert!(!client.contains::<Pod>("test", "p1"));

        client.create(&test_pod("p1")).await.unwrap();
        assert!(client.contains::<Pod>("test", "p1"));
        assert_eq!(client.write_count(), 2);
    }

    #[tokio::test]
    async fn modify_and_delete() {
        let client = InMemoryClient::new();
        client.create(&test_pod("p1")).await.unwrap();

        client
            .modify::<Pod>("test", "p1", |pod| {
                pod.status = Some(PodStatus {
                    phase: Some("Succeeded".to_string()),
                    ..Default::default()
                });
            })
            .unwrap();
        let pod: Pod = client.get("test", "p1").await.unwrap();
        assert_eq!(pod.status.and_then(|s| s.phase).as_deref(), Some("Succeeded"));

        client.delete::<Pod>("test", "p1").await.unwrap();
        assert!(client.delete::<Pod>("test", "p1").await.unwrap_err().is_not_found());
    }
}
