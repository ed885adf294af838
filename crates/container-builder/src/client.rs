//! Cluster object client capability.
//!
//! The engine only ever talks to the cluster through [`ClusterClient`]. The
//! caller owns the client and its connection lifetime; [`KubeClusterClient`]
//! is the production implementation backed by a `kube::Client`.

use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use crate::{BuildError, Result};

/// Field manager used for status patches.
const FIELD_MANAGER: &str = "container-builder";

/// A namespaced, typed cluster object the engine can store.
pub trait ClusterObject:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<K> ClusterObject for K where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// Create/get/update/delete on typed cluster objects.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Create an object.
    ///
    /// # Errors
    ///
    /// Returns `BuildError::AlreadyExists` if an object with the same
    /// identity is present.
    async fn create<K: ClusterObject>(&self, object: &K) -> Result<K>;

    /// Fetch an object by namespace and name.
    ///
    /// # Errors
    ///
    /// Returns `BuildError::NotFound` if the object is absent.
    async fn get<K: ClusterObject>(&self, namespace: &str, name: &str) -> Result<K>;

    /// Replace a whole object.
    ///
    /// # Errors
    ///
    /// Returns `BuildError::NotFound` if the object is absent.
    async fn update<K: ClusterObject>(&self, object: &K) -> Result<K>;

    /// Replace only the `status` of an object.
    ///
    /// # Errors
    ///
    /// Returns `BuildError::NotFound` if the object is absent.
    async fn update_status<K: ClusterObject>(&self, object: &K) -> Result<K>;

    /// Delete an object.
    ///
    /// # Errors
    ///
    /// Returns `BuildError::NotFound` if the object is absent.
    async fn delete<K: ClusterObject>(&self, namespace: &str, name: &str) -> Result<()>;
}

/// Namespace and name of an object, required for every stored object.
///
/// # Errors
///
/// Returns a configuration error if either is missing.
pub fn object_identity<K: ClusterObject>(object: &K) -> Result<(String, String)> {
    let kind = K::kind(&());
    let namespace = object
        .namespace()
        .ok_or_else(|| BuildError::Config(format!("{kind} has no namespace")))?;
    let name = object
        .meta()
        .name
        .clone()
        .ok_or_else(|| BuildError::Config(format!("{kind} in {namespace} has no name")))?;
    Ok((namespace, name))
}

/// [`ClusterClient`] backed by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
}

impl KubeClusterClient {
    /// Wrap an existing client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect using in-cluster config or the local kubeconfig.
    ///
    /// # Errors
    ///
    /// Returns an error if no configuration can be inferred.
    pub async fn try_default() -> Result<Self> {
        Ok(Self::new(Client::try_default().await?))
    }

    fn api<K: ClusterObject>(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

/// Map API server errors onto the engine's taxonomy.
fn map_api_error<K: ClusterObject>(err: kube::Error, namespace: &str, name: &str) -> BuildError {
    let kind = K::kind(&()).to_string();
    match err {
        kube::Error::Api(ref e) if e.code == 404 => BuildError::NotFound {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        },
        kube::Error::Api(ref e) if e.code == 409 && e.reason == "AlreadyExists" => {
            BuildError::AlreadyExists {
                kind,
                namespace: namespace.to_string(),
                name: name.to_string(),
            }
        }
        kube::Error::Api(ref e) if e.code == 400 || e.code == 422 => BuildError::Rejected {
            kind,
            name: name.to_string(),
            message: e.message.clone(),
        },
        other => BuildError::Kube(other),
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn create<K: ClusterObject>(&self, object: &K) -> Result<K> {
        let (namespace, name) = object_identity(object)?;
        debug!(kind = %K::kind(&()), namespace, name, "Creating object");
        self.api::<K>(&namespace)
            .create(&PostParams::default(), object)
            .await
            .map_err(|e| map_api_error::<K>(e, &namespace, &name))
    }

    async fn get<K: ClusterObject>(&self, namespace: &str, name: &str) -> Result<K> {
        self.api::<K>(namespace)
            .get(name)
            .await
            .map_err(|e| map_api_error::<K>(e, namespace, name))
    }

    async fn update<K: ClusterObject>(&self, object: &K) -> Result<K> {
        let (namespace, name) = object_identity(object)?;
        self.api::<K>(&namespace)
            .replace(&name, &PostParams::default(), object)
            .await
            .map_err(|e| map_api_error::<K>(e, &namespace, &name))
    }

    async fn update_status<K: ClusterObject>(&self, object: &K) -> Result<K> {
        let (namespace, name) = object_identity(object)?;
        let value = serde_json::to_value(object)?;
        let patch = json!({ "status": value.get("status") });

        self.api::<K>(&namespace)
            .patch_status(&name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch))
            .await
            .map_err(|e| map_api_error::<K>(e, &namespace, &name))
    }

    async fn delete<K: ClusterObject>(&self, namespace: &str, name: &str) -> Result<()> {
        self.api::<K>(namespace)
            .delete(name, &DeleteParams::background())
            .await
            .map(|_| ())
            .map_err(|e| map_api_error::<K>(e, namespace, name))
    }
}
