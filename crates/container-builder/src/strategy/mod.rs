//! Build strategies: where a build executes.
//!
//! Every supported (build strategy, publish strategy) pair maps to a
//! [`Realization`]. Unmapped pairs are rejected when the pair is selected,
//! which happens before a build record is ever persisted.

mod pod;

use container_builder_api::{BuildStrategy, ContainerBuild, PublishStrategy, WorkloadReference};
use tracing::{info, warn};

use crate::client::{ClusterClient, ClusterObject};
use crate::{BuildError, Result};

pub use pod::{build_pod, pod_state};

/// Observed state of a build's workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkloadState {
    /// The workload does not exist.
    Missing,
    /// The workload exists but has not started running.
    NotStarted,
    /// The workload is running the build.
    Running,
    /// The build completed successfully.
    Succeeded,
    /// The build ran and failed.
    Failed(String),
    /// The workload cannot start, e.g. its image cannot be pulled.
    Faulted(String),
}

/// A validated pairing of execution substrate and publish backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Realization {
    build: BuildStrategy,
    publish: PublishStrategy,
}

impl Realization {
    /// Select the realization for a strategy pair.
    ///
    /// # Errors
    ///
    /// Returns `BuildError::UnsupportedStrategy` for pairs without a
    /// workload factory.
    pub fn select(build: BuildStrategy, publish: PublishStrategy) -> Result<Self> {
        match (build, publish) {
            (BuildStrategy::Pod, PublishStrategy::Kaniko | PublishStrategy::Buildah) => {
                Ok(Self { build, publish })
            }
            (BuildStrategy::Routine, _) => Err(BuildError::UnsupportedStrategy { build, publish }),
        }
    }

    /// Select the realization recorded in a build's spec.
    ///
    /// # Errors
    ///
    /// Returns `BuildError::UnsupportedStrategy` for pairs without a
    /// workload factory.
    pub fn for_build(build: &ContainerBuild) -> Result<Self> {
        Self::select(build.spec.strategy, build.spec.publish_strategy)
    }

    /// The execution substrate.
    #[must_use]
    pub const fn build_strategy(&self) -> BuildStrategy {
        self.build
    }

    /// The publish backend.
    #[must_use]
    pub const fn publish_strategy(&self) -> PublishStrategy {
        self.publish
    }

    /// Create the workload for `build`, adopting one that already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if materialization or creation fails for any reason
    /// other than the objects already existing.
    pub async fn create_workload<C: ClusterClient>(
        &self,
        client: &C,
        build: &ContainerBuild,
    ) -> Result<WorkloadReference> {
        match self.build {
            BuildStrategy::Pod => pod::create(client, build).await,
            BuildStrategy::Routine => Err(self.unsupported()),
        }
    }

    /// Observe the workload of `build`.
    ///
    /// # Errors
    ///
    /// Returns an error if the workload cannot be read.
    pub async fn observe<C: ClusterClient>(
        &self,
        client: &C,
        build: &ContainerBuild,
    ) -> Result<WorkloadState> {
        match self.build {
            BuildStrategy::Pod => pod::observe(client, build).await,
            BuildStrategy::Routine => Err(self.unsupported()),
        }
    }

    /// Delete the workload of a terminal build. Failures are logged.
    pub async fn cleanup<C: ClusterClient>(&self, client: &C, build: &ContainerBuild) {
        match self.build {
            BuildStrategy::Pod => pod::cleanup(client, build).await,
            BuildStrategy::Routine => {}
        }
    }

    fn unsupported(&self) -> BuildError {
        BuildError::UnsupportedStrategy {
            build: self.build,
            publish: self.publish,
        }
    }
}

/// Create `object`, treating an existing object with the same identity as
/// success. Callers must re-fetch by name rather than rely on the result.
pub(crate) async fn create_or_adopt<C: ClusterClient, K: ClusterObject>(
    client: &C,
    object: &K,
) -> Result<()> {
    let kind = K::kind(&());
    let name = object.meta().name.as_deref().unwrap_or_default();

    match client.create(object).await {
        Ok(_) => {
            info!(kind = %kind, name, "Created build object");
            Ok(())
        }
        Err(e) if e.is_already_exists() => {
            warn!(kind = %kind, name, "Build object already exists, adopting it");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Delete an object, treating absence as success. Failures are logged.
pub(crate) async fn delete_quietly<C: ClusterClient, K: ClusterObject>(
    client: &C,
    namespace: &str,
    name: &str,
) {
    let kind = K::kind(&());
    match client.delete::<K>(namespace, name).await {
        Ok(()) => info!(kind = %kind, namespace, name, "Deleted build object"),
        Err(e) if e.is_not_found() => {}
        Err(e) => warn!(kind = %kind, namespace, name, error = %e, "Failed to delete build object"),
    }
}
