//! Fluent entry point for scheduling and reconciling builds.
//!
//! ```ignore
//! let build = ContainerBuilder::new(info)
//!     .with_client(&client)
//!     .with_resource("Dockerfile", dockerfile)
//!     .schedule()
//!     .await?;
//!
//! let build = ContainerBuilder::from_build(build)
//!     .with_client(&client)
//!     .reconcile()
//!     .await?;
//! ```

use container_builder_api::{
    names, ContainerBuild, ContainerBuildSpec, ContainerBuildStatus, PlatformContainerBuild,
};
use tracing::{info, warn};

use crate::bundle::ResourceBundle;
use crate::client::{object_identity, ClusterClient};
use crate::config::BuilderConfig;
use crate::meta::build_labels;
use crate::publish::{destination, tool_image, validate_image};
use crate::reconciler::Reconciler;
use crate::strategy::Realization;
use crate::{BuildError, Result};

/// What to build and for which platform.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerBuilderInfo {
    /// Image reference the build publishes.
    pub final_image_name: String,
    /// Caller-chosen name, unique per build within the platform namespace.
    pub build_unique_name: String,
    /// Platform supplying strategies, timeout and registry settings.
    pub platform: PlatformContainerBuild,
}

#[derive(Debug, Clone)]
enum Source {
    New(ContainerBuilderInfo),
    Existing(Box<ContainerBuild>),
}

/// Accumulates a build description, then schedules or reconciles it.
///
/// Each `with_*` call consumes the builder and returns it, so a builder is
/// never shared between chains.
pub struct ContainerBuilder<'c, C: ClusterClient> {
    source: Source,
    client: Option<&'c C>,
    resources: ResourceBundle,
    config: BuilderConfig,
}

impl<'c, C: ClusterClient> ContainerBuilder<'c, C> {
    /// Start describing a new build.
    #[must_use]
    pub fn new(info: ContainerBuilderInfo) -> Self {
        Self {
            source: Source::New(info),
            client: None,
            resources: ResourceBundle::new(),
            config: BuilderConfig::default(),
        }
    }

    /// Resume from a stored build record.
    ///
    /// The record is trusted as-is; resources and configuration added
    /// afterwards are ignored.
    #[must_use]
    pub fn from_build(build: ContainerBuild) -> Self {
        Self {
            source: Source::Existing(Box::new(build)),
            client: None,
            resources: ResourceBundle::new(),
            config: BuilderConfig::default(),
        }
    }

    /// Attach the cluster client used by `schedule` and `reconcile`.
    #[must_use]
    pub fn with_client(mut self, client: &'c C) -> Self {
        self.client = Some(client);
        self
    }

    /// Add a file to the build context. A repeated name replaces the
    /// earlier content.
    #[must_use]
    pub fn with_resource(mut self, name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        let name = name.into();
        if self.resources.insert(name.clone(), content).is_some() {
            warn!(resource = %name, "Replacing build resource");
        }
        self
    }

    /// Override the engine configuration.
    #[must_use]
    pub fn with_config(mut self, config: BuilderConfig) -> Self {
        self.config = config;
        self
    }

    /// The build record `schedule` would persist.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a required field is missing, the
    /// image reference or timeout is malformed, the strategy pair is
    /// unsupported or the resource bundle is invalid.
    pub fn descriptor(&self) -> Result<ContainerBuild> {
        let info = match &self.source {
            Source::New(info) => info,
            Source::Existing(build) => return Ok(build.as_ref().clone()),
        };

        if info.final_image_name.trim().is_empty() {
            return Err(BuildError::Config("final image name is required".to_string()));
        }
        if info.build_unique_name.trim().is_empty() {
            return Err(BuildError::Config("build unique name is required".to_string()));
        }
        if info.platform.namespace.trim().is_empty() {
            return Err(BuildError::Config("platform namespace is required".to_string()));
        }

        let name = names::build_name(&info.build_unique_name)?;
        let platform = &info.platform.spec;
        if platform.timeout_seconds == Some(0) {
            return Err(BuildError::Config("build timeout must be positive".to_string()));
        }
        validate_image(&info.final_image_name)?;
        validate_image(&destination(&info.final_image_name, &platform.registry))?;
        Realization::select(platform.build_strategy, platform.publish_strategy)?;
        self.resources.validate()?;

        let spec = ContainerBuildSpec {
            strategy: platform.build_strategy,
            publish_strategy: platform.publish_strategy,
            timeout_seconds: platform.timeout_seconds,
            image: info.final_image_name.clone(),
            platform: info.platform.clone(),
            tool_image: tool_image(platform.publish_strategy, &self.config),
            workspace_path: self.config.workspace_path.clone(),
            service_account: self.config.service_account.clone(),
            resources: self.resources.clone().into_resources(),
        };

        let mut build = ContainerBuild::new(&name, spec);
        build.metadata.namespace = Some(info.platform.namespace.clone());
        build.metadata.labels = Some(build_labels(&name));
        build.status = Some(ContainerBuildStatus::default());
        Ok(build)
    }

    /// Persist the build record in phase `Scheduling`.
    ///
    /// No workload is created here; that happens on the first reconcile.
    /// Scheduling an equivalent build again returns the stored record.
    ///
    /// # Errors
    ///
    /// Returns a configuration error before any cluster call if the build
    /// is invalid or no client is attached, `BuildError::Conflict` if a
    /// different build with the same name exists, or the cluster error.
    pub async fn schedule(self) -> Result<ContainerBuild> {
        let build = self.descriptor()?;
        let client = self.client.ok_or(BuildError::MissingClient("schedule"))?;
        let (namespace, name) = object_identity(&build)?;

        match client.create(&build).await {
            Ok(created) => {
                info!(
                    build = %name,
                    namespace = %namespace,
                    image = %build.spec.image,
                    strategy = %build.spec.strategy,
                    publish_strategy = %build.spec.publish_strategy,
                    "Build scheduled"
                );
                Ok(created)
            }
            Err(e) if e.is_already_exists() => {
                let existing: ContainerBuild = client.get(&namespace, &name).await?;
                if existing.spec == build.spec {
                    info!(build = %name, namespace = %namespace, "Build already scheduled");
                    Ok(existing)
                } else {
                    Err(BuildError::Conflict(name))
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Advance the build by one reconcile step.
    ///
    /// A builder created with [`ContainerBuilder::new`] first loads the
    /// stored record by its derived name.
    ///
    /// # Errors
    ///
    /// Returns `BuildError::MissingClient` without a client, or any error
    /// from loading or reconciling the record.
    pub async fn reconcile(self) -> Result<ContainerBuild> {
        let client = self.client.ok_or(BuildError::MissingClient("reconcile"))?;

        let build = match self.source {
            Source::Existing(build) => *build,
            Source::New(info) => {
                let name = names::build_name(&info.build_unique_name)?;
                client.get(&info.platform.namespace, &name).await?
            }
        };

        Reconciler::new(client).reconcile(build).await
    }
}
