//! Platform configuration owning a set of builds.
//!
//! A snapshot of the platform is copied into every build spec when the build
//! is scheduled, so later edits to the platform never affect running builds.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::strategy::{BuildStrategy, PublishStrategy};

/// The platform a build belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformContainerBuild {
    /// Namespace where builds and their workloads live.
    pub namespace: String,
    /// Platform name.
    pub name: String,
    /// Build defaults for this platform.
    pub spec: PlatformContainerBuildSpec,
}

/// Build defaults supplied by a platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformContainerBuildSpec {
    /// Where builds execute.
    #[serde(default)]
    pub build_strategy: BuildStrategy,
    /// Which tool builds and pushes the image.
    #[serde(default)]
    pub publish_strategy: PublishStrategy,
    /// Build deadline in seconds. `None` disables deadline enforcement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    /// Target registry settings.
    #[serde(default)]
    pub registry: RegistrySpec,
    /// Kaniko-specific options.
    #[serde(default)]
    pub kaniko: KanikoOptions,
    /// What happens to the workload once a build is terminal.
    #[serde(default)]
    pub cleanup: WorkloadCleanup,
}

/// Registry the built image is pushed to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySpec {
    /// Registry host prefixed to image names that carry none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Name of a `kubernetes.io/dockerconfigjson` secret with push credentials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// Skip TLS verification against the registry.
    #[serde(default)]
    pub insecure: bool,
}

/// Kaniko executor options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KanikoOptions {
    /// Enable the remote layer cache.
    #[serde(default)]
    pub cache: bool,
}

/// Policy for the workload once a build reaches a terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum WorkloadCleanup {
    /// Leave the workload for inspection or external garbage collection.
    #[default]
    Retain,
    /// Delete the workload and its context object.
    Delete,
}

impl PlatformContainerBuild {
    /// Create a platform with default build settings.
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            spec: PlatformContainerBuildSpec::default(),
        }
    }

    /// Replace the build strategy.
    #[must_use]
    pub fn with_build_strategy(mut self, strategy: BuildStrategy) -> Self {
        self.spec.build_strategy = strategy;
        self
    }

    /// Replace the publish strategy.
    #[must_use]
    pub fn with_publish_strategy(mut self, strategy: PublishStrategy) -> Self {
        self.spec.publish_strategy = strategy;
        self
    }

    /// Set the build deadline, rounded up to whole seconds.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let seconds = timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0);
        self.spec.timeout_seconds = Some(seconds);
        self
    }
}

impl PlatformContainerBuildSpec {
    /// The build deadline, if one is configured.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds.map(Duration::from_secs)
    }
}
