//! Engine configuration.
//!
//! Values here are resolved when a build is scheduled and copied into the
//! build spec, so reconciliation never depends on the reconciling process's
//! environment.

use serde::{Deserialize, Serialize};

/// Default Kaniko executor image.
pub const DEFAULT_KANIKO_EXECUTOR_IMAGE: &str = "gcr.io/kaniko-project/executor:v1.23.2";

/// Default Buildah image.
pub const DEFAULT_BUILDAH_IMAGE: &str = "quay.io/buildah/stable:v1.37";

/// Default mount path of the build workspace inside the workload.
pub const DEFAULT_WORKSPACE_PATH: &str = "/workspace";

/// Configuration for the build engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderConfig {
    /// Image running the Kaniko executor.
    pub kaniko_executor_image: String,
    /// Image providing the `buildah` binary.
    pub buildah_image: String,
    /// Mount path of the single workspace volume.
    pub workspace_path: String,
    /// Service account for build workloads; `None` uses the namespace default.
    pub service_account: Option<String>,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            kaniko_executor_image: DEFAULT_KANIKO_EXECUTOR_IMAGE.to_string(),
            buildah_image: DEFAULT_BUILDAH_IMAGE.to_string(),
            workspace_path: DEFAULT_WORKSPACE_PATH.to_string(),
            service_account: None,
        }
    }
}

impl BuilderConfig {
    /// Load configuration from environment variables.
    ///
    /// Supported environment variables:
    /// - `KANIKO_EXECUTOR_IMAGE`: Kaniko executor image
    /// - `BUILDAH_IMAGE`: Buildah image
    /// - `BUILDER_WORKSPACE_PATH`: workspace mount path
    /// - `BUILDER_SERVICE_ACCOUNT`: service account for build workloads
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(val) = lookup("KANIKO_EXECUTOR_IMAGE") {
            config.kaniko_executor_image = val;
        }
        if let Some(val) = lookup("BUILDAH_IMAGE") {
            config.buildah_image = val;
        }
        if let Some(val) = lookup("BUILDER_WORKSPACE_PATH") {
            let trimmed = val.trim_end_matches('/');
            if val.starts_with('/') && !trimmed.is_empty() {
                config.workspace_path = trimmed.to_string();
            }
        }
        if let Some(val) = lookup("BUILDER_SERVICE_ACCOUNT") {
            if !val.is_empty() {
                config.service_account = Some(val);
            }
        }

        config
    }
}
