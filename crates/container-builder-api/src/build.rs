//! The persisted build record.
//!
//! A [`ContainerBuild`] has a write-once spec, fixed when the build is
//! scheduled, and a status owned exclusively by the reconciler.

use std::time::Duration;

use chrono::{DateTime, Utc};
use k8s_openapi::ByteString;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

use crate::phase::ContainerBuildPhase;
use crate::platform::PlatformContainerBuild;
use crate::strategy::{BuildStrategy, PublishStrategy};

/// Immutable description of one image build.
#[derive(CustomResource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[kube(
    group = "container-builder.io",
    version = "v1alpha1",
    kind = "ContainerBuild",
    plural = "containerbuilds",
    shortname = "cbuild",
    namespaced,
    status = "ContainerBuildStatus",
    derive = "PartialEq",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct ContainerBuildSpec {
    /// Where the build executes.
    pub strategy: BuildStrategy,
    /// Which tool builds and pushes the image.
    pub publish_strategy: PublishStrategy,
    /// Build deadline in seconds, measured from workload creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    /// Final image reference.
    pub image: String,
    /// Snapshot of the owning platform at schedule time.
    pub platform: PlatformContainerBuild,
    /// Image of the build tool selected by the publish strategy.
    pub tool_image: String,
    /// Path inside the workload where the resource bundle is mounted.
    pub workspace_path: String,
    /// Service account the workload runs as.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account: Option<String>,
    /// Build context files, sorted by name.
    pub resources: Vec<BuildResource>,
}

/// One named file of the build context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildResource {
    /// Relative path of the file inside the build context.
    pub name: String,
    /// Raw file content.
    pub content: ByteString,
}

/// Mutable state of a build, replaced as a whole on every transition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerBuildStatus {
    /// Current lifecycle phase.
    #[serde(default)]
    pub phase: ContainerBuildPhase,
    /// Human-readable reason for `Error`, `Failed` or `Interrupted`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The workload realizing this build, once created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workload: Option<WorkloadReference>,
    /// When the workload was created (entry into `Pending`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the current phase was entered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_at: Option<DateTime<Utc>>,
    /// When a terminal phase was entered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Reference to the cluster object executing a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadReference {
    /// Object kind, e.g. `Pod`.
    pub kind: String,
    /// Object name in the build's namespace.
    pub name: String,
}

impl ContainerBuildSpec {
    /// The build deadline, if one is configured.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds.map(Duration::from_secs)
    }
}

impl ContainerBuild {
    /// Current phase; a record without status is still `Scheduling`.
    #[must_use]
    pub fn phase(&self) -> ContainerBuildPhase {
        self.status
            .as_ref()
            .map(|s| s.phase)
            .unwrap_or_default()
    }

    /// Check whether the build's deadline has passed at `now`.
    ///
    /// Builds without a timeout or without a workload never time out.
    #[must_use]
    pub fn deadline_exceeded(&self, now: DateTime<Utc>) -> bool {
        let Some(timeout) = self.spec.timeout() else {
            return false;
        };
        let Some(started_at) = self.status.as_ref().and_then(|s| s.started_at) else {
            return false;
        };

        now.signed_duration_since(started_at)
            .to_std()
            .is_ok_and(|elapsed| elapsed > timeout)
    }
}
