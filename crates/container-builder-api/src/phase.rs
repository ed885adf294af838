//! Lifecycle phases of a container build.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Phase of a build's lifecycle.
///
/// Only the reconciler moves a build between phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ContainerBuildPhase {
    /// Record persisted, workload not yet created.
    #[default]
    Scheduling,
    /// Workload created, not yet observed running.
    Pending,
    /// Workload observed actively running the build.
    Building,
    /// Workload completed and the image was published.
    Succeeded,
    /// Unrecoverable configuration or creation fault.
    Error,
    /// Workload ran and exited with a failure.
    Failed,
    /// Timeout exceeded or externally cancelled.
    Interrupted,
}

impl ContainerBuildPhase {
    /// Check if no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Error | Self::Failed | Self::Interrupted
        )
    }

    /// Check if a workload exists and is being observed.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Building)
    }

    /// The phase name as persisted.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduling => "Scheduling",
            Self::Pending => "Pending",
            Self::Building => "Building",
            Self::Succeeded => "Succeeded",
            Self::Error => "Error",
            Self::Failed => "Failed",
            Self::Interrupted => "Interrupted",
        }
    }
}

impl fmt::Display for ContainerBuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
