//! Build and publish strategy selectors.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Execution substrate that performs a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BuildStrategy {
    /// A single-container pod in the platform namespace.
    #[default]
    Pod,
    /// An in-process build inside the operator. No workload factory exists
    /// for it, so builds requesting it are rejected when scheduled.
    Routine,
}

/// Tool that builds the image and pushes it to a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PublishStrategy {
    /// The Kaniko executor.
    #[default]
    Kaniko,
    /// Buildah `bud` followed by `push`.
    Buildah,
}

impl BuildStrategy {
    /// The strategy name as persisted.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pod => "pod",
            Self::Routine => "routine",
        }
    }
}

impl PublishStrategy {
    /// The strategy name as persisted.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Kaniko => "Kaniko",
            Self::Buildah => "Buildah",
        }
    }
}

impl fmt::Display for BuildStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for PublishStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildStrategy {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pod" => Ok(Self::Pod),
            "routine" => Ok(Self::Routine),
            _ => Err(ApiError::UnknownStrategy(s.to_string())),
        }
    }
}

impl FromStr for PublishStrategy {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "kaniko" => Ok(Self::Kaniko),
            "buildah" => Ok(Self::Buildah),
            _ => Err(ApiError::UnknownStrategy(s.to_string())),
        }
    }
}
