//! Error types for the build engine.

use container_builder_api::{ApiError, BuildStrategy, ContainerBuildPhase, PublishStrategy};
use thiserror::Error;

/// Errors that can occur while scheduling or reconciling a build.
#[derive(Error, Debug)]
pub enum BuildError {
    /// A required builder input is missing or malformed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A name could not be turned into an object name.
    #[error("Invalid name: {0}")]
    InvalidName(#[from] ApiError),

    /// The builder was used without a cluster client.
    #[error("No cluster client attached; call with_client() before {0}()")]
    MissingClient(&'static str),

    /// No workload factory exists for the strategy pair.
    #[error("Build strategy {build} cannot publish with {publish}")]
    UnsupportedStrategy {
        /// Requested execution substrate.
        build: BuildStrategy,
        /// Requested publish backend.
        publish: PublishStrategy,
    },

    /// The reconciler attempted a transition the state machine forbids.
    #[error("Invalid phase transition for build {build}: {from} -> {to}")]
    InvalidTransition {
        /// The build being transitioned.
        build: String,
        /// The current phase.
        from: ContainerBuildPhase,
        /// The requested phase.
        to: ContainerBuildPhase,
    },

    /// An object with the same identity already exists.
    #[error("{kind} {namespace}/{name} already exists")]
    AlreadyExists {
        /// Object kind.
        kind: String,
        /// Object namespace.
        namespace: String,
        /// Object name.
        name: String,
    },

    /// The requested object does not exist.
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        /// Object kind.
        kind: String,
        /// Object namespace.
        namespace: String,
        /// Object name.
        name: String,
    },

    /// A build with the same name exists with a different spec.
    #[error("Build {0} already exists with a different spec")]
    Conflict(String),

    /// The cluster refused the object as invalid.
    #[error("Cluster rejected {kind} {name}: {message}")]
    Rejected {
        /// Object kind.
        kind: String,
        /// Object name.
        name: String,
        /// Message returned by the API server.
        message: String,
    },

    /// Kubernetes API error.
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Object (de)serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BuildError {
    /// Check if retrying the same call may succeed.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Kube(_))
    }

    /// Check if this error was detected before any cluster interaction.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::InvalidName(_)
                | Self::MissingClient(_)
                | Self::UnsupportedStrategy { .. }
        )
    }

    /// Check if this is an `AlreadyExists` error.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Check if this is a `NotFound` error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// A specialized Result type for build operations.
pub type Result<T> = std::result::Result<T, BuildError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classification() {
        let unsupported = BuildError::UnsupportedStrategy {
            build: BuildStrategy::Routine,
            publish: PublishStrategy::Kaniko,
        };
        assert!(unsupported.is_configuration());
        assert!(!unsupported.is_retriable());
        assert_eq!(
            unsupported.to_string(),
            "Build strategy routine cannot publish with Kaniko"
        );

        let missing = BuildError::MissingClient("schedule");
        assert!(missing.is_configuration());

        let exists = BuildError::AlreadyExists {
            kind: "Pod".to_string(),
            namespace: "test".to_string(),
            name: "build1-builder".to_string(),
        };
        assert!(exists.is_already_exists());
        assert!(!exists.is_configuration());
        assert_eq!(exists.to_string(), "Pod test/build1-builder already exists");
    }
}
