//! Persisted data model for container image builds.
//!
//! This crate provides the types shared between the build engine and the
//! operator code that drives it:
//!
//! - **Build record**: the [`ContainerBuild`] custom resource, its immutable
//!   spec and reconciler-owned status
//! - **Phases**: the [`ContainerBuildPhase`] lifecycle
//! - **Strategies**: where a build runs ([`BuildStrategy`]) and which tool
//!   publishes the image ([`PublishStrategy`])
//! - **Platform**: the owning [`PlatformContainerBuild`] configuration
//! - **Naming**: deterministic names for records and derived objects
//!
//! # Example
//!
//! ```
//! use container_builder_api::names;
//!
//! let name = names::build_name("My Build_01").unwrap();
//! assert_eq!(name, "my-build-01");
//! assert_eq!(names::workload_name(&name), "my-build-01-builder");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod build;
pub mod error;
pub mod names;
pub mod phase;
pub mod platform;
pub mod strategy;

pub use build::{BuildResource, ContainerBuild, ContainerBuildSpec, ContainerBuildStatus, WorkloadReference};
pub use error::{ApiError, Result};
pub use phase::ContainerBuildPhase;
pub use platform::{
    KanikoOptions, PlatformContainerBuild, PlatformContainerBuildSpec, RegistrySpec,
    WorkloadCleanup,
};
pub use strategy::{BuildStrategy, PublishStrategy};
