//! Container image build engine for Kubernetes.
//!
//! This crate turns a build description into a persisted
//! [`ContainerBuild`](container_builder_api::ContainerBuild) record and
//! drives it to completion through a build workload. It handles:
//!
//! - Describing builds with the fluent [`ContainerBuilder`]
//! - Materializing the build context as a single projected volume
//! - Selecting the workload substrate and the publish tool (Kaniko, Buildah)
//! - Advancing build phases with the idempotent [`Reconciler`]
//!
//! The engine has no loop of its own. Callers re-invoke
//! [`ContainerBuilder::reconcile`] from a poll loop or a watch until the
//! build is terminal.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    ContainerBuilder                      │
//! │   new(info) ─ with_resource ─ schedule ─ reconcile       │
//! └──────────────────────────────────────────────────────────┘
//!                │                               │
//!                ▼                               ▼
//!       ┌─────────────────┐            ┌───────────────────┐
//!       │  ResourceBundle │            │    Reconciler     │
//!       └─────────────────┘            └───────────────────┘
//!                                                │
//!                               ┌────────────────┴──────────┐
//!                               ▼                           ▼
//!                      ┌─────────────────┐        ┌─────────────────┐
//!                      │   Realization   │───────▶│ Publish backend │
//!                      │   (Pod, ...)    │        │ (Kaniko, Buildah)│
//!                      └─────────────────┘        └─────────────────┘
//!                               │
//!                               ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │                  ClusterClient (kube)                    │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use container_builder::{ContainerBuilder, ContainerBuilderInfo, KubeClusterClient};
//! use container_builder_api::PlatformContainerBuild;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = KubeClusterClient::try_default().await?;
//!
//! let info = ContainerBuilderInfo {
//!     final_image_name: "quay.io/x/build:latest".to_string(),
//!     build_unique_name: "build1".to_string(),
//!     platform: PlatformContainerBuild::new("builds", "platform")
//!         .with_timeout(Duration::from_secs(300)),
//! };
//!
//! let build = ContainerBuilder::new(info)
//!     .with_client(&client)
//!     .with_resource("Dockerfile", b"FROM alpine".to_vec())
//!     .schedule()
//!     .await?;
//!
//! let build = ContainerBuilder::from_build(build)
//!     .with_client(&client)
//!     .reconcile()
//!     .await?;
//! println!("phase: {}", build.phase());
//! # Ok(())
//! # }
//! ```
//!
//! # Testing
//!
//! For testing without a cluster, enable the `test-utils` feature and use
//! the in-memory client:
//!
//! ```ignore
//! use container_builder::mock::InMemoryClient;
//!
//! let client = InMemoryClient::new();
//! let build = ContainerBuilder::new(info)
//!     .with_client(&client)
//!     .with_resource("Dockerfile", b"FROM alpine".to_vec())
//!     .schedule()
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod builder;
pub mod bundle;
pub mod client;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod meta;
pub mod publish;
pub mod reconciler;
pub mod strategy;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use builder::{ContainerBuilder, ContainerBuilderInfo};
pub use bundle::ResourceBundle;
pub use client::{ClusterClient, ClusterObject, KubeClusterClient};
pub use config::BuilderConfig;
pub use error::{BuildError, Result};
pub use reconciler::Reconciler;
pub use strategy::{Realization, WorkloadState};
