//! Resource bundle: the build context files and their materialization.
//!
//! A bundle is assembled client-side while a build is described, copied
//! into the build spec, and materialized exactly once as an immutable
//! `ConfigMap` when the workload is created. The workload sees it through a
//! single projected volume that also carries registry credentials when the
//! platform designates a secret.

use std::collections::{BTreeMap, BTreeSet};

use container_builder_api::{names, BuildResource, ContainerBuild};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapProjection, KeyToPath, ProjectedVolumeSource, SecretProjection, Volume,
    VolumeMount, VolumeProjection,
};
use k8s_openapi::ByteString;
use kube::ResourceExt;

use crate::meta::owned_metadata;
use crate::{BuildError, Result};

/// Name of the file every build context must contain.
pub const DOCKERFILE: &str = "Dockerfile";

/// Upper bound on the summed size of all resources.
pub const MAX_BUNDLE_BYTES: usize = 1024 * 1024;

/// Directory under the workspace holding the build context.
pub const CONTEXT_DIR: &str = "context";

/// Directory under the workspace holding registry credentials.
pub const DOCKER_CONFIG_DIR: &str = ".docker";

/// Name of the single workspace volume.
pub const WORKSPACE_VOLUME: &str = "workspace";

/// Key of the credentials inside a `kubernetes.io/dockerconfigjson` secret.
const DOCKER_CONFIG_JSON_KEY: &str = ".dockerconfigjson";

/// Named byte blobs making up a build context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceBundle {
    resources: BTreeMap<String, Vec<u8>>,
}

impl ResourceBundle {
    /// Create an empty bundle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource, returning the content it replaced, if any.
    pub fn insert(&mut self, name: impl Into<String>, content: impl Into<Vec<u8>>) -> Option<Vec<u8>> {
        self.resources.insert(name.into(), content.into())
    }

    /// Content of a resource.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.resources.get(name).map(Vec::as_slice)
    }

    /// Number of resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Check whether the bundle is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Summed size of all resource contents.
    #[must_use]
    pub fn total_size(&self) -> usize {
        self.resources.values().map(Vec::len).sum()
    }

    /// Check that the bundle can be materialized.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the bundle is empty, lacks a
    /// Dockerfile, has an invalid or colliding name, or is too large.
    pub fn validate(&self) -> Result<()> {
        if self.resources.is_empty() {
            return Err(BuildError::Config(
                "build context has no resources".to_string(),
            ));
        }
        if !self.resources.contains_key(DOCKERFILE) {
            return Err(BuildError::Config(format!(
                "build context has no {DOCKERFILE}"
            )));
        }

        let mut keys = BTreeSet::new();
        for name in self.resources.keys() {
            validate_resource_name(name)?;
            if !keys.insert(context_key(name)) {
                return Err(BuildError::Config(format!(
                    "resource {name:?} collides with another resource once stored"
                )));
            }
        }

        let size = self.total_size();
        if size > MAX_BUNDLE_BYTES {
            return Err(BuildError::Config(format!(
                "build context is {size} bytes, limit is {MAX_BUNDLE_BYTES}"
            )));
        }
        Ok(())
    }

    /// Convert into the persisted form, sorted by name.
    #[must_use]
    pub fn into_resources(self) -> Vec<BuildResource> {
        self.resources
            .into_iter()
            .map(|(name, content)| BuildResource {
                name,
                content: ByteString(content),
            })
            .collect()
    }
}

impl From<&[BuildResource]> for ResourceBundle {
    fn from(resources: &[BuildResource]) -> Self {
        Self {
            resources: resources
                .iter()
                .map(|r| (r.name.clone(), r.content.0.clone()))
                .collect(),
        }
    }
}

/// Check a resource name is a safe relative path.
///
/// # Errors
///
/// Returns a configuration error for empty or absolute names and names
/// containing empty or `.` segments or segments starting with `..`.
/// Kubernetes reserves the `..` prefix for volume bookkeeping and refuses
/// it in ConfigMap keys and projected paths.
pub fn validate_resource_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(BuildError::Config("resource name is empty".to_string()));
    }
    if name.starts_with('/') {
        return Err(BuildError::Config(format!(
            "resource name {name:?} must be relative"
        )));
    }
    if name
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment.starts_with(".."))
    {
        return Err(BuildError::Config(format!(
            "resource name {name:?} has an empty, relative or reserved segment"
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'))
    {
        return Err(BuildError::Config(format!(
            "resource name {name:?} may only contain [A-Za-z0-9._-/]"
        )));
    }
    Ok(())
}

/// Key of a resource inside the context object.
#[must_use]
pub fn context_key(name: &str) -> String {
    name.replace('/', "_")
}

/// Absolute path of the build context inside the workload.
#[must_use]
pub fn context_dir(build: &ContainerBuild) -> String {
    format!("{}/{CONTEXT_DIR}", build.spec.workspace_path)
}

/// Absolute path of the registry credentials directory, if any are mounted.
#[must_use]
pub fn docker_config_dir(build: &ContainerBuild) -> Option<String> {
    build
        .spec
        .platform
        .spec
        .registry
        .secret
        .as_ref()
        .map(|_| format!("{}/{DOCKER_CONFIG_DIR}", build.spec.workspace_path))
}

/// Materialize the bundle as an immutable `ConfigMap`.
///
/// # Errors
///
/// Returns a configuration error if the persisted resources are invalid.
pub fn context_object(build: &ContainerBuild) -> Result<ConfigMap> {
    ResourceBundle::from(build.spec.resources.as_slice()).validate()?;

    let binary_data = build
        .spec
        .resources
        .iter()
        .map(|r| (context_key(&r.name), r.content.clone()))
        .collect();

    Ok(ConfigMap {
        metadata: owned_metadata(build, &names::context_name(&build.name_any())),
        binary_data: Some(binary_data),
        immutable: Some(true),
        ..Default::default()
    })
}

/// The single volume carrying the build context and credentials.
#[must_use]
pub fn workspace_volume(build: &ContainerBuild) -> Volume {
    let items = build
        .spec
        .resources
        .iter()
        .map(|r| KeyToPath {
            key: context_key(&r.name),
            path: format!("{CONTEXT_DIR}/{}", r.name),
            ..Default::default()
        })
        .collect();

    let mut sources = vec![VolumeProjection {
        config_map: Some(ConfigMapProjection {
            name: names::context_name(&build.name_any()),
            items: Some(items),
            ..Default::default()
        }),
        ..Default::default()
    }];

    if let Some(secret) = &build.spec.platform.spec.registry.secret {
        sources.push(VolumeProjection {
            secret: Some(SecretProjection {
                name: secret.clone(),
                items: Some(vec![KeyToPath {
                    key: DOCKER_CONFIG_JSON_KEY.to_string(),
                    path: format!("{DOCKER_CONFIG_DIR}/config.json"),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        });
    }

    Volume {
        name: WORKSPACE_VOLUME.to_string(),
        projected: Some(ProjectedVolumeSource {
            sources: Some(sources),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Mount of the workspace volume into the build container.
#[must_use]
pub fn workspace_mount(build: &ContainerBuild) -> VolumeMount {
    VolumeMount {
        name: WORKSPACE_VOLUME.to_string(),
        mount_path: build.spec.workspace_path.clone(),
        read_only: Some(true),
        ..Default::default()
    }
}
