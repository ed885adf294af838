//! Metadata shared by every object derived from a build.

use std::collections::BTreeMap;

use container_builder_api::ContainerBuild;
use kube::api::ObjectMeta;
use kube::{Resource, ResourceExt};

/// Label marking objects created by this engine.
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Value of [`MANAGED_BY_LABEL`].
pub const MANAGED_BY: &str = "container-builder";

/// Label carrying the owning build's name.
pub const BUILD_LABEL: &str = "container-builder.io/build";

/// Labels identifying objects that belong to `build_name`.
#[must_use]
pub fn build_labels(build_name: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(MANAGED_BY_LABEL.to_string(), MANAGED_BY.to_string());
    labels.insert(BUILD_LABEL.to_string(), build_name.to_string());
    labels
}

/// Metadata for an object named `name` owned by `build`.
///
/// The controller owner reference is only set once the build has a UID,
/// i.e. after it was persisted.
pub(crate) fn owned_metadata(build: &ContainerBuild, name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: build.namespace(),
        labels: Some(build_labels(&build.name_any())),
        owner_references: build.controller_owner_ref(&()).map(|owner| vec![owner]),
        ..Default::default()
    }
}
