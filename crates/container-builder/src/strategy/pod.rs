//! Pod build strategy: the build runs as a single never-restarting pod.

use container_builder_api::{names, ContainerBuild, WorkloadReference};
use k8s_openapi::api::core::v1::{ConfigMap, Container, Pod, PodSpec, SecurityContext};
use kube::ResourceExt;
use tracing::debug;

use super::{create_or_adopt, delete_quietly, WorkloadState};
use crate::bundle::{context_object, workspace_mount, workspace_volume};
use crate::client::ClusterClient;
use crate::meta::owned_metadata;
use crate::publish::{build_tool, BuildTool};
use crate::Result;

/// Name of the build container.
const BUILDER_CONTAINER: &str = "builder";

/// Kind recorded in the workload reference.
const POD_KIND: &str = "Pod";

/// Waiting reasons after which the container will never start on its own.
const FATAL_WAITING_REASONS: [&str; 5] = [
    "ErrImagePull",
    "ImagePullBackOff",
    "InvalidImageName",
    "CreateContainerConfigError",
    "CreateContainerError",
];

/// Build the pod that runs `tool` against `build`'s workspace.
#[must_use]
pub fn build_pod(build: &ContainerBuild, tool: BuildTool) -> Pod {
    let pod_name = names::workload_name(&build.name_any());

    Pod {
        metadata: owned_metadata(build, &pod_name),
        spec: Some(PodSpec {
            containers: vec![build_container(build, tool)],
            volumes: Some(vec![workspace_volume(build)]),
            restart_policy: Some("Never".to_string()),
            active_deadline_seconds: build
                .spec
                .timeout_seconds
                .and_then(|secs| i64::try_from(secs).ok()),
            service_account_name: build.spec.service_account.clone(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn build_container(build: &ContainerBuild, tool: BuildTool) -> Container {
    Container {
        name: BUILDER_CONTAINER.to_string(),
        image: Some(tool.image),
        command: (!tool.command.is_empty()).then_some(tool.command),
        args: Some(tool.args),
        env: (!tool.env.is_empty()).then_some(tool.env),
        volume_mounts: Some(vec![workspace_mount(build)]),
        security_context: tool.privileged.then(|| SecurityContext {
            privileged: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Map an observed pod to a workload state.
#[must_use]
pub fn pod_state(pod: &Pod) -> WorkloadState {
    let Some(status) = pod.status.as_ref() else {
        return WorkloadState::NotStarted;
    };

    for cs in status.container_statuses.iter().flatten() {
        let Some(waiting) = cs.state.as_ref().and_then(|s| s.waiting.as_ref()) else {
            continue;
        };
        if let Some(reason) = &waiting.reason {
            if FATAL_WAITING_REASONS.contains(&reason.as_str()) {
                let msg = waiting
                    .message
                    .as_ref()
                    .map_or_else(|| reason.clone(), |m| format!("{reason}: {m}"));
                return WorkloadState::Faulted(msg);
            }
        }
    }

    match status.phase.as_deref() {
        Some("Running") => WorkloadState::Running,
        Some("Succeeded") => WorkloadState::Succeeded,
        Some("Failed") => WorkloadState::Failed(failure_message(pod)),
        _ => WorkloadState::NotStarted,
    }
}

fn failure_message(pod: &Pod) -> String {
    let Some(status) = pod.status.as_ref() else {
        return "build pod failed".to_string();
    };

    let terminated = status
        .container_statuses
        .iter()
        .flatten()
        .filter_map(|cs| cs.state.as_ref().and_then(|s| s.terminated.as_ref()))
        .find(|t| t.exit_code != 0);

    if let Some(t) = terminated {
        return t
            .message
            .clone()
            .or_else(|| t.reason.clone())
            .unwrap_or_else(|| format!("build exited with code {}", t.exit_code));
    }

    status
        .message
        .clone()
        .or_else(|| status.reason.clone())
        .unwrap_or_else(|| "build pod failed".to_string())
}

pub(super) async fn create<C: ClusterClient>(
    client: &C,
    build: &ContainerBuild,
) -> Result<WorkloadReference> {
    let namespace = build.namespace().unwrap_or_default();
    let pod_name = names::workload_name(&build.name_any());

    create_or_adopt(client, &context_object(build)?).await?;
    create_or_adopt(client, &build_pod(build, build_tool(build))).await?;

    let pod: Pod = client.get(&namespace, &pod_name).await?;
    debug!(
        namespace = %namespace,
        pod = %pod_name,
        uid = ?pod.metadata.uid,
        "Build pod present"
    );

    Ok(WorkloadReference {
        kind: POD_KIND.to_string(),
        name: pod.name_any(),
    })
}

pub(super) async fn observe<C: ClusterClient>(
    client: &C,
    build: &ContainerBuild,
) -> Result<WorkloadState> {
    let namespace = build.namespace().unwrap_or_default();
    let pod_name = names::workload_name(&build.name_any());

    match client.get::<Pod>(&namespace, &pod_name).await {
        Ok(pod) => Ok(pod_state(&pod)),
        Err(e) if e.is_not_found() => Ok(WorkloadState::Missing),
        Err(e) => Err(e),
    }
}

pub(super) async fn cleanup<C: ClusterClient>(client: &C, build: &ContainerBuild) {
    let namespace = build.namespace().unwrap_or_default();
    let name = build.name_any();

    delete_quietly::<C, Pod>(client, &namespace, &names::workload_name(&name)).await;
    delete_quietly::<C, ConfigMap>(client, &namespace, &names::context_name(&name)).await;
}
