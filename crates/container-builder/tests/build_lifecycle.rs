//! End-to-end build lifecycle against the in-memory cluster client.
//!
//! Run with:
//!   cargo test -p container-builder --test build_lifecycle

use std::time::Duration;

use chrono::{TimeDelta, Utc};
use container_builder::mock::{InMemoryClient, Operation};
use container_builder::{
    BuildError, ClusterClient, ContainerBuilder, ContainerBuilderInfo, Reconciler,
};
use container_builder_api::{
    names, BuildStrategy, ContainerBuild, ContainerBuildPhase, PlatformContainerBuild,
    PublishStrategy, WorkloadCleanup,
};
use k8s_openapi::api::core::v1::{ConfigMap, Pod, PodStatus};

const DOCKERFILE: &[u8] = include_bytes!("testdata/Dockerfile");
const WORKFLOW: &[u8] = include_bytes!("testdata/greetings.sw.json");

const NAMESPACE: &str = "test";

// =============================================================================
// Helpers
// =============================================================================

fn platform() -> PlatformContainerBuild {
    PlatformContainerBuild::new(NAMESPACE, "testPlatform")
        .with_build_strategy(BuildStrategy::Pod)
        .with_publish_strategy(PublishStrategy::Kaniko)
        .with_timeout(Duration::from_secs(5 * 60))
}

fn info(platform: PlatformContainerBuild) -> ContainerBuilderInfo {
    ContainerBuilderInfo {
        final_image_name: "quay.io/kiegroup/buildexample:latest".to_string(),
        build_unique_name: "build1".to_string(),
        platform,
    }
}

async fn schedule(
    client: &InMemoryClient,
    platform: PlatformContainerBuild,
) -> Result<ContainerBuild, BuildError> {
    ContainerBuilder::new(info(platform))
        .with_client(client)
        .with_resource("Dockerfile", DOCKERFILE)
        .with_resource("greetings.sw.json", WORKFLOW)
        .schedule()
        .await
}

async fn reconcile(client: &InMemoryClient, build: ContainerBuild) -> ContainerBuild {
    ContainerBuilder::from_build(build)
        .with_client(client)
        .reconcile()
        .await
        .unwrap()
}

fn set_pod_phase(client: &InMemoryClient, phase: &str) {
    client
        .modify::<Pod>(NAMESPACE, "build1-builder", |pod| {
            pod.status = Some(PodStatus {
                phase: Some(phase.to_string()),
                ..Default::default()
            });
        })
        .unwrap();
}

// =============================================================================
// Scheduling
// =============================================================================

#[tokio::test]
async fn schedule_then_reconcile_with_kaniko() {
    let client = InMemoryClient::new();

    let build = schedule(&client, platform()).await.unwrap();
    assert_eq!(build.phase(), ContainerBuildPhase::Scheduling);
    assert_eq!(build.spec.resources.len(), 2);
    assert_eq!(client.count::<Pod>(), 0);

    let build = reconcile(&client, build).await;
    assert_eq!(build.phase(), ContainerBuildPhase::Pending);

    let pod_name = names::workload_name(&names::build_name("build1").unwrap());
    let pod: Pod = client.get(NAMESPACE, &pod_name).await.unwrap();
    assert_eq!(pod_name, "build1-builder");
    assert_eq!(client.count::<Pod>(), 1);
    assert_eq!(
        pod.spec.as_ref().unwrap().volumes.as_ref().unwrap().len(),
        1
    );

    // The in-memory pod never starts on its own.
    let build = reconcile(&client, build).await;
    assert_eq!(build.phase(), ContainerBuildPhase::Pending);
    assert_eq!(client.count::<Pod>(), 1);
}

#[tokio::test]
async fn context_object_carries_testdata() {
    let client = InMemoryClient::new();
    let build = schedule(&client, platform()).await.unwrap();
    reconcile(&client, build).await;

    let context: ConfigMap = client.get(NAMESPACE, "build1-context").await.unwrap();
    let data = context.binary_data.unwrap();
    assert_eq!(data["Dockerfile"].0, DOCKERFILE);
    assert_eq!(data["greetings.sw.json"].0, WORKFLOW);
}

#[tokio::test]
async fn reschedule_is_idempotent() {
    let client = InMemoryClient::new();
    let first = schedule(&client, platform()).await.unwrap();
    let first = reconcile(&client, first).await;

    let again = schedule(&client, platform()).await.unwrap();

    assert_eq!(again.metadata.uid, first.metadata.uid);
    assert_eq!(again.phase(), ContainerBuildPhase::Pending);
    assert_eq!(client.count::<ContainerBuild>(), 1);
    assert_eq!(client.count::<Pod>(), 1);
}

#[tokio::test]
async fn routine_strategy_is_rejected_before_any_write() {
    let client = InMemoryClient::new();
    let platform = platform().with_build_strategy(BuildStrategy::Routine);

    let err = schedule(&client, platform).await.unwrap_err();

    assert!(matches!(err, BuildError::UnsupportedStrategy { .. }));
    assert_eq!(client.write_count(), 0);
    assert_eq!(client.read_count(), 0);
}

#[tokio::test]
async fn buildah_pod_runs_privileged() {
    let client = InMemoryClient::new();
    let platform = platform().with_publish_strategy(PublishStrategy::Buildah);

    let build = schedule(&client, platform).await.unwrap();
    reconcile(&client, build).await;

    let pod: Pod = client.get(NAMESPACE, "build1-builder").await.unwrap();
    let container = &pod.spec.unwrap().containers[0];
    assert_eq!(
        container.security_context.as_ref().and_then(|s| s.privileged),
        Some(true)
    );
}

// =============================================================================
// Reconciliation
// =============================================================================

#[tokio::test]
async fn successful_build_reaches_succeeded() {
    let client = InMemoryClient::new();
    let build = reconcile(&client, schedule(&client, platform()).await.unwrap()).await;

    set_pod_phase(&client, "Running");
    let build = reconcile(&client, build).await;
    assert_eq!(build.phase(), ContainerBuildPhase::Building);

    set_pod_phase(&client, "Succeeded");
    let build = reconcile(&client, build).await;
    assert_eq!(build.phase(), ContainerBuildPhase::Succeeded);

    let stored: ContainerBuild = client.get(NAMESPACE, "build1").await.unwrap();
    assert_eq!(stored.phase(), ContainerBuildPhase::Succeeded);
}

#[tokio::test]
async fn failed_pod_fails_build() {
    let client = InMemoryClient::new();
    let build = reconcile(&client, schedule(&client, platform()).await.unwrap()).await;

    set_pod_phase(&client, "Running");
    let build = reconcile(&client, build).await;

    client
        .modify::<Pod>(NAMESPACE, "build1-builder", |pod| {
            pod.status = Some(PodStatus {
                phase: Some("Failed".to_string()),
                message: Some("build step failed".to_string()),
                ..Default::default()
            });
        })
        .unwrap();
    let build = reconcile(&client, build).await;

    let status = build.status.unwrap();
    assert_eq!(status.phase, ContainerBuildPhase::Failed);
    assert_eq!(status.error.as_deref(), Some("build step failed"));
}

#[tokio::test]
async fn deleted_pod_is_error() {
    let client = InMemoryClient::new();
    let build = reconcile(&client, schedule(&client, platform()).await.unwrap()).await;

    client.remove::<Pod>(NAMESPACE, "build1-builder");
    let build = reconcile(&client, build).await;

    assert_eq!(build.phase(), ContainerBuildPhase::Error);
}

#[tokio::test]
async fn timeout_interrupts_build() {
    let client = InMemoryClient::new();
    let build = reconcile(&client, schedule(&client, platform()).await.unwrap()).await;

    let later = Utc::now() + TimeDelta::minutes(6);
    let build = Reconciler::new(&client).reconcile_at(build, later).await.unwrap();

    assert_eq!(build.phase(), ContainerBuildPhase::Interrupted);
}

#[tokio::test]
async fn terminal_build_is_left_alone() {
    let client = InMemoryClient::new();
    let build = reconcile(&client, schedule(&client, platform()).await.unwrap()).await;
    client.remove::<Pod>(NAMESPACE, "build1-builder");
    let build = reconcile(&client, build).await;
    assert!(build.phase().is_terminal());

    let reads = client.read_count();
    let writes = client.write_count();
    let again = reconcile(&client, build.clone()).await;

    assert_eq!(again, build);
    assert_eq!(client.read_count(), reads);
    assert_eq!(client.write_count(), writes);
}

#[tokio::test]
async fn transient_failure_keeps_phase() {
    let client = InMemoryClient::new();
    let build = schedule(&client, platform()).await.unwrap();

    client.fail_next(Operation::Create);
    let err = ContainerBuilder::from_build(build.clone())
        .with_client(&client)
        .reconcile()
        .await
        .unwrap_err();
    assert!(err.is_retriable());

    let stored: ContainerBuild = client.get(NAMESPACE, "build1").await.unwrap();
    assert_eq!(stored.phase(), ContainerBuildPhase::Scheduling);

    let build = reconcile(&client, build).await;
    assert_eq!(build.phase(), ContainerBuildPhase::Pending);
}

#[tokio::test]
async fn delete_policy_removes_workload() {
    let client = InMemoryClient::new();
    let mut platform = platform();
    platform.spec.cleanup = WorkloadCleanup::Delete;

    let build = reconcile(&client, schedule(&client, platform).await.unwrap()).await;
    set_pod_phase(&client, "Running");
    let build = reconcile(&client, build).await;
    set_pod_phase(&client, "Succeeded");
    let build = reconcile(&client, build).await;

    assert_eq!(build.phase(), ContainerBuildPhase::Succeeded);
    assert_eq!(client.count::<Pod>(), 0);
    assert_eq!(client.count::<ConfigMap>(), 0);
}

#[tokio::test]
async fn missing_client_is_a_configuration_error() {
    let err = ContainerBuilder::<InMemoryClient>::new(info(platform()))
        .with_resource("Dockerfile", DOCKERFILE)
        .schedule()
        .await
        .unwrap_err();

    assert!(err.is_configuration());
}
