//! The reconciler: advances a build's phase from observed cluster state.
//!
//! Reconciliation is a single externally driven step. It never waits for
//! the workload to change; callers re-invoke it on their own schedule, from
//! a poll loop or a watch. Every step is safe to repeat after a partial
//! failure:
//!
//! - `Scheduling` creates the context object and the workload, adopting
//!   either if a previous attempt already created it.
//! - `Pending` and `Building` read the workload and map its state.
//! - Terminal phases return the record untouched without any cluster call.
//!
//! The status is persisted only when it changed. A transient cluster error
//! is returned as-is and leaves the persisted phase where it was.

use chrono::{DateTime, Utc};
use container_builder_api::{
    ContainerBuild, ContainerBuildPhase, ContainerBuildStatus, WorkloadCleanup,
};
use kube::ResourceExt;
use tracing::{debug, info, warn};

use crate::client::ClusterClient;
use crate::lifecycle::validate_transition;
use crate::strategy::{Realization, WorkloadState};
use crate::{BuildError, Result};

/// Advances builds through their lifecycle using a cluster client.
pub struct Reconciler<'a, C: ClusterClient> {
    client: &'a C,
}

impl<'a, C: ClusterClient> Reconciler<'a, C> {
    /// Create a reconciler using `client`.
    #[must_use]
    pub const fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Advance `build` by one step.
    ///
    /// # Errors
    ///
    /// Returns an error if a cluster call fails transiently. The stored
    /// record is unchanged in that case and the call may be retried.
    pub async fn reconcile(&self, build: ContainerBuild) -> Result<ContainerBuild> {
        self.reconcile_at(build, Utc::now()).await
    }

    /// Advance `build` by one step, evaluating the timeout at `now`.
    ///
    /// # Errors
    ///
    /// See [`Reconciler::reconcile`].
    pub async fn reconcile_at(
        &self,
        build: ContainerBuild,
        now: DateTime<Utc>,
    ) -> Result<ContainerBuild> {
        let name = build.name_any();
        let phase = build.phase();

        if phase.is_terminal() {
            debug!(build = %name, phase = %phase, "Build is terminal, nothing to do");
            return Ok(build);
        }

        let mut status = build.status.clone().unwrap_or_default();

        if phase.is_active() && build.deadline_exceeded(now) {
            let timeout = build.spec.timeout_seconds.unwrap_or_default();
            transition(
                &name,
                &mut status,
                ContainerBuildPhase::Interrupted,
                Some(format!("build exceeded its timeout of {timeout}s")),
                now,
            )?;
        } else if phase == ContainerBuildPhase::Scheduling {
            self.create_workload(&build, &mut status, now).await?;
        } else {
            self.observe_workload(&build, &mut status, now).await?;
        }

        if build.status.as_ref() == Some(&status) {
            debug!(build = %name, phase = %phase, "Build unchanged");
            return Ok(build);
        }

        let mut updated = build;
        updated.status = Some(status);
        let stored = self.client.update_status(&updated).await?;

        if stored.phase().is_terminal()
            && stored.spec.platform.spec.cleanup == WorkloadCleanup::Delete
        {
            if let Ok(realization) = Realization::for_build(&stored) {
                realization.cleanup(self.client, &stored).await;
            }
        }

        Ok(stored)
    }

    async fn create_workload(
        &self,
        build: &ContainerBuild,
        status: &mut ContainerBuildStatus,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let name = build.name_any();
        let created = match Realization::for_build(build) {
            Ok(realization) => realization.create_workload(self.client, build).await,
            Err(e) => Err(e),
        };

        match created {
            Ok(workload) => {
                status.workload = Some(workload);
                status.started_at = Some(now);
                transition(&name, status, ContainerBuildPhase::Pending, None, now)
            }
            Err(e) if is_unrecoverable(&e) => {
                warn!(build = %name, error = %e, "Build workload cannot be created");
                transition(
                    &name,
                    status,
                    ContainerBuildPhase::Error,
                    Some(e.to_string()),
                    now,
                )
            }
            Err(e) => Err(e),
        }
    }

    async fn observe_workload(
        &self,
        build: &ContainerBuild,
        status: &mut ContainerBuildStatus,
        now: DateTime<Utc>,
    ) -> Result<()> {
        use ContainerBuildPhase::{Building, Error, Failed, Pending, Succeeded};

        let name = build.name_any();
        let observed = match Realization::for_build(build) {
            Ok(realization) => realization.observe(self.client, build).await,
            Err(e) => Err(e),
        };
        let state = match observed {
            Ok(state) => state,
            Err(e) if is_unrecoverable(&e) => {
                return transition(&name, status, Error, Some(e.to_string()), now);
            }
            Err(e) => return Err(e),
        };
        debug!(build = %name, state = ?state, "Observed build workload");

        match (status.phase, state) {
            (_, WorkloadState::Missing) => {
                let workload = status
                    .workload
                    .as_ref()
                    .map_or_else(|| "workload".to_string(), |w| format!("{} {}", w.kind, w.name));
                transition(
                    &name,
                    status,
                    Error,
                    Some(format!("{workload} no longer exists")),
                    now,
                )
            }
            (Pending, WorkloadState::Running | WorkloadState::Succeeded) => {
                transition(&name, status, Building, None, now)
            }
            (Building, WorkloadState::Succeeded) => {
                transition(&name, status, Succeeded, None, now)
            }
            (_, WorkloadState::Failed(message)) => {
                transition(&name, status, Failed, Some(message), now)
            }
            (_, WorkloadState::Faulted(message)) => {
                transition(&name, status, Error, Some(message), now)
            }
            _ => Ok(()),
        }
    }
}

/// Errors that no retry of the same step can fix.
fn is_unrecoverable(error: &BuildError) -> bool {
    error.is_configuration() || matches!(error, BuildError::Rejected { .. })
}

fn transition(
    build: &str,
    status: &mut ContainerBuildStatus,
    to: ContainerBuildPhase,
    error: Option<String>,
    now: DateTime<Utc>,
) -> Result<()> {
    let from = status.phase;
    validate_transition(build, from, to)?;

    status.phase = to;
    status.error = error;
    status.last_transition_at = Some(now);
    if to.is_terminal() {
        status.completed_at = Some(now);
    }

    match &status.error {
        Some(reason) => info!(build, from = %from, to = %to, reason = %reason, "Build phase changed"),
        None => info!(build, from = %from, to = %to, "Build phase changed"),
    }
    Ok(())
}
