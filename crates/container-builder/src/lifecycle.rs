//! Build phase state machine.
//!
//! # State Machine
//!
//! ```text
//!   Scheduling ──▶ Pending ──▶ Building ──▶ Succeeded
//!       │             │           │
//!       │             ├───────────┴──▶ Failed | Interrupted
//!       │             │           │
//!       └─────────────┴───────────┴──▶ Error
//! ```
//!
//! Succeeded, Error, Failed and Interrupted are terminal.

use container_builder_api::ContainerBuildPhase;

use crate::{BuildError, Result};

/// Validates a phase transition and returns the target phase if valid.
///
/// # Errors
///
/// Returns `BuildError::InvalidTransition` if the transition is not allowed.
pub fn validate_transition(
    build: &str,
    from: ContainerBuildPhase,
    to: ContainerBuildPhase,
) -> Result<ContainerBuildPhase> {
    if is_valid_transition(from, to) {
        Ok(to)
    } else {
        Err(BuildError::InvalidTransition {
            build: build.to_string(),
            from,
            to,
        })
    }
}

/// Check if a phase transition is valid according to the state machine.
#[must_use]
pub const fn is_valid_transition(from: ContainerBuildPhase, to: ContainerBuildPhase) -> bool {
    use ContainerBuildPhase::{Building, Error, Failed, Interrupted, Pending, Scheduling, Succeeded};

    matches!(
        (from, to),
        (Scheduling, Pending | Error)
            | (Pending, Building | Error | Failed | Interrupted)
            | (Building, Succeeded | Error | Failed | Interrupted)
    )
}

/// Returns the list of valid target phases from the given phase.
#[must_use]
pub fn valid_transitions_from(phase: ContainerBuildPhase) -> Vec<ContainerBuildPhase> {
    use ContainerBuildPhase::{Building, Error, Failed, Interrupted, Pending, Scheduling, Succeeded};

    match phase {
        Scheduling => vec![Pending, Error],
        Pending => vec![Building, Error, Failed, Interrupted],
        Building => vec![Succeeded, Error, Failed, Interrupted],
        Succeeded | Error | Failed | Interrupted => Vec::new(),
    }
}
