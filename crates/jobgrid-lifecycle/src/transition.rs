//! Legal job status transitions.

use jobgrid_state::JobStatus;

use crate::error::{LifecycleError, LifecycleResult};

/// `true` if a job may move from `from` to `to`. Self-transitions are not
/// transitions and are rejected.
pub fn can_transition(from: JobStatus, to: JobStatus) -> bool {
    use JobStatus::*;
    if from.is_terminal() {
        return false;
    }
    matches!(
        (from, to),
        (Init, Running | Failed | Killed) | (Running, Succeeded | Failed | Killed)
    )
}

pub fn check_transition(id: &str, from: JobStatus, to: JobStatus) -> LifecycleResult<()> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(LifecycleError::IllegalTransition {
            id: id.to_string(),
            from,
            to,
        })
    }
}
