//! Job lifecycle error types.

use jobgrid_state::JobStatus;
use thiserror::Error;

/// Errors that can occur while managing jobs.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("job not found: {0}")]
    NotFound(String),

    #[error("job already exists: {0}")]
    Conflict(String),

    #[error("job {id}: illegal transition {from} -> {to}")]
    IllegalTransition {
        id: String,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("resolution error: {0}")]
    Resolve(#[from] jobgrid_resolver::ResolveError),

    #[error("state store error: {0}")]
    State(#[from] jobgrid_state::StateError),
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;
