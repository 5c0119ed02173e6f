//! Error types for criteria resolution.

use jobgrid_state::StateError;

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("no matching cluster and command: {0}")]
    NoMatchingResource(String),

    #[error("state error: {0}")]
    State(#[from] StateError),
}

pub type ResolveResult<T> = Result<T, ResolveError>;
