//! JobGrid criteria resolver: tiered tag matching.
//!
//! Given a job's ordered cluster criteria and its command criteria, picks
//! exactly one UP cluster and one command registered on it. Resolution is
//! read-only: it never touches job state.
//!
//! # Components
//!
//! - **`matcher`**: Superset matching and candidate ranking
//! - **`snapshot`**: Point-in-time view of clusters and commands
//! - **`resolver`**: Tier walk and the store-backed [`Resolver`]

pub mod error;
pub mod matcher;
pub mod resolver;
pub mod snapshot;

pub use error::{ResolveError, ResolveResult};
pub use matcher::{Candidate, first_matching_command, is_superset, rank_candidates};
pub use resolver::{Resolution, Resolver, resolve_in};
pub use snapshot::RegistrySnapshot;
