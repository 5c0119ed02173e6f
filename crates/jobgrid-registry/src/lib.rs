//! jobgrid-registry: inventory of clusters and commands.
//!
//! Owns the lifetime of cluster and command records and every collection
//! hanging off them: tags, configuration references, and the ordered
//! command list of each cluster. There is no matching logic here; the
//! resolver reads what this crate writes.
//!
//! # Components
//!
//! - **`cluster`**: `ClusterRegistry`: CRUD, tag/config sets, command list
//! - **`command`**: `CommandRegistry`: CRUD, tag/config sets, reverse lookup
//! - **`collection`**: shared precondition checks and set mutations
//!
//! Every mutating call runs in a single write transaction and returns the
//! resulting state, so callers never need a second read.

mod collection;

pub mod cluster;
pub mod command;
pub mod error;

pub use cluster::ClusterRegistry;
pub use command::CommandRegistry;
pub use error::{RegistryError, RegistryResult};
