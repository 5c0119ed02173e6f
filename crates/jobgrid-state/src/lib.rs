//! jobgrid-state: embedded entity store for JobGrid.
//!
//! Backed by [redb](https://docs.rs/redb), provides persistent and in-memory
//! storage for clusters, commands, and jobs.
//!
//! # Architecture
//!
//! All records are JSON-serialized into redb's `&[u8]` value columns and
//! keyed by their identifier. Callers open a transaction scope with
//! [`StateStore::read`] or [`StateStore::write`]; everything done inside one
//! scope sees a single consistent snapshot and commits atomically.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across threads and async tasks.

pub mod error;
pub mod query;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use query::{ClusterFilter, CommandFilter, JobQuery, JobSortField, PageRequest, SortDirection};
pub use store::{ReadTxn, Record, StateStore, WriteTxn};
pub use types::*;
