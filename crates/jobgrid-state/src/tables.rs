//! redb table definitions for the JobGrid entity store.
//!
//! Each table uses `&str` keys (the record identifier) and `&[u8]` values
//! (JSON-serialized records).

use redb::TableDefinition;

/// Cluster records keyed by `{cluster_id}`.
pub const CLUSTERS: TableDefinition<&str, &[u8]> = TableDefinition::new("clusters");

/// Command records keyed by `{command_id}`.
pub const COMMANDS: TableDefinition<&str, &[u8]> = TableDefinition::new("commands");

/// Job records keyed by `{job_id}`.
pub const JOBS: TableDefinition<&str, &[u8]> = TableDefinition::new("jobs");
