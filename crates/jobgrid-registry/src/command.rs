//! CommandRegistry: command records and their associations.
//!
//! Clusters reference commands by id. Deleting a command detaches it from
//! every cluster in the same transaction, so no cluster ever lists a
//! command that no longer exists.

use std::collections::BTreeSet;

use jobgrid_state::{
    Cluster, ClusterStatus, Command, CommandFilter, PageRequest, StateStore, WriteTxn,
    epoch_millis, next_stamp,
};
use tracing::{debug, info};

use crate::collection::{self, SetKind, load, not_found, require_field, require_id};
use crate::error::{RegistryError, RegistryResult};

/// Registry of runnable commands.
#[derive(Clone)]
pub struct CommandRegistry {
    state: StateStore,
}

impl CommandRegistry {
    pub fn new(state: StateStore) -> Self {
        Self { state }
    }

    // ── CRUD ───────────────────────────────────────────────────────

    pub fn create(&self, mut command: Command) -> RegistryResult<Command> {
        validate_fields(&command)?;
        if command.id.trim().is_empty() {
            command.id = uuid::Uuid::new_v4().to_string();
        }

        let command = self.state.write(|tx| -> RegistryResult<Command> {
            if tx.contains::<Command>(&command.id)? {
                return Err(RegistryError::Conflict {
                    kind: "command",
                    id: command.id.clone(),
                });
            }
            let now = epoch_millis();
            command.created_at = now;
            command.updated_at = now;
            tx.put(&command)?;
            Ok(command)
        })?;

        info!(id = %command.id, name = %command.name, "command created");
        Ok(command)
    }

    pub fn get(&self, id: &str) -> RegistryResult<Command> {
        collection::get(&self.state, id)
    }

    pub fn list(&self, filter: &CommandFilter, page: &PageRequest) -> RegistryResult<Vec<Command>> {
        Ok(self.state.read(|tx| tx.find_commands(filter, page))?)
    }

    pub fn update(&self, id: &str, patch: Command) -> RegistryResult<Command> {
        require_id(id)?;
        if !patch.id.is_empty() && patch.id != id {
            return Err(RegistryError::InvalidArgument(format!(
                "command id is immutable: cannot change {id} to {}",
                patch.id
            )));
        }
        validate_fields(&patch)?;

        let updated = self.state.write(|tx| -> RegistryResult<Command> {
            let existing: Command = load(tx, id)?;
            let updated = Command {
                id: existing.id,
                created_at: existing.created_at,
                updated_at: next_stamp(existing.updated_at),
                ..patch
            };
            tx.put(&updated)?;
            Ok(updated)
        })?;

        info!(id = %updated.id, "command updated");
        Ok(updated)
    }

    /// Delete a command and detach it from every cluster listing it.
    pub fn delete(&self, id: &str) -> RegistryResult<Command> {
        require_id(id)?;
        let (removed, detached) = self.state.write(|tx| -> RegistryResult<(Command, usize)> {
            let removed = tx
                .remove::<Command>(id)?
                .ok_or_else(|| not_found::<Command>(id))?;
            let detached = detach_from_clusters(tx, |command_id| command_id == id)?;
            Ok((removed, detached))
        })?;
        info!(%id, clusters_detached = detached, "command deleted");
        Ok(removed)
    }

    /// Delete every command and empty every cluster's command list.
    pub fn delete_all(&self) -> RegistryResult<Vec<Command>> {
        let removed = self.state.write(|tx| -> RegistryResult<Vec<Command>> {
            let removed = tx.clear::<Command>()?;
            detach_from_clusters(tx, |_| true)?;
            Ok(removed)
        })?;
        info!(count = removed.len(), "all commands deleted");
        Ok(removed)
    }

    // ── Configs ────────────────────────────────────────────────────

    pub fn add_configs(
        &self,
        id: &str,
        configs: BTreeSet<String>,
    ) -> RegistryResult<BTreeSet<String>> {
        collection::add::<Command>(&self.state, id, SetKind::Configs, configs)
    }

    pub fn get_configs(&self, id: &str) -> RegistryResult<BTreeSet<String>> {
        collection::read::<Command>(&self.state, id, SetKind::Configs)
    }

    pub fn update_configs(
        &self,
        id: &str,
        configs: BTreeSet<String>,
    ) -> RegistryResult<BTreeSet<String>> {
        collection::replace::<Command>(&self.state, id, SetKind::Configs, configs)
    }

    pub fn remove_all_configs(&self, id: &str) -> RegistryResult<BTreeSet<String>> {
        collection::clear::<Command>(&self.state, id, SetKind::Configs)
    }

    // ── Tags ───────────────────────────────────────────────────────

    pub fn add_tags(&self, id: &str, tags: BTreeSet<String>) -> RegistryResult<BTreeSet<String>> {
        collection::add::<Command>(&self.state, id, SetKind::Tags, tags)
    }

    pub fn get_tags(&self, id: &str) -> RegistryResult<BTreeSet<String>> {
        collection::read::<Command>(&self.state, id, SetKind::Tags)
    }

    pub fn update_tags(
        &self,
        id: &str,
        tags: BTreeSet<String>,
    ) -> RegistryResult<BTreeSet<String>> {
        collection::replace::<Command>(&self.state, id, SetKind::Tags, tags)
    }

    pub fn remove_all_tags(&self, id: &str) -> RegistryResult<BTreeSet<String>> {
        collection::clear::<Command>(&self.state, id, SetKind::Tags)
    }

    pub fn remove_tag(&self, id: &str, tag: &str) -> RegistryResult<BTreeSet<String>> {
        collection::remove_one::<Command>(&self.state, id, SetKind::Tags, tag)
    }

    // ── Reverse lookup ─────────────────────────────────────────────

    /// Clusters whose command list references `id`, optionally limited to
    /// the given statuses (empty = any status).
    pub fn clusters_for_command(
        &self,
        id: &str,
        statuses: &BTreeSet<ClusterStatus>,
    ) -> RegistryResult<Vec<Cluster>> {
        require_id(id)?;
        self.state.read(|tx| -> RegistryResult<Vec<Cluster>> {
            if tx.get::<Command>(id)?.is_none() {
                return Err(not_found::<Command>(id));
            }
            let clusters = tx
                .all::<Cluster>()?
                .into_iter()
                .filter(|c| c.commands.iter().any(|cmd| cmd == id))
                .filter(|c| statuses.is_empty() || statuses.contains(&c.status))
                .collect();
            Ok(clusters)
        })
    }
}

fn validate_fields(command: &Command) -> RegistryResult<()> {
    require_field("command name", &command.name)?;
    require_field("command user", &command.user)?;
    require_field("command version", &command.version)?;
    Ok(())
}

/// Drop matching command ids from every cluster, touching each cluster
/// that changed. Returns how many clusters changed.
fn detach_from_clusters<F>(tx: &WriteTxn, mut detach: F) -> RegistryResult<usize>
where
    F: FnMut(&str) -> bool,
{
    let mut changed = 0;
    for mut cluster in tx.all::<Cluster>()? {
        let before = cluster.commands.len();
        cluster.commands.retain(|c| !detach(c));
        if cluster.commands.len() != before {
            cluster.updated_at = next_stamp(cluster.updated_at);
            tx.put(&cluster)?;
            debug!(cluster = %cluster.id, "detached commands from cluster");
            changed += 1;
        }
    }
    Ok(changed)
}
