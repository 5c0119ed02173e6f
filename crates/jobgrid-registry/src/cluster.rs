//! ClusterRegistry: cluster records and their associations.
//!
//! A cluster's command list is ordered: the resolver takes the first
//! matching command in list order, so every list operation here preserves
//! the order the operator supplied.

use std::collections::{BTreeSet, HashSet};

use jobgrid_state::{
    Cluster, ClusterFilter, Command, PageRequest, StateStore, WriteTxn, epoch_millis, next_stamp,
};
use tracing::{debug, info, warn};

use crate::collection::{self, SetKind, load, mutate, not_found, require_field, require_id};
use crate::error::{RegistryError, RegistryResult};

/// Registry of execution clusters.
#[derive(Clone)]
pub struct ClusterRegistry {
    state: StateStore,
}

impl ClusterRegistry {
    pub fn new(state: StateStore) -> Self {
        Self { state }
    }

    // ── CRUD ───────────────────────────────────────────────────────

    /// Create a cluster. A blank id is replaced with a generated one.
    pub fn create(&self, mut cluster: Cluster) -> RegistryResult<Cluster> {
        validate_fields(&cluster)?;
        check_command_list(&cluster.commands)?;
        if cluster.id.trim().is_empty() {
            cluster.id = uuid::Uuid::new_v4().to_string();
        }

        let cluster = self.state.write(|tx| -> RegistryResult<Cluster> {
            if tx.contains::<Cluster>(&cluster.id)? {
                return Err(RegistryError::Conflict {
                    kind: "cluster",
                    id: cluster.id.clone(),
                });
            }
            require_commands_exist(tx, &cluster.commands)?;
            let now = epoch_millis();
            cluster.created_at = now;
            cluster.updated_at = now;
            tx.put(&cluster)?;
            Ok(cluster)
        })?;

        info!(id = %cluster.id, name = %cluster.name, "cluster created");
        Ok(cluster)
    }

    pub fn get(&self, id: &str) -> RegistryResult<Cluster> {
        collection::get(&self.state, id)
    }

    /// List clusters matching `filter`, newest update first unless the page
    /// asks for ascending order.
    pub fn list(&self, filter: &ClusterFilter, page: &PageRequest) -> RegistryResult<Vec<Cluster>> {
        Ok(self.state.read(|tx| tx.find_clusters(filter, page))?)
    }

    /// Replace every mutable field of a cluster. The id never changes.
    pub fn update(&self, id: &str, patch: Cluster) -> RegistryResult<Cluster> {
        require_id(id)?;
        if !patch.id.is_empty() && patch.id != id {
            return Err(RegistryError::InvalidArgument(format!(
                "cluster id is immutable: cannot change {id} to {}",
                patch.id
            )));
        }
        validate_fields(&patch)?;
        check_command_list(&patch.commands)?;

        let updated = self.state.write(|tx| -> RegistryResult<Cluster> {
            let existing: Cluster = load(tx, id)?;
            require_commands_exist(tx, &patch.commands)?;
            let updated = Cluster {
                id: existing.id,
                created_at: existing.created_at,
                updated_at: next_stamp(existing.updated_at),
                ..patch
            };
            tx.put(&updated)?;
            Ok(updated)
        })?;

        info!(id = %updated.id, status = %updated.status, "cluster updated");
        Ok(updated)
    }

    /// Delete a cluster. Its commands stay in the inventory.
    pub fn delete(&self, id: &str) -> RegistryResult<Cluster> {
        require_id(id)?;
        let removed = self
            .state
            .write(|tx| -> RegistryResult<Cluster> {
                tx.remove::<Cluster>(id)?.ok_or_else(|| not_found::<Cluster>(id))
            })?;
        info!(%id, "cluster deleted");
        Ok(removed)
    }

    pub fn delete_all(&self) -> RegistryResult<Vec<Cluster>> {
        let removed = self
            .state
            .write(|tx| -> RegistryResult<Vec<Cluster>> { Ok(tx.clear::<Cluster>()?) })?;
        info!(count = removed.len(), "all clusters deleted");
        Ok(removed)
    }

    // ── Configs ────────────────────────────────────────────────────

    pub fn add_configs(
        &self,
        id: &str,
        configs: BTreeSet<String>,
    ) -> RegistryResult<BTreeSet<String>> {
        collection::add::<Cluster>(&self.state, id, SetKind::Configs, configs)
    }

    pub fn get_configs(&self, id: &str) -> RegistryResult<BTreeSet<String>> {
        collection::read::<Cluster>(&self.state, id, SetKind::Configs)
    }

    pub fn update_configs(
        &self,
        id: &str,
        configs: BTreeSet<String>,
    ) -> RegistryResult<BTreeSet<String>> {
        collection::replace::<Cluster>(&self.state, id, SetKind::Configs, configs)
    }

    pub fn remove_all_configs(&self, id: &str) -> RegistryResult<BTreeSet<String>> {
        collection::clear::<Cluster>(&self.state, id, SetKind::Configs)
    }

    // ── Tags ───────────────────────────────────────────────────────

    pub fn add_tags(&self, id: &str, tags: BTreeSet<String>) -> RegistryResult<BTreeSet<String>> {
        collection::add::<Cluster>(&self.state, id, SetKind::Tags, tags)
    }

    pub fn get_tags(&self, id: &str) -> RegistryResult<BTreeSet<String>> {
        collection::read::<Cluster>(&self.state, id, SetKind::Tags)
    }

    pub fn update_tags(
        &self,
        id: &str,
        tags: BTreeSet<String>,
    ) -> RegistryResult<BTreeSet<String>> {
        collection::replace::<Cluster>(&self.state, id, SetKind::Tags, tags)
    }

    pub fn remove_all_tags(&self, id: &str) -> RegistryResult<BTreeSet<String>> {
        collection::clear::<Cluster>(&self.state, id, SetKind::Tags)
    }

    pub fn remove_tag(&self, id: &str, tag: &str) -> RegistryResult<BTreeSet<String>> {
        collection::remove_one::<Cluster>(&self.state, id, SetKind::Tags, tag)
    }

    // ── Command list ───────────────────────────────────────────────

    /// Append commands to the end of the cluster's list, keeping the
    /// existing order. A command already on the list is rejected.
    pub fn add_commands(&self, id: &str, command_ids: &[String]) -> RegistryResult<Vec<Command>> {
        require_id(id)?;
        require_command_ids(command_ids)?;
        check_command_list(command_ids)?;

        let commands = self.state.write(|tx| -> RegistryResult<Vec<Command>> {
            let mut cluster: Cluster = load(tx, id)?;
            if let Some(dup) = command_ids.iter().find(|c| cluster.commands.contains(*c)) {
                return Err(RegistryError::InvalidArgument(format!(
                    "command {dup} is already attached to cluster {id}"
                )));
            }
            require_commands_exist(tx, command_ids)?;
            cluster.commands.extend(command_ids.iter().cloned());
            cluster.updated_at = next_stamp(cluster.updated_at);
            tx.put(&cluster)?;
            resolve_commands(tx, &cluster)
        })?;

        debug!(%id, added = command_ids.len(), "commands attached to cluster");
        Ok(commands)
    }

    /// The cluster's commands, in list order.
    pub fn get_commands(&self, id: &str) -> RegistryResult<Vec<Command>> {
        require_id(id)?;
        self.state.read(|tx| -> RegistryResult<Vec<Command>> {
            let cluster: Cluster = tx.get(id)?.ok_or_else(|| not_found::<Cluster>(id))?;
            let mut commands = Vec::with_capacity(cluster.commands.len());
            for command_id in &cluster.commands {
                match tx.get::<Command>(command_id)? {
                    Some(command) => commands.push(command),
                    None => {
                        warn!(cluster = %id, command = %command_id, "dangling command reference")
                    }
                }
            }
            Ok(commands)
        })
    }

    /// Replace the whole command list with `command_ids`, in that order.
    pub fn update_commands(
        &self,
        id: &str,
        command_ids: &[String],
    ) -> RegistryResult<Vec<Command>> {
        require_id(id)?;
        require_command_ids(command_ids)?;
        check_command_list(command_ids)?;

        self.state.write(|tx| -> RegistryResult<Vec<Command>> {
            let mut cluster: Cluster = load(tx, id)?;
            require_commands_exist(tx, command_ids)?;
            cluster.commands = command_ids.to_vec();
            cluster.updated_at = next_stamp(cluster.updated_at);
            tx.put(&cluster)?;
            resolve_commands(tx, &cluster)
        })
    }

    pub fn remove_all_commands(&self, id: &str) -> RegistryResult<Vec<Command>> {
        require_id(id)?;
        mutate(&self.state, id, |cluster: &mut Cluster| {
            cluster.commands.clear();
            Ok(Vec::new())
        })
    }

    /// Detach one command, keeping the relative order of the rest.
    pub fn remove_command(&self, id: &str, command_id: &str) -> RegistryResult<Vec<Command>> {
        require_id(id)?;
        require_field("command id", command_id)?;

        self.state.write(|tx| -> RegistryResult<Vec<Command>> {
            let mut cluster: Cluster = load(tx, id)?;
            let before = cluster.commands.len();
            cluster.commands.retain(|c| c != command_id);
            if cluster.commands.len() == before {
                return Err(RegistryError::NotFound {
                    kind: "command",
                    id: format!("{command_id} on cluster {id}"),
                });
            }
            cluster.updated_at = next_stamp(cluster.updated_at);
            tx.put(&cluster)?;
            resolve_commands(tx, &cluster)
        })
    }
}

fn validate_fields(cluster: &Cluster) -> RegistryResult<()> {
    require_field("cluster name", &cluster.name)?;
    require_field("cluster user", &cluster.user)?;
    require_field("cluster version", &cluster.version)?;
    Ok(())
}

fn require_command_ids(command_ids: &[String]) -> RegistryResult<()> {
    if command_ids.is_empty() {
        return Err(RegistryError::InvalidArgument(
            "no commands entered, unable to continue".to_string(),
        ));
    }
    Ok(())
}

/// Reject blank or repeated ids in a proposed command list.
fn check_command_list(command_ids: &[String]) -> RegistryResult<()> {
    let mut seen = HashSet::new();
    for command_id in command_ids {
        require_field("command id", command_id)?;
        if !seen.insert(command_id.as_str()) {
            return Err(RegistryError::InvalidArgument(format!(
                "command {command_id} listed more than once"
            )));
        }
    }
    Ok(())
}

fn require_commands_exist(tx: &WriteTxn, command_ids: &[String]) -> RegistryResult<()> {
    for command_id in command_ids {
        if !tx.contains::<Command>(command_id)? {
            return Err(not_found::<Command>(command_id));
        }
    }
    Ok(())
}

/// The cluster's commands in list order. Dangling ids are skipped.
fn resolve_commands(tx: &WriteTxn, cluster: &Cluster) -> RegistryResult<Vec<Command>> {
    let mut commands = Vec::with_capacity(cluster.commands.len());
    for command_id in &cluster.commands {
        match tx.get::<Command>(command_id)? {
            Some(command) => commands.push(command),
            None => {
                warn!(cluster = %cluster.id, command = %command_id, "dangling command reference")
            }
        }
    }
    Ok(commands)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobgrid_state::ClusterStatus;

    fn setup() -> (StateStore, ClusterRegistry) {
        let store = StateStore::open_in_memory().unwrap();
        let registry = ClusterRegistry::new(store.clone());
        (store, registry)
    }

    fn put_command(store: &StateStore, id: &str) {
        store
            .put(&Command::new(id, "tgianos", "1.0").with_id(id).with_tags(["type:pig"]))
            .unwrap();
    }

    fn set(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn list(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn ids(commands: &[Command]) -> Vec<&str> {
        commands.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn create_assigns_id_and_defaults_to_up() {
        let (_, registry) = setup();
        let created = registry.create(Cluster::new("h2prod", "tgianos", "2.4.0")).unwrap();

        assert!(!created.id.is_empty());
        assert_eq!(created.status, ClusterStatus::Up);
        assert!(created.updated_at > 0);
        assert_eq!(registry.get(&created.id).unwrap(), created);
    }

    #[test]
    fn create_with_existing_id_conflicts() {
        let (_, registry) = setup();
        registry
            .create(Cluster::new("h2prod", "tgianos", "2.4.0").with_id("cluster1"))
            .unwrap();

        let err = registry
            .create(Cluster::new("other", "tgianos", "2.4.0").with_id("cluster1"))
            .unwrap_err();
        assert!(matches!(err, RegistryError::Conflict { .. }));
    }

    #[test]
    fn create_requires_name() {
        let (_, registry) = setup();
        let err = registry.create(Cluster::new("", "tgianos", "2.4.0")).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidArgument(_)));
    }

    #[test]
    fn get_missing_and_blank() {
        let (_, registry) = setup();
        assert!(matches!(registry.get("nope"), Err(RegistryError::NotFound { .. })));
        assert!(matches!(registry.get("  "), Err(RegistryError::InvalidArgument(_))));
    }

    #[test]
    fn update_keeps_id_and_created() {
        let (_, registry) = setup();
        let created = registry
            .create(Cluster::new("h2prod", "tgianos", "2.4.0").with_id("cluster1"))
            .unwrap();

        let patch = Cluster::new("h2query", "amsharma", "2.4.3")
            .with_status(ClusterStatus::OutOfService)
            .with_tags(["sched:adhoc"]);
        let updated = registry.update("cluster1", patch).unwrap();

        assert_eq!(updated.id, "cluster1");
        assert_eq!(updated.name, "h2query");
        assert_eq!(updated.status, ClusterStatus::OutOfService);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at > created.updated_at);
    }

    #[test]
    fn update_rejects_id_change() {
        let (_, registry) = setup();
        registry
            .create(Cluster::new("h2prod", "tgianos", "2.4.0").with_id("cluster1"))
            .unwrap();

        let patch = Cluster::new("h2prod", "tgianos", "2.4.0").with_id("cluster2");
        assert!(matches!(
            registry.update("cluster1", patch),
            Err(RegistryError::InvalidArgument(_))
        ));
        assert!(matches!(
            registry.update("missing", Cluster::new("a", "b", "c")),
            Err(RegistryError::NotFound { .. })
        ));
    }

    #[test]
    fn delete_and_delete_all() {
        let (_, registry) = setup();
        registry.create(Cluster::new("a", "u", "1").with_id("c1")).unwrap();
        registry.create(Cluster::new("b", "u", "1").with_id("c2")).unwrap();
        registry.create(Cluster::new("c", "u", "1").with_id("c3")).unwrap();

        assert_eq!(registry.delete("c1").unwrap().id, "c1");
        assert!(matches!(registry.delete("c1"), Err(RegistryError::NotFound { .. })));

        let removed = registry.delete_all().unwrap();
        assert_eq!(removed.len(), 2);
        assert!(registry
            .list(&ClusterFilter::default(), &PageRequest::unbounded())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn config_set_operations_return_resulting_set() {
        let (_, registry) = setup();
        registry.create(Cluster::new("a", "u", "1").with_id("c1")).unwrap();

        let after_add = registry
            .add_configs("c1", set(&["s3://core-site.xml", "s3://hdfs-site.xml"]))
            .unwrap();
        assert_eq!(after_add.len(), 2);

        let after_second_add = registry.add_configs("c1", set(&["s3://core-site.xml"])).unwrap();
        assert_eq!(after_second_add.len(), 2);

        let replaced = registry.update_configs("c1", set(&["s3://yarn-site.xml"])).unwrap();
        assert_eq!(replaced, set(&["s3://yarn-site.xml"]));
        assert_eq!(registry.get_configs("c1").unwrap(), replaced);

        assert!(registry.remove_all_configs("c1").unwrap().is_empty());
    }

    #[test]
    fn set_operations_validate_arguments() {
        let (_, registry) = setup();
        registry.create(Cluster::new("a", "u", "1").with_id("c1")).unwrap();

        assert!(matches!(
            registry.add_tags("c1", BTreeSet::new()),
            Err(RegistryError::InvalidArgument(_))
        ));
        assert!(matches!(
            registry.add_tags("", set(&["prod"])),
            Err(RegistryError::InvalidArgument(_))
        ));
        assert!(matches!(
            registry.update_configs("c1", BTreeSet::new()),
            Err(RegistryError::InvalidArgument(_))
        ));
        assert!(matches!(
            registry.add_tags("missing", set(&["prod"])),
            Err(RegistryError::NotFound { .. })
        ));
    }

    #[test]
    fn tag_operations_touch_update_time() {
        let (_, registry) = setup();
        let created = registry.create(Cluster::new("a", "u", "1").with_id("c1")).unwrap();

        let tags = registry.add_tags("c1", set(&["prod", "yarn", "adhoc"])).unwrap();
        assert_eq!(tags.len(), 3);
        let touched = registry.get("c1").unwrap();
        assert!(touched.updated_at > created.updated_at);

        let tags = registry.remove_tag("c1", "adhoc").unwrap();
        assert_eq!(tags, set(&["prod", "yarn"]));
        let tags = registry.remove_tag("c1", "not-there").unwrap();
        assert_eq!(tags, set(&["prod", "yarn"]));

        assert_eq!(registry.update_tags("c1", set(&["test"])).unwrap(), set(&["test"]));
        assert!(registry.remove_all_tags("c1").unwrap().is_empty());
        assert!(registry.get_tags("c1").unwrap().is_empty());
    }

    #[test]
    fn add_commands_appends_in_order() {
        let (store, registry) = setup();
        for id in ["pig", "hive", "spark"] {
            put_command(&store, id);
        }
        registry.create(Cluster::new("a", "u", "1").with_id("c1")).unwrap();

        let commands = registry.add_commands("c1", &list(&["hive", "pig"])).unwrap();
        assert_eq!(ids(&commands), ["hive", "pig"]);

        let commands = registry.add_commands("c1", &list(&["spark"])).unwrap();
        assert_eq!(ids(&commands), ["hive", "pig", "spark"]);
        assert_eq!(ids(&registry.get_commands("c1").unwrap()), ["hive", "pig", "spark"]);
    }

    #[test]
    fn add_commands_rejects_duplicates_and_unknown() {
        let (store, registry) = setup();
        put_command(&store, "pig");
        registry
            .create(Cluster::new("a", "u", "1").with_id("c1").with_commands(["pig"]))
            .unwrap();

        assert!(matches!(
            registry.add_commands("c1", &list(&["pig"])),
            Err(RegistryError::InvalidArgument(_))
        ));
        assert!(matches!(
            registry.add_commands("c1", &list(&["hive", "hive"])),
            Err(RegistryError::InvalidArgument(_))
        ));
        assert!(matches!(
            registry.add_commands("c1", &list(&["ghost"])),
            Err(RegistryError::NotFound { .. })
        ));
        assert!(matches!(
            registry.add_commands("c1", &[]),
            Err(RegistryError::InvalidArgument(_))
        ));
        // Failed calls leave the list untouched.
        assert_eq!(registry.get("c1").unwrap().commands, vec!["pig".to_string()]);
    }

    #[test]
    fn update_commands_replaces_order() {
        let (store, registry) = setup();
        for id in ["pig", "hive", "spark"] {
            put_command(&store, id);
        }
        registry
            .create(Cluster::new("a", "u", "1").with_id("c1").with_commands(["pig", "hive"]))
            .unwrap();

        let commands = registry
            .update_commands("c1", &list(&["spark", "pig"]))
            .unwrap();
        assert_eq!(ids(&commands), ["spark", "pig"]);
    }

    #[test]
    fn remove_command_keeps_relative_order() {
        let (store, registry) = setup();
        for id in ["pig", "hive", "spark"] {
            put_command(&store, id);
        }
        registry
            .create(
                Cluster::new("a", "u", "1")
                    .with_id("c1")
                    .with_commands(["pig", "hive", "spark"]),
            )
            .unwrap();

        let commands = registry.remove_command("c1", "hive").unwrap();
        assert_eq!(ids(&commands), ["pig", "spark"]);
        assert!(matches!(
            registry.remove_command("c1", "hive"),
            Err(RegistryError::NotFound { .. })
        ));

        assert!(registry.remove_all_commands("c1").unwrap().is_empty());
        assert!(registry.get_commands("c1").unwrap().is_empty());
    }

    #[test]
    fn create_with_unknown_command_fails() {
        let (_, registry) = setup();
        let err = registry
            .create(Cluster::new("a", "u", "1").with_commands(["ghost"]))
            .unwrap_err();
        assert!(matches!(err, RegistryError::NotFound { kind: "command", .. }));
    }

    #[test]
    fn dangling_reference_does_not_block_list_edits() {
        let (store, registry) = setup();
        put_command(&store, "pig");
        put_command(&store, "hive");
        // Raw insert: the registry never leaves a dangling id behind.
        store
            .put(
                &Cluster::new("a", "u", "1")
                    .with_id("c1")
                    .with_commands(["ghost", "pig"]),
            )
            .unwrap();

        assert_eq!(ids(&registry.get_commands("c1").unwrap()), ["pig"]);
        let commands = registry.add_commands("c1", &list(&["hive"])).unwrap();
        assert_eq!(ids(&commands), ["pig", "hive"]);
        assert_eq!(ids(&registry.remove_command("c1", "pig").unwrap()), ["hive"]);
        assert_eq!(registry.get("c1").unwrap().commands, list(&["ghost", "hive"]));
    }
}
