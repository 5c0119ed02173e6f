//! Resolution engine: walks criteria tiers in preference order.
//!
//! For each tier:
//! 1. Collect UP clusters whose tags cover the tier (via matcher)
//! 2. Keep those that list a command covering the command criteria
//! 3. Rank the survivors and take the best one
//!
//! The first tier that yields a pair wins. Later tiers are never consulted.

use std::collections::BTreeSet;

use jobgrid_state::{ClusterCriteria, StateStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ResolveError, ResolveResult};
use crate::matcher::{rank_candidates, tier_candidates};
use crate::snapshot::RegistrySnapshot;

/// The cluster and command selected for a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub cluster_id: String,
    pub cluster_name: String,
    pub command_id: String,
    pub command_name: String,
    /// Index of the criteria tier that matched.
    pub tier: usize,
}

/// Resolve against an in-memory snapshot.
pub fn resolve_in(
    snapshot: &RegistrySnapshot,
    tiers: &[ClusterCriteria],
    command_criteria: &BTreeSet<String>,
) -> ResolveResult<Resolution> {
    if tiers.is_empty() {
        return Err(ResolveError::InvalidArgument(
            "no cluster criteria entered, unable to continue".to_string(),
        ));
    }

    for (index, tier) in tiers.iter().enumerate() {
        let candidates = tier_candidates(
            &snapshot.clusters,
            &snapshot.commands,
            &tier.tags,
            command_criteria,
        );
        let Some(best) = rank_candidates(candidates).into_iter().next() else {
            debug!(tier = index, tags = ?tier.tags, "no candidate in tier");
            continue;
        };

        debug!(
            tier = index,
            cluster = %best.cluster_id,
            command = %best.command_id,
            "tier matched"
        );
        return Ok(Resolution {
            cluster_id: best.cluster_id,
            cluster_name: best.cluster_name,
            command_id: best.command_id,
            command_name: best.command_name,
            tier: index,
        });
    }

    warn!(tiers = tiers.len(), ?command_criteria, "no cluster/command matched any tier");
    Err(ResolveError::NoMatchingResource(format!(
        "no UP cluster in {} tier(s) offers a command tagged {:?}",
        tiers.len(),
        command_criteria
    )))
}

/// Store-backed resolver. Each call reads one consistent snapshot.
#[derive(Clone)]
pub struct Resolver {
    state: StateStore,
}

impl Resolver {
    pub fn new(state: StateStore) -> Self {
        Self { state }
    }

    pub fn resolve(
        &self,
        tiers: &[ClusterCriteria],
        command_criteria: &BTreeSet<String>,
    ) -> ResolveResult<Resolution> {
        // Rejected here as well so an invalid call never opens a read.
        if tiers.is_empty() {
            return Err(ResolveError::InvalidArgument(
                "no cluster criteria entered, unable to continue".to_string(),
            ));
        }
        let snapshot = self.state.read(|tx| RegistrySnapshot::load(tx))?;
        let resolution = resolve_in(&snapshot, tiers, command_criteria)?;
        info!(
            cluster = %resolution.cluster_id,
            command = %resolution.command_id,
            tier = resolution.tier,
            "criteria resolved"
        );
        Ok(resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobgrid_registry::{ClusterRegistry, CommandRegistry};
    use jobgrid_state::{Cluster, ClusterStatus, Command};

    fn tags(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn cluster(id: &str, updated_at: u64, cluster_tags: &[&str], commands: &[&str]) -> Cluster {
        let mut cluster = Cluster::new(&format!("{id}-name"), "tgianos", "2.4.0")
            .with_id(id)
            .with_tags(cluster_tags.iter().copied())
            .with_commands(commands.iter().copied());
        cluster.updated_at = updated_at;
        cluster
    }

    fn command(id: &str, command_tags: &[&str]) -> Command {
        Command::new(&format!("{id}-name"), "tgianos", "1.0")
            .with_id(id)
            .with_tags(command_tags.iter().copied())
    }

    fn inventory() -> RegistrySnapshot {
        RegistrySnapshot::new(
            [
                cluster("adhoc", 10, &["type:yarn", "sched:adhoc"], &["pig", "hive"]),
                cluster("sla", 20, &["type:yarn", "sched:sla"], &["hive"]),
                cluster(
                    "retired",
                    30,
                    &["type:yarn", "sched:adhoc", "sched:sla"],
                    &["pig", "hive"],
                ),
            ]
            .into_iter()
            .map(|c| {
                if c.id == "retired" {
                    c.with_status(ClusterStatus::Terminated)
                } else {
                    c
                }
            }),
            [command("pig", &["type:pig"]), command("hive", &["type:hive"])],
        )
    }

    #[test]
    fn first_tier_wins() {
        let tiers = vec![
            ClusterCriteria::new(["sched:sla"]),
            ClusterCriteria::new(["sched:adhoc"]),
        ];
        let resolution = resolve_in(&inventory(), &tiers, &tags(&["type:hive"])).unwrap();
        assert_eq!(resolution.cluster_id, "sla");
        assert_eq!(resolution.command_id, "hive");
        assert_eq!(resolution.tier, 0);
    }

    #[test]
    fn falls_through_to_later_tier() {
        let tiers = vec![
            ClusterCriteria::new(["sched:sla"]),
            ClusterCriteria::new(["sched:adhoc"]),
        ];
        // The SLA cluster has no pig command, so tier 0 yields nothing.
        let resolution = resolve_in(&inventory(), &tiers, &tags(&["type:pig"])).unwrap();
        assert_eq!(resolution.cluster_id, "adhoc");
        assert_eq!(resolution.command_name, "pig-name");
        assert_eq!(resolution.tier, 1);
    }

    #[test]
    fn non_up_clusters_are_never_chosen() {
        let tiers = vec![ClusterCriteria::new(["sched:adhoc", "sched:sla"])];
        let err = resolve_in(&inventory(), &tiers, &tags(&["type:pig"])).unwrap_err();
        assert!(matches!(err, ResolveError::NoMatchingResource(_)));
    }

    #[test]
    fn empty_tiers_are_rejected() {
        let err = resolve_in(&inventory(), &[], &tags(&["type:pig"])).unwrap_err();
        assert!(matches!(err, ResolveError::InvalidArgument(_)));
    }

    #[test]
    fn result_satisfies_both_criteria() {
        let snapshot = inventory();
        let tiers = vec![ClusterCriteria::new(["type:yarn"])];
        let criteria = tags(&["type:hive"]);
        let resolution = resolve_in(&snapshot, &tiers, &criteria).unwrap();

        let cluster = snapshot
            .clusters
            .iter()
            .find(|c| c.id == resolution.cluster_id)
            .unwrap();
        let command = &snapshot.commands[&resolution.command_id];
        assert!(tiers[0].tags.is_subset(&cluster.tags));
        assert!(criteria.is_subset(&command.tags));
        assert!(cluster.commands.contains(&command.id));
        // Both UP clusters qualify; the more recently updated one wins.
        assert_eq!(resolution.cluster_id, "sla");
    }

    #[test]
    fn store_backed_resolution() {
        let store = StateStore::open_in_memory().unwrap();
        store.put(&command("pig", &["type:pig", "ver:0.13"])).unwrap();
        store
            .put(&cluster("h2prod", 5, &["type:yarn", "env:prod"], &["pig"]))
            .unwrap();

        let resolver = Resolver::new(store);
        let resolution = resolver
            .resolve(&[ClusterCriteria::new(["env:prod"])], &tags(&["type:pig"]))
            .unwrap();
        assert_eq!(resolution.cluster_name, "h2prod-name");

        let err = resolver
            .resolve(&[ClusterCriteria::new(["env:test"])], &tags(&["type:pig"]))
            .unwrap_err();
        assert!(matches!(err, ResolveError::NoMatchingResource(_)));
    }

    #[test]
    fn store_backed_rejects_empty_tiers() {
        let resolver = Resolver::new(StateStore::open_in_memory().unwrap());
        let err = resolver.resolve(&[], &tags(&["type:pig"])).unwrap_err();
        assert!(matches!(err, ResolveError::InvalidArgument(_)));
    }

    #[test]
    fn detached_command_is_never_resolved() {
        let store = StateStore::open_in_memory().unwrap();
        let commands = CommandRegistry::new(store.clone());
        let clusters = ClusterRegistry::new(store.clone());
        commands.create(command("pig_13", &["type:pig"])).unwrap();
        commands.create(command("pig_11", &["type:pig"])).unwrap();
        clusters
            .create(
                Cluster::new("h2prod", "tgianos", "2.4.0")
                    .with_id("h2prod")
                    .with_tags(["sched:sla"])
                    .with_commands(["pig_13", "pig_11"]),
            )
            .unwrap();

        let tiers = vec![ClusterCriteria::new(["sched:sla"])];
        let criteria = tags(&["type:pig"]);
        let resolver = Resolver::new(store.clone());

        let before = store.begin_read().unwrap();
        commands.delete("pig_13").unwrap();

        // A snapshot taken before the delete still sees a consistent pair.
        let old = RegistrySnapshot::load(&before).unwrap();
        let resolution = resolve_in(&old, &tiers, &criteria).unwrap();
        assert_eq!(resolution.command_id, "pig_13");
        assert!(old.clusters[0].commands.contains(&resolution.command_id));
        assert!(old.commands.contains_key(&resolution.command_id));

        let resolution = resolver.resolve(&tiers, &criteria).unwrap();
        assert_eq!(resolution.command_id, "pig_11");

        let before = store.begin_read().unwrap();
        clusters.remove_command("h2prod", "pig_11").unwrap();

        let old = RegistrySnapshot::load(&before).unwrap();
        assert_eq!(resolve_in(&old, &tiers, &criteria).unwrap().command_id, "pig_11");

        let err = resolver.resolve(&tiers, &criteria).unwrap_err();
        assert!(matches!(err, ResolveError::NoMatchingResource(_)));
    }
}
