//! Tag matching for resolution decisions.
//!
//! A record matches a criteria set when its tags are a superset of the
//! criteria: every requested tag must be present, extra tags are ignored.
//! Comparison is exact string equality, so `Type:Yarn` never matches
//! `type:yarn`.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use jobgrid_state::{Cluster, ClusterStatus, Command};

/// A cluster in the current tier together with the command it would run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub cluster_id: String,
    pub cluster_name: String,
    pub cluster_updated_at: u64,
    pub command_id: String,
    pub command_name: String,
}

impl Candidate {
    fn new(cluster: &Cluster, command: &Command) -> Self {
        Self {
            cluster_id: cluster.id.clone(),
            cluster_name: cluster.name.clone(),
            cluster_updated_at: cluster.updated_at,
            command_id: command.id.clone(),
            command_name: command.name.clone(),
        }
    }
}

/// `true` if `tags` contains every entry of `criteria`.
pub fn is_superset(tags: &BTreeSet<String>, criteria: &BTreeSet<String>) -> bool {
    criteria.is_subset(tags)
}

/// `true` if the cluster is UP and carries every tier tag.
pub fn cluster_matches(cluster: &Cluster, tier: &BTreeSet<String>) -> bool {
    cluster.status == ClusterStatus::Up && is_superset(&cluster.tags, tier)
}

/// First command in the cluster's stored order whose tags cover `criteria`.
///
/// Ids that do not resolve to a command in `commands` are skipped.
pub fn first_matching_command<'a>(
    cluster: &Cluster,
    commands: &'a HashMap<String, Command>,
    criteria: &BTreeSet<String>,
) -> Option<&'a Command> {
    cluster
        .commands
        .iter()
        .filter_map(|id| commands.get(id))
        .find(|command| is_superset(&command.tags, criteria))
}

/// Build one candidate per matching cluster that has a matching command.
pub fn tier_candidates<'a, I>(
    clusters: I,
    commands: &HashMap<String, Command>,
    tier: &BTreeSet<String>,
    criteria: &BTreeSet<String>,
) -> Vec<Candidate>
where
    I: IntoIterator<Item = &'a Cluster>,
{
    clusters
        .into_iter()
        .filter(|cluster| cluster_matches(cluster, tier))
        .filter_map(|cluster| {
            first_matching_command(cluster, commands, criteria)
                .map(|command| Candidate::new(cluster, command))
        })
        .collect()
}

/// Most recently updated cluster first, then smallest id.
fn candidate_order(a: &Candidate, b: &Candidate) -> Ordering {
    b.cluster_updated_at
        .cmp(&a.cluster_updated_at)
        .then_with(|| a.cluster_id.cmp(&b.cluster_id))
}

/// Sort candidates best first.
pub fn rank_candidates(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.sort_by(candidate_order);
    candidates
}
