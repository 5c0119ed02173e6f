//! Point-in-time view of the inventory used for one resolution.
//!
//! Built from a single read transaction so a concurrent detach or status
//! change is either fully visible or not visible at all.

use std::collections::HashMap;

use jobgrid_state::{Cluster, ClusterStatus, Command, ReadTxn, StateResult};
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    /// UP clusters only.
    pub clusters: Vec<Cluster>,
    pub commands: HashMap<String, Command>,
}

impl RegistrySnapshot {
    /// Build a snapshot from in-memory records. Non-UP clusters are dropped.
    pub fn new(
        clusters: impl IntoIterator<Item = Cluster>,
        commands: impl IntoIterator<Item = Command>,
    ) -> Self {
        Self {
            clusters: clusters
                .into_iter()
                .filter(|c| c.status == ClusterStatus::Up)
                .collect(),
            commands: commands.into_iter().map(|c| (c.id.clone(), c)).collect(),
        }
    }

    /// Load every UP cluster and every command from one read transaction.
    pub fn load(tx: &ReadTxn) -> StateResult<Self> {
        let snapshot = Self::new(tx.all::<Cluster>()?, tx.all::<Command>()?);
        debug!(
            clusters = snapshot.clusters.len(),
            commands = snapshot.commands.len(),
            "registry snapshot loaded"
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobgrid_state::StateStore;

    #[test]
    fn load_keeps_only_up_clusters() {
        let store = StateStore::open_in_memory().unwrap();
        store.put(&Cluster::new("a", "u", "1").with_id("up")).unwrap();
        store
            .put(
                &Cluster::new("b", "u", "1")
                    .with_id("gone")
                    .with_status(ClusterStatus::Terminated),
            )
            .unwrap();
        store.put(&Command::new("pig", "u", "1").with_id("pig")).unwrap();

        let snapshot = store.read(|tx| RegistrySnapshot::load(tx)).unwrap();
        assert_eq!(snapshot.clusters.len(), 1);
        assert_eq!(snapshot.clusters[0].id, "up");
        assert!(snapshot.commands.contains_key("pig"));
    }
}
