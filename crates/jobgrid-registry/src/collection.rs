//! Precondition checks and set mutations shared by both registries.

use std::collections::BTreeSet;

use jobgrid_state::{Cluster, Command, Record, StateStore, WriteTxn, next_stamp};

use crate::error::{RegistryError, RegistryResult};

/// An inventory record with tag and config sets.
pub(crate) trait Inventory: Record {
    fn set(&self, kind: SetKind) -> &BTreeSet<String>;
    fn set_mut(&mut self, kind: SetKind) -> &mut BTreeSet<String>;
    fn updated_at_mut(&mut self) -> &mut u64;

    fn touch(&mut self) {
        let stamp = self.updated_at_mut();
        *stamp = next_stamp(*stamp);
    }
}

impl Inventory for Cluster {
    fn set(&self, kind: SetKind) -> &BTreeSet<String> {
        match kind {
            SetKind::Tags => &self.tags,
            SetKind::Configs => &self.configs,
        }
    }

    fn set_mut(&mut self, kind: SetKind) -> &mut BTreeSet<String> {
        match kind {
            SetKind::Tags => &mut self.tags,
            SetKind::Configs => &mut self.configs,
        }
    }

    fn updated_at_mut(&mut self) -> &mut u64 {
        &mut self.updated_at
    }
}

impl Inventory for Command {
    fn set(&self, kind: SetKind) -> &BTreeSet<String> {
        match kind {
            SetKind::Tags => &self.tags,
            SetKind::Configs => &self.configs,
        }
    }

    fn set_mut(&mut self, kind: SetKind) -> &mut BTreeSet<String> {
        match kind {
            SetKind::Tags => &mut self.tags,
            SetKind::Configs => &mut self.configs,
        }
    }

    fn updated_at_mut(&mut self) -> &mut u64 {
        &mut self.updated_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SetKind {
    Tags,
    Configs,
}

impl SetKind {
    fn label(self) -> &'static str {
        match self {
            Self::Tags => "tags",
            Self::Configs => "configs",
        }
    }
}

// ── Preconditions ─────────────────────────────────────────────────

pub(crate) fn require_id(id: &str) -> RegistryResult<()> {
    if id.trim().is_empty() {
        return Err(RegistryError::InvalidArgument(
            "no id entered, unable to continue".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn require_field(field: &str, value: &str) -> RegistryResult<()> {
    if value.trim().is_empty() {
        return Err(RegistryError::InvalidArgument(format!("{field} is required")));
    }
    Ok(())
}

pub(crate) fn require_values(label: &str, values: &BTreeSet<String>) -> RegistryResult<()> {
    if values.is_empty() {
        return Err(RegistryError::InvalidArgument(format!(
            "no {label} entered, unable to continue"
        )));
    }
    if values.iter().any(|v| v.trim().is_empty()) {
        return Err(RegistryError::InvalidArgument(format!(
            "blank entry in {label}"
        )));
    }
    Ok(())
}

pub(crate) fn not_found<R: Record>(id: &str) -> RegistryError {
    RegistryError::NotFound {
        kind: R::KIND,
        id: id.to_string(),
    }
}

// ── Transaction helpers ───────────────────────────────────────────

/// Load a record inside a write transaction or fail with `NotFound`.
pub(crate) fn load<R: Record>(tx: &WriteTxn, id: &str) -> RegistryResult<R> {
    tx.get::<R>(id)?.ok_or_else(|| not_found::<R>(id))
}

/// Read, modify, touch, and write back one record atomically.
pub(crate) fn mutate<R, T, F>(store: &StateStore, id: &str, f: F) -> RegistryResult<T>
where
    R: Inventory,
    F: FnOnce(&mut R) -> RegistryResult<T>,
{
    store.write(|tx| -> RegistryResult<T> {
        let mut record: R = load(tx, id)?;
        let out = f(&mut record)?;
        record.touch();
        tx.put(&record)?;
        Ok(out)
    })
}

pub(crate) fn get<R: Record>(store: &StateStore, id: &str) -> RegistryResult<R> {
    require_id(id)?;
    store.get::<R>(id)?.ok_or_else(|| not_found::<R>(id))
}

// ── Set operations ────────────────────────────────────────────────

/// Union `values` into the set.
pub(crate) fn add<R: Inventory>(
    store: &StateStore,
    id: &str,
    kind: SetKind,
    values: BTreeSet<String>,
) -> RegistryResult<BTreeSet<String>> {
    require_id(id)?;
    require_values(kind.label(), &values)?;
    mutate(store, id, |record: &mut R| {
        let set = record.set_mut(kind);
        set.extend(values);
        Ok(set.clone())
    })
}

pub(crate) fn read<R: Inventory>(
    store: &StateStore,
    id: &str,
    kind: SetKind,
) -> RegistryResult<BTreeSet<String>> {
    let record: R = get(store, id)?;
    Ok(record.set(kind).clone())
}

/// Replace the set wholesale. Clearing goes through [`clear`].
pub(crate) fn replace<R: Inventory>(
    store: &StateStore,
    id: &str,
    kind: SetKind,
    values: BTreeSet<String>,
) -> RegistryResult<BTreeSet<String>> {
    require_id(id)?;
    require_values(kind.label(), &values)?;
    mutate(store, id, |record: &mut R| {
        let set = record.set_mut(kind);
        *set = values;
        Ok(set.clone())
    })
}

pub(crate) fn clear<R: Inventory>(
    store: &StateStore,
    id: &str,
    kind: SetKind,
) -> RegistryResult<BTreeSet<String>> {
    require_id(id)?;
    mutate(store, id, |record: &mut R| {
        let set = record.set_mut(kind);
        set.clear();
        Ok(set.clone())
    })
}

/// Remove one value. Removing an absent value leaves the set unchanged.
pub(crate) fn remove_one<R: Inventory>(
    store: &StateStore,
    id: &str,
    kind: SetKind,
    value: &str,
) -> RegistryResult<BTreeSet<String>> {
    require_id(id)?;
    require_field(kind.label(), value)?;
    mutate(store, id, |record: &mut R| {
        let set = record.set_mut(kind);
        set.remove(value);
        Ok(set.clone())
    })
}
