//! StateStore: redb-backed entity store for JobGrid.
//!
//! Records are JSON-serialized into redb's `&[u8]` value columns. The store
//! hands out transaction scopes instead of one-shot accessors so services
//! can read, validate, and write a record inside a single transaction:
//!
//! - [`StateStore::read`] runs a closure against a read-only MVCC snapshot.
//! - [`StateStore::write`] runs a closure inside a write transaction and
//!   commits only if it returns `Ok`. redb admits one writer at a time, so a
//!   read-check-write sequence inside one scope is a compare-and-set.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{StateError, StateResult};
use crate::query::{ClusterFilter, CommandFilter, JobQuery, JobSortField, PageRequest};
use crate::tables::{CLUSTERS, COMMANDS, JOBS};
use crate::types::{Cluster, Command, Job};

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

type RecordTable = TableDefinition<'static, &'static str, &'static [u8]>;

/// A record type persisted in its own table, keyed by its identifier.
pub trait Record: Serialize + DeserializeOwned {
    /// Human-readable kind used in logs and errors.
    const KIND: &'static str;
    const TABLE: RecordTable;

    fn key(&self) -> &str;
}

impl Record for Cluster {
    const KIND: &'static str = "cluster";
    const TABLE: RecordTable = CLUSTERS;

    fn key(&self) -> &str {
        &self.id
    }
}

impl Record for Command {
    const KIND: &'static str = "command";
    const TABLE: RecordTable = COMMANDS;

    fn key(&self) -> &str {
        &self.id
    }
}

impl Record for Job {
    const KIND: &'static str = "job";
    const TABLE: RecordTable = JOBS;

    fn key(&self) -> &str {
        &self.id
    }
}

fn decode<R: Record>(key: &str, bytes: &[u8]) -> StateResult<R> {
    serde_json::from_slice(bytes).map_err(|source| StateError::Decode {
        kind: R::KIND,
        key: key.to_string(),
        source,
    })
}

fn read_one<R, T>(table: &T, key: &str) -> StateResult<Option<R>>
where
    R: Record,
    T: ReadableTable<&'static str, &'static [u8]>,
{
    match table.get(key).map_err(map_err!(Storage))? {
        Some(guard) => Ok(Some(decode(key, guard.value())?)),
        None => Ok(None),
    }
}

fn read_all<R, T>(table: &T) -> StateResult<Vec<R>>
where
    R: Record,
    T: ReadableTable<&'static str, &'static [u8]>,
{
    let mut results = Vec::new();
    for entry in table.iter().map_err(map_err!(Storage))? {
        let (key, value) = entry.map_err(map_err!(Storage))?;
        results.push(decode(key.value(), value.value())?);
    }
    Ok(results)
}

/// Thread-safe entity store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(CLUSTERS).map_err(map_err!(Table))?;
        txn.open_table(COMMANDS).map_err(map_err!(Table))?;
        txn.open_table(JOBS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Commit))?;
        Ok(())
    }

    /// Begin a read-only snapshot.
    pub fn begin_read(&self) -> StateResult<ReadTxn> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        Ok(ReadTxn { txn })
    }

    /// Begin a write transaction. Blocks while another writer is active.
    pub fn begin_write(&self) -> StateResult<WriteTxn> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        Ok(WriteTxn { txn })
    }

    /// Run `f` against one consistent snapshot.
    pub fn read<T, E, F>(&self, f: F) -> Result<T, E>
    where
        E: From<StateError>,
        F: FnOnce(&ReadTxn) -> Result<T, E>,
    {
        let txn = self.begin_read()?;
        f(&txn)
    }

    /// Run `f` in a write transaction, committing on `Ok` and aborting on `Err`.
    pub fn write<T, E, F>(&self, f: F) -> Result<T, E>
    where
        E: From<StateError>,
        F: FnOnce(&WriteTxn) -> Result<T, E>,
    {
        let txn = self.begin_write()?;
        match f(&txn) {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(e) => {
                txn.abort();
                Err(e)
            }
        }
    }

    // ── Single-operation shortcuts ─────────────────────────────────

    /// Fetch one record in its own snapshot.
    pub fn get<R: Record>(&self, key: &str) -> StateResult<Option<R>> {
        self.read(|tx| tx.get(key))
    }

    /// Insert or replace one record in its own transaction.
    pub fn put<R: Record>(&self, record: &R) -> StateResult<()> {
        self.write(|tx| tx.put(record))
    }

    /// List every record of one kind.
    pub fn all<R: Record>(&self) -> StateResult<Vec<R>> {
        self.read(|tx| tx.all())
    }
}

/// A read-only snapshot of the store.
pub struct ReadTxn {
    txn: redb::ReadTransaction,
}

impl ReadTxn {
    pub fn get<R: Record>(&self, key: &str) -> StateResult<Option<R>> {
        let table = self.txn.open_table(R::TABLE).map_err(map_err!(Table))?;
        read_one(&table, key)
    }

    pub fn all<R: Record>(&self) -> StateResult<Vec<R>> {
        let table = self.txn.open_table(R::TABLE).map_err(map_err!(Table))?;
        read_all(&table)
    }

    pub fn find_clusters(
        &self,
        filter: &ClusterFilter,
        page: &PageRequest,
    ) -> StateResult<Vec<Cluster>> {
        Ok(filter.select(self.all()?, page))
    }

    pub fn find_commands(
        &self,
        filter: &CommandFilter,
        page: &PageRequest,
    ) -> StateResult<Vec<Command>> {
        Ok(filter.select(self.all()?, page))
    }

    pub fn find_jobs(
        &self,
        query: &JobQuery,
        order: &[JobSortField],
        page: &PageRequest,
    ) -> StateResult<Vec<Job>> {
        Ok(query.select(self.all()?, order, page))
    }
}

/// A write transaction. Reads inside it observe its own uncommitted writes.
pub struct WriteTxn {
    txn: redb::WriteTransaction,
}

impl WriteTxn {
    pub fn get<R: Record>(&self, key: &str) -> StateResult<Option<R>> {
        let table = self.txn.open_table(R::TABLE).map_err(map_err!(Table))?;
        read_one(&table, key)
    }

    pub fn all<R: Record>(&self) -> StateResult<Vec<R>> {
        let table = self.txn.open_table(R::TABLE).map_err(map_err!(Table))?;
        read_all(&table)
    }

    pub fn contains<R: Record>(&self, key: &str) -> StateResult<bool> {
        let table = self.txn.open_table(R::TABLE).map_err(map_err!(Table))?;
        Ok(table.get(key).map_err(map_err!(Storage))?.is_some())
    }

    /// Insert or replace a record under its own key.
    pub fn put<R: Record>(&self, record: &R) -> StateResult<()> {
        let value = serde_json::to_vec(record).map_err(|source| StateError::Encode {
            kind: R::KIND,
            source,
        })?;
        let mut table = self.txn.open_table(R::TABLE).map_err(map_err!(Table))?;
        table
            .insert(record.key(), value.as_slice())
            .map_err(map_err!(Storage))?;
        debug!(kind = R::KIND, key = record.key(), "record stored");
        Ok(())
    }

    /// Remove a record, returning it if it existed.
    pub fn remove<R: Record>(&self, key: &str) -> StateResult<Option<R>> {
        let mut table = self.txn.open_table(R::TABLE).map_err(map_err!(Table))?;
        let removed = match table.remove(key).map_err(map_err!(Storage))? {
            Some(guard) => Some(decode(key, guard.value())?),
            None => None,
        };
        debug!(kind = R::KIND, %key, existed = removed.is_some(), "record removed");
        Ok(removed)
    }

    /// Remove every record of one kind, returning what was removed.
    pub fn clear<R: Record>(&self) -> StateResult<Vec<R>> {
        let mut table = self.txn.open_table(R::TABLE).map_err(map_err!(Table))?;
        let records: Vec<R> = read_all(&table)?;
        for record in &records {
            table.remove(record.key()).map_err(map_err!(Storage))?;
        }
        debug!(kind = R::KIND, count = records.len(), "table cleared");
        Ok(records)
    }

    pub fn commit(self) -> StateResult<()> {
        self.txn.commit().map_err(map_err!(Commit))
    }

    pub fn abort(self) {
        if let Err(e) = self.txn.abort() {
            warn!(error = %e, "failed to abort write transaction");
        }
    }
}
