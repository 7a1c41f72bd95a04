//! # StorageManager
//!
//! The embedding crate's single entry point: a process-wide registry of
//! named [`Store`]s, each backed by its own durability log, coordinated
//! through one [`TransactionManager`].
//!
//! ```no_run
//! use colstore::StorageManager;
//! use colstore_core::types::LogicalType;
//!
//! # fn main() -> colstore_core::error::StoreResult<()> {
//! let mgr = StorageManager::open("./data")?;
//! mgr.create_table(
//!     "orders",
//!     vec![("id".to_string(), LogicalType::Int), ("qty".to_string(), LogicalType::Int)],
//!     vec!["id".to_string()],
//! )?;
//!
//! let store = mgr.get_table("orders")?;
//! let mut ctx = mgr.begin_transaction();
//! let (begin, _) = store.append_to_delta(1);
//! let write = store.copy_row_to_delta(vec![1.into(), 10.into()], 0, ctx.tid);
//! mgr.log_write("orders", ctx.tid, begin, write)?;
//! ctx.record_insert(&store, vec![begin]);
//! mgr.commit_transaction(ctx)?;
//!
//! mgr.persist_table("orders")?;
//! # Ok(())
//! # }
//! ```
//!
//! Pairs each registered table's `Store` with its own durability log
//! and one shared `TransactionManager` for tid/cid issuance and
//! commit orchestration. Dictionary/Value records are logged eagerly at
//! mutation time via `log_write`/`log_delete`, ahead of the eventual
//! commit; `commit_transaction` only appends the trailing Commit record
//! (see `TransactionManager::commit_transaction`'s doc comment for why).

#![warn(missing_docs)]
#![warn(clippy::all)]

use colstore_concurrency::{TransactionManager, TxContext};
use colstore_core::error::{StoreError, StoreResult};
use colstore_core::types::{Cid, ColumnName, LogicalType, RowId, TableName, Tid};
use colstore_durability::{
    dump_table, encode_dictionary, encode_value, load_table, replay, BufferedLogger,
    DEFAULT_BUFFER_SIZE,
};
use colstore_storage::{DeltaWrite, Store};
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument};

pub use colstore_concurrency as concurrency;
pub use colstore_core as core;
pub use colstore_durability as durability;
pub use colstore_storage as storage;

struct TableEntry {
    store: Arc<Store>,
    logger: Arc<BufferedLogger>,
    indexed_columns: Vec<ColumnName>,
}

/// Coordinates every named table's store, log, and shared transaction
/// manager for one database directory.
pub struct StorageManager {
    db_path: PathBuf,
    tables: DashMap<TableName, TableEntry>,
    tx_manager: Arc<TransactionManager>,
}

impl StorageManager {
    /// Open (creating if absent) a database rooted at `db_path`. Does not
    /// load any tables; call `recover_table` or `create_table` per table.
    pub fn open(db_path: impl AsRef<Path>) -> StoreResult<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        std::fs::create_dir_all(db_path.join("log"))?;
        Ok(StorageManager {
            db_path,
            tables: DashMap::new(),
            tx_manager: Arc::new(TransactionManager::new()),
        })
    }

    fn log_path(&self, table: &str) -> PathBuf {
        self.db_path.join("log").join(table).join("wal.bin")
    }

    /// Create a fresh, empty table and register it.
    #[instrument(skip(self, schema))]
    pub fn create_table(
        &self,
        name: impl Into<String>,
        schema: Vec<(ColumnName, LogicalType)>,
        indexed_columns: Vec<ColumnName>,
    ) -> StoreResult<Arc<Store>> {
        let name = name.into();
        let store = Arc::new(Store::new(name.clone(), schema, indexed_columns.clone()));
        let logger = Arc::new(BufferedLogger::open(self.log_path(&name), DEFAULT_BUFFER_SIZE)?);
        self.tables.insert(
            name,
            TableEntry {
                store: store.clone(),
                logger,
                indexed_columns,
            },
        );
        Ok(store)
    }

    /// Look up a registered table's store.
    pub fn get_table(&self, name: &str) -> StoreResult<Arc<Store>> {
        self.tables
            .get(name)
            .map(|e| e.store.clone())
            .ok_or_else(|| StoreError::TableNotFound(name.to_string()))
    }

    /// Begin a new transaction against this manager's shared tid/cid
    /// counters.
    pub fn begin_transaction(&self) -> TxContext {
        self.tx_manager.begin_transaction()
    }

    /// Log one delta row write ahead of commit: a Dictionary record per
    /// dictionary extension `write` carries, then one Value record for the
    /// row itself, with every column's bit set in the field bitmask (a
    /// freshly materialized row has every column written). Call this right
    /// after `Store::copy_row_to_delta` returns.
    #[instrument(skip(self, write))]
    pub fn log_write(&self, table: &str, tid: Tid, row: RowId, write: DeltaWrite) -> StoreResult<()> {
        let entry = self
            .tables
            .get(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;
        for ext in &write.extensions {
            let column = entry
                .store
                .schema()
                .iter()
                .position(|(name, _)| name == &ext.column)
                .ok_or_else(|| StoreError::ColumnNotFound {
                    table: table.to_string(),
                    column: ext.column.clone(),
                })? as u32;
            let bytes = encode_dictionary(table, column, ext.value_id, &ext.value)?;
            entry.logger.append(&bytes)?;
        }
        let mask = full_column_mask(entry.store.schema().len());
        let bytes = encode_value(tid, table, row, None, mask, &write.value_ids)?;
        entry.logger.append(&bytes)
    }

    /// Log a delete ahead of commit: a single Value record with no set
    /// bits in its field bitmask and `invalidated_row` set to `row`. Call
    /// this right after `Store::mark_for_deletion` succeeds.
    #[instrument(skip(self))]
    pub fn log_delete(&self, table: &str, tid: Tid, row: RowId) -> StoreResult<()> {
        let entry = self
            .tables
            .get(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;
        let bytes = encode_value(tid, table, row, Some(row), 0, &[])?;
        entry.logger.append(&bytes)
    }

    /// Commit `ctx`: append the transaction's Commit record to every
    /// registered table's log, then flush every table's log. Touching
    /// every registered table rather than only the ones `ctx` wrote to is
    /// a simplification over per-table durability bookkeeping (see
    /// DESIGN.md): a Commit record for a tid with no pending writes in a
    /// given table's log is a harmless no-op on replay, and flushing an
    /// idle table costs a redundant syscall, never correctness.
    #[instrument(skip(self, ctx))]
    pub fn commit_transaction(&self, ctx: TxContext) -> StoreResult<Cid> {
        let tables = self.tables.clone_table_list();
        let commit_tables = tables.clone();
        let mut log_append = move |bytes: &[u8]| -> StoreResult<()> {
            for logger in &commit_tables {
                logger.append(bytes)?;
            }
            Ok(())
        };
        let mut flush_all = move || -> StoreResult<()> {
            for logger in &tables {
                logger.flush()?;
            }
            Ok(())
        };
        self.tx_manager
            .commit_transaction(ctx, Some(&mut log_append), Some(&mut flush_all))
    }

    /// Flush a table's log, merge its delta into main, dump main to disk,
    /// then truncate the log (the dump now supersedes it for cold reload).
    #[instrument(skip(self))]
    pub fn persist_table(&self, name: &str) -> StoreResult<()> {
        let entry = self
            .tables
            .get(name)
            .ok_or_else(|| StoreError::TableNotFound(name.to_string()))?;
        entry.logger.flush()?;
        entry.store.merge()?;
        dump_table(&entry.store, &self.db_path)?;
        entry.logger.truncate()?;
        info!(table = name, "table persisted");
        Ok(())
    }

    /// Reload a table: try a prior dump first, falling back to replaying
    /// the log from scratch if no dump exists, then register the result.
    #[instrument(skip(self, schema))]
    pub fn recover_table(
        &self,
        name: &str,
        schema: Vec<(ColumnName, LogicalType)>,
        indexed_columns: Vec<ColumnName>,
    ) -> StoreResult<Arc<Store>> {
        let store = match load_table(&self.db_path, name) {
            Ok((_, main)) => Arc::new(Store::from_main(name, schema, indexed_columns.clone(), main)),
            Err(_) => Arc::new(Store::new(name, schema, indexed_columns.clone())),
        };

        let logger = Arc::new(BufferedLogger::open(self.log_path(name), DEFAULT_BUFFER_SIZE)?);
        let log_bytes = logger.read_all()?;
        if !log_bytes.is_empty() {
            let mut stores = rustc_hash::FxHashMap::default();
            stores.insert(name.to_string(), store.clone());
            replay(&log_bytes, &stores)?;
        }

        self.tables.insert(
            name.to_string(),
            TableEntry {
                store: store.clone(),
                logger,
                indexed_columns,
            },
        );
        Ok(store)
    }
}

/// One bit per column, set for every column in a schema of `n` columns.
/// `field_bitmask` is a `u64`, so a schema wider than 64 columns can't be
/// fully represented — matching the log record format's existing limit.
fn full_column_mask(n: usize) -> u64 {
    if n >= 64 {
        u64::MAX
    } else {
        (1u64 << n) - 1
    }
}

trait TableList {
    fn clone_table_list(&self) -> Vec<Arc<BufferedLogger>>;
}

impl TableList for DashMap<TableName, TableEntry> {
    fn clone_table_list(&self) -> Vec<Arc<BufferedLogger>> {
        self.iter().map(|e| e.logger.clone()).collect()
    }
}
