//! The per-table container: main + delta + MVCC vectors + secondary-index
//! registry + merge orchestration.
//!
//! Grounded verbatim on the reference `Store.cpp`'s `isVisibleForTransaction`,
//! `appendToDelta`, `copyRowToDelta`, `commitPositions`,
//! `checkForConcurrentCommit`, `markForDeletion`, `unmarkForDeletion`,
//! `validatePositions`, `buildValidPositions` and `merge`.

use crate::index::{DeltaIndex, GroupkeyIndex, PagedIndex};
use crate::table::{DeltaTable, MainTable};
use crate::merger::TableMerger;
use colstore_core::error::{StoreError, StoreResult};
use colstore_core::types::{
    ColumnName, LogicalType, RowId, Tid, Cid, INF_CID, MERGE_TID, START_TID, UNKNOWN_CID,
};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, instrument, trace};

/// Default page size (in rows) for a newly built `PagedIndex`; a reasonable
/// coarse-grained default for an in-memory store.
pub const DEFAULT_PAGE_SIZE: usize = 1024;

/// The three parallel MVCC vectors, each independently lockable for
/// structural growth. Individual cells are updated with atomic operations
/// while holding only a read lock on the outer `Vec`, matching the source's
/// "CAS on tid[r], spinlock only around resize" discipline.
struct MvccVectors {
    tid: RwLock<Vec<AtomicU64>>,
    cid_begin: RwLock<Vec<AtomicU64>>,
    cid_end: RwLock<Vec<AtomicU64>>,
}

impl MvccVectors {
    fn new() -> Self {
        MvccVectors {
            tid: RwLock::new(Vec::new()),
            cid_begin: RwLock::new(Vec::new()),
            cid_end: RwLock::new(Vec::new()),
        }
    }

    fn len(&self) -> usize {
        self.tid.read().len()
    }

    /// Extend all three vectors by `n` slots with `(tid, cid_begin, cid_end)`
    /// initial values, returning the starting offset.
    fn extend(&self, n: usize, tid: u64, cid_begin: u64, cid_end: u64) -> usize {
        let mut tid_v = self.tid.write();
        let mut begin_v = self.cid_begin.write();
        let mut end_v = self.cid_end.write();
        let start = tid_v.len();
        tid_v.extend((0..n).map(|_| AtomicU64::new(tid)));
        begin_v.extend((0..n).map(|_| AtomicU64::new(cid_begin)));
        end_v.extend((0..n).map(|_| AtomicU64::new(cid_end)));
        start
    }

    /// Replace the vectors wholesale, sized to `new_len`, filled with
    /// `(UNKNOWN_CID, INF_CID, START_TID)` — the post-merge reset.
    fn reset_after_merge(&self, new_len: usize) {
        let mut tid_v = self.tid.write();
        let mut begin_v = self.cid_begin.write();
        let mut end_v = self.cid_end.write();
        *tid_v = (0..new_len).map(|_| AtomicU64::new(START_TID.get())).collect();
        *begin_v = (0..new_len)
            .map(|_| AtomicU64::new(UNKNOWN_CID.get()))
            .collect();
        *end_v = (0..new_len).map(|_| AtomicU64::new(INF_CID.get())).collect();
    }

    fn tid_at(&self, r: usize) -> u64 {
        self.tid.read()[r].load(Ordering::SeqCst)
    }

    fn cid_begin_at(&self, r: usize) -> u64 {
        self.cid_begin.read()[r].load(Ordering::SeqCst)
    }

    fn cid_end_at(&self, r: usize) -> u64 {
        self.cid_end.read()[r].load(Ordering::SeqCst)
    }
}

/// A record of a dictionary extension made while copying a row into delta,
/// surfaced so the durability log can emit a Dictionary record before the
/// corresponding Value record.
#[derive(Debug, Clone)]
pub struct DictExtension {
    /// Column the value was added to.
    pub column: ColumnName,
    /// The value-id assigned.
    pub value_id: colstore_core::types::Vid,
    /// The value itself.
    pub value: colstore_core::value::Value,
}

/// Everything a caller needs to log one delta row write: any dictionary
/// extensions made while assigning value-ids, plus the vids themselves in
/// column order (the payload of the row's Value record). Returned by
/// `copy_row_to_delta` rather than logged internally, since logging needs
/// the owning table's name and logger, neither of which `Store` holds.
#[derive(Debug, Clone)]
pub struct DeltaWrite {
    /// Dictionary extensions made while writing this row, in column order.
    pub extensions: Vec<DictExtension>,
    /// The vid assigned to each column's value, in column order.
    pub value_ids: Vec<colstore_core::types::Vid>,
}

/// The per-table container unifying main, delta, MVCC vectors, and the
/// secondary-index registry.
pub struct Store {
    /// Table name, used for logging and index naming.
    pub name: String,
    schema: Vec<(ColumnName, LogicalType)>,
    main: RwLock<MainTable>,
    delta: RwLock<DeltaTable>,
    mvcc: MvccVectors,
    groupkey_indices: RwLock<FxHashMap<ColumnName, GroupkeyIndex>>,
    delta_indices: RwLock<FxHashMap<ColumnName, DeltaIndex>>,
    paged_indices: RwLock<FxHashMap<ColumnName, PagedIndex>>,
    indexed_columns: Vec<ColumnName>,
    last_commit_cid: AtomicU64,
}

impl Store {
    /// A freshly created store: empty main, empty delta, MVCC vectors of
    /// length 0. `indexed_columns` names the columns that get a
    /// `GroupkeyIndex`/`DeltaIndex`/`PagedIndex` triple.
    pub fn new(
        name: impl Into<String>,
        schema: Vec<(ColumnName, LogicalType)>,
        indexed_columns: Vec<ColumnName>,
    ) -> Self {
        let main = MainTable::empty(&schema);
        let delta = DeltaTable::empty(&schema);
        let mut delta_indices = FxHashMap::default();
        let mut groupkey_indices = FxHashMap::default();
        let mut paged_indices = FxHashMap::default();
        for col in &indexed_columns {
            delta_indices.insert(col.clone(), DeltaIndex::new());
            groupkey_indices.insert(
                col.clone(),
                GroupkeyIndex::build(crate::dictionary::OrderPreservingDictionary::new(), &[]),
            );
            paged_indices.insert(col.clone(), PagedIndex::new(DEFAULT_PAGE_SIZE));
        }
        Store {
            name: name.into(),
            schema,
            main: RwLock::new(main),
            delta: RwLock::new(delta),
            mvcc: MvccVectors::new(),
            groupkey_indices: RwLock::new(groupkey_indices),
            delta_indices: RwLock::new(delta_indices),
            paged_indices: RwLock::new(paged_indices),
            indexed_columns,
            last_commit_cid: AtomicU64::new(0),
        }
    }

    /// Rebuild a store directly from an already-sealed `main` table (e.g.
    /// loaded from a dump), with a fresh empty delta and MVCC vectors
    /// marking every row committed-visible as of `UNKNOWN_CID`. Secondary
    /// indices are rebuilt from `main`'s values, same as `TableMerger`
    /// does after a merge.
    pub fn from_main(
        name: impl Into<String>,
        schema: Vec<(ColumnName, LogicalType)>,
        indexed_columns: Vec<ColumnName>,
        main: MainTable,
    ) -> Self {
        let row_count = main.row_count();
        let delta = DeltaTable::empty(&schema);
        let mut delta_indices = FxHashMap::default();
        let mut groupkey_indices = FxHashMap::default();
        let mut paged_indices = FxHashMap::default();
        for col in &indexed_columns {
            delta_indices.insert(col.clone(), DeltaIndex::new());
            if let Some(col_idx) = main.column_index(col) {
                let column = &main.columns[col_idx];
                let vids: Vec<colstore_core::types::Vid> =
                    (0..row_count).map(|r| column.vid_at(r)).collect();
                groupkey_indices.insert(col.clone(), GroupkeyIndex::build(column.dictionary.clone(), &vids));
                let mut paged = PagedIndex::new(DEFAULT_PAGE_SIZE);
                for (row, &vid) in vids.iter().enumerate() {
                    paged.mark(vid, row);
                }
                paged_indices.insert(col.clone(), paged);
            }
        }

        let mvcc = MvccVectors::new();
        mvcc.extend(row_count, START_TID.get(), UNKNOWN_CID.get(), INF_CID.get());

        Store {
            name: name.into(),
            schema,
            main: RwLock::new(main),
            delta: RwLock::new(delta),
            mvcc,
            groupkey_indices: RwLock::new(groupkey_indices),
            delta_indices: RwLock::new(delta_indices),
            paged_indices: RwLock::new(paged_indices),
            indexed_columns,
            last_commit_cid: AtomicU64::new(0),
        }
    }

    /// The store's column schema.
    pub fn schema(&self) -> &[(ColumnName, LogicalType)] {
        &self.schema
    }

    /// Names of columns carrying secondary indices.
    pub fn indexed_columns(&self) -> &[ColumnName] {
        &self.indexed_columns
    }

    /// Number of rows in main.
    pub fn main_len(&self) -> usize {
        self.main.read().row_count()
    }

    /// Number of rows in delta.
    pub fn delta_len(&self) -> usize {
        self.delta.read().row_count()
    }

    /// Total addressable row count: `|main| + |delta|`.
    pub fn total_len(&self) -> usize {
        self.main_len() + self.delta_len()
    }

    /// Read-only access to main, for scans.
    pub fn main(&self) -> parking_lot::RwLockReadGuard<'_, MainTable> {
        self.main.read()
    }

    /// Read-only access to delta, for scans.
    pub fn delta(&self) -> parking_lot::RwLockReadGuard<'_, DeltaTable> {
        self.delta.read()
    }

    /// Read-only access to a column's group-key index, if built.
    pub fn groupkey_index(&self, column: &str) -> Option<parking_lot::MappedRwLockReadGuard<'_, GroupkeyIndex>> {
        parking_lot::RwLockReadGuard::try_map(self.groupkey_indices.read(), |m| m.get(column)).ok()
    }

    /// Read-only access to a column's delta index, if registered.
    pub fn delta_index(&self, column: &str) -> Option<parking_lot::MappedRwLockReadGuard<'_, DeltaIndex>> {
        parking_lot::RwLockReadGuard::try_map(self.delta_indices.read(), |m| m.get(column)).ok()
    }

    /// Commit-id of the most recently completed commit against this store.
    pub fn last_commit_cid(&self) -> Cid {
        Cid::new(self.last_commit_cid.load(Ordering::SeqCst))
    }

    /// Advance the last-committed watermark; called by `TransactionManager`
    /// after a successful commit.
    pub fn advance_last_commit_cid(&self, cid: Cid) {
        self.last_commit_cid.fetch_max(cid.get(), Ordering::SeqCst);
    }

    /// Atomically reserve `n` consecutive delta rows, extending all three
    /// MVCC vectors with `(INF, INF, START_TID)`. Concurrent callers
    /// receive disjoint ranges because the reservation and the vector
    /// extension happen together under the vectors' own write locks.
    /// Delta's own attribute vectors grow via `reserve_range` rather than a
    /// plain `resize`, so the reserved range is handed back to the caller
    /// instead of recomputed from `row_count` before and after.
    #[instrument(skip(self))]
    pub fn append_to_delta(&self, n: usize) -> (RowId, RowId) {
        let main_len = self.main_len();
        let start_in_delta = {
            let mut delta = self.delta.write();
            delta.reserve_range(n).start
        };
        let mvcc_start = self
            .mvcc
            .extend(n, START_TID.get(), INF_CID.get(), INF_CID.get());
        debug_assert_eq!(mvcc_start, main_len + start_in_delta);
        let begin = RowId::new(mvcc_start as u64);
        let end = RowId::new((mvcc_start + n) as u64);
        trace!(begin = begin.get(), end = end.get(), "reserved delta range");
        (begin, end)
    }

    /// Materialize one row into delta at `dst_row` (relative to delta),
    /// setting `tid[global] = tid`. Returns the dictionary extensions made
    /// plus the vid assigned to every column, for the caller to forward to
    /// the durability log via `StorageManager::log_write` ahead of commit.
    pub fn copy_row_to_delta(
        &self,
        values: Vec<colstore_core::value::Value>,
        dst_row: usize,
        tid: Tid,
    ) -> DeltaWrite {
        let main_len = self.main_len();
        let global = main_len + dst_row;
        self.mvcc.tid.read()[global].store(tid.get(), Ordering::SeqCst);

        let mut extensions = Vec::new();
        let mut value_ids = Vec::with_capacity(values.len());
        {
            let mut delta = self.delta.write();
            for (col_idx, value) in values.into_iter().enumerate() {
                let column = delta.columns[col_idx].name.clone();
                let before = delta.columns[col_idx].dictionary.size();
                let vid = delta.columns[col_idx].set_value(dst_row, value.clone());
                if delta.columns[col_idx].dictionary.size() > before {
                    extensions.push(DictExtension {
                        column,
                        value_id: vid,
                        value,
                    });
                }
                value_ids.push(vid);
            }
        }

        self.add_row_to_delta_indices(dst_row, global);
        DeltaWrite { extensions, value_ids }
    }

    /// Replay a logged dictionary extension into the delta for `column`,
    /// returning the vid the dictionary assigned. Used by log recovery;
    /// callers should assert the returned vid equals the one recorded in
    /// the log, since replaying dictionary records in their original order
    /// is what makes the vid assignment deterministic.
    pub fn recover_dictionary_entry(
        &self,
        column: &str,
        value: colstore_core::value::Value,
    ) -> StoreResult<colstore_core::types::Vid> {
        let mut delta = self.delta.write();
        let col_idx = delta.column_index(column).ok_or_else(|| StoreError::ColumnNotFound {
            table: self.name.clone(),
            column: column.to_string(),
        })?;
        Ok(delta.columns[col_idx].dictionary.add(value))
    }

    /// Grow delta (if needed) so that global row `row` exists, then write
    /// `vid` directly into `column` at that row, bypassing the dictionary.
    /// Used by log recovery to replay a Value record's already-resolved
    /// value-ids.
    pub fn recover_set_delta_vid(
        &self,
        column: &str,
        row: RowId,
        vid: colstore_core::types::Vid,
    ) -> StoreResult<()> {
        let main_len = self.main_len();
        let delta_row = row.get() as usize - main_len;
        let needed = delta_row + 1;
        if needed > self.delta_len() {
            self.append_to_delta(needed - self.delta_len());
        }
        let mut delta = self.delta.write();
        let col_idx = delta.column_index(column).ok_or_else(|| StoreError::ColumnNotFound {
            table: self.name.clone(),
            column: column.to_string(),
        })?;
        delta.columns[col_idx].set_vid(delta_row, vid);
        drop(delta);
        self.add_row_to_delta_indices(delta_row, row.get() as usize);
        Ok(())
    }

    fn add_row_to_delta_indices(&self, delta_row: usize, global_row: usize) {
        let delta = self.delta.read();
        let mut indices = self.delta_indices.write();
        for column in &self.indexed_columns {
            if let (Some(col_idx), Some(idx)) = (delta.column_index(column), indices.get_mut(column)) {
                let value = delta.columns[col_idx].value_at(delta_row);
                idx.add(value, RowId::new(global_row as u64));
            }
        }
    }

    /// CAS `tid[row]` from `START_TID` to `tid`. Idempotent if `tid` already
    /// holds the row and it has not been invalidated; otherwise fails with
    /// `ConcurrentCommit`.
    pub fn mark_for_deletion(&self, row: RowId, tid: Tid) -> StoreResult<()> {
        let r = row.get() as usize;
        let cell = &self.mvcc.tid.read()[r];
        match cell.compare_exchange(
            START_TID.get(),
            tid.get(),
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => Ok(()),
            Err(current) => {
                if current == tid.get() && self.mvcc.cid_end_at(r) == INF_CID.get() {
                    Ok(())
                } else {
                    Err(StoreError::ConcurrentCommit { row: row.get() })
                }
            }
        }
    }

    /// Best-effort reset of `tid[row]` to `START_TID` where it is currently
    /// held by `tid`. Used for idempotent rollback.
    pub fn unmark_for_deletion(&self, rows: &[RowId], tid: Tid) {
        let cells = self.mvcc.tid.read();
        for row in rows {
            let r = row.get() as usize;
            let _ = cells[r].compare_exchange(
                tid.get(),
                START_TID.get(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            );
        }
    }

    /// For each row, require `tid[r] == tid` and `cid_end[r] == INF`.
    pub fn check_for_concurrent_commit(&self, rows: &[RowId], tid: Tid) -> StoreResult<()> {
        for row in rows {
            let r = row.get() as usize;
            if self.mvcc.tid_at(r) != tid.get() || self.mvcc.cid_end_at(r) != INF_CID.get() {
                return Err(StoreError::ConcurrentCommit { row: row.get() });
            }
        }
        Ok(())
    }

    /// Commit a batch of positions. If `valid`, set `cid_begin[r] = cid` and
    /// reset `tid[r]` to `START_TID` (an insert becoming visible). If not
    /// valid, only `cid_end[r] = cid` is set — `tid` is left untouched, since
    /// no later transaction should ever contend on a committed-delete row's
    /// tid (see DESIGN.md's Open Question resolution).
    pub fn commit_positions(&self, rows: &[RowId], cid: Cid, valid: bool) {
        let tid_v = self.mvcc.tid.read();
        let begin_v = self.mvcc.cid_begin.read();
        let end_v = self.mvcc.cid_end.read();
        for row in rows {
            let r = row.get() as usize;
            if valid {
                begin_v[r].store(cid.get(), Ordering::SeqCst);
                tid_v[r].store(START_TID.get(), Ordering::SeqCst);
            } else {
                end_v[r].store(cid.get(), Ordering::SeqCst);
            }
        }
    }

    /// The visibility predicate of §3: for transaction `tid` at snapshot
    /// `snapshot_cid`, is row `r` visible?
    fn is_visible(&self, r: usize, snapshot_cid: Cid, tid: Tid) -> bool {
        let row_tid = self.mvcc.tid_at(r);
        let cid_begin = self.mvcc.cid_begin_at(r);
        let cid_end = self.mvcc.cid_end_at(r);
        if row_tid == tid.get() {
            cid_begin > snapshot_cid.get() && cid_end == INF_CID.get()
        } else {
            cid_begin <= snapshot_cid.get() && cid_end > snapshot_cid.get()
        }
    }

    /// In-place filter to visible rows.
    pub fn validate_positions(&self, positions: &[RowId], snapshot_cid: Cid, tid: Tid) -> Vec<RowId> {
        positions
            .iter()
            .copied()
            .filter(|r| self.is_visible(r.get() as usize, snapshot_cid, tid))
            .collect()
    }

    /// Enumerate all visible rows.
    pub fn build_valid_positions(&self, snapshot_cid: Cid, tid: Tid) -> Vec<RowId> {
        (0..self.mvcc.len())
            .filter(|&r| self.is_visible(r, snapshot_cid, tid))
            .map(|r| RowId::new(r as u64))
            .collect()
    }

    /// Rebuild main from main ∪ delta (visible rows only, per `MERGE_TID`
    /// snapshot at `last_commit_cid`), swap it in, replace delta with a
    /// fresh empty one, and reset the MVCC vectors. See `TableMerger` for
    /// the per-column algorithm.
    #[instrument(skip(self))]
    pub fn merge(&self) -> StoreResult<()> {
        let last_cid = self.last_commit_cid();
        let total = self.total_len();
        let valid_positions: Vec<bool> = (0..total)
            .map(|r| self.is_visible(r, last_cid, MERGE_TID))
            .collect();

        let (new_main, paged, groupkey) = {
            let main = self.main.read();
            let delta = self.delta.read();
            TableMerger::merge(&main, &delta, &valid_positions, &self.indexed_columns)?
        };

        let new_len = new_main.row_count();
        {
            let mut main_w = self.main.write();
            let mut delta_w = self.delta.write();
            *main_w = new_main;
            *delta_w = DeltaTable::empty(&self.schema);
        }
        {
            let mut delta_indices = self.delta_indices.write();
            for col in &self.indexed_columns {
                delta_indices.insert(col.clone(), DeltaIndex::new());
            }
        }
        *self.paged_indices.write() = paged;
        *self.groupkey_indices.write() = groupkey;
        self.mvcc.reset_after_merge(new_len);
        debug!(new_main_len = new_len, "merge complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colstore_core::value::Value;

    fn int_store() -> Store {
        Store::new(
            "t",
            vec![("id".to_string(), LogicalType::Int)],
            vec!["id".to_string()],
        )
    }

    #[test]
    fn append_to_delta_ranges_are_disjoint_and_contiguous() {
        let store = int_store();
        let (b1, e1) = store.append_to_delta(3);
        let (b2, e2) = store.append_to_delta(2);
        assert_eq!((b1.get(), e1.get()), (0, 3));
        assert_eq!((b2.get(), e2.get()), (3, 5));
        assert_eq!(store.delta_len(), 5);
    }

    #[test]
    fn visibility_matches_scenario_1() {
        let store = int_store();
        let (begin, _) = store.append_to_delta(1);
        let row = begin;
        let t1 = Tid::new(1);
        store.copy_row_to_delta(vec![Value::Int(1)], row.get() as usize, t1);
        store.commit_positions(&[row], Cid::new(1), true);

        // T2 at snapshot cid=0 must not see the row.
        let t2_visible = store.validate_positions(&[row], Cid::new(0), Tid::new(2));
        assert!(t2_visible.is_empty());

        // T3 at snapshot cid=1 must see the row.
        let t3_visible = store.validate_positions(&[row], Cid::new(1), Tid::new(3));
        assert_eq!(t3_visible, vec![row]);
    }

    #[test]
    fn own_pending_insert_is_visible_to_self_before_commit() {
        let store = int_store();
        let (begin, _) = store.append_to_delta(1);
        let t1 = Tid::new(1);
        store.copy_row_to_delta(vec![Value::Int(42)], begin.get() as usize, t1);
        // not yet committed: cid_begin == INF > snapshot, cid_end == INF -> visible to self
        let visible = store.validate_positions(&[begin], Cid::new(0), t1);
        assert_eq!(visible, vec![begin]);
        // but not visible to another transaction
        let not_visible = store.validate_positions(&[begin], Cid::new(0), Tid::new(2));
        assert!(not_visible.is_empty());
    }

    #[test]
    fn mark_for_deletion_concurrent_exactly_one_wins() {
        let store = int_store();
        let (begin, _) = store.append_to_delta(1);
        store.commit_positions(&[begin], Cid::new(1), true);

        let r1 = store.mark_for_deletion(begin, Tid::new(10));
        let r2 = store.mark_for_deletion(begin, Tid::new(11));
        assert!(r1.is_ok());
        assert!(r2.is_err());
    }

    #[test]
    fn mark_for_deletion_is_idempotent_for_same_tid() {
        let store = int_store();
        let (begin, _) = store.append_to_delta(1);
        store.commit_positions(&[begin], Cid::new(1), true);
        assert!(store.mark_for_deletion(begin, Tid::new(5)).is_ok());
        assert!(store.mark_for_deletion(begin, Tid::new(5)).is_ok());
    }

    #[test]
    fn commit_positions_delete_branch_leaves_tid_untouched() {
        let store = int_store();
        let (begin, _) = store.append_to_delta(1);
        store.commit_positions(&[begin], Cid::new(1), true);
        let tid = Tid::new(7);
        store.mark_for_deletion(begin, tid).unwrap();
        store.commit_positions(&[begin], Cid::new(2), false);
        assert_eq!(store.mvcc.tid_at(begin.get() as usize), tid.get());
        assert_eq!(store.mvcc.cid_end_at(begin.get() as usize), 2);
    }

    #[test]
    fn unmark_for_deletion_resets_only_matching_tid() {
        let store = int_store();
        let (begin, _) = store.append_to_delta(1);
        store.commit_positions(&[begin], Cid::new(1), true);
        store.mark_for_deletion(begin, Tid::new(9)).unwrap();
        store.unmark_for_deletion(&[begin], Tid::new(999));
        assert_eq!(store.mvcc.tid_at(begin.get() as usize), 9);
        store.unmark_for_deletion(&[begin], Tid::new(9));
        assert_eq!(store.mvcc.tid_at(begin.get() as usize), START_TID.get());
    }

    #[test]
    fn merge_idempotent_on_empty_delta() {
        let store = int_store();
        let (b0, _) = store.append_to_delta(1);
        store.copy_row_to_delta(vec![Value::Int(1)], 0, Tid::new(1));
        store.commit_positions(&[b0], Cid::new(1), true);
        store.merge().unwrap();
        assert_eq!(store.main_len(), 1);
        assert_eq!(store.delta_len(), 0);

        store.merge().unwrap();
        assert_eq!(store.main_len(), 1);
        assert_eq!(store.delta_len(), 0);
    }

    #[test]
    fn merge_compacts_1000_delta_rows() {
        let store = int_store();
        let (begin, _) = store.append_to_delta(1000);
        for i in 0..1000u64 {
            let row = (begin.get() + i) as usize;
            store.copy_row_to_delta(vec![Value::Int(i as i64)], row, Tid::new(1));
        }
        let rows: Vec<RowId> = (begin.get()..begin.get() + 1000).map(RowId::new).collect();
        store.commit_positions(&rows, Cid::new(1), true);
        store.merge().unwrap();
        assert_eq!(store.main_len(), 1000);
        assert_eq!(store.delta_len(), 0);
        for r in 0..1000usize {
            assert_eq!(store.mvcc.tid_at(r), START_TID.get());
            assert_eq!(store.mvcc.cid_end_at(r), INF_CID.get());
        }
    }

    #[test]
    fn check_for_concurrent_commit_fails_on_mismatched_tid() {
        let store = int_store();
        let (begin, _) = store.append_to_delta(1);
        assert!(store
            .check_for_concurrent_commit(&[begin], Tid::new(99))
            .is_err());
    }
}
