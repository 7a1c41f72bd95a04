//! Issues tids and cids, tracks live transactions, and orchestrates commit.
//!
//! Uses `AtomicU64` counters with `fetch_update`+`checked_add` for
//! overflow-safe tid/cid issuance, and tracks per-store insert/delete row
//! batches per transaction rather than read/write sets, applying them
//! atomically at commit time.

use colstore_core::error::{StoreError, StoreResult};
use colstore_core::types::{Cid, RowId, Tid};
use colstore_durability::encode_commit;
use colstore_storage::Store;
use dashmap::DashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{instrument, warn};

/// A pending batch of row commits against one store, accumulated during a
/// transaction and applied atomically at commit time.
struct PendingBatch {
    store: Arc<Store>,
    inserted: Vec<RowId>,
    deleted: Vec<RowId>,
}

/// The read/write context of one in-flight transaction: its tid, its
/// snapshot commit-id (the `last_committed_cid` at `begin`), and the rows
/// it has touched so far.
pub struct TxContext {
    /// This transaction's id.
    pub tid: Tid,
    /// The commit-id snapshot this transaction reads against.
    pub snapshot_cid: Cid,
    batches: Vec<PendingBatch>,
}

impl TxContext {
    fn batch_for(&mut self, store: &Arc<Store>) -> &mut PendingBatch {
        if let Some(pos) = self.batches.iter().position(|b| Arc::ptr_eq(&b.store, store)) {
            &mut self.batches[pos]
        } else {
            self.batches.push(PendingBatch {
                store: store.clone(),
                inserted: Vec::new(),
                deleted: Vec::new(),
            });
            self.batches.last_mut().unwrap()
        }
    }

    /// Record that `rows` were newly inserted into `store` under this
    /// transaction, to be committed as visible when `commit_transaction`
    /// runs.
    pub fn record_insert(&mut self, store: &Arc<Store>, rows: Vec<RowId>) {
        self.batch_for(store).inserted.extend(rows);
    }

    /// Record that `rows` were marked for deletion in `store` under this
    /// transaction.
    pub fn record_delete(&mut self, store: &Arc<Store>, rows: Vec<RowId>) {
        self.batch_for(store).deleted.extend(rows);
    }
}

/// Issues monotonically increasing tids (never reused) and commit-ids,
/// and tracks which tids are still live.
pub struct TransactionManager {
    next_tid: AtomicU64,
    next_cid: AtomicU64,
    running: DashSet<Tid>,
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionManager {
    /// A fresh manager; tid 0 is `START_TID` (the unlocked sentinel), so
    /// issuance starts at 1.
    pub fn new() -> Self {
        TransactionManager {
            next_tid: AtomicU64::new(1),
            next_cid: AtomicU64::new(1),
            running: DashSet::new(),
        }
    }

    fn allocate_tid(&self) -> Tid {
        let raw = self
            .next_tid
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_add(1))
            .expect("transaction id space exhausted");
        Tid::new(raw)
    }

    fn allocate_cid(&self) -> Cid {
        let raw = self
            .next_cid
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_add(1))
            .expect("commit id space exhausted");
        Cid::new(raw)
    }

    /// The most recently allocated commit-id (the snapshot new readers see).
    pub fn last_committed_cid(&self) -> Cid {
        Cid::new(self.next_cid.load(Ordering::SeqCst).saturating_sub(1))
    }

    /// Begin a new transaction: allocate a tid, snapshot the current
    /// `last_committed_cid`, and mark the tid as running.
    #[instrument(skip(self))]
    pub fn begin_transaction(&self) -> TxContext {
        let tid = self.allocate_tid();
        self.running.insert(tid);
        TxContext {
            tid,
            snapshot_cid: self.last_committed_cid(),
            batches: Vec::new(),
        }
    }

    /// Whether `tid` is still live (so rollbacks can be idempotent).
    pub fn is_running_transaction(&self, tid: Tid) -> bool {
        self.running.contains(&tid)
    }

    /// Commit `ctx`: allocate a cid, apply every recorded insert/delete
    /// batch via `Store::commit_positions`, advance each touched store's
    /// `last_commit_cid`, append a Commit record, optionally flush the
    /// durability log, then mark the tid no longer running.
    ///
    /// Dictionary/Value records are logged eagerly as each row is written
    /// (`StorageManager::log_write`/`log_delete`), not deferred to this
    /// call — only the trailing Commit record is encoded here, right
    /// before the tid that made the writes is dropped from the running
    /// set. Deferring Dictionary/Value encoding to commit time would let
    /// concurrent transactions' log order diverge from delta's actual
    /// insertion order, breaking recovery's replayed-vid-equals-logged-vid
    /// assertion.
    ///
    /// `log_append`, if given, is invoked with the encoded Commit record
    /// right after the in-memory commit; `flush_log`, if given, runs after
    /// that. Neither failure undoes the commit — a log-write failure marks
    /// the commit non-durable rather than aborting it, matching
    /// `StoreError::is_durability_warning`.
    #[instrument(skip(self, ctx, log_append, flush_log))]
    pub fn commit_transaction(
        &self,
        ctx: TxContext,
        log_append: Option<&mut dyn FnMut(&[u8]) -> StoreResult<()>>,
        flush_log: Option<&mut dyn FnMut() -> StoreResult<()>>,
    ) -> StoreResult<Cid> {
        let cid = self.allocate_cid();
        for batch in &ctx.batches {
            if !batch.inserted.is_empty() {
                batch.store.commit_positions(&batch.inserted, cid, true);
            }
            if !batch.deleted.is_empty() {
                batch.store.commit_positions(&batch.deleted, cid, false);
            }
            batch.store.advance_last_commit_cid(cid);
        }

        if let Some(append) = log_append {
            match encode_commit(ctx.tid) {
                Ok(bytes) => {
                    if let Err(e) = append(&bytes) {
                        warn!(error = %e, "commit record append failed; commit is not durable");
                    }
                }
                Err(e) => warn!(error = %e, "failed to encode commit record"),
            }
        }

        if let Some(flush) = flush_log {
            if let Err(e) = flush() {
                warn!(error = %e, "log flush failed; commit is not durable");
            }
        }

        self.running.remove(&ctx.tid);
        Ok(cid)
    }

    /// Roll back `ctx`: best-effort unmark every recorded row across every
    /// touched store, then mark the tid no longer running. Idempotent —
    /// safe to call more than once for the same tid.
    pub fn rollback_transaction(&self, ctx: &TxContext) -> StoreResult<()> {
        for batch in &ctx.batches {
            let mut rows = batch.inserted.clone();
            rows.extend(batch.deleted.iter().copied());
            batch.store.unmark_for_deletion(&rows, ctx.tid);
        }
        self.running.remove(&ctx.tid);
        Ok(())
    }

    /// Abort `ctx` without touching any store (e.g. a validation failure
    /// before any row was written); marks the tid done and returns the
    /// sentinel error so callers can distinguish an explicit abort from a
    /// successful commit.
    pub fn abort_transaction(&self, ctx: &TxContext) -> StoreError {
        self.running.remove(&ctx.tid);
        StoreError::TransactionAborted(ctx.tid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colstore_core::types::LogicalType;
    use colstore_core::value::Value;

    fn store() -> Arc<Store> {
        Arc::new(Store::new(
            "t",
            vec![("id".to_string(), LogicalType::Int)],
            vec![],
        ))
    }

    #[test]
    fn tids_are_monotonically_increasing_and_never_reused() {
        let mgr = TransactionManager::new();
        let t1 = mgr.begin_transaction();
        let t2 = mgr.begin_transaction();
        assert!(t2.tid.get() > t1.tid.get());
    }

    #[test]
    fn commit_advances_cid_and_marks_rows_visible() {
        let mgr = TransactionManager::new();
        let s = store();
        let (begin, _) = s.append_to_delta(1);
        let mut ctx = mgr.begin_transaction();
        s.copy_row_to_delta(vec![Value::Int(1)], 0, ctx.tid);
        ctx.record_insert(&s, vec![begin]);
        let cid = mgr.commit_transaction(ctx, None, None).unwrap();
        assert_eq!(s.last_commit_cid(), cid);

        let reader_ctx = mgr.begin_transaction();
        let visible = s.validate_positions(&[begin], reader_ctx.snapshot_cid, reader_ctx.tid);
        assert_eq!(visible, vec![begin]);
    }

    #[test]
    fn is_running_transaction_reflects_lifecycle() {
        let mgr = TransactionManager::new();
        let ctx = mgr.begin_transaction();
        assert!(mgr.is_running_transaction(ctx.tid));
        let tid = ctx.tid;
        mgr.commit_transaction(ctx, None, None).unwrap();
        assert!(!mgr.is_running_transaction(tid));
    }

    #[test]
    fn rollback_unmarks_recorded_rows() {
        let mgr = TransactionManager::new();
        let s = store();
        let (begin, _) = s.append_to_delta(1);
        s.commit_positions(&[begin], Cid::new(1), true);
        let mut ctx = mgr.begin_transaction();
        s.mark_for_deletion(begin, ctx.tid).unwrap();
        ctx.record_delete(&s, vec![begin]);
        mgr.rollback_transaction(&ctx).unwrap();
        assert!(!mgr.is_running_transaction(ctx.tid));
        assert!(s.mark_for_deletion(begin, Tid::new(999)).is_ok());
    }
}
