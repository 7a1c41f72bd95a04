//! Shared trait seams implemented in `storage`.
//!
//! Defining these in `core` (rather than inline in `storage`) keeps the
//! contract visible to `durability` and `concurrency` without those crates
//! depending on `storage`'s implementation details.

use crate::error::StoreResult;
use crate::types::Vid;
use crate::value::Value;

/// Bidirectional value↔value-id map. Two implementations share this
/// interface: an order-preserving, sealed-after-build dictionary (used by
/// main) and an order-indifferent, append-only dictionary (used by delta).
pub trait Dictionary: Send + Sync {
    /// Insert `v`, returning its value-id. Order-preserving dictionaries
    /// only support this during bulk build; order-indifferent dictionaries
    /// support concurrent calls and return the existing vid on repeat
    /// inserts of an equal value.
    fn add(&mut self, v: Value) -> Vid;

    /// Exact lookup. Order-preserving dictionaries fail with
    /// `DictValueNotFound` through the caller's own error mapping when the
    /// value is absent in a context requiring exactness; this trait method
    /// itself returns `None` for "not present".
    fn vid_for_value(&self, v: &Value) -> Option<Vid>;

    /// Resolve a value-id back to its value. Panics if `vid` is out of
    /// range; callers only ever pass vids obtained from this same
    /// dictionary.
    fn value_for_vid(&self, vid: Vid) -> Value;

    /// Number of distinct values held.
    fn size(&self) -> usize;

    /// Smallest vid `i` such that `value_for_vid(i) >= v`. For an
    /// order-indifferent dictionary this is only meaningful relative to
    /// insertion order and should not be used for range predicates.
    fn lower_bound(&self, v: &Value) -> Vid;

    /// Smallest vid `i` such that `value_for_vid(i) > v`.
    fn upper_bound(&self, v: &Value) -> Vid;
}

/// A result of probing an index: the set of matching row positions plus
/// whether that set is known to be in ascending order.
///
/// The original engine represents this as an iterator pair over the
/// index's own storage; Rust's borrow checker makes returning borrowed
/// iterator pairs across this trait boundary impractical, so the owned
/// form is used here instead. Observable semantics are unchanged: ascending
/// order when `sorted`, otherwise a flat concatenation that must be sorted
/// before being intersected with another range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionRange {
    /// Matching row positions.
    pub positions: Vec<crate::types::RowId>,
    /// Whether `positions` is known to be ascending.
    pub sorted: bool,
}

impl PositionRange {
    /// An empty, trivially sorted range.
    pub fn empty() -> Self {
        PositionRange {
            positions: Vec::new(),
            sorted: true,
        }
    }

    /// Build a range from already-sorted positions.
    pub fn sorted(positions: Vec<crate::types::RowId>) -> Self {
        PositionRange {
            positions,
            sorted: true,
        }
    }

    /// Build a range whose positions are not known to be sorted.
    pub fn unsorted(positions: Vec<crate::types::RowId>) -> Self {
        PositionRange {
            positions,
            sorted: false,
        }
    }

    /// Number of positions.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether there are no positions.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Sort in place if not already known sorted, and mark as sorted.
    pub fn ensure_sorted(&mut self) {
        if !self.sorted {
            self.positions.sort_unstable();
            self.sorted = true;
        }
    }
}

/// Shared probe interface for the three secondary-index structures
/// (`GroupkeyIndex`, `DeltaIndex`, `PagedIndex`).
pub trait IndexProbe: Send + Sync {
    /// Rows whose value equals `key`.
    fn eq(&self, key: &Value) -> StoreResult<PositionRange>;
    /// Rows whose value is strictly less than `key`.
    fn lt(&self, key: &Value) -> StoreResult<PositionRange>;
    /// Rows whose value is less than or equal to `key`.
    fn lte(&self, key: &Value) -> StoreResult<PositionRange>;
    /// Rows whose value is strictly greater than `key`.
    fn gt(&self, key: &Value) -> StoreResult<PositionRange>;
    /// Rows whose value is greater than or equal to `key`.
    fn gte(&self, key: &Value) -> StoreResult<PositionRange>;
    /// Rows whose value lies in `[a, b]`.
    fn between(&self, a: &Value, b: &Value) -> StoreResult<PositionRange>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RowId;

    #[test]
    fn position_range_ensure_sorted_sorts_unsorted_input() {
        let mut r = PositionRange::unsorted(vec![RowId::new(3), RowId::new(1), RowId::new(2)]);
        r.ensure_sorted();
        assert!(r.sorted);
        assert_eq!(
            r.positions,
            vec![RowId::new(1), RowId::new(2), RowId::new(3)]
        );
    }

    #[test]
    fn position_range_empty_is_sorted_and_empty() {
        let r = PositionRange::empty();
        assert!(r.sorted);
        assert!(r.is_empty());
    }
}
