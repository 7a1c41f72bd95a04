//! Mutable, over-delta inverted index.
//!
//! Grounded verbatim on the reference `DeltaIndex.h`: an ordered map from
//! value to a sorted pos-list, each insert synchronized by the Store's
//! write lock around `copy_row_to_delta`.

use colstore_core::error::StoreResult;
use colstore_core::traits::{IndexProbe, PositionRange};
use colstore_core::types::RowId;
use colstore_core::value::Value;
use std::collections::BTreeMap;

/// `BTreeMap<Value, Vec<RowId>>`: per-key pos-lists are sorted, but a
/// multi-key range result is only a concatenation of those per-key lists,
/// not globally sorted — hence `eq` returns `sorted: true` while range ops
/// return `sorted: false`.
#[derive(Debug, Default)]
pub struct DeltaIndex {
    index: BTreeMap<Value, Vec<RowId>>,
}

impl DeltaIndex {
    /// An empty delta index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `pos` under `value`, keeping the per-key pos-list sorted.
    /// Mirrors the reference's backward scan from the tail: new rows are
    /// almost always appended at the end since `copy_row_to_delta` assigns
    /// monotonically increasing row numbers.
    pub fn add(&mut self, value: Value, pos: RowId) {
        let list = self.index.entry(value).or_default();
        let insert_at = list
            .iter()
            .rposition(|&existing| existing <= pos)
            .map(|i| i + 1)
            .unwrap_or(0);
        list.insert(insert_at, pos);
    }

    fn concat_range<'a, I: Iterator<Item = &'a Vec<RowId>>>(iter: I) -> PositionRange {
        let mut positions = Vec::new();
        let mut keys = 0;
        for list in iter {
            positions.extend_from_slice(list);
            keys += 1;
        }
        PositionRange {
            sorted: keys <= 1,
            positions,
        }
    }
}

impl IndexProbe for DeltaIndex {
    fn eq(&self, key: &Value) -> StoreResult<PositionRange> {
        Ok(match self.index.get(key) {
            Some(list) => PositionRange::sorted(list.clone()),
            None => PositionRange::empty(),
        })
    }

    fn lt(&self, key: &Value) -> StoreResult<PositionRange> {
        Ok(Self::concat_range(
            self.index.range(..key.clone()).map(|(_, v)| v),
        ))
    }

    fn lte(&self, key: &Value) -> StoreResult<PositionRange> {
        Ok(Self::concat_range(
            self.index.range(..=key.clone()).map(|(_, v)| v),
        ))
    }

    fn gt(&self, key: &Value) -> StoreResult<PositionRange> {
        use std::ops::Bound::Excluded;
        Ok(Self::concat_range(
            self.index
                .range((Excluded(key.clone()), std::ops::Bound::Unbounded))
                .map(|(_, v)| v),
        ))
    }

    fn gte(&self, key: &Value) -> StoreResult<PositionRange> {
        Ok(Self::concat_range(
            self.index.range(key.clone()..).map(|(_, v)| v),
        ))
    }

    fn between(&self, a: &Value, b: &Value) -> StoreResult<PositionRange> {
        Ok(Self::concat_range(
            self.index.range(a.clone()..=b.clone()).map(|(_, v)| v),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eq_returns_sorted_single_key_list() {
        let mut idx = DeltaIndex::new();
        idx.add(Value::Int(5), RowId::new(3));
        idx.add(Value::Int(5), RowId::new(1));
        idx.add(Value::Int(5), RowId::new(2));
        let r = idx.eq(&Value::Int(5)).unwrap();
        assert!(r.sorted);
        assert_eq!(
            r.positions,
            vec![RowId::new(1), RowId::new(2), RowId::new(3)]
        );
    }

    #[test]
    fn range_across_keys_is_not_globally_sorted_flag() {
        let mut idx = DeltaIndex::new();
        idx.add(Value::Int(1), RowId::new(9));
        idx.add(Value::Int(2), RowId::new(1));
        let r = idx.between(&Value::Int(1), &Value::Int(2)).unwrap();
        assert!(!r.sorted);
        assert_eq!(r.len(), 2);
    }

    #[test]
    fn missing_key_eq_is_empty() {
        let idx = DeltaIndex::new();
        let r = idx.eq(&Value::Int(1)).unwrap();
        assert!(r.is_empty());
    }
}
