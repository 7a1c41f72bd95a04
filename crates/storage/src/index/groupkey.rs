//! Read-only, over-main inverted index, built once per merge.
//!
//! Grounded verbatim on the reference `GroupkeyIndex.h`.

use crate::dictionary::OrderPreservingDictionary;
use colstore_core::error::StoreResult;
use colstore_core::traits::{IndexProbe, PositionRange};
use colstore_core::types::{RowId, Vid};
use colstore_core::value::Value;

/// `offsets[vid]..offsets[vid+1]` slices `postings` into the rows holding
/// that vid. `postings` is a permutation of `[0, |main|)` grouped by vid.
pub struct GroupkeyIndex {
    dictionary: OrderPreservingDictionary,
    offsets: Vec<usize>,
    postings: Vec<RowId>,
}

impl GroupkeyIndex {
    /// Build from a column's finished dictionary and its per-row vids.
    /// `vid_at(row)` is called once per row in ascending row order.
    pub fn build(dictionary: OrderPreservingDictionary, row_vids: &[Vid]) -> Self {
        let dict_size = dictionary.size();
        let mut counts = vec![0usize; dict_size + 1];
        for &vid in row_vids {
            counts[vid.get() as usize + 1] += 1;
        }
        let mut offsets = counts;
        for i in 1..offsets.len() {
            offsets[i] += offsets[i - 1];
        }

        let mut cursor = offsets.clone();
        let mut postings = vec![RowId::new(0); row_vids.len()];
        for (row, &vid) in row_vids.iter().enumerate() {
            let slot = &mut cursor[vid.get() as usize];
            postings[*slot] = RowId::new(row as u64);
            *slot += 1;
        }

        GroupkeyIndex {
            dictionary,
            offsets,
            postings,
        }
    }

    fn slice(&self, vid: Vid) -> &[RowId] {
        let start = self.offsets[vid.get() as usize];
        let end = self.offsets[vid.get() as usize + 1];
        &self.postings[start..end]
    }

    /// Number of distinct values.
    pub fn dict_size(&self) -> usize {
        self.dictionary.size()
    }

    /// The `vid -> postings` slice boundaries, for serialization.
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// The flat, vid-grouped row-id array, for serialization.
    pub fn postings(&self) -> &[RowId] {
        &self.postings
    }
}

impl IndexProbe for GroupkeyIndex {
    fn eq(&self, key: &Value) -> StoreResult<PositionRange> {
        use colstore_core::traits::Dictionary;
        Ok(match self.dictionary.vid_for_value(key) {
            Some(vid) => PositionRange::sorted(self.slice(vid).to_vec()),
            None => PositionRange::empty(),
        })
    }

    fn lt(&self, key: &Value) -> StoreResult<PositionRange> {
        use colstore_core::traits::Dictionary;
        let vid = self.dictionary.lower_bound(key);
        let end = self.offsets[vid.get() as usize];
        Ok(PositionRange::sorted(self.postings[0..end].to_vec()))
    }

    fn lte(&self, key: &Value) -> StoreResult<PositionRange> {
        use colstore_core::traits::Dictionary;
        let vid = self.dictionary.upper_bound(key);
        let end = self.offsets[vid.get() as usize];
        Ok(PositionRange::sorted(self.postings[0..end].to_vec()))
    }

    fn gt(&self, key: &Value) -> StoreResult<PositionRange> {
        use colstore_core::traits::Dictionary;
        let vid = self.dictionary.upper_bound(key);
        let start = self.offsets[vid.get() as usize];
        Ok(PositionRange::sorted(self.postings[start..].to_vec()))
    }

    fn gte(&self, key: &Value) -> StoreResult<PositionRange> {
        use colstore_core::traits::Dictionary;
        let vid = self.dictionary.lower_bound(key);
        let start = self.offsets[vid.get() as usize];
        Ok(PositionRange::sorted(self.postings[start..].to_vec()))
    }

    fn between(&self, a: &Value, b: &Value) -> StoreResult<PositionRange> {
        use colstore_core::traits::Dictionary;
        let lo = self.dictionary.lower_bound(a);
        let hi = self.dictionary.upper_bound(b);
        let start = self.offsets[lo.get() as usize];
        let end = self.offsets[hi.get() as usize];
        Ok(PositionRange::sorted(self.postings[start.min(end)..end.max(start)].to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colstore_core::traits::Dictionary;

    fn build_from_values(values: &[i64]) -> GroupkeyIndex {
        let mut sorted: Vec<Value> = values.iter().map(|&v| Value::Int(v)).collect();
        sorted.sort();
        sorted.dedup();
        let dict = OrderPreservingDictionary::from_sorted_values(sorted);
        let row_vids: Vec<Vid> = values
            .iter()
            .map(|&v| dict.vid_for_value(&Value::Int(v)).unwrap())
            .collect();
        GroupkeyIndex::build(dict, &row_vids)
    }

    #[test]
    fn eq_returns_exact_postings_count() {
        let idx = build_from_values(&[1, 2, 2, 3, 2]);
        let r = idx.eq(&Value::Int(2)).unwrap();
        assert_eq!(r.len(), 3);
        assert!(r.sorted);
    }

    #[test]
    fn eq_missing_value_is_empty() {
        let idx = build_from_values(&[1, 2, 3]);
        let r = idx.eq(&Value::Int(99)).unwrap();
        assert!(r.is_empty());
    }

    #[test]
    fn between_matches_range() {
        // main = [1, 2, 3, 5]; between(2, 5) should match rows with value in [2,5]
        let idx = build_from_values(&[1, 2, 3, 5]);
        let r = idx.between(&Value::Int(2), &Value::Int(5)).unwrap();
        assert_eq!(r.len(), 3);
    }

    #[test]
    fn lt_and_gte_partition_the_postings() {
        let idx = build_from_values(&[1, 2, 3, 5]);
        let lt = idx.lt(&Value::Int(3)).unwrap();
        let gte = idx.gte(&Value::Int(3)).unwrap();
        assert_eq!(lt.len() + gte.len(), 4);
    }
}
