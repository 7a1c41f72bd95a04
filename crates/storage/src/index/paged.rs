//! Bit-per-page presence map: a coarse index, valuable chiefly because it
//! can be rebuilt during merge from a value-id mapping without re-reading
//! table data.
//!
//! Grounded on the reference `PagedIndex.h` and rebuilt per `PagedIndexMerger.cpp`.

use colstore_core::types::{RowId, Vid};
use colstore_core::value::Value;
use std::collections::HashMap;

/// `present[vid]` is a bitset with one bit per page; bit `p` is set iff any
/// row in page `p` carries that vid.
pub struct PagedIndex {
    page_size: usize,
    present: HashMap<Vid, Vec<u64>>,
}

impl PagedIndex {
    /// An empty paged index over pages of `page_size` rows.
    pub fn new(page_size: usize) -> Self {
        PagedIndex {
            page_size: page_size.max(1),
            present: HashMap::new(),
        }
    }

    fn page_of(&self, row: usize) -> usize {
        row / self.page_size
    }

    fn set_bit(bits: &mut Vec<u64>, page: usize) {
        let word = page / 64;
        let bit = page % 64;
        if bits.len() <= word {
            bits.resize(word + 1, 0);
        }
        bits[word] |= 1 << bit;
    }

    /// Mark that `vid` appears somewhere in the page containing `row`.
    pub fn mark(&mut self, vid: Vid, row: usize) {
        let page = self.page_of(row);
        let bits = self.present.entry(vid).or_default();
        Self::set_bit(bits, page);
    }

    /// Pages known to contain `vid` at least once.
    pub fn pages_for(&self, vid: Vid) -> Vec<usize> {
        let Some(bits) = self.present.get(&vid) else {
            return Vec::new();
        };
        let mut pages = Vec::new();
        for (word_idx, &word) in bits.iter().enumerate() {
            let mut w = word;
            while w != 0 {
                let bit = w.trailing_zeros() as usize;
                pages.push(word_idx * 64 + bit);
                w &= w - 1;
            }
        }
        pages
    }

    /// Candidate row range `[page*page_size, (page+1)*page_size)` for each
    /// page known to contain `vid`, for the caller to then filter by an
    /// exact value comparison against table data.
    pub fn candidate_rows_for(&self, vid: Vid) -> Vec<RowId> {
        let mut rows = Vec::new();
        for page in self.pages_for(vid) {
            let start = page * self.page_size;
            for r in start..start + self.page_size {
                rows.push(RowId::new(r as u64));
            }
        }
        rows
    }

    /// The configured page size.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Exact-match probe: find candidate pages by scanning `present[vid]`,
    /// then for each set bit scan the page's rows and keep only those whose
    /// column value equals `key`, resolved via `value_at`.
    ///
    /// This is a standalone probe of `PagedIndex` itself, not a step
    /// `IndexAwareScan` composes — the index's value is as a merge-time
    /// optimization (rebuilt without re-reading table data, see
    /// `TableMerger`), not as a query-path structure alongside
    /// `GroupkeyIndex`/`DeltaIndex`.
    pub fn eq<F>(&self, vid: Vid, key: &Value, value_at: F) -> Vec<RowId>
    where
        F: Fn(RowId) -> Value,
    {
        self.candidate_rows_for(vid)
            .into_iter()
            .filter(|&row| value_at(row) == *key)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_and_pages_for_round_trip() {
        let mut idx = PagedIndex::new(4);
        idx.mark(Vid::new(7), 0);
        idx.mark(Vid::new(7), 9);
        idx.mark(Vid::new(7), 130);
        let mut pages = idx.pages_for(Vid::new(7));
        pages.sort_unstable();
        assert_eq!(pages, vec![0, 2, 32]);
    }

    #[test]
    fn missing_vid_has_no_pages() {
        let idx = PagedIndex::new(4);
        assert!(idx.pages_for(Vid::new(1)).is_empty());
    }

    #[test]
    fn candidate_rows_span_whole_page() {
        let mut idx = PagedIndex::new(4);
        idx.mark(Vid::new(1), 5);
        let rows = idx.candidate_rows_for(Vid::new(1));
        assert_eq!(
            rows,
            vec![RowId::new(4), RowId::new(5), RowId::new(6), RowId::new(7)]
        );
    }

    #[test]
    fn eq_filters_whole_page_down_to_exact_matches() {
        let mut idx = PagedIndex::new(4);
        idx.mark(Vid::new(1), 5);
        let values: HashMap<u64, Value> = HashMap::from([
            (4, Value::Int(9)),
            (5, Value::Int(7)),
            (6, Value::Int(2)),
            (7, Value::Int(7)),
        ]);
        let mut rows = idx.eq(Vid::new(1), &Value::Int(7), |r| values[&r.get()].clone());
        rows.sort_unstable();
        assert_eq!(rows, vec![RowId::new(5), RowId::new(7)]);
    }
}
