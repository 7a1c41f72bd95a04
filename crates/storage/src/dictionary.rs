//! The two dictionary flavors: order-preserving (main) and
//! order-indifferent (delta).

use colstore_core::traits::Dictionary;
use colstore_core::types::Vid;
use colstore_core::value::Value;
use rustc_hash::FxHashMap;

/// Sealed, sorted dictionary used by main. `add` is only ever called
/// during bulk build (see `TableMerger`); after that the dictionary is
/// read-only and lookups use binary search.
#[derive(Debug, Clone, Default)]
pub struct OrderPreservingDictionary {
    values: Vec<Value>,
}

impl OrderPreservingDictionary {
    /// An empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build directly from an already-sorted, deduplicated value list.
    /// Used by `TableMerger` once it has materialized the union set.
    pub fn from_sorted_values(values: Vec<Value>) -> Self {
        debug_assert!(values.windows(2).all(|w| w[0] < w[1]));
        OrderPreservingDictionary { values }
    }

    fn binary_search(&self, v: &Value) -> Result<usize, usize> {
        self.values.binary_search(v)
    }
}

impl Dictionary for OrderPreservingDictionary {
    fn add(&mut self, v: Value) -> Vid {
        match self.binary_search(&v) {
            Ok(pos) => Vid::new(pos as u32),
            Err(pos) => {
                self.values.insert(pos, v);
                Vid::new(pos as u32)
            }
        }
    }

    fn vid_for_value(&self, v: &Value) -> Option<Vid> {
        self.binary_search(v).ok().map(|pos| Vid::new(pos as u32))
    }

    fn value_for_vid(&self, vid: Vid) -> Value {
        self.values[vid.get() as usize].clone()
    }

    fn size(&self) -> usize {
        self.values.len()
    }

    fn lower_bound(&self, v: &Value) -> Vid {
        let pos = match self.binary_search(v) {
            Ok(pos) => pos,
            Err(pos) => pos,
        };
        Vid::new(pos as u32)
    }

    fn upper_bound(&self, v: &Value) -> Vid {
        let pos = match self.binary_search(v) {
            Ok(pos) => pos + 1,
            Err(pos) => pos,
        };
        Vid::new(pos as u32)
    }
}

/// Append-only, insertion-ordered dictionary used by delta. `add` is
/// idempotent: repeated inserts of an equal value return the same vid.
/// Iteration order is insertion order, not value order; range predicates
/// on delta must dereference through `DeltaIndex`, never through vid
/// arithmetic on this dictionary.
#[derive(Debug, Clone, Default)]
pub struct OrderIndifferentDictionary {
    values: Vec<Value>,
    lookup: FxHashMap<Value, Vid>,
}

impl OrderIndifferentDictionary {
    /// An empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Iterate values in insertion order, paired with their vid.
    pub fn iter(&self) -> impl Iterator<Item = (Vid, &Value)> {
        self.values
            .iter()
            .enumerate()
            .map(|(i, v)| (Vid::new(i as u32), v))
    }
}

impl Dictionary for OrderIndifferentDictionary {
    fn add(&mut self, v: Value) -> Vid {
        if let Some(&vid) = self.lookup.get(&v) {
            return vid;
        }
        let vid = Vid::new(self.values.len() as u32);
        self.lookup.insert(v.clone(), vid);
        self.values.push(v);
        vid
    }

    fn vid_for_value(&self, v: &Value) -> Option<Vid> {
        self.lookup.get(v).copied()
    }

    fn value_for_vid(&self, vid: Vid) -> Value {
        self.values[vid.get() as usize].clone()
    }

    fn size(&self) -> usize {
        self.values.len()
    }

    fn lower_bound(&self, _v: &Value) -> Vid {
        // Not order-preserving: range predicates on delta go through
        // DeltaIndex, which dereferences values directly rather than
        // relying on vid arithmetic here.
        unimplemented!("order-indifferent dictionaries do not support vid range queries")
    }

    fn upper_bound(&self, _v: &Value) -> Vid {
        unimplemented!("order-indifferent dictionaries do not support vid range queries")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_preserving_round_trip() {
        let mut dict = OrderPreservingDictionary::new();
        let a = dict.add(Value::Int(5));
        let b = dict.add(Value::Int(1));
        let c = dict.add(Value::Int(3));
        assert_eq!(dict.value_for_vid(a), Value::Int(5));
        assert_eq!(dict.value_for_vid(b), Value::Int(1));
        assert_eq!(dict.value_for_vid(c), Value::Int(3));
        for i in 0..dict.size() as u32 {
            let v = dict.value_for_vid(Vid::new(i));
            assert_eq!(dict.vid_for_value(&v), Some(Vid::new(i)));
        }
    }

    #[test]
    fn order_preserving_stays_sorted_after_adds() {
        let mut dict = OrderPreservingDictionary::new();
        for v in [5, 1, 3, 1, 9, 0] {
            dict.add(Value::Int(v));
        }
        let mut prev = None;
        for i in 0..dict.size() as u32 {
            let v = dict.value_for_vid(Vid::new(i));
            if let Some(p) = prev {
                assert!(p < v);
            }
            prev = Some(v);
        }
    }

    #[test]
    fn order_preserving_lower_upper_bound() {
        let mut dict = OrderPreservingDictionary::new();
        for v in [1, 3, 5, 7] {
            dict.add(Value::Int(v));
        }
        // missing value 4 lies between vid(3)=1 and vid(5)=2
        assert_eq!(dict.lower_bound(&Value::Int(4)), Vid::new(2));
        assert_eq!(dict.upper_bound(&Value::Int(4)), Vid::new(2));
        // exact match
        assert_eq!(dict.lower_bound(&Value::Int(5)), Vid::new(2));
        assert_eq!(dict.upper_bound(&Value::Int(5)), Vid::new(3));
    }

    #[test]
    fn order_preserving_missing_value_returns_none() {
        let mut dict = OrderPreservingDictionary::new();
        dict.add(Value::Int(1));
        assert_eq!(dict.vid_for_value(&Value::Int(99)), None);
    }

    #[test]
    fn order_indifferent_add_is_idempotent() {
        let mut dict = OrderIndifferentDictionary::new();
        let a = dict.add(Value::Str("x".into()));
        let b = dict.add(Value::Str("x".into()));
        assert_eq!(a, b);
        assert_eq!(dict.size(), 1);
    }

    #[test]
    fn order_indifferent_preserves_insertion_order() {
        let mut dict = OrderIndifferentDictionary::new();
        dict.add(Value::Int(5));
        dict.add(Value::Int(1));
        dict.add(Value::Int(3));
        let order: Vec<_> = dict.iter().map(|(_, v)| v.clone()).collect();
        assert_eq!(order, vec![Value::Int(5), Value::Int(1), Value::Int(3)]);
    }
}
