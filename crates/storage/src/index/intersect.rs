//! Sorted-list intersection.
//!
//! Grounded verbatim on the reference `PositionsIntersect.cpp`/`.h`:
//! Baeza-Yates recursive intersection (probe the median of the smaller
//! list into the larger via binary search, recurse on both halves), with a
//! linear-merge fallback for small combined inputs.

use colstore_core::traits::PositionRange;
use colstore_core::types::RowId;

/// Below this combined size, a linear merge beats the overhead of
/// recursive binary search.
const LINEAR_MERGE_THRESHOLD: usize = 20;

/// Intersect two position ranges, sorting either side first if it isn't
/// already known sorted.
pub fn intersect(a: &PositionRange, b: &PositionRange) -> Vec<RowId> {
    let mut a_sorted = a.clone();
    a_sorted.ensure_sorted();
    let mut b_sorted = b.clone();
    b_sorted.ensure_sorted();
    intersect_sorted(&a_sorted.positions, &b_sorted.positions)
}

fn intersect_sorted(a: &[RowId], b: &[RowId]) -> Vec<RowId> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    if *a.last().unwrap() < b[0] || *b.last().unwrap() < a[0] {
        return Vec::new();
    }
    if a.len() + b.len() < LINEAR_MERGE_THRESHOLD {
        return linear_merge(a, b);
    }
    // Ensure `a` is the larger list.
    if a.len() < b.len() {
        return intersect_sorted(b, a);
    }

    // Narrow b to the overlapping sub-range of a.
    let lo = a.partition_point(|&x| x < b[0]);
    let hi = a.partition_point(|&x| x <= *b.last().unwrap());
    if lo >= hi {
        return Vec::new();
    }
    let a = &a[lo..hi];

    let mid = b.len() / 2;
    let median = b[mid];
    let pos = a.partition_point(|&x| x < median);
    let found = pos < a.len() && a[pos] == median;

    let (a_left, a_right) = a.split_at(pos);
    let a_right = if found { &a_right[1..] } else { a_right };

    let mut result = intersect_sorted(a_left, &b[..mid]);
    if found {
        result.push(median);
    }
    result.extend(intersect_sorted(a_right, &b[mid + 1..]));
    result
}

fn linear_merge(a: &[RowId], b: &[RowId]) -> Vec<RowId> {
    let mut result = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                result.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn rows(v: &[u64]) -> Vec<RowId> {
        v.iter().map(|&x| RowId::new(x)).collect()
    }

    #[test]
    fn small_input_matches_set_intersection() {
        let a = rows(&[1, 3, 5, 7, 9]);
        let b = rows(&[3, 4, 5, 9]);
        let got = intersect_sorted(&a, &b);
        assert_eq!(got, rows(&[3, 5, 9]));
    }

    #[test]
    fn disjoint_ranges_short_circuit() {
        let a = rows(&[1, 2, 3]);
        let b = rows(&[100, 101]);
        assert!(intersect_sorted(&a, &b).is_empty());
    }

    #[test]
    fn large_input_matches_reference_set_intersection() {
        let a: Vec<u64> = (0..500).step_by(2).collect();
        let b: Vec<u64> = (0..500).step_by(3).collect();
        let expected: BTreeSet<u64> = a
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .intersection(&b.iter().copied().collect())
            .copied()
            .collect();
        let got = intersect_sorted(&rows(&a), &rows(&b));
        let got_set: BTreeSet<u64> = got.iter().map(|r| r.get()).collect();
        assert_eq!(got_set, expected);
    }

    #[test]
    fn unsorted_input_is_sorted_before_intersecting() {
        let a = PositionRange::unsorted(rows(&[5, 1, 3]));
        let b = PositionRange::unsorted(rows(&[3, 1, 9]));
        let got = intersect(&a, &b);
        assert_eq!(got, rows(&[1, 3]));
    }

    #[test]
    fn intersection_result_independent_of_recursion_side() {
        // swapping argument order must not change the result
        let a: Vec<u64> = (0..100).collect();
        let b: Vec<u64> = (50..300).step_by(2).collect();
        let r1 = intersect_sorted(&rows(&a), &rows(&b));
        let r2 = intersect_sorted(&rows(&b), &rows(&a));
        assert_eq!(r1, r2);
    }
}
