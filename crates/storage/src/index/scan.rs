//! Combines index probes on main (via group-key) and delta (via delta-index);
//! intersects ranges.
//!
//! Grounded on the reference `IndexAwareTableScan.cpp` and spec §4.4 steps
//! 1-5: consolidate same-column range pairs into `between`, probe main and
//! delta independently, intersect same-column predicates, then concatenate
//! delta results onto main results after offsetting by `|main|`.

use crate::index::intersect;
use crate::store::Store;
use colstore_core::error::{StoreError, StoreResult};
use colstore_core::traits::{IndexProbe, PositionRange};
use colstore_core::types::{ColumnName, RowId};
use colstore_core::value::Value;

/// One predicate in the scan's conjunction.
#[derive(Debug, Clone)]
pub enum Predicate {
    /// `column == value`.
    Eq(ColumnName, Value),
    /// `column < value`.
    Lt(ColumnName, Value),
    /// `column <= value`.
    Lte(ColumnName, Value),
    /// `column > value`.
    Gt(ColumnName, Value),
    /// `column >= value`.
    Gte(ColumnName, Value),
    /// `a <= column <= b`.
    Between(ColumnName, Value, Value),
}

impl Predicate {
    /// The column this predicate targets.
    pub fn column(&self) -> &ColumnName {
        match self {
            Predicate::Eq(c, _)
            | Predicate::Lt(c, _)
            | Predicate::Lte(c, _)
            | Predicate::Gt(c, _)
            | Predicate::Gte(c, _)
            | Predicate::Between(c, _, _) => c,
        }
    }
}

/// Rewrite `col > a` paired with `col < b` (on the same column) into a
/// single `between(a, b)`, and sort the resulting list by column name for
/// determinism. Columns with more than two predicates, or predicates that
/// don't pair into a bound, are passed through unconsolidated — step 3/4
/// then intersects them directly.
fn consolidate(predicates: &[Predicate]) -> Vec<Predicate> {
    use std::collections::BTreeMap;
    let mut by_col: BTreeMap<ColumnName, Vec<Predicate>> = BTreeMap::new();
    for p in predicates {
        by_col.entry(p.column().clone()).or_default().push(p.clone());
    }

    let mut out = Vec::new();
    for (col, mut ps) in by_col {
        let lower = ps
            .iter()
            .position(|p| matches!(p, Predicate::Gt(_, _) | Predicate::Gte(_, _)));
        let upper = ps
            .iter()
            .position(|p| matches!(p, Predicate::Lt(_, _) | Predicate::Lte(_, _)));
        if let (Some(li), Some(ui)) = (lower, upper) {
            if li != ui {
                let lo = match &ps[li] {
                    Predicate::Gt(_, v) | Predicate::Gte(_, v) => v.clone(),
                    _ => unreachable!(),
                };
                let hi = match &ps[ui] {
                    Predicate::Lt(_, v) | Predicate::Lte(_, v) => v.clone(),
                    _ => unreachable!(),
                };
                let mut remaining: Vec<Predicate> = ps
                    .into_iter()
                    .enumerate()
                    .filter(|(i, _)| *i != li && *i != ui)
                    .map(|(_, p)| p)
                    .collect();
                remaining.push(Predicate::Between(col, lo, hi));
                ps = remaining;
            }
        }
        out.extend(ps);
    }
    out
}

fn evaluate<P: IndexProbe + ?Sized>(idx: &P, predicate: &Predicate) -> StoreResult<PositionRange> {
    match predicate {
        Predicate::Eq(_, v) => idx.eq(v),
        Predicate::Lt(_, v) => idx.lt(v),
        Predicate::Lte(_, v) => idx.lte(v),
        Predicate::Gt(_, v) => idx.gt(v),
        Predicate::Gte(_, v) => idx.gte(v),
        Predicate::Between(_, a, b) => idx.between(a, b),
    }
}

/// Sort ranges by length ascending, then fold-intersect into `base`,
/// stopping early once `base` empties.
fn multi_intersect(mut ranges: Vec<PositionRange>) -> Vec<RowId> {
    if ranges.is_empty() {
        return Vec::new();
    }
    ranges.sort_by_key(PositionRange::len);
    let mut base = ranges[0].clone();
    base.ensure_sorted();
    for r in &ranges[1..] {
        if base.is_empty() {
            break;
        }
        base = PositionRange::sorted(intersect::intersect(&base, r));
    }
    base.positions
}

/// Orchestrates the full index-aware scan over a store.
pub struct IndexAwareScan;

impl IndexAwareScan {
    /// Evaluate `predicates` (a conjunction) against `store`'s main and
    /// delta indices, returning global row positions (delta rows already
    /// offset by `|main|`).
    pub fn execute(store: &Store, predicates: &[Predicate]) -> StoreResult<Vec<RowId>> {
        let consolidated = consolidate(predicates);
        if consolidated.is_empty() {
            return Ok(Vec::new());
        }

        let mut main_ranges = Vec::with_capacity(consolidated.len());
        for p in &consolidated {
            let idx = store.groupkey_index(p.column()).ok_or_else(|| {
                StoreError::IndexNotFound {
                    table: store.name.clone(),
                    column: p.column().clone(),
                }
            })?;
            main_ranges.push(evaluate(&*idx, p)?);
        }
        let main_result = multi_intersect(main_ranges);

        let mut delta_ranges = Vec::with_capacity(consolidated.len());
        for p in &consolidated {
            let idx = store.delta_index(p.column()).ok_or_else(|| {
                StoreError::IndexNotFound {
                    table: store.name.clone(),
                    column: p.column().clone(),
                }
            })?;
            delta_ranges.push(evaluate(&*idx, p)?);
        }
        let delta_result = multi_intersect(delta_ranges);

        let main_len = store.main_len() as u64;
        let mut result = main_result;
        result.extend(
            delta_result
                .into_iter()
                .map(|r| RowId::new(r.get() + main_len)),
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use colstore_core::types::{Cid, LogicalType, Tid};

    fn build_scenario_store() -> Store {
        // main [(1),(2),(3),(5)], delta [(4)], column "c0" indexed.
        let store = Store::new(
            "t",
            vec![("c0".to_string(), LogicalType::Int)],
            vec!["c0".to_string()],
        );
        for v in [1, 2, 3, 5] {
            let (begin, _) = store.append_to_delta(1);
            store.copy_row_to_delta(vec![Value::Int(v)], 0, Tid::new(1));
            store.commit_positions(&[begin], Cid::new(1), true);
            store.merge().unwrap();
        }
        let (begin, _) = store.append_to_delta(1);
        store.copy_row_to_delta(vec![Value::Int(4)], 0, Tid::new(2));
        store.commit_positions(&[begin], Cid::new(2), true);
        store
    }

    #[test]
    fn scenario_3_between_via_lt_consolidation() {
        let store = build_scenario_store();
        let predicates = vec![Predicate::Lt("c0".to_string(), Value::Int(5))];
        let result = IndexAwareScan::execute(&store, &predicates).unwrap();
        let mut rows: Vec<u64> = result.iter().map(|r| r.get()).collect();
        rows.sort_unstable();
        // main rows 0,1,2 (values 1,2,3) + delta row (value 4) offset by |main|=4 -> row 4
        assert_eq!(rows, vec![0, 1, 2, 4]);
    }

    #[test]
    fn scenario_6_consolidates_between_and_intersects_second_column() {
        let store = Store::new(
            "t",
            vec![
                ("a".to_string(), LogicalType::Int),
                ("b".to_string(), LogicalType::Int),
            ],
            vec!["a".to_string(), "b".to_string()],
        );
        let rows_data = [(15, 7), (25, 7), (5, 7), (12, 3)];
        for (a, b) in rows_data {
            let (begin, _) = store.append_to_delta(1);
            store.copy_row_to_delta(vec![Value::Int(a), Value::Int(b)], 0, Tid::new(1));
            store.commit_positions(&[begin], Cid::new(1), true);
            store.merge().unwrap();
        }

        let predicates = vec![
            Predicate::Gt("a".to_string(), Value::Int(10)),
            Predicate::Lt("a".to_string(), Value::Int(20)),
            Predicate::Eq("b".to_string(), Value::Int(7)),
        ];
        let result = IndexAwareScan::execute(&store, &predicates).unwrap();
        // only row 0 (a=15, b=7) satisfies 10<a<20 AND b==7
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn missing_index_returns_index_not_found() {
        let store = Store::new(
            "t",
            vec![("a".to_string(), LogicalType::Int)],
            vec![],
        );
        let predicates = vec![Predicate::Eq("a".to_string(), Value::Int(1))];
        let err = IndexAwareScan::execute(&store, &predicates).unwrap_err();
        assert!(matches!(err, StoreError::IndexNotFound { .. }));
    }
}
