//! Column-wise tables: an ordered sequence of columns, each a dictionary
//! paired with an attribute vector.

use crate::attribute_vector::{AttributeVector, FixedWidthVector};
use crate::dictionary::{OrderIndifferentDictionary, OrderPreservingDictionary};
use colstore_core::traits::Dictionary;
use colstore_core::types::{ColumnName, LogicalType, Vid};
use colstore_core::value::Value;
use std::ops::Range;

/// One column of the main partition: a sealed, order-preserving dictionary
/// plus a bit- or fixed-width attribute vector.
pub struct MainColumn {
    /// Column name.
    pub name: ColumnName,
    /// Logical scalar type.
    pub logical_type: LogicalType,
    /// Sealed dictionary.
    pub dictionary: OrderPreservingDictionary,
    /// Value-id storage, one of `FixedWidthVector` or `BitCompressedVector`.
    pub values: Box<dyn AttributeVector>,
}

impl MainColumn {
    /// The value stored at `row`.
    pub fn value_at(&self, row: usize) -> Value {
        self.dictionary.value_for_vid(self.values.get(row))
    }

    /// The value-id stored at `row`.
    pub fn vid_at(&self, row: usize) -> Vid {
        self.values.get(row)
    }
}

/// Main partition: read-mostly, dictionary-ordered, rebuilt wholesale by
/// `TableMerger`.
pub struct MainTable {
    /// Ordered columns.
    pub columns: Vec<MainColumn>,
    row_count: usize,
}

impl MainTable {
    /// An empty main table with the given column names/types, no rows.
    pub fn empty(schema: &[(ColumnName, LogicalType)]) -> Self {
        let columns = schema
            .iter()
            .map(|(name, ty)| MainColumn {
                name: name.clone(),
                logical_type: *ty,
                dictionary: OrderPreservingDictionary::new(),
                values: Box::new(FixedWidthVector::new()),
            })
            .collect();
        MainTable {
            columns,
            row_count: 0,
        }
    }

    /// Construct directly from fully-built columns (used by `TableMerger`).
    pub fn from_columns(columns: Vec<MainColumn>, row_count: usize) -> Self {
        MainTable { columns, row_count }
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Index of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// The value at `(col, row)`.
    pub fn value_at(&self, col: usize, row: usize) -> Value {
        self.columns[col].value_at(row)
    }
}

/// One column of the delta partition: an append-only, insertion-ordered
/// dictionary plus a fixed-width attribute vector that admits non-blocking
/// append into a pre-reserved row range.
pub struct DeltaColumn {
    /// Column name.
    pub name: ColumnName,
    /// Logical scalar type.
    pub logical_type: LogicalType,
    /// Append-only dictionary.
    pub dictionary: OrderIndifferentDictionary,
    /// Value-id storage.
    pub values: FixedWidthVector,
}

impl DeltaColumn {
    /// The value stored at `row` (row is relative to the delta, i.e.
    /// already offset by `|main|`).
    pub fn value_at(&self, row: usize) -> Value {
        self.dictionary.value_for_vid(self.values.get(row))
    }

    /// The value-id stored at `row`.
    pub fn vid_at(&self, row: usize) -> Vid {
        self.values.get(row)
    }

    /// Insert `v` into the dictionary (idempotent) and write the resulting
    /// vid at `row`. Returns the vid, so callers recording dictionary
    /// extensions for the durability log can tell whether a new entry was
    /// created.
    pub fn set_value(&mut self, row: usize, v: Value) -> Vid {
        let vid = self.dictionary.add(v);
        self.values.set(row, vid);
        vid
    }

    /// Write `vid` directly into `row`'s attribute vector without touching
    /// the dictionary. Used by log replay, where a Value record logs
    /// already-assigned value-ids rather than raw values.
    pub fn set_vid(&mut self, row: usize, vid: Vid) {
        self.values.set(row, vid);
    }
}

/// Delta partition: mutable, append-only, insertion-ordered.
pub struct DeltaTable {
    /// Ordered columns.
    pub columns: Vec<DeltaColumn>,
    row_count: usize,
}

impl DeltaTable {
    /// A fresh, empty delta table with the given column names/types.
    pub fn empty(schema: &[(ColumnName, LogicalType)]) -> Self {
        let columns = schema
            .iter()
            .map(|(name, ty)| DeltaColumn {
                name: name.clone(),
                logical_type: *ty,
                dictionary: OrderIndifferentDictionary::new(),
                values: FixedWidthVector::new(),
            })
            .collect();
        DeltaTable {
            columns,
            row_count: 0,
        }
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Index of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Grow every column's attribute vector to `new_row_count`, zero-filling
    /// new slots, and update the tracked row count.
    pub fn resize(&mut self, new_row_count: usize) {
        for col in &mut self.columns {
            col.values.resize(new_row_count);
        }
        self.row_count = new_row_count;
    }

    /// Reserve `n` new rows across every column's attribute vector in one
    /// pass, returning the row range. Used by `Store::append_to_delta` in
    /// place of `resize(row_count + n)` so the reservation reads as the
    /// non-blocking-append primitive it is, rather than a before/after
    /// length computation the caller has to redo per call.
    pub fn reserve_range(&mut self, n: usize) -> Range<usize> {
        let mut range = 0..0;
        for col in &mut self.columns {
            range = col.values.reserve_range(n);
        }
        self.row_count = range.end;
        range
    }

    /// The value at `(col, row)`, where `row` is relative to the delta.
    pub fn value_at(&self, col: usize, row: usize) -> Value {
        self.columns[col].value_at(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Vec<(ColumnName, LogicalType)> {
        vec![
            ("id".to_string(), LogicalType::Int),
            ("name".to_string(), LogicalType::Str),
        ]
    }

    #[test]
    fn delta_table_resize_preserves_existing_values() {
        let mut delta = DeltaTable::empty(&schema());
        delta.resize(2);
        delta.columns[0].set_value(0, Value::Int(1));
        delta.columns[0].set_value(1, Value::Int(2));
        delta.resize(4);
        assert_eq!(delta.value_at(0, 0), Value::Int(1));
        assert_eq!(delta.value_at(0, 1), Value::Int(2));
        assert_eq!(delta.row_count(), 4);
    }

    #[test]
    fn main_table_empty_has_zero_rows() {
        let main = MainTable::empty(&schema());
        assert_eq!(main.row_count(), 0);
        assert_eq!(main.column_index("name"), Some(1));
        assert_eq!(main.column_index("missing"), None);
    }
}
