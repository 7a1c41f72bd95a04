//! Storage layer: dictionaries, attribute vectors, main/delta tables, the
//! `Store` MVCC container, the secondary-index family, and the
//! `TableMerger`.
//!
//! - `dictionary`: `OrderPreservingDictionary` (main) and
//!   `OrderIndifferentDictionary` (delta)
//! - `attribute_vector`: `FixedWidthVector` and `BitCompressedVector`
//! - `table`: `MainTable`/`DeltaTable`, each column-wise
//! - `store`: the per-table MVCC container and append/delete/commit/merge
//!   primitives
//! - `index`: `GroupkeyIndex`, `DeltaIndex`, `PagedIndex`, `IndexAwareScan`
//! - `merger`: `TableMerger`, the union-dictionary rebuild procedure

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod attribute_vector;
pub mod dictionary;
pub mod index;
pub mod merger;
pub mod store;
pub mod table;

pub use attribute_vector::{AttributeVector, BitCompressedVector, FixedWidthVector};
pub use dictionary::{OrderIndifferentDictionary, OrderPreservingDictionary};
pub use index::{DeltaIndex, GroupkeyIndex, IndexAwareScan, PagedIndex, Predicate};
pub use merger::TableMerger;
pub use store::{DictExtension, Store, DEFAULT_PAGE_SIZE};
pub use table::{DeltaColumn, DeltaTable, MainColumn, MainTable};
