//! Secondary-index family: `GroupkeyIndex` (read-only, over main),
//! `DeltaIndex` (mutable, over delta), `PagedIndex` (bit-per-page presence
//! map), and `IndexAwareScan`, which composes them.

pub mod delta;
pub mod groupkey;
pub mod intersect;
pub mod paged;
pub mod scan;

pub use delta::DeltaIndex;
pub use groupkey::GroupkeyIndex;
pub use paged::PagedIndex;
pub use scan::{IndexAwareScan, Predicate};
