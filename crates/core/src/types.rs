//! Row, value, transaction and commit identifiers, and the sentinel
//! values that drive the MVCC visibility rule.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a row within a store's combined (main ++ delta) address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RowId(pub u64);

impl RowId {
    /// Construct a `RowId` from a raw offset.
    pub fn new(v: u64) -> Self {
        RowId(v)
    }

    /// The raw offset.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RowId {
    fn from(v: u64) -> Self {
        RowId(v)
    }
}

impl From<usize> for RowId {
    fn from(v: usize) -> Self {
        RowId(v as u64)
    }
}

/// Dictionary value-id: a compressed integer handle for an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Vid(pub u32);

impl Vid {
    /// Construct a `Vid` from a raw value-id.
    pub fn new(v: u32) -> Self {
        Vid(v)
    }

    /// The raw value-id.
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Vid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transaction identifier. Also used as the lock holder in `tid[r]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tid(pub u64);

impl Tid {
    /// Construct a `Tid` from a raw id.
    pub fn new(v: u64) -> Self {
        Tid(v)
    }

    /// The raw id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Commit identifier, monotonically increasing across the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Cid(pub u64);

impl Cid {
    /// Construct a `Cid` from a raw id.
    pub fn new(v: u64) -> Self {
        Cid(v)
    }

    /// The raw id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unlocked sentinel for `tid[r]`: no transaction currently holds the row.
pub const START_TID: Tid = Tid(0);

/// Sentinel tid used exclusively by the merge procedure's visibility check,
/// guaranteed to never collide with a real transaction's tid.
pub const MERGE_TID: Tid = Tid(u64::MAX);

/// Sentinel meaning "never invalidated" / "not yet committed", depending on
/// which vector it appears in.
pub const INF_CID: Cid = Cid(u64::MAX);

/// Sentinel used for `cid_begin[r]` immediately after a merge, before the
/// row has ever been visited by a validating transaction.
pub const UNKNOWN_CID: Cid = Cid(0);

/// Logical scalar type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalType {
    /// 64-bit signed integer.
    Int,
    /// 64-bit floating point.
    Float,
    /// UTF-8 string.
    Str,
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogicalType::Int => "int",
            LogicalType::Float => "float",
            LogicalType::Str => "str",
        };
        write!(f, "{s}")
    }
}

/// Column name, interned as an owned string at table build time.
pub type ColumnName = String;

/// Table name, used to look the store up in the storage manager.
pub type TableName = String;
