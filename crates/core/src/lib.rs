//! Core types and traits for the storage core.
//!
//! This crate defines the foundational types used throughout the system:
//! - `RowId`/`Vid`/`Tid`/`Cid`: positional and identity newtypes, plus the
//!   MVCC sentinels (`START_TID`, `INF_CID`, `UNKNOWN_CID`, `MERGE_TID`)
//! - `Value`/`LogicalType`: the scalar value sum type
//! - `StoreError`: the unified error type
//! - `Dictionary`/`IndexProbe`/`PositionRange`: shared trait seams
//!   implemented by `storage`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod traits;
pub mod types;
pub mod value;

pub use error::{StoreError, StoreResult};
pub use traits::{Dictionary, IndexProbe, PositionRange};
pub use types::{
    ColumnName, LogicalType, RowId, TableName, Tid, Vid, Cid, INF_CID, MERGE_TID, START_TID,
    UNKNOWN_CID,
};
pub use value::Value;
