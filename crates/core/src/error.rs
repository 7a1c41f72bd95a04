//! Error types for the storage core.
//!
//! `StoreError` is the unified error type returned by every fallible
//! operation in `core`/`storage`/`durability`/`concurrency`.
//!
//! ### Usage
//!
//! ```ignore
//! match store.mark_for_deletion(row, tid) {
//!     Err(e) if e.is_conflict() => {
//!         // caller decides whether to retry; the core never retries itself
//!     }
//!     Err(e) => return Err(e),
//!     Ok(()) => {}
//! }
//! ```

use crate::types::{ColumnName, TableName, Tid};
use std::io;
use thiserror::Error;

/// Result type alias for storage-core operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Unified error type for the storage core.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The storage manager has no store registered under this name.
    #[error("table not found: {0}")]
    TableNotFound(TableName),

    /// The table has no column with this name.
    #[error("column not found: {table}.{column}")]
    ColumnNotFound {
        /// Owning table.
        table: TableName,
        /// Missing column name.
        column: ColumnName,
    },

    /// No index is registered for this (table, column) pair.
    #[error("index not found: {table}.{column}")]
    IndexNotFound {
        /// Owning table.
        table: TableName,
        /// Column the index was expected on.
        column: ColumnName,
    },

    /// An order-preserving dictionary was probed for a missing exact key.
    #[error("value not found in dictionary for column {column}")]
    DictValueNotFound {
        /// Column whose dictionary was probed.
        column: ColumnName,
    },

    /// A CAS on `tid[r]` lost to a concurrent writer.
    #[error("concurrent commit detected on row {row}")]
    ConcurrentCommit {
        /// The row whose tid-CAS failed.
        row: u64,
    },

    /// The transaction manager requires the caller to stop.
    #[error("transaction {0} aborted")]
    TransactionAborted(Tid),

    /// A logical check raised by surrounding procedure code. Never produced
    /// by the core itself; the variant exists so callers can thread their
    /// own validation failures through the same error type.
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// The durability log could not be flushed (disk full, fsync failure).
    /// The engine logs and continues, marking the last commit non-durable.
    #[error("log write error: {0}")]
    LogWriteError(String),

    /// I/O error surfaced from the dump/recovery path.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StoreError {
    /// Whether the caller may retry after this error (only `ConcurrentCommit`
    /// is retryable; the core never retries internally).
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::ConcurrentCommit { .. })
    }

    /// Whether this error indicates the caller's transaction must be
    /// abandoned rather than retried.
    pub fn is_serious(&self) -> bool {
        matches!(
            self,
            StoreError::TransactionAborted(_) | StoreError::ValidationFailed(_)
        )
    }

    /// Whether this error means a durability guarantee was not met, even
    /// though the in-memory operation otherwise succeeded.
    pub fn is_durability_warning(&self) -> bool {
        matches!(self, StoreError::LogWriteError(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrent_commit_is_conflict_and_retryable_kind() {
        let e = StoreError::ConcurrentCommit { row: 3 };
        assert!(e.is_conflict());
        assert!(!e.is_serious());
    }

    #[test]
    fn transaction_aborted_is_serious() {
        let e = StoreError::TransactionAborted(Tid::new(7));
        assert!(e.is_serious());
        assert!(!e.is_conflict());
    }

    #[test]
    fn log_write_error_is_durability_warning() {
        let e = StoreError::LogWriteError("disk full".into());
        assert!(e.is_durability_warning());
    }
}
