//! Transaction coordination: tid/cid issuance, live-transaction tracking,
//! and commit orchestration across stores.
//!
//! - `manager`: `TransactionManager`, `TxContext`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod manager;

pub use manager::{TransactionManager, TxContext};
