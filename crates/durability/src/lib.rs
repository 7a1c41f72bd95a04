//! Durability layer: log record format, the `BufferedLogger` ring buffer,
//! optional group-commit coalescing, log replay, and the persisted
//! table dump format.
//!
//! - `format`: record byte layout (`LogRecord`, `encode_*`/`decode_record`)
//! - `logger`: `BufferedLogger`, the ring-buffer append/flush engine
//! - `group_commit`: `GroupCommitter`, optional fsync-coalescing thread
//! - `recovery`: `replay`, reconstructing stores from a log file
//! - `dump`: `dump_table`/`load_table`, the cold-reload directory format

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dump;
pub mod format;
pub mod group_commit;
pub mod logger;
pub mod recovery;

pub use dump::{dump_table, load_table};
pub use format::{decode_record, encode_commit, encode_dictionary, encode_value, LogRecord};
pub use group_commit::GroupCommitter;
pub use logger::{BufferedLogger, DEFAULT_BUFFER_SIZE};
pub use recovery::{replay, RecoveryStats};
