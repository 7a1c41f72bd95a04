//! A circular byte buffer plus an append-only log file.
//!
//! Grounded on `original_source/BufferedLogger.cpp`: the buffer mutex is
//! held only long enough to advance the head pointer and bump an
//! in-flight writer count; the actual `memcpy` (here, slice copy) happens
//! outside the lock. `flush` takes the file mutex, spin-waits for
//! in-flight writers to drain, then writes the contiguous-or-wrapped
//! region between `last_write` and the current head.

use colstore_core::error::{StoreError, StoreResult};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use tracing::{debug, instrument, warn};

/// Default ring-buffer capacity, matching the reference implementation's
/// `LOG_BUFFER_SIZE`.
pub const DEFAULT_BUFFER_SIZE: usize = 16_384;

struct RingBuffer {
    data: Vec<u8>,
    head: usize,
    last_write: usize,
}

/// State shared between `append` and `flush` under the buffer mutex:
/// ring contents, head pointer, and in-flight writer count.
struct BufferState {
    ring: RingBuffer,
    writers_in_flight: usize,
}

/// Buffers log records in a ring and periodically flushes them to a file.
pub struct BufferedLogger {
    path: PathBuf,
    buffer_mutex: Mutex<BufferState>,
    file_mutex: Mutex<File>,
    buffered_size: AtomicUsize,
    // tracks whether any writer is mid-copy, without holding buffer_mutex
    in_flight_spin: AtomicI64,
}

impl BufferedLogger {
    /// Open (creating if absent) the log file at `path` and allocate a
    /// fresh ring buffer of `buffer_size` bytes.
    pub fn open(path: impl AsRef<Path>, buffer_size: usize) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&path)?;
        Ok(BufferedLogger {
            path,
            buffer_mutex: Mutex::new(BufferState {
                ring: RingBuffer {
                    data: vec![0u8; buffer_size],
                    head: 0,
                    last_write: 0,
                },
                writers_in_flight: 0,
            }),
            file_mutex: Mutex::new(file),
            buffered_size: AtomicUsize::new(0),
            in_flight_spin: AtomicI64::new(0),
        })
    }

    /// Append `record` to the ring buffer, requesting a flush once the
    /// buffered size exceeds half the ring's capacity.
    #[instrument(skip(self, record), fields(len = record.len()))]
    pub fn append(&self, record: &[u8]) -> StoreResult<()> {
        let len = record.len();
        let capacity = {
            let guard = self.buffer_mutex.lock();
            guard.ring.data.len()
        };
        if len > capacity {
            return Err(StoreError::LogWriteError(format!(
                "record of {len} bytes exceeds ring buffer capacity {capacity}"
            )));
        }

        let head = {
            let mut guard = self.buffer_mutex.lock();
            let head = guard.ring.head;
            guard.ring.head = (head + len) % capacity;
            guard.writers_in_flight += 1;
            self.in_flight_spin.fetch_add(1, Ordering::SeqCst);
            head
        };

        {
            let mut guard = self.buffer_mutex.lock();
            let data = &mut guard.ring.data;
            if head + len <= capacity {
                data[head..head + len].copy_from_slice(record);
            } else {
                let part1 = capacity - head;
                let part2 = len - part1;
                data[head..].copy_from_slice(&record[..part1]);
                data[..part2].copy_from_slice(&record[part1..]);
            }
            guard.writers_in_flight -= 1;
        }
        self.in_flight_spin.fetch_sub(1, Ordering::SeqCst);

        let prior = self.buffered_size.fetch_add(len, Ordering::SeqCst);
        if prior + len > capacity / 2 {
            self.flush()?;
        }
        Ok(())
    }

    /// Flush every byte written since the last flush to disk, optionally
    /// followed by `fsync`. A no-op if nothing changed since the last
    /// flush.
    #[instrument(skip(self))]
    pub fn flush(&self) -> StoreResult<()> {
        let mut file = self.file_mutex.lock();

        let (head, capacity, last_write) = loop {
            let guard = self.buffer_mutex.lock();
            if guard.writers_in_flight == 0 {
                break (guard.ring.head, guard.ring.data.len(), guard.ring.last_write);
            }
            drop(guard);
            std::thread::yield_now();
        };

        if head == last_write {
            return Ok(());
        }

        let written = {
            let guard = self.buffer_mutex.lock();
            if head > last_write {
                file.write_all(&guard.ring.data[last_write..head])?;
                head - last_write
            } else {
                file.write_all(&guard.ring.data[last_write..])?;
                file.write_all(&guard.ring.data[..head])?;
                (capacity - last_write) + head
            }
        };

        self.buffered_size.fetch_sub(written, Ordering::SeqCst);
        self.buffer_mutex.lock().ring.last_write = head;

        file.flush()?;
        if let Err(e) = file.sync_data() {
            warn!(error = %e, path = %self.path.display(), "fsync failed on log flush");
            return Err(StoreError::LogWriteError(format!("fsync failed: {e}")));
        }
        Ok(())
    }

    /// Truncate the log file to empty and reset the ring buffer, used
    /// after a successful checkpoint/dump has made replay unnecessary.
    pub fn truncate(&self) -> StoreResult<()> {
        self.flush()?;
        let mut file = self.file_mutex.lock();
        file.set_len(0)?;
        let mut guard = self.buffer_mutex.lock();
        guard.ring.head = 0;
        guard.ring.last_write = 0;
        self.buffered_size.store(0, Ordering::SeqCst);
        debug!(path = %self.path.display(), "log truncated");
        Ok(())
    }

    /// Read the entire on-disk log file from offset 0, for replay.
    pub fn read_all(&self) -> StoreResult<Vec<u8>> {
        self.flush()?;
        let mut file = File::open(&self.path)?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Path to the underlying log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn append_then_flush_persists_bytes() {
        let dir = tempdir().unwrap();
        let logger = BufferedLogger::open(dir.path().join("log.bin"), DEFAULT_BUFFER_SIZE).unwrap();
        logger.append(b"hello").unwrap();
        logger.append(b"world").unwrap();
        logger.flush().unwrap();
        let contents = logger.read_all().unwrap();
        assert_eq!(&contents, b"helloworld");
    }

    #[test]
    fn append_past_half_buffer_triggers_automatic_flush() {
        let dir = tempdir().unwrap();
        let logger = BufferedLogger::open(dir.path().join("log.bin"), 16).unwrap();
        logger.append(&[1u8; 9]).unwrap();
        let contents = logger.read_all().unwrap();
        assert_eq!(contents.len(), 9);
    }

    #[test]
    fn wrapping_write_is_reassembled_correctly() {
        let dir = tempdir().unwrap();
        let logger = BufferedLogger::open(dir.path().join("log.bin"), 8).unwrap();
        logger.append(&[1, 2, 3, 4, 5]).unwrap();
        logger.flush().unwrap();
        logger.append(&[6, 7, 8, 9]).unwrap();
        logger.flush().unwrap();
        let contents = logger.read_all().unwrap();
        assert_eq!(contents, vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn truncate_resets_file_and_ring() {
        let dir = tempdir().unwrap();
        let logger = BufferedLogger::open(dir.path().join("log.bin"), DEFAULT_BUFFER_SIZE).unwrap();
        logger.append(b"stale").unwrap();
        logger.flush().unwrap();
        logger.truncate().unwrap();
        assert!(logger.read_all().unwrap().is_empty());
        logger.append(b"fresh").unwrap();
        logger.flush().unwrap();
        assert_eq!(logger.read_all().unwrap(), b"fresh");
    }
}
