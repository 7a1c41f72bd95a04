//! Log record byte layout.
//!
//! Three record kinds, each starting with a one-byte tag:
//!
//! ```text
//! Dictionary  'D' + u8 name_len + name + u32 column + u32 value_id + i32 value_len + value
//! Value       'V' + u64 tx_id + u8 name_len + name + u64 row + u64 invalidated_row
//!             + u64 field_bitmask + value_id (u32, one per set bit)
//! Commit      'C' + u64 tx_id
//! ```
//!
//! Grounded on the reference `BufferedLogger.cpp`'s comment-documented
//! format; each record here additionally ends with a `crc32fast` trailer,
//! explicit length/checksum framing in the style used elsewhere in this
//! codebase for on-disk records, so `recovery` can detect a truncated tail
//! rather than misparse it as the start of a new record.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use colstore_core::error::{StoreError, StoreResult};
use colstore_core::types::{RowId, TableName, Tid, Vid};
use colstore_core::value::Value;
use crc32fast::Hasher;
use std::io::{self, Read, Write};

const DICTIONARY_TAG: u8 = b'D';
const VALUE_TAG: u8 = b'V';
const COMMIT_TAG: u8 = b'C';

/// One decoded log record.
#[derive(Debug, Clone, PartialEq)]
pub enum LogRecord {
    /// Extends a delta dictionary: `(table, column, value_id, value)`.
    Dictionary {
        /// Owning table.
        table: TableName,
        /// Column ordinal within the table's schema.
        column: u32,
        /// The value-id the value was assigned.
        value_id: Vid,
        /// The logged value.
        value: Value,
    },
    /// An insert, update, or delete against one row.
    Value {
        /// Transaction that performed the write.
        tid: Tid,
        /// Owning table.
        table: TableName,
        /// Row position in the store's combined address space.
        row: RowId,
        /// Non-zero row position if this write invalidated (deleted) a row.
        invalidated_row: Option<RowId>,
        /// One bit per column; set bits have a trailing value-id.
        field_bitmask: u64,
        /// Value-ids for each set bit in `field_bitmask`, in column order.
        value_ids: Vec<Vid>,
    },
    /// Commits every pending write recorded under `tid` so far.
    Commit {
        /// The committing transaction.
        tid: Tid,
    },
}

fn write_checked<W: Write>(w: &mut W, buf: &[u8]) -> io::Result<()> {
    w.write_all(buf)
}

/// Encode a dictionary record, appending its CRC32 trailer.
pub fn encode_dictionary(
    table: &str,
    column: u32,
    value_id: Vid,
    value: &Value,
) -> StoreResult<Vec<u8>> {
    let mut buf = Vec::with_capacity(32);
    buf.write_u8(DICTIONARY_TAG)?;
    write_name(&mut buf, table)?;
    buf.write_u32::<LittleEndian>(column)?;
    buf.write_u32::<LittleEndian>(value_id.get())?;
    write_value(&mut buf, value)?;
    append_crc(&mut buf);
    Ok(buf)
}

/// Encode a value record, appending its CRC32 trailer.
pub fn encode_value(
    tid: Tid,
    table: &str,
    row: RowId,
    invalidated_row: Option<RowId>,
    field_bitmask: u64,
    value_ids: &[Vid],
) -> StoreResult<Vec<u8>> {
    let mut buf = Vec::with_capacity(64);
    buf.write_u8(VALUE_TAG)?;
    buf.write_u64::<LittleEndian>(tid.get())?;
    write_name(&mut buf, table)?;
    buf.write_u64::<LittleEndian>(row.get())?;
    buf.write_u64::<LittleEndian>(invalidated_row.map(|r| r.get()).unwrap_or(0))?;
    buf.write_u64::<LittleEndian>(field_bitmask)?;
    for vid in value_ids {
        buf.write_u32::<LittleEndian>(vid.get())?;
    }
    append_crc(&mut buf);
    Ok(buf)
}

/// Encode a commit record, appending its CRC32 trailer.
pub fn encode_commit(tid: Tid) -> StoreResult<Vec<u8>> {
    let mut buf = Vec::with_capacity(16);
    buf.write_u8(COMMIT_TAG)?;
    buf.write_u64::<LittleEndian>(tid.get())?;
    append_crc(&mut buf);
    Ok(buf)
}

fn write_name<W: Write>(w: &mut W, name: &str) -> io::Result<()> {
    debug_assert!(!name.is_empty() && name.len() <= u8::MAX as usize);
    w.write_u8(name.len() as u8)?;
    write_checked(w, name.as_bytes())
}

fn write_value<W: Write>(w: &mut W, value: &Value) -> io::Result<()> {
    match value {
        Value::Int(i) => {
            w.write_i32::<LittleEndian>(8)?;
            w.write_i64::<LittleEndian>(*i)
        }
        Value::Float(f) => {
            w.write_i32::<LittleEndian>(8)?;
            w.write_f64::<LittleEndian>(*f)
        }
        Value::Str(s) => {
            w.write_i32::<LittleEndian>(s.len() as i32)?;
            write_checked(w, s.as_bytes())
        }
    }
}

fn append_crc(buf: &mut Vec<u8>) {
    let mut hasher = Hasher::new();
    hasher.update(buf);
    let crc = hasher.finalize();
    buf.extend_from_slice(&crc.to_le_bytes());
}

/// Decode one record (including its trailing CRC32) from `cursor`,
/// returning the record and the number of bytes consumed. The caller's
/// schema lookup resolves `column: u32`'s logical type so the value
/// payload can be parsed; `column_type` is given per-table by the
/// recovery driver.
pub fn decode_record(
    bytes: &[u8],
    column_type: impl Fn(&str, u32) -> Option<colstore_core::types::LogicalType>,
) -> StoreResult<(LogRecord, usize)> {
    let mut cursor = io::Cursor::new(bytes);
    let tag = cursor
        .read_u8()
        .map_err(|e| StoreError::LogWriteError(format!("truncated record tag: {e}")))?;

    let record = match tag {
        DICTIONARY_TAG => {
            let table = read_name(&mut cursor)?;
            let column = cursor
                .read_u32::<LittleEndian>()
                .map_err(io_err)?;
            let value_id = Vid::new(cursor.read_u32::<LittleEndian>().map_err(io_err)?);
            let logical_type = column_type(&table, column).ok_or_else(|| {
                StoreError::LogWriteError(format!("unknown column ordinal {column} in {table}"))
            })?;
            let value = read_value(&mut cursor, logical_type)?;
            LogRecord::Dictionary {
                table,
                column,
                value_id,
                value,
            }
        }
        VALUE_TAG => {
            let tid = Tid::new(cursor.read_u64::<LittleEndian>().map_err(io_err)?);
            let table = read_name(&mut cursor)?;
            let row = RowId::new(cursor.read_u64::<LittleEndian>().map_err(io_err)?);
            let invalidated_raw = cursor.read_u64::<LittleEndian>().map_err(io_err)?;
            let field_bitmask = cursor.read_u64::<LittleEndian>().map_err(io_err)?;
            let mut value_ids = Vec::with_capacity(field_bitmask.count_ones() as usize);
            for _ in 0..field_bitmask.count_ones() {
                value_ids.push(Vid::new(cursor.read_u32::<LittleEndian>().map_err(io_err)?));
            }
            LogRecord::Value {
                tid,
                table,
                row,
                invalidated_row: if invalidated_raw == 0 {
                    None
                } else {
                    Some(RowId::new(invalidated_raw))
                },
                field_bitmask,
                value_ids,
            }
        }
        COMMIT_TAG => {
            let tid = Tid::new(cursor.read_u64::<LittleEndian>().map_err(io_err)?);
            LogRecord::Commit { tid }
        }
        other => {
            return Err(StoreError::LogWriteError(format!(
                "unknown log record tag: {other:#x}"
            )))
        }
    };

    let payload_len = cursor.position() as usize;
    let crc_start = payload_len;
    let crc_end = crc_start + 4;
    let stored = bytes
        .get(crc_start..crc_end)
        .ok_or_else(|| StoreError::LogWriteError("truncated record: missing CRC".into()))?;
    let mut hasher = Hasher::new();
    hasher.update(&bytes[..payload_len]);
    let computed = hasher.finalize();
    let stored = u32::from_le_bytes(stored.try_into().unwrap());
    if stored != computed {
        return Err(StoreError::LogWriteError(format!(
            "CRC mismatch decoding record: stored {stored:#010x}, computed {computed:#010x}"
        )));
    }

    Ok((record, crc_end))
}

fn read_name(cursor: &mut io::Cursor<&[u8]>) -> StoreResult<String> {
    let len = cursor.read_u8().map_err(io_err)? as usize;
    let mut buf = vec![0u8; len];
    cursor.read_exact(&mut buf).map_err(io_err)?;
    String::from_utf8(buf).map_err(|e| StoreError::LogWriteError(format!("invalid table name: {e}")))
}

fn read_value(
    cursor: &mut io::Cursor<&[u8]>,
    logical_type: colstore_core::types::LogicalType,
) -> StoreResult<Value> {
    let len = cursor.read_i32::<LittleEndian>().map_err(io_err)?;
    use colstore_core::types::LogicalType::*;
    match logical_type {
        Int => Ok(Value::Int(cursor.read_i64::<LittleEndian>().map_err(io_err)?)),
        Float => Ok(Value::Float(cursor.read_f64::<LittleEndian>().map_err(io_err)?)),
        Str => {
            let mut buf = vec![0u8; len.max(0) as usize];
            cursor.read_exact(&mut buf).map_err(io_err)?;
            String::from_utf8(buf)
                .map(Value::Str)
                .map_err(|e| StoreError::LogWriteError(format!("invalid string value: {e}")))
        }
    }
}

fn io_err(e: io::Error) -> StoreError {
    StoreError::LogWriteError(format!("truncated record: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use colstore_core::types::LogicalType;

    #[test]
    fn dictionary_record_round_trips() {
        let buf = encode_dictionary("orders", 1, Vid::new(7), &Value::Int(42)).unwrap();
        let (record, consumed) =
            decode_record(&buf, |_, _| Some(LogicalType::Int)).unwrap();
        assert_eq!(consumed, buf.len());
        assert_eq!(
            record,
            LogRecord::Dictionary {
                table: "orders".to_string(),
                column: 1,
                value_id: Vid::new(7),
                value: Value::Int(42),
            }
        );
    }

    #[test]
    fn value_record_round_trips_with_string_column() {
        let buf = encode_value(
            Tid::new(3),
            "orders",
            RowId::new(10),
            None,
            0b101,
            &[Vid::new(1), Vid::new(2)],
        )
        .unwrap();
        let (record, consumed) = decode_record(&buf, |_, _| Some(LogicalType::Str)).unwrap();
        assert_eq!(consumed, buf.len());
        match record {
            LogRecord::Value {
                tid,
                row,
                invalidated_row,
                field_bitmask,
                value_ids,
                ..
            } => {
                assert_eq!(tid, Tid::new(3));
                assert_eq!(row, RowId::new(10));
                assert_eq!(invalidated_row, None);
                assert_eq!(field_bitmask, 0b101);
                assert_eq!(value_ids, vec![Vid::new(1), Vid::new(2)]);
            }
            _ => panic!("expected Value record"),
        }
    }

    #[test]
    fn commit_record_round_trips() {
        let buf = encode_commit(Tid::new(99)).unwrap();
        let (record, consumed) = decode_record(&buf, |_, _| None).unwrap();
        assert_eq!(consumed, buf.len());
        assert_eq!(record, LogRecord::Commit { tid: Tid::new(99) });
    }

    #[test]
    fn corrupt_crc_is_rejected() {
        let mut buf = encode_commit(Tid::new(1)).unwrap();
        let last = buf.len() - 1;
        buf[last] ^= 0xff;
        assert!(decode_record(&buf, |_, _| None).is_err());
    }
}
