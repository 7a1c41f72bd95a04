//! Persisted table dump: a directory-per-table snapshot used for cold
//! reload, distinct from the redo log.
//!
//! Layout (directory-per-table pattern, following the storage/database
//! layer's snapshot-to-disk convention):
//!
//! ```text
//! <db_path>/log/<table>/metadata.dat     row count, decimal text
//! <db_path>/log/<table>/header.dat       names | types | partitions, "===" terminated
//! <db_path>/log/<table>/<col>.dict.dat   one value per line
//! <db_path>/log/<table>/<col>.attr.dat   raw little-endian u32 value-ids
//! <db_path>/log/<table>/indices.dat      indexed column ordinals, one ASCII digit per line
//! <db_path>/log/<table>/idx__<table>__<col>.dat   group-key index (optional)
//! ```
//!
//! A dump always reflects `main` only — callers merge before dumping so
//! delta is empty and every row carries a stable, sealed dictionary.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use colstore_core::error::{StoreError, StoreResult};
use colstore_core::types::{ColumnName, LogicalType};
use colstore_core::value::Value;
use colstore_storage::{AttributeVector, GroupkeyIndex, MainColumn, MainTable, Store};
use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

fn table_dir(db_path: &Path, table: &str) -> PathBuf {
    db_path.join("log").join(table)
}

fn format_value(v: &Value) -> String {
    match v {
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Str(s) => s.clone(),
    }
}

fn parse_value(s: &str, ty: LogicalType) -> StoreResult<Value> {
    match ty {
        LogicalType::Int => s
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|e| StoreError::LogWriteError(format!("bad int in dict dump: {e}"))),
        LogicalType::Float => s
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| StoreError::LogWriteError(format!("bad float in dict dump: {e}"))),
        LogicalType::Str => Ok(Value::Str(s.to_string())),
    }
}

/// Flush `store`'s main partition to `<db_path>/log/<table>/`. The caller
/// is expected to have called `store.merge()` first; this function only
/// persists main, not delta.
#[instrument(skip(store))]
pub fn dump_table(store: &Store, db_path: &Path) -> StoreResult<()> {
    let dir = table_dir(db_path, &store.name);
    fs::create_dir_all(&dir)?;

    let main = store.main();
    fs::write(dir.join("metadata.dat"), main.row_count().to_string())?;

    write_header(&dir, store.schema())?;

    for col in &main.columns {
        dump_column(&dir, col)?;
    }

    let indexed: Vec<usize> = store
        .indexed_columns()
        .iter()
        .filter_map(|c| main.column_index(c))
        .collect();
    let mut indices_file = BufWriter::new(fs::File::create(dir.join("indices.dat"))?);
    for ord in &indexed {
        writeln!(indices_file, "{ord}")?;
    }
    indices_file.flush()?;

    for column in store.indexed_columns() {
        if let Some(idx) = store.groupkey_index(column) {
            dump_groupkey_index(&dir, &store.name, column, &*idx)?;
        }
    }

    info!(table = %store.name, rows = main.row_count(), "table dumped");
    Ok(())
}

fn write_header(dir: &Path, schema: &[(ColumnName, LogicalType)]) -> StoreResult<()> {
    let names: Vec<&str> = schema.iter().map(|(n, _)| n.as_str()).collect();
    let types: Vec<&str> = schema
        .iter()
        .map(|(_, t)| match t {
            LogicalType::Int => "int",
            LogicalType::Float => "float",
            LogicalType::Str => "str",
        })
        .collect();
    let partitions: Vec<&str> = schema.iter().map(|_| "main").collect();

    let mut f = BufWriter::new(fs::File::create(dir.join("header.dat"))?);
    writeln!(f, "{}", names.join("|"))?;
    writeln!(f, "{}", types.join("|"))?;
    writeln!(f, "{}", partitions.join("|"))?;
    writeln!(f, "===")?;
    f.flush()?;
    Ok(())
}

fn dump_column(dir: &Path, col: &MainColumn) -> StoreResult<()> {
    let mut dict_file = BufWriter::new(fs::File::create(dir.join(format!("{}.dict.dat", col.name)))?);
    for vid in 0..col.dictionary.size() as u32 {
        let value = col.dictionary.value_for_vid(colstore_core::types::Vid::new(vid));
        writeln!(dict_file, "{}", format_value(&value))?;
    }
    dict_file.flush()?;

    let mut attr_file = BufWriter::new(fs::File::create(dir.join(format!("{}.attr.dat", col.name)))?);
    for row in 0..col.values.len() {
        attr_file.write_u32::<LittleEndian>(col.values.get(row).get())?;
    }
    attr_file.flush()?;
    Ok(())
}

fn dump_groupkey_index(dir: &Path, table: &str, column: &str, idx: &GroupkeyIndex) -> StoreResult<()> {
    let path = dir.join(format!("idx__{table}__{column}.dat"));
    let mut f = BufWriter::new(fs::File::create(path)?);
    f.write_u64::<LittleEndian>(idx.dict_size() as u64)?;
    let offsets = idx.offsets();
    f.write_u64::<LittleEndian>(offsets.len() as u64)?;
    for &o in offsets {
        f.write_u64::<LittleEndian>(o as u64)?;
    }
    let postings = idx.postings();
    f.write_u64::<LittleEndian>(postings.len() as u64)?;
    for row in postings {
        f.write_u64::<LittleEndian>(row.get())?;
    }
    f.flush()?;
    Ok(())
}

/// Rebuild a `MainTable` (and its schema) from a dump directory, the
/// reverse of `dump_table`. Does not reconstruct secondary indices;
/// callers rebuild those fresh via `Store::new` + a no-op `merge()`, or
/// by re-deriving them from the loaded main table.
#[instrument]
pub fn load_table(db_path: &Path, table: &str) -> StoreResult<(Vec<(ColumnName, LogicalType)>, MainTable)> {
    let dir = table_dir(db_path, table);
    let metadata = fs::read_to_string(dir.join("metadata.dat"))?;
    let row_count: usize = metadata
        .trim()
        .parse()
        .map_err(|e| StoreError::LogWriteError(format!("bad metadata.dat: {e}")))?;

    let schema = read_header(&dir)?;

    let mut columns = Vec::with_capacity(schema.len());
    for (name, ty) in &schema {
        columns.push(load_column(&dir, name, *ty, row_count)?);
    }

    Ok((schema, MainTable::from_columns(columns, row_count)))
}

fn read_header(dir: &Path) -> StoreResult<Vec<(ColumnName, LogicalType)>> {
    let f = fs::File::open(dir.join("header.dat"))?;
    let mut lines = BufReader::new(f).lines();
    let names = lines
        .next()
        .ok_or_else(|| StoreError::LogWriteError("empty header.dat".into()))??;
    let types = lines
        .next()
        .ok_or_else(|| StoreError::LogWriteError("truncated header.dat".into()))??;

    let names: Vec<&str> = names.split('|').collect();
    let types: Vec<&str> = types.split('|').collect();
    if names.len() != types.len() {
        return Err(StoreError::LogWriteError(
            "header.dat name/type column count mismatch".into(),
        ));
    }

    names
        .into_iter()
        .zip(types)
        .map(|(name, ty)| {
            let logical = match ty {
                "int" => LogicalType::Int,
                "float" => LogicalType::Float,
                "str" => LogicalType::Str,
                other => {
                    return Err(StoreError::LogWriteError(format!(
                        "unknown logical type in header.dat: {other}"
                    )))
                }
            };
            Ok((name.to_string(), logical))
        })
        .collect()
}

fn load_column(dir: &Path, name: &str, ty: LogicalType, row_count: usize) -> StoreResult<MainColumn> {
    let dict_file = fs::File::open(dir.join(format!("{name}.dict.dat")))?;
    let mut values = Vec::new();
    for line in BufReader::new(dict_file).lines() {
        values.push(parse_value(&line?, ty)?);
    }
    let dictionary = colstore_storage::OrderPreservingDictionary::from_sorted_values(values);

    let bits = colstore_storage::BitCompressedVector::bits_for(dictionary.size());
    let mut attr = colstore_storage::BitCompressedVector::new(bits, row_count);
    let mut attr_file = fs::File::open(dir.join(format!("{name}.attr.dat")))?;
    for row in 0..row_count {
        let vid = attr_file.read_u32::<LittleEndian>()?;
        attr.set(row, colstore_core::types::Vid::new(vid));
    }

    Ok(MainColumn {
        name: name.to_string(),
        logical_type: ty,
        dictionary,
        values: Box::new(attr),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use colstore_core::types::{Cid, RowId, Tid};
    use colstore_core::value::Value;
    use tempfile::tempdir;

    #[test]
    fn dump_then_load_round_trips_main_table() {
        let dir = tempdir().unwrap();
        let store = Store::new(
            "orders",
            vec![
                ("id".to_string(), LogicalType::Int),
                ("name".to_string(), LogicalType::Str),
            ],
            vec!["id".to_string()],
        );
        let (begin, _) = store.append_to_delta(2);
        store.copy_row_to_delta(vec![Value::Int(1), Value::Str("a".into())], 0, Tid::new(1));
        store.copy_row_to_delta(vec![Value::Int(2), Value::Str("b".into())], 1, Tid::new(1));
        let second = RowId::new(begin.get() + 1);
        store.commit_positions(&[begin, second], Cid::new(1), true);
        store.merge().unwrap();

        dump_table(&store, dir.path()).unwrap();
        let (schema, main) = load_table(dir.path(), "orders").unwrap();
        assert_eq!(schema.len(), 2);
        assert_eq!(main.row_count(), 2);
        let mut got: Vec<i64> = (0..2)
            .map(|r| match main.value_at(0, r) {
                Value::Int(i) => i,
                _ => panic!("expected int"),
            })
            .collect();
        got.sort();
        assert_eq!(got, vec![1, 2]);
    }
}
