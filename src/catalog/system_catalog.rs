//! Tables, columns, indexes and statistics, stored as rows under reserved
//! key prefixes in the transactional store (§4.6).
//!
//! Grounded on `catalog.py`'s four-prefix layout and method surface, with
//! two redesigns recorded in `DESIGN.md`: metadata values are typed binary
//! (tag byte + fixed/length-prefixed fields) instead of `"k=v,k=v"` strings,
//! and enumeration uses [`TransactionalStore::scan_prefix`] instead of the
//! `"~"` sentinel trick.

use std::sync::Arc;

use log::debug;

use crate::common::{Error, Result};
use crate::concurrency::TransactionalStore;

use super::types::{ColumnDef, ColumnInfo, ColumnType, IndexDef, TableStats};
use super::value::{decode_string, encode_string};

const TABLES_PREFIX: &str = "__catalog__tables:";
const COLUMNS_PREFIX: &str = "__catalog__columns:";
const INDEXES_PREFIX: &str = "__catalog__indexes:";
const STATS_PREFIX: &str = "__catalog__stats:";

const DEAD: u8 = 0;
const LIVE: u8 = 1;

struct TableMeta {
    column_count: u16,
    next_rowid: u64,
}

fn table_key(table: &str) -> String {
    format!("{TABLES_PREFIX}{table}")
}

fn column_prefix(table: &str) -> String {
    format!("{COLUMNS_PREFIX}{table}:")
}

fn column_key(table: &str, column: &str) -> String {
    format!("{COLUMNS_PREFIX}{table}:{column}")
}

fn index_key(index_name: &str) -> String {
    format!("{INDEXES_PREFIX}{index_name}")
}

fn stats_key(table: &str) -> String {
    format!("{STATS_PREFIX}{table}")
}

/// Key for a data row: `{table}:{rowid:020d}`, zero-padded so rows sort in
/// rowid order under a prefix scan (§3).
pub fn row_key(table: &str, rowid: u64) -> Vec<u8> {
    format!("{table}:{rowid:020}").into_bytes()
}

/// Prefix covering every row of `table`.
pub fn row_prefix(table: &str) -> Vec<u8> {
    format!("{table}:").into_bytes()
}

fn encode_table_meta(meta: &TableMeta) -> Vec<u8> {
    let mut out = vec![LIVE];
    out.extend_from_slice(&meta.column_count.to_le_bytes());
    out.extend_from_slice(&meta.next_rowid.to_le_bytes());
    out
}

fn decode_table_meta(data: &[u8]) -> Result<Option<TableMeta>> {
    if data.first() != Some(&LIVE) {
        return Ok(None);
    }
    let column_count = u16::from_le_bytes(
        data.get(1..3)
            .ok_or_else(|| Error::StorageFailure("truncated table meta".to_string()))?
            .try_into()
            .unwrap(),
    );
    let next_rowid = u64::from_le_bytes(
        data.get(3..11)
            .ok_or_else(|| Error::StorageFailure("truncated table meta".to_string()))?
            .try_into()
            .unwrap(),
    );
    Ok(Some(TableMeta {
        column_count,
        next_rowid,
    }))
}

fn encode_column_meta(col_type: ColumnType, ordinal: u16) -> Vec<u8> {
    let mut out = vec![LIVE, col_type.as_u8()];
    out.extend_from_slice(&ordinal.to_le_bytes());
    out
}

fn decode_column_meta(data: &[u8]) -> Result<Option<(ColumnType, u16)>> {
    if data.first() != Some(&LIVE) {
        return Ok(None);
    }
    let col_type = ColumnType::from_u8(
        *data
            .get(1)
            .ok_or_else(|| Error::StorageFailure("truncated column meta".to_string()))?,
    )?;
    let ordinal = u16::from_le_bytes(
        data.get(2..4)
            .ok_or_else(|| Error::StorageFailure("truncated column meta".to_string()))?
            .try_into()
            .unwrap(),
    );
    Ok(Some((col_type, ordinal)))
}

fn encode_index_meta(table: &str, column: &str) -> Vec<u8> {
    let mut out = vec![LIVE];
    encode_string(&mut out, table);
    encode_string(&mut out, column);
    out
}

fn decode_index_meta(data: &[u8]) -> Result<Option<(String, String)>> {
    if data.first() != Some(&LIVE) {
        return Ok(None);
    }
    let mut offset = 1;
    let table = decode_string(data, &mut offset)?;
    let column = decode_string(data, &mut offset)?;
    Ok(Some((table, column)))
}

fn encode_stats(row_count: u64) -> Vec<u8> {
    let mut out = vec![LIVE];
    out.extend_from_slice(&row_count.to_le_bytes());
    out
}

fn decode_stats(data: &[u8]) -> Result<Option<u64>> {
    if data.first() != Some(&LIVE) {
        return Ok(None);
    }
    let row_count = u64::from_le_bytes(
        data.get(1..9)
            .ok_or_else(|| Error::StorageFailure("truncated stats".to_string()))?
            .try_into()
            .unwrap(),
    );
    Ok(Some(row_count))
}

fn utf8_suffix(key: &[u8], prefix_len: usize, what: &str) -> Result<String> {
    String::from_utf8(key[prefix_len..].to_vec())
        .map_err(|e| Error::StorageFailure(format!("{what} key is not utf-8: {e}")))
}

/// Tables, columns, indexes and statistics, layered on top of a
/// [`TransactionalStore`].
pub struct Catalog {
    store: Arc<TransactionalStore>,
}

impl Catalog {
    pub fn new(store: Arc<TransactionalStore>) -> Self {
        Self { store }
    }

    pub fn create_table(&self, name: &str, columns: &[ColumnDef]) -> Result<()> {
        if name.starts_with("__catalog__") || name.contains(':') {
            return Err(Error::SchemaFailure(format!(
                "table name '{name}' is reserved"
            )));
        }
        if columns.is_empty() {
            return Err(Error::SchemaFailure(format!(
                "table '{name}' must declare at least one column"
            )));
        }
        if self.table_exists(name)? {
            return Err(Error::SchemaFailure(format!("table '{name}' already exists")));
        }

        let meta = TableMeta {
            column_count: columns.len() as u16,
            next_rowid: 1,
        };
        self.store
            .insert(table_key(name).as_bytes(), &encode_table_meta(&meta))?;
        for (ordinal, column) in columns.iter().enumerate() {
            let key = column_key(name, &column.name);
            self.store
                .insert(key.as_bytes(), &encode_column_meta(column.col_type, ordinal as u16))?;
        }

        debug!("created table '{}' with {} column(s)", name, columns.len());
        Ok(())
    }

    pub fn drop_table(&self, name: &str) -> Result<()> {
        self.require_table_meta(name)?;

        for column in self.get_columns(name)? {
            let key = column_key(name, &column.def.name);
            self.store.insert(key.as_bytes(), &[DEAD])?;
        }
        for index in self.get_indexes(Some(name))? {
            self.store.insert(index_key(&index.name).as_bytes(), &[DEAD])?;
        }
        self.store.insert(table_key(name).as_bytes(), &[DEAD])?;

        debug!("dropped table '{}'", name);
        Ok(())
    }

    pub fn table_exists(&self, name: &str) -> Result<bool> {
        Ok(self.read_table_meta(name)?.is_some())
    }

    fn read_table_meta(&self, name: &str) -> Result<Option<TableMeta>> {
        match self.store.get(table_key(name).as_bytes())? {
            Some(bytes) => decode_table_meta(&bytes),
            None => Ok(None),
        }
    }

    fn require_table_meta(&self, name: &str) -> Result<TableMeta> {
        self.read_table_meta(name)?
            .ok_or_else(|| Error::SchemaFailure(format!("table '{name}' does not exist")))
    }

    pub fn get_tables(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for (key, value) in self.store.scan_prefix(TABLES_PREFIX.as_bytes())? {
            if decode_table_meta(&value)?.is_some() {
                names.push(utf8_suffix(&key, TABLES_PREFIX.len(), "table")?);
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn get_columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        self.require_table_meta(table)?;

        let prefix = column_prefix(table);
        let mut columns = Vec::new();
        for (key, value) in self.store.scan_prefix(prefix.as_bytes())? {
            if let Some((col_type, ordinal)) = decode_column_meta(&value)? {
                let name = utf8_suffix(&key, prefix.len(), "column")?;
                columns.push(ColumnInfo {
                    def: ColumnDef::new(name, col_type),
                    ordinal,
                });
            }
        }
        columns.sort_by_key(|c| c.ordinal);
        Ok(columns)
    }

    pub fn add_column(&self, table: &str, column: ColumnDef) -> Result<()> {
        let mut meta = self.require_table_meta(table)?;

        let key = column_key(table, &column.name);
        if let Some(existing) = self.store.get(key.as_bytes())? {
            if decode_column_meta(&existing)?.is_some() {
                return Err(Error::SchemaFailure(format!(
                    "column '{}' already exists on table '{}'",
                    column.name, table
                )));
            }
        }

        let ordinal = meta.column_count;
        self.store
            .insert(key.as_bytes(), &encode_column_meta(column.col_type, ordinal))?;

        meta.column_count += 1;
        self.store
            .insert(table_key(table).as_bytes(), &encode_table_meta(&meta))?;
        Ok(())
    }

    /// Atomically reserve the next rowid for `table`, persisting the
    /// incremented counter before returning the id assigned to this call.
    pub fn next_rowid(&self, table: &str) -> Result<u64> {
        let mut meta = self.require_table_meta(table)?;
        let rowid = meta.next_rowid;
        meta.next_rowid += 1;
        self.store
            .insert(table_key(table).as_bytes(), &encode_table_meta(&meta))?;
        Ok(rowid)
    }

    pub fn create_index(&self, index_name: &str, table: &str, column: &str) -> Result<()> {
        self.require_table_meta(table)?;
        let columns = self.get_columns(table)?;
        if !columns.iter().any(|c| c.def.name == column) {
            return Err(Error::SchemaFailure(format!(
                "column '{column}' does not exist on table '{table}'"
            )));
        }

        let key = index_key(index_name);
        if let Some(existing) = self.store.get(key.as_bytes())? {
            if decode_index_meta(&existing)?.is_some() {
                return Err(Error::SchemaFailure(format!(
                    "index '{index_name}' already exists"
                )));
            }
        }

        self.store.insert(key.as_bytes(), &encode_index_meta(table, column))?;
        debug!("created index '{}' on {}({})", index_name, table, column);
        Ok(())
    }

    pub fn drop_index(&self, index_name: &str) -> Result<()> {
        let key = index_key(index_name);
        match self.store.get(key.as_bytes())? {
            Some(value) if decode_index_meta(&value)?.is_some() => {
                self.store.insert(key.as_bytes(), &[DEAD])?;
                Ok(())
            }
            _ => Err(Error::SchemaFailure(format!(
                "index '{index_name}' does not exist"
            ))),
        }
    }

    pub fn get_indexes(&self, table: Option<&str>) -> Result<Vec<IndexDef>> {
        let mut indexes = Vec::new();
        for (key, value) in self.store.scan_prefix(INDEXES_PREFIX.as_bytes())? {
            let Some((idx_table, idx_column)) = decode_index_meta(&value)? else {
                continue;
            };
            if let Some(wanted) = table {
                if wanted != idx_table {
                    continue;
                }
            }
            let name = utf8_suffix(&key, INDEXES_PREFIX.len(), "index")?;
            indexes.push(IndexDef {
                name,
                table: idx_table,
                column: idx_column,
            });
        }
        indexes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(indexes)
    }

    pub fn update_stats(&self, table: &str, row_count: u64) -> Result<()> {
        self.require_table_meta(table)?;
        self.store.insert(stats_key(table).as_bytes(), &encode_stats(row_count))?;
        Ok(())
    }

    pub fn get_stats(&self, table: &str) -> Result<TableStats> {
        match self.store.get(stats_key(table).as_bytes())? {
            Some(value) => Ok(TableStats {
                row_count: decode_stats(&value)?.unwrap_or(0),
            }),
            None => Ok(TableStats::default()),
        }
    }
}
