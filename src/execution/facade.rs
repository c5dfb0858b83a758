//! `Database`: the single client-facing entry point (§4.10).
//!
//! Collapses the reference implementation's phased `Database` /
//! `IndexedDatabase` / `TransactionalDatabase` / `SQLDatabase` stack
//! (`__init__.py`) into one type backed by [`TransactionalStore`] (F) and
//! [`Catalog`].

use std::path::Path;
use std::sync::Arc;

use log::info;

use crate::catalog::{Catalog, ColumnInfo, IndexDef};
use crate::common::{Config, Lsn, Result, TxnId};
use crate::concurrency::TransactionalStore;

use super::executor::{Executor, QueryResult};
use super::parser::parse_sql;

/// Buffer-pool hit rate and WAL position, for observability (§6).
#[derive(Debug, Clone, Copy)]
pub struct DatabaseStats {
    pub cache_hit_rate: f64,
    pub last_lsn: Lsn,
}

/// An open database: one data file, one WAL, one buffer pool, one catalog.
pub struct Database {
    store: Arc<TransactionalStore>,
    catalog: Arc<Catalog>,
    executor: Executor,
}

impl Database {
    /// Open (or create) the database file at `path` with the given
    /// embedder-supplied [`Config`], running crash recovery first.
    pub fn open<P: AsRef<Path>>(path: P, config: Config) -> Result<Self> {
        let store = Arc::new(TransactionalStore::open_with_config(path, &config)?);
        let catalog = Arc::new(Catalog::new(Arc::clone(&store)));
        let executor = Executor::new(Arc::clone(&catalog), Arc::clone(&store));
        info!("database opened");
        Ok(Self {
            store,
            catalog,
            executor,
        })
    }

    /// Parse and execute one SQL statement.
    pub fn execute(&self, sql: &str) -> Result<QueryResult> {
        let stmt = parse_sql(sql)?;
        self.executor.execute(&stmt)
    }

    pub fn begin_transaction(&self) -> Result<TxnId> {
        self.store.begin_transaction()
    }

    pub fn commit_transaction(&self, txn: TxnId) -> Result<()> {
        self.store.commit(txn)
    }

    pub fn abort_transaction(&self, txn: TxnId) -> Result<()> {
        self.store.abort(txn)
    }

    pub fn checkpoint(&self) -> Result<()> {
        self.store.checkpoint()
    }

    pub fn flush(&self) -> Result<()> {
        self.store.flush()
    }

    /// Flush and make the database unusable for further writes (the store
    /// itself is dropped along with this `Database`).
    pub fn close(&self) -> Result<()> {
        self.store.flush()
    }

    pub fn list_tables(&self) -> Result<Vec<String>> {
        self.catalog.get_tables()
    }

    pub fn describe_table(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        self.catalog.get_columns(table)
    }

    pub fn list_indexes(&self, table: Option<&str>) -> Result<Vec<IndexDef>> {
        self.catalog.get_indexes(table)
    }

    pub fn get_stats(&self) -> DatabaseStats {
        DatabaseStats {
            cache_hit_rate: self.store.buffer_pool_stats().hit_rate(),
            last_lsn: self.store.last_lsn(),
        }
    }
}

impl Drop for Database {
    /// Best-effort flush on drop (§5); callers should still call `close`
    /// explicitly to observe errors.
    fn drop(&mut self) {
        if let Err(e) = self.store.flush() {
            log::warn!("best-effort flush on drop failed: {e}");
        }
    }
}
