//! Transaction-aware key-value store: the B-tree and the write-ahead log
//! combined behind `begin`/`commit`/`abort` (§4.5).

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, trace};
use parking_lot::Mutex;

use crate::buffer::{BufferPoolManager, StatsSnapshot};
use crate::common::{Config, Error, Lsn, Result, TxnId};
use crate::index::{BTree, ScanEntry};
use crate::recovery::{self, Operation, Wal};
use crate::storage::DiskManager;

/// What an aborted mutation needs restored: the key's value immediately
/// before the mutation, or `None` if the key was absent.
struct UndoOp {
    key: Vec<u8>,
    pre_image: Option<Vec<u8>>,
}

struct ActiveTransaction {
    txn_id: TxnId,
    undo: Vec<UndoOp>,
}

/// Combines the B-tree (D) and the write-ahead log (E) into a durable,
/// transactional key-value store.
///
/// Only one transaction may be in flight at a time (§4.5): `begin_transaction`
/// fails while another is active.
pub struct TransactionalStore {
    bpm: Arc<BufferPoolManager>,
    btree: BTree,
    wal: Mutex<Wal>,
    next_txn_id: AtomicU64,
    active: Mutex<Option<ActiveTransaction>>,
    sync_on_commit: bool,
}

impl TransactionalStore {
    /// Open the store at `data_path` (and its colocated `.wal` file),
    /// creating both if they don't exist, running crash recovery first.
    pub fn open_or_create<P: AsRef<Path>>(data_path: P, pool_size: usize) -> Result<Self> {
        Self::open_with(data_path, pool_size, true)
    }

    /// Open the store honoring an embedder-supplied [`Config`] (buffer pool
    /// size, whether `commit` fsyncs the WAL).
    pub fn open_with_config<P: AsRef<Path>>(data_path: P, config: &Config) -> Result<Self> {
        Self::open_with(data_path, config.buffer_pool_size, config.sync_on_commit)
    }

    fn open_with<P: AsRef<Path>>(data_path: P, pool_size: usize, sync_on_commit: bool) -> Result<Self> {
        let data_path = data_path.as_ref();
        let wal_path = wal_path_for(data_path);

        let dm = DiskManager::open_or_create(data_path)?;
        let bpm = Arc::new(BufferPoolManager::new(pool_size, dm));
        let btree = BTree::open_or_create(Arc::clone(&bpm))?;

        let mut wal = Wal::open_or_create(&wal_path)?;
        recovery::recover(&mut wal, &btree)?;

        let max_txn_seen = wal.iterate()?.iter().map(|r| r.txn_id.0).max().unwrap_or(0);

        debug!("opened transactional store at {:?}", data_path);
        Ok(Self {
            bpm,
            btree,
            wal: Mutex::new(wal),
            next_txn_id: AtomicU64::new(max_txn_seen + 1),
            active: Mutex::new(None),
            sync_on_commit,
        })
    }

    /// Start a transaction. Fails if one is already in flight.
    pub fn begin_transaction(&self) -> Result<TxnId> {
        let mut active = self.active.lock();
        if active.is_some() {
            return Err(Error::TransactionFailure(
                "a transaction is already active".to_string(),
            ));
        }

        let txn_id = TxnId::new(self.next_txn_id.fetch_add(1, Ordering::Relaxed));
        self.wal.lock().append(txn_id, Operation::Begin, &[], &[])?;
        *active = Some(ActiveTransaction {
            txn_id,
            undo: Vec::new(),
        });

        trace!("began {}", txn_id);
        Ok(txn_id)
    }

    /// Insert `key`/`value` under an explicit transaction.
    pub fn insert_txn(&self, txn: TxnId, key: &[u8], value: &[u8]) -> Result<()> {
        self.mutate_txn(txn, Operation::Insert, key, value)
    }

    /// Tombstone `key` under an explicit transaction.
    pub fn delete_txn(&self, txn: TxnId, key: &[u8]) -> Result<()> {
        self.mutate_txn(txn, Operation::Delete, key, &[])
    }

    fn mutate_txn(&self, txn: TxnId, op: Operation, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_active(txn)?;

        let pre_image = self.btree.get(key)?;
        self.wal.lock().append(txn, op, key, value)?;

        match op {
            Operation::Insert => self.btree.insert(key, value)?,
            Operation::Delete => self.btree.delete(key)?,
            _ => unreachable!("mutate_txn only called with Insert/Delete"),
        }

        if let Some(active) = self.active.lock().as_mut() {
            active.undo.push(UndoOp {
                key: key.to_vec(),
                pre_image,
            });
        }

        Ok(())
    }

    /// Commit a transaction: append its commit record and fsync the WAL.
    /// The write only becomes durable once this returns.
    pub fn commit(&self, txn: TxnId) -> Result<()> {
        self.check_active(txn)?;

        {
            let mut wal = self.wal.lock();
            wal.append(txn, Operation::Commit, &[], &[])?;
            if self.sync_on_commit {
                wal.sync()?;
            }
        }

        *self.active.lock() = None;
        trace!("committed {}", txn);
        Ok(())
    }

    /// Abort a transaction: reverse its mutations by restoring each key's
    /// pre-image, in reverse order, then append its abort record.
    pub fn abort(&self, txn: TxnId) -> Result<()> {
        let undo = {
            let mut active = self.active.lock();
            match active.take() {
                Some(a) if a.txn_id == txn => a.undo,
                Some(other) => {
                    *active = Some(other);
                    return Err(Error::TransactionFailure(format!(
                        "{} is not the active transaction",
                        txn
                    )));
                }
                None => {
                    return Err(Error::TransactionFailure(format!("{} is not active", txn)));
                }
            }
        };

        for op in undo.into_iter().rev() {
            match op.pre_image {
                Some(value) => self.btree.insert(&op.key, &value)?,
                None => self.btree.delete(&op.key)?,
            }
        }

        self.wal.lock().append(txn, Operation::Abort, &[], &[])?;
        trace!("aborted {}", txn);
        Ok(())
    }

    fn check_active(&self, txn: TxnId) -> Result<()> {
        match &*self.active.lock() {
            Some(a) if a.txn_id == txn => Ok(()),
            Some(_) => Err(Error::TransactionFailure(format!(
                "{} is not the active transaction",
                txn
            ))),
            None => Err(Error::TransactionFailure(format!("{} is not active", txn))),
        }
    }

    /// Insert with an implicit begin/commit.
    pub fn insert(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let txn = self.begin_transaction()?;
        self.insert_txn(txn, key, value)?;
        self.commit(txn)
    }

    /// Delete with an implicit begin/commit.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        let txn = self.begin_transaction()?;
        self.delete_txn(txn, key)?;
        self.commit(txn)
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.btree.get(key)
    }

    pub fn range_scan(&self, lo: &[u8], hi: &[u8]) -> Result<Vec<ScanEntry>> {
        self.btree.range_scan(lo, hi)
    }

    pub fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<ScanEntry>> {
        self.btree.scan_prefix(prefix)
    }

    /// Buffer-pool hit/miss counters, for `Database::get_stats` (§4.10).
    pub fn buffer_pool_stats(&self) -> StatsSnapshot {
        self.bpm.stats().snapshot()
    }

    /// LSN of the last record appended to the write-ahead log.
    pub fn last_lsn(&self) -> Lsn {
        self.wal.lock().last_lsn()
    }

    /// Flush every dirty buffer-pool page to disk.
    pub fn flush(&self) -> Result<()> {
        self.bpm.flush_all_pages()
    }

    /// Flush the buffer pool, record a checkpoint, sync and truncate the WAL.
    ///
    /// After this returns, recovery on a future open has nothing to replay:
    /// every mutation up to this point is durable in the data file itself.
    pub fn checkpoint(&self) -> Result<()> {
        self.bpm.flush_all_pages()?;

        let mut wal = self.wal.lock();
        wal.append(TxnId::INVALID, Operation::Checkpoint, &[], &[])?;
        wal.sync()?;
        wal.truncate()?;

        debug!("checkpoint complete");
        Ok(())
    }
}

fn wal_path_for(data_path: &Path) -> PathBuf {
    let mut name = data_path.as_os_str().to_os_string();
    name.push(".wal");
    PathBuf::from(name)
}
