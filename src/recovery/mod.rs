//! Write-ahead logging and crash recovery.
//!
//! # Components
//! - [`wal::Wal`] - the append-only log
//! - [`recover`] - the recovery protocol run when a transactional store opens

mod wal;

use std::collections::{HashMap, HashSet};

use log::{debug, info};

use crate::common::{Lsn, Result, TxnId};
use crate::index::BTree;

pub use wal::{Operation, Wal, WalRecord};

/// Replay every mutation of a committed transaction against `btree`, in LSN
/// order (§4.4).
///
/// Scans the whole log first to find which `txn_id`s committed, then
/// re-applies only their `Insert`/`Delete` records. `insert`/`delete` are
/// idempotent at the B-tree level (insert overwrites, delete tombstones
/// unconditionally), so replaying an already-applied mutation is harmless.
pub fn recover(wal: &mut Wal, btree: &BTree) -> Result<()> {
    let records = wal.iterate()?;

    let mut committed = HashSet::new();
    let mut mutations: HashMap<TxnId, Vec<&WalRecord>> = HashMap::new();

    for record in &records {
        match record.op {
            Operation::Commit => {
                committed.insert(record.txn_id);
            }
            Operation::Insert | Operation::Delete => {
                mutations.entry(record.txn_id).or_default().push(record);
            }
            Operation::Begin | Operation::Abort | Operation::Checkpoint => {}
        }
    }

    let mut replayed: Vec<&WalRecord> = mutations
        .into_iter()
        .filter(|(txn_id, _)| committed.contains(txn_id))
        .flat_map(|(_, records)| records)
        .collect();
    replayed.sort_by_key(|r| r.lsn);

    let count = replayed.len();
    for record in replayed {
        match record.op {
            Operation::Insert => btree.insert(&record.key, &record.value)?,
            Operation::Delete => btree.delete(&record.key)?,
            _ => unreachable!("mutations map only holds Insert/Delete records"),
        }
    }

    if count > 0 {
        info!("recovery replayed {} committed mutation(s)", count);
    } else {
        debug!("recovery found nothing to replay");
    }

    Ok(())
}

/// Highest LSN observed across a batch of records, or `Lsn::ZERO` if empty.
pub fn max_lsn(records: &[WalRecord]) -> Lsn {
    records.iter().map(|r| r.lsn).max().unwrap_or(Lsn::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferPoolManager;
    use crate::storage::DiskManager;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn fresh_btree(dir: &tempfile::TempDir) -> BTree {
        let path = dir.path().join("test.db");
        let dm = DiskManager::create(&path).unwrap();
        let bpm = Arc::new(BufferPoolManager::new(16, dm));
        BTree::create(bpm).unwrap()
    }

    #[test]
    fn test_recover_replays_only_committed() {
        let dir = tempdir().unwrap();
        let btree = fresh_btree(&dir);

        let wal_path = dir.path().join("test.wal");
        let mut wal = Wal::create(&wal_path).unwrap();

        let committed_txn = TxnId::new(1);
        wal.append(committed_txn, Operation::Begin, &[], &[]).unwrap();
        wal.append(committed_txn, Operation::Insert, b"a", b"1").unwrap();
        wal.append(committed_txn, Operation::Commit, &[], &[]).unwrap();

        let aborted_txn = TxnId::new(2);
        wal.append(aborted_txn, Operation::Begin, &[], &[]).unwrap();
        wal.append(aborted_txn, Operation::Insert, b"b", b"2").unwrap();
        wal.append(aborted_txn, Operation::Abort, &[], &[]).unwrap();

        recover(&mut wal, &btree).unwrap();

        assert_eq!(btree.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(btree.get(b"b").unwrap(), None);
    }

    #[test]
    fn test_recover_ignores_uncommitted_trailing_txn() {
        let dir = tempdir().unwrap();
        let btree = fresh_btree(&dir);

        let wal_path = dir.path().join("test.wal");
        let mut wal = Wal::create(&wal_path).unwrap();

        let txn = TxnId::new(1);
        wal.append(txn, Operation::Begin, &[], &[]).unwrap();
        wal.append(txn, Operation::Insert, b"a", b"1").unwrap();
        // No commit record: the transaction never finished.

        recover(&mut wal, &btree).unwrap();

        assert_eq!(btree.get(b"a").unwrap(), None);
    }

    #[test]
    fn test_recover_applies_delete() {
        let dir = tempdir().unwrap();
        let btree = fresh_btree(&dir);
        btree.insert(b"a", b"1").unwrap();

        let wal_path = dir.path().join("test.wal");
        let mut wal = Wal::create(&wal_path).unwrap();

        let txn = TxnId::new(1);
        wal.append(txn, Operation::Begin, &[], &[]).unwrap();
        wal.append(txn, Operation::Delete, b"a", &[]).unwrap();
        wal.append(txn, Operation::Commit, &[], &[]).unwrap();

        recover(&mut wal, &btree).unwrap();

        assert_eq!(btree.get(b"a").unwrap(), None);
    }
}
