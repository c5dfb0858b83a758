//! Write-ahead log: an append-only record stream colocated with the data
//! file (same path, `.wal` suffix).
//!
//! # Record framing
//! ```text
//! lsn (u64) | txn_id (u64) | op (u8) | key_len (u32) | key | value_len (u32) | value
//! ```
//! `key`/`value` are empty for `Begin`/`Commit`/`Abort`/`Checkpoint` records.
//! Framing carries explicit lengths so a torn tail record (a crash mid-append)
//! can be detected and discarded on recovery rather than misread.

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::{debug, trace, warn};

use crate::common::{Lsn, Result, TxnId};

/// The operation a WAL record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Operation {
    Begin = 1,
    Insert = 2,
    Delete = 3,
    Commit = 4,
    Abort = 5,
    Checkpoint = 6,
}

impl Operation {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Operation::Begin),
            2 => Some(Operation::Insert),
            3 => Some(Operation::Delete),
            4 => Some(Operation::Commit),
            5 => Some(Operation::Abort),
            6 => Some(Operation::Checkpoint),
            _ => None,
        }
    }
}

/// A single decoded WAL record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalRecord {
    pub lsn: Lsn,
    pub txn_id: TxnId,
    pub op: Operation,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl WalRecord {
    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8 + 8 + 1 + 4 + self.key.len() + 4 + self.value.len());
        buf.extend_from_slice(&self.lsn.0.to_le_bytes());
        buf.extend_from_slice(&self.txn_id.0.to_le_bytes());
        buf.push(self.op as u8);
        buf.extend_from_slice(&(self.key.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.key);
        buf.extend_from_slice(&(self.value.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.value);
        buf
    }
}

/// The write-ahead log.
///
/// `append` is buffered in the OS page cache until `sync`; a reader never
/// sees a committed transaction's mutations without first observing its
/// `Commit` record (recovery replays in LSN order and only after the scan
/// completes).
pub struct Wal {
    file: File,
    last_lsn: Lsn,
}

impl Wal {
    /// Create a fresh, empty WAL file.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        debug!("created empty WAL");
        Ok(Self {
            file,
            last_lsn: Lsn::ZERO,
        })
    }

    /// Open an existing WAL, restoring `last_lsn` from its last well-formed
    /// record.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        let mut wal = Self {
            file,
            last_lsn: Lsn::ZERO,
        };
        let (records, _) = wal.scan()?;
        wal.last_lsn = records.last().map(|r| r.lsn).unwrap_or(Lsn::ZERO);

        debug!("opened WAL, last_lsn={}", wal.last_lsn);
        Ok(wal)
    }

    /// Open the WAL if it exists, otherwise create a fresh one.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    /// Append a record, returning its assigned LSN. Not synced.
    pub fn append(&mut self, txn_id: TxnId, op: Operation, key: &[u8], value: &[u8]) -> Result<Lsn> {
        let lsn = self.last_lsn.next();

        let record = WalRecord {
            lsn,
            txn_id,
            op,
            key: key.to_vec(),
            value: value.to_vec(),
        };

        self.file.seek(SeekFrom::End(0))?;
        self.file.write_all(&record.encode())?;
        self.last_lsn = lsn;

        trace!("appended WAL record lsn={} op={:?}", lsn, op);
        Ok(lsn)
    }

    /// Fsync the log file. Must be called before a transaction's commit is
    /// considered durable, and before truncating at checkpoint.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Read every well-formed record from the start of the log, in append
    /// order. A torn trailing record (partial write from a crash mid-append)
    /// is silently discarded.
    pub fn iterate(&mut self) -> Result<Vec<WalRecord>> {
        let (records, _) = self.scan()?;
        Ok(records)
    }

    /// Reset the log to empty. Callers must have already flushed and synced
    /// the data file the log protects.
    pub fn truncate(&mut self) -> Result<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.last_lsn = Lsn::ZERO;
        debug!("truncated WAL");
        Ok(())
    }

    /// The most recently assigned LSN, or `Lsn::ZERO` if the log is empty.
    pub fn last_lsn(&self) -> Lsn {
        self.last_lsn
    }

    /// Scan the file from the start, returning well-formed records and the
    /// byte offset at which a torn tail record (if any) was discarded.
    fn scan(&mut self) -> Result<(Vec<WalRecord>, u64)> {
        self.file.seek(SeekFrom::Start(0))?;
        let mut reader = BufReader::new(&mut self.file);

        let mut records = Vec::new();
        let mut offset = 0u64;

        loop {
            match read_record(&mut reader) {
                Ok(Some(record)) => {
                    offset += record_len(&record) as u64;
                    records.push(record);
                }
                Ok(None) => break,
                Err(_) => {
                    warn!("discarding torn WAL record at offset {}", offset);
                    break;
                }
            }
        }

        Ok((records, offset))
    }
}

fn record_len(record: &WalRecord) -> usize {
    8 + 8 + 1 + 4 + record.key.len() + 4 + record.value.len()
}

/// Read one record, returning `Ok(None)` at a clean EOF (no bytes read) and
/// `Err` for a torn/truncated record (some bytes read, not enough for a full
/// frame).
fn read_record<R: Read>(reader: &mut R) -> io::Result<Option<WalRecord>> {
    let mut lsn_buf = [0u8; 8];
    match read_exact_or_eof(reader, &mut lsn_buf)? {
        0 => return Ok(None),
        n if n < 8 => return Err(io::Error::from(io::ErrorKind::UnexpectedEof)),
        _ => {}
    }
    let lsn = Lsn::new(u64::from_le_bytes(lsn_buf));

    let mut txn_buf = [0u8; 8];
    reader.read_exact(&mut txn_buf)?;
    let txn_id = TxnId::new(u64::from_le_bytes(txn_buf));

    let mut op_buf = [0u8; 1];
    reader.read_exact(&mut op_buf)?;
    let op = Operation::from_u8(op_buf[0]).ok_or_else(|| io::Error::from(io::ErrorKind::InvalidData))?;

    let mut key_len_buf = [0u8; 4];
    reader.read_exact(&mut key_len_buf)?;
    let key_len = u32::from_le_bytes(key_len_buf) as usize;

    let mut key = vec![0u8; key_len];
    reader.read_exact(&mut key)?;

    let mut value_len_buf = [0u8; 4];
    reader.read_exact(&mut value_len_buf)?;
    let value_len = u32::from_le_bytes(value_len_buf) as usize;

    let mut value = vec![0u8; value_len];
    reader.read_exact(&mut value)?;

    Ok(Some(WalRecord {
        lsn,
        txn_id,
        op,
        key,
        value,
    }))
}

/// Like `read_exact`, but returns the number of bytes actually read instead
/// of erroring on a clean EOF with zero bytes read.
fn read_exact_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}
