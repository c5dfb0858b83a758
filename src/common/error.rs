//! Error types for anvildb.

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
/// This is a common Rust pattern (see `std::io::Result`).
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in anvildb, spanning both the storage engine and the
/// SQL pipeline built on top of it.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error from disk operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested page does not exist on disk.
    #[error("page {0} not found")]
    PageNotFound(u32),

    /// Buffer pool has no free frames and cannot evict any pages.
    ///
    /// This happens when all frames are pinned.
    #[error("no free frames available in buffer pool")]
    NoFreeFrames,

    /// The provided page ID is invalid (e.g., exceeds max pages).
    #[error("invalid page id: {0}")]
    InvalidPageId(u32),

    /// Buffer pool is at maximum capacity.
    #[error("buffer pool is full")]
    BufferPoolFull,

    /// Attempted to unpin a page that wasn't pinned.
    ///
    /// This indicates a bug - unpinning should match pinning.
    #[error("page {0} is not pinned")]
    PageNotPinned(u32),

    /// A page's checksum did not match its contents: a torn write, disk
    /// corruption, or a bug upstream wrote the wrong bytes.
    #[error("checksum mismatch on page {0}")]
    ChecksumMismatch(u32),

    /// `get` on a key that is absent or has been tombstoned.
    #[error("key not found")]
    KeyNotFound,

    /// Malformed SQL. Carries the offending token text and its position
    /// (character offset into the input) for diagnostics.
    #[error("parse error at position {position}: {message}")]
    ParseFailure { message: String, position: usize },

    /// Table/column/index not found or already exists; INSERT column count
    /// mismatch; any other catalog-level inconsistency.
    #[error("schema error: {0}")]
    SchemaFailure(String),

    /// An unqualified column reference resolved to more than one source in
    /// a join.
    #[error("ambiguous column reference: {0}")]
    AmbiguousColumn(String),

    /// Opaque failure from the storage stack (I/O, page corruption) as seen
    /// above the transactional store's boundary.
    #[error("storage failure: {0}")]
    StorageFailure(String),

    /// Operation against an unknown, already-finished, or (for `begin`)
    /// already-active transaction.
    #[error("transaction error: {0}")]
    TransactionFailure(String),

    /// Unsupported operator, or a cast the planner/executor can't perform.
    #[error("logic error: {0}")]
    LogicFailure(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::PageNotFound(42);
        assert_eq!(format!("{}", err), "page 42 not found");

        let err = Error::NoFreeFrames;
        assert_eq!(format!("{}", err), "no free frames available in buffer pool");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();

        match err {
            Error::Io(_) => {}
            _ => panic!("expected Io error"),
        }
    }

    #[test]
    fn test_result_type_alias() {
        fn might_fail() -> Result<u32> {
            Ok(42)
        }

        assert_eq!(might_fail().unwrap(), 42);
    }

    #[test]
    fn test_parse_failure_carries_position() {
        let err = Error::ParseFailure {
            message: "unexpected token".to_string(),
            position: 12,
        };
        assert_eq!(format!("{}", err), "parse error at position 12: unexpected token");
    }
}
