//! anvildb - an embedded, single-process relational database engine.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            anvildb                               │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              SQL Pipeline (execution/)                   │   │
//! │  │   Tokenizer/Parser → Planner → Executor → Facade         │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                  Catalog (catalog/)                       │   │
//! │  │       tables / columns / indexes / stats, as rows         │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │         Transactional Store (concurrency/)                │   │
//! │  │   begin/commit/abort over the B-tree, undo on abort       │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │      B-Tree (index/)          Write-Ahead Log (recovery/) │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                  Buffer Pool (buffer/)                    │   │
//! │  │      BufferPoolManager + Frame + strict LRU + Stats       │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │           Storage Layer (storage/)                       │   │
//! │  │     DiskManager + Page + PageHeader                      │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, FrameId, Lsn, TxnId, Error, Config)
//! - [`storage`] - Disk I/O and page formats
//! - [`buffer`] - Buffer pool management and strict-LRU eviction
//! - [`index`] - The B-tree
//! - [`recovery`] - Write-ahead logging and crash recovery
//! - [`concurrency`] - The transactional store
//! - [`catalog`] - Table, column, index and statistics metadata
//! - [`execution`] - SQL tokenizer, parser, planner, executor and facade
//!
//! # Quick Start
//! ```no_run
//! use anvildb::{Config, Database};
//!
//! let db = Database::open("my_database.db", Config::default()).unwrap();
//! db.execute("CREATE TABLE users (id INT, name TEXT, age INT)").unwrap();
//! db.execute("INSERT INTO users VALUES (1, 'Alice', 30)").unwrap();
//! let rows = db.execute("SELECT name FROM users WHERE age > 25").unwrap();
//! ```

pub mod buffer;
pub mod catalog;
pub mod common;
pub mod concurrency;
pub mod execution;
pub mod index;
pub mod recovery;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::{Config, PAGE_SIZE};
pub use common::{Error, FrameId, Lsn, PageId, Result, TxnId};

pub use buffer::{BufferPoolManager, BufferPoolStats, Frame, StatsSnapshot};
pub use execution::Database;
pub use storage::page::{Page, PageHeader, PageType};
pub use storage::DiskManager;
