//! The transactional store: the B-tree and write-ahead log combined behind
//! `begin`/`commit`/`abort`.
//!
//! # Components
//! - [`transactional_store::TransactionalStore`] - the public surface

mod transactional_store;

pub use transactional_store::TransactionalStore;
