//! The B-tree index.
//!
//! # Components
//! - [`btree::BTree`] - the B+-tree over pages

pub mod btree;

pub use btree::{prefix_upper_bound, BTree, ScanEntry};
