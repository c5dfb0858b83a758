//! Table, column, index and statistics metadata, stored as ordinary rows
//! under reserved key prefixes (§3, §4.6).
//!
//! # Components
//! - [`system_catalog::Catalog`] - the public surface
//! - [`value::Value`] - the typed row value shared with [`crate::execution`]
//! - [`types`] - column/index/stats descriptors

mod system_catalog;
mod types;
mod value;

pub use system_catalog::{row_key, row_prefix, Catalog};
pub use types::{ColumnDef, ColumnInfo, ColumnType, IndexDef, TableStats};
pub use value::{decode_row, encode_row, Value};
