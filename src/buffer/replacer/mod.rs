//! Eviction policy for the buffer pool.
//!
//! Implements strict LRU (Least Recently Used): a frame moves to the
//! most-recently-used end of the recency ordering on every access, and
//! eviction always takes the least-recently-used evictable frame.

mod lru;

pub use lru::LruReplacer;
