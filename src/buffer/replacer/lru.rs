//! Strict LRU (Least Recently Used) page replacement policy.
//!
//! Unlike a FIFO queue, a frame moves to the most-recently-used end of the
//! recency ordering on *every* access, not just the first one.

use std::collections::{HashSet, VecDeque};

use crate::common::FrameId;

/// LRU replacement policy.
///
/// Evicts the least-recently-accessed evictable frame.
pub struct LruReplacer {
    /// Frame IDs ordered by recency: front = least recently used, back = most
    /// recently used.
    recency: VecDeque<FrameId>,

    /// Set of frame IDs that are evictable (pin_count == 0).
    evictable: HashSet<FrameId>,
}

impl LruReplacer {
    /// Create a new LRU replacer.
    pub fn new() -> Self {
        Self {
            recency: VecDeque::new(),
            evictable: HashSet::new(),
        }
    }

    /// Record that a frame was accessed, moving it to the most-recently-used
    /// end of the recency ordering.
    pub fn record_access(&mut self, frame_id: FrameId) {
        if let Some(pos) = self.recency.iter().position(|&fid| fid == frame_id) {
            self.recency.remove(pos);
        }
        self.recency.push_back(frame_id);
    }

    /// Set whether a frame is evictable.
    ///
    /// A frame is evictable when its pin_count reaches 0.
    pub fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        if evictable {
            self.evictable.insert(frame_id);
        } else {
            self.evictable.remove(&frame_id);
        }
    }

    /// Evict the least-recently-used evictable frame.
    ///
    /// Returns the frame ID of the evicted frame, or `None` if no frames are
    /// evictable. Frames that are not currently evictable stay in the
    /// recency ordering untouched so a later `evict()` can still find them.
    pub fn evict(&mut self) -> Option<FrameId> {
        let position = self
            .recency
            .iter()
            .position(|&fid| self.evictable.contains(&fid))?;

        let frame_id = self.recency.remove(position)?;
        self.evictable.remove(&frame_id);

        Some(frame_id)
    }

    /// Remove a frame from the replacer entirely.
    ///
    /// Called when a page is deleted from the buffer pool.
    pub fn remove(&mut self, frame_id: FrameId) {
        self.evictable.remove(&frame_id);
        self.recency.retain(|&fid| fid != frame_id);
    }

    /// Number of evictable frames.
    pub fn size(&self) -> usize {
        self.evictable.len()
    }
}

impl Default for LruReplacer {
    fn default() -> Self {
        Self::new()
    }
}
