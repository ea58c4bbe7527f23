//! Bounded shuffle history
//!
//! Remembers recently picked tracks so shuffle can avoid repeating them.

use crate::types::TrackId;
use std::collections::VecDeque;

/// Recently picked tracks with bounded size
///
/// Ring buffer: when full, the oldest entry is discarded.
#[derive(Debug, Clone)]
pub struct History {
    /// History buffer (most recent = back)
    tracks: VecDeque<TrackId>,

    /// Maximum history size
    max_size: usize,
}

impl History {
    /// Create new history with specified maximum size
    pub fn new(max_size: usize) -> Self {
        Self {
            tracks: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    /// Add track to history
    ///
    /// If history is full, oldest track is discarded
    pub fn push(&mut self, track: TrackId) {
        self.tracks.push_back(track);
        self.trim();
    }

    pub fn contains(&self, track: &TrackId) -> bool {
        self.tracks.contains(track)
    }

    /// All history tracks (oldest first)
    pub fn iter(&self) -> impl Iterator<Item = &TrackId> {
        self.tracks.iter()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Set maximum history size
    ///
    /// If new size is smaller than current, oldest entries are discarded
    pub fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size;
        self.trim();
    }

    fn trim(&mut self) {
        while self.tracks.len() > self.max_size {
            self.tracks.pop_front();
        }
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(1)
    }
}
