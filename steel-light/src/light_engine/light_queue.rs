//! FIFO queue for light propagation entries.

use std::collections::VecDeque;

use super::queue_entry::QueueEntry;

/// Initial capacity, enough for a typical single-block flood fill.
const DEFAULT_CAPACITY: usize = 4096;

/// Capacity kept after a batch drains; anything larger is released.
const TRIM_CAPACITY: usize = 16_384;

/// A FIFO of packed block positions and their propagation entries.
///
/// Entries are handled strictly in insertion order so that a level spreads one
/// block per step, the way a breadth-first flood fill does.
#[derive(Debug)]
pub struct LightQueue {
    buffer: VecDeque<(i64, QueueEntry)>,
}

impl LightQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn enqueue(&mut self, pos: i64, entry: QueueEntry) {
        self.buffer.push_back((pos, entry));
    }

    #[inline]
    pub fn dequeue(&mut self) -> Option<(i64, QueueEntry)> {
        self.buffer.pop_front()
    }

    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Releases memory after an unusually large batch.
    pub fn trim(&mut self) {
        if self.buffer.is_empty() && self.buffer.capacity() > TRIM_CAPACITY {
            self.buffer.shrink_to(DEFAULT_CAPACITY);
        }
    }
}

impl Default for LightQueue {
    fn default() -> Self {
        Self::new()
    }
}
