use std::collections::VecDeque;

use rustc_hash::FxHashMap;

/// An insertion-ordered set of nodes.
///
/// Removal marks the node's sequence number stale instead of shifting the deque;
/// stale slots are skipped when popping and compacted once they dominate.
#[derive(Debug, Default)]
struct LinkedNodeSet {
    order: VecDeque<(i64, u64)>,
    members: FxHashMap<i64, u64>,
    next_seq: u64,
}

impl LinkedNodeSet {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            members: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            next_seq: 0,
        }
    }

    fn add(&mut self, node: i64) -> bool {
        if self.members.contains_key(&node) {
            return false;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.members.insert(node, seq);
        self.order.push_back((node, seq));
        true
    }

    fn remove(&mut self, node: i64) -> bool {
        if self.members.remove(&node).is_none() {
            return false;
        }
        if self.members.is_empty() {
            self.order.clear();
        } else if self.order.len() > 64 && self.order.len() > self.members.len() * 4 {
            let members = &self.members;
            self.order
                .retain(|(node, seq)| members.get(node) == Some(seq));
        }
        true
    }

    fn remove_first(&mut self) -> Option<i64> {
        while let Some((node, seq)) = self.order.pop_front() {
            if self.members.get(&node) == Some(&seq) {
                self.members.remove(&node);
                return Some(node);
            }
        }
        None
    }

    fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Buckets of nodes keyed by level, drained lowest level first and FIFO within a level.
#[derive(Debug)]
pub struct LeveledPriorityQueue {
    level_count: usize,
    queues: Box<[LinkedNodeSet]>,
    /// Lowest bucket that may be non-empty, `level_count` when the queue is empty.
    first_queued_level: usize,
}

impl LeveledPriorityQueue {
    #[must_use]
    pub fn new(level_count: usize, expected_size: usize) -> Self {
        Self {
            level_count,
            queues: (0..level_count)
                .map(|_| LinkedNodeSet::with_capacity(expected_size))
                .collect(),
            first_queued_level: level_count,
        }
    }

    /// Scans forward from the current first level, stopping at `max_level`.
    fn check_first_queued_level(&mut self, max_level: usize) {
        let start = self.first_queued_level;
        self.first_queued_level = max_level;
        for level in start + 1..max_level {
            if !self.queues[level].is_empty() {
                self.first_queued_level = level;
                break;
            }
        }
    }

    /// Removes `node` from bucket `level`. If that empties the first bucket the next
    /// one is searched for, but no further than `max_level`.
    pub fn dequeue(&mut self, node: i64, level: usize, max_level: usize) {
        let queue = &mut self.queues[level];
        queue.remove(node);
        if queue.is_empty() && self.first_queued_level == level {
            self.check_first_queued_level(max_level);
        }
    }

    /// Adds `node` to bucket `level`. Adding a node twice to the same bucket is a no-op.
    pub fn enqueue(&mut self, node: i64, level: usize) {
        self.queues[level].add(node);
        if self.first_queued_level > level {
            self.first_queued_level = level;
        }
    }

    /// Pops the oldest node of the lowest non-empty bucket.
    pub fn remove_first(&mut self) -> Option<i64> {
        while self.first_queued_level < self.level_count {
            let level = self.first_queued_level;
            let node = self.queues[level].remove_first();
            if self.queues[level].is_empty() {
                self.check_first_queued_level(self.level_count);
            }
            if node.is_some() {
                return node;
            }
        }
        None
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.first_queued_level >= self.level_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowest_level_first() {
        let mut queue = LeveledPriorityQueue::new(16, 4);
        queue.enqueue(10, 5);
        queue.enqueue(20, 2);
        queue.enqueue(30, 9);
        assert_eq!(queue.remove_first(), Some(20));
        assert_eq!(queue.remove_first(), Some(10));
        assert_eq!(queue.remove_first(), Some(30));
        assert!(queue.is_empty());
        assert_eq!(queue.remove_first(), None);
    }

    #[test]
    fn test_fifo_within_level() {
        let mut queue = LeveledPriorityQueue::new(4, 4);
        for node in [3, 1, 2] {
            queue.enqueue(node, 1);
        }
        queue.enqueue(3, 1);
        assert_eq!(queue.remove_first(), Some(3));
        assert_eq!(queue.remove_first(), Some(1));
        assert_eq!(queue.remove_first(), Some(2));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_dequeue_rescans() {
        let mut queue = LeveledPriorityQueue::new(16, 4);
        queue.enqueue(1, 3);
        queue.enqueue(2, 7);
        queue.dequeue(1, 3, 16);
        assert!(!queue.is_empty());
        assert_eq!(queue.remove_first(), Some(2));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_dequeue_respects_max_level() {
        let mut queue = LeveledPriorityQueue::new(16, 4);
        queue.enqueue(1, 3);
        queue.enqueue(2, 12);
        // Moving node 1 from bucket 3 to 6: the scan stops at 6.
        queue.dequeue(1, 3, 6);
        queue.enqueue(1, 6);
        assert_eq!(queue.remove_first(), Some(1));
        assert_eq!(queue.remove_first(), Some(2));
    }

    #[test]
    fn test_many_removals_compact() {
        let mut queue = LeveledPriorityQueue::new(2, 4);
        for node in 0..1000 {
            queue.enqueue(node, 0);
        }
        for node in 0..999 {
            queue.dequeue(node, 0, 2);
        }
        assert_eq!(queue.remove_first(), Some(999));
        assert!(queue.is_empty());
    }
}
