//! Bucketed relaxation driven by a [`GraphStrategy`], independent of the light engines.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::leveled_priority_queue::LeveledPriorityQueue;

/// The graph-specific half of a [`DynamicGraphMinFixedPoint`].
///
/// Levels are "distances": 0 is the strongest value and `level_count - 1` means
/// nothing reaches the node. The engine clamps every level it receives, so
/// implementations may return out-of-range values.
pub trait GraphStrategy {
    /// Sources are never re-evaluated; edges into them are ignored.
    fn is_source(&self, node: i64) -> bool;

    /// The best level `node` could have from all its inputs except `excluded`,
    /// starting from `level`.
    fn get_computed_level(&self, node: i64, excluded: i64, level: i32) -> i32;

    /// Called after `node` settled. Implementations call
    /// [`DynamicGraphMinFixedPoint::check_neighbor`] for each node `node` feeds.
    fn check_neighbors_after_update(
        &self,
        graph: &mut DynamicGraphMinFixedPoint,
        node: i64,
        level: i32,
        decreasing: bool,
    );

    /// The committed level of `node`.
    fn get_level(&self, node: i64) -> i32;

    fn set_level(&mut self, node: i64, level: i32);

    /// Level `to` gets through the edge from `from` when `from` is at `level`.
    fn compute_level_from_neighbor(&self, from: i64, to: i64, level: i32) -> i32;
}

/// Keeps the minimal level assignment consistent with sources and edges, touching
/// only nodes whose level can actually change.
///
/// Pending nodes wait in level buckets keyed by the lower of their committed and
/// computed levels. The lowest bucket is always drained first, which makes every
/// node settle at most once per direction of change.
#[derive(Debug)]
pub struct DynamicGraphMinFixedPoint {
    level_count: u8,
    queue: LeveledPriorityQueue,
    computed_levels: FxHashMap<i64, u8>,
    has_work: bool,
}

impl DynamicGraphMinFixedPoint {
    /// # Panics
    /// If `level_count` is 254 or more; level values must fit a byte next to the unset marker.
    #[must_use]
    pub fn new(level_count: u8, expected_level_size: usize, expected_total_size: usize) -> Self {
        assert!(level_count < 254, "Level count must be < 254.");
        assert!(level_count > 0, "Level count must be > 0.");
        Self {
            level_count,
            queue: LeveledPriorityQueue::new(usize::from(level_count), expected_level_size),
            computed_levels: FxHashMap::with_capacity_and_hasher(
                expected_total_size,
                Default::default(),
            ),
            has_work: false,
        }
    }

    #[inline]
    fn max_level(&self) -> i32 {
        i32::from(self.level_count) - 1
    }

    #[inline]
    fn clamp_level(&self, level: i32) -> i32 {
        level.clamp(0, self.max_level())
    }

    #[inline]
    fn calculate_priority(&self, a: i32, b: i32) -> usize {
        a.min(b).clamp(0, self.max_level()) as usize
    }

    /// Drops a pending update for `node`.
    pub fn remove_from_queue<S: GraphStrategy + ?Sized>(&mut self, strategy: &S, node: i64) {
        if let Some(computed) = self.computed_levels.remove(&node) {
            let level = self.clamp_level(strategy.get_level(node));
            let priority = self.calculate_priority(level, i32::from(computed));
            let level_count = usize::from(self.level_count);
            self.queue.dequeue(node, priority, level_count);
            self.has_work = !self.queue.is_empty();
        }
    }

    /// Drops every pending update whose node matches `predicate`.
    pub fn remove_if<S: GraphStrategy + ?Sized>(
        &mut self,
        strategy: &S,
        mut predicate: impl FnMut(i64) -> bool,
    ) {
        let nodes: SmallVec<[i64; 16]> = self
            .computed_levels
            .keys()
            .copied()
            .filter(|node| predicate(*node))
            .collect();
        for node in nodes {
            self.remove_from_queue(strategy, node);
        }
    }

    /// Re-evaluates `node` from all of its inputs.
    pub fn check_node<S: GraphStrategy + ?Sized>(&mut self, strategy: &S, node: i64) {
        self.check_edge(strategy, node, node, self.max_level(), false);
    }

    /// Tells the graph that the edge `from -> to` now proposes `level`.
    ///
    /// A decreasing edge can only lower `to`; otherwise `to` is recomputed from all
    /// its other inputs since `from` may no longer be the one that mattered.
    pub fn check_edge<S: GraphStrategy + ?Sized>(
        &mut self,
        strategy: &S,
        from: i64,
        to: i64,
        level: i32,
        decreasing: bool,
    ) {
        let current = strategy.get_level(to);
        let previous = self.computed_levels.get(&to).copied();
        self.check_edge_with(strategy, from, to, level, current, previous, decreasing);
        self.has_work = !self.queue.is_empty();
    }

    #[allow(clippy::too_many_arguments)]
    fn check_edge_with<S: GraphStrategy + ?Sized>(
        &mut self,
        strategy: &S,
        from: i64,
        to: i64,
        new_level: i32,
        current_level: i32,
        previous_computed: Option<u8>,
        decreasing: bool,
    ) {
        if strategy.is_source(to) {
            return;
        }

        let new_level = self.clamp_level(new_level);
        let current_level = self.clamp_level(current_level);
        let was_unset = previous_computed.is_none();
        let previous_computed = previous_computed.map_or(current_level, i32::from);

        let computed = if decreasing {
            previous_computed.min(new_level)
        } else {
            self.clamp_level(strategy.get_computed_level(to, from, new_level))
        };

        let old_priority = self.calculate_priority(current_level, previous_computed);
        if current_level != computed {
            let new_priority = self.calculate_priority(current_level, computed);
            if old_priority != new_priority && !was_unset {
                self.queue.dequeue(to, old_priority, new_priority);
            }
            self.queue.enqueue(to, new_priority);
            self.computed_levels.insert(to, computed as u8);
        } else if !was_unset {
            let level_count = usize::from(self.level_count);
            self.queue.dequeue(to, old_priority, level_count);
            self.computed_levels.remove(&to);
        }
    }

    /// Propagates `from`'s new `level` across the edge to `to`.
    ///
    /// When increasing, `to` is only revisited if its level was derived from `from`.
    pub fn check_neighbor<S: GraphStrategy + ?Sized>(
        &mut self,
        strategy: &S,
        from: i64,
        to: i64,
        level: i32,
        decreasing: bool,
    ) {
        let previous = self.computed_levels.get(&to).copied();
        let proposed = self.clamp_level(strategy.compute_level_from_neighbor(from, to, level));

        if decreasing {
            let current = strategy.get_level(to);
            self.check_edge_with(strategy, from, to, proposed, current, previous, true);
        } else {
            let known = previous.map_or_else(
                || self.clamp_level(strategy.get_level(to)),
                i32::from,
            );
            if proposed == known {
                let current = if previous.is_none() {
                    known
                } else {
                    strategy.get_level(to)
                };
                let max = self.max_level();
                self.check_edge_with(strategy, from, to, max, current, previous, false);
            }
        }
    }

    #[must_use]
    pub fn has_work(&self) -> bool {
        self.has_work
    }

    /// Settles up to `budget` pending nodes and returns what is left of the budget.
    pub fn run_updates<S: GraphStrategy + ?Sized>(&mut self, strategy: &mut S, mut budget: usize) -> usize {
        if self.queue.is_empty() {
            return budget;
        }

        while budget > 0 {
            let Some(node) = self.queue.remove_first() else {
                break;
            };
            budget -= 1;

            let level = self.clamp_level(strategy.get_level(node));
            let Some(computed) = self.computed_levels.remove(&node) else {
                continue;
            };
            let computed = i32::from(computed);

            if computed < level {
                strategy.set_level(node, computed);
                strategy.check_neighbors_after_update(self, node, computed, true);
            } else if computed > level {
                let max = self.max_level();
                strategy.set_level(node, max);
                if computed != max {
                    let priority = self.calculate_priority(max, computed);
                    self.queue.enqueue(node, priority);
                    self.computed_levels.insert(node, computed as u8);
                }
                strategy.check_neighbors_after_update(self, node, level, false);
            }
        }

        self.has_work = !self.queue.is_empty();
        budget
    }

    /// Number of nodes with a pending level.
    #[must_use]
    pub fn queue_size(&self) -> usize {
        self.computed_levels.len()
    }

    /// The pending level of `node`, if it has one.
    #[must_use]
    pub fn pending_level(&self, node: i64) -> Option<u8> {
        self.computed_levels.get(&node).copied()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use rustc_hash::{FxHashMap, FxHashSet};

    use super::*;

    const LEVELS: u8 = 16;
    const MAX: i32 = 15;
    const SOURCE: i64 = i64::MAX;
    const SIZE: i32 = 24;

    fn node(x: i32, y: i32) -> i64 {
        i64::from(x) * 1000 + i64::from(y)
    }

    fn neighbors(of: i64) -> impl Iterator<Item = i64> {
        let (x, y) = ((of / 1000) as i32, (of % 1000) as i32);
        [(x - 1, y), (x + 1, y), (x, y - 1), (x, y + 1)]
            .into_iter()
            .filter(|(x, y)| (0..SIZE).contains(x) && (0..SIZE).contains(y))
            .map(|(x, y)| node(x, y))
    }

    /// Grid distance to the nearest source, walls block.
    #[derive(Default)]
    struct GridDistance {
        levels: FxHashMap<i64, i32>,
        sources: FxHashSet<i64>,
        walls: FxHashSet<i64>,
    }

    impl GraphStrategy for GridDistance {
        fn is_source(&self, node: i64) -> bool {
            node == SOURCE
        }

        fn get_computed_level(&self, node: i64, excluded: i64, level: i32) -> i32 {
            let mut best = level;
            if excluded != SOURCE {
                best = best.min(self.compute_level_from_neighbor(SOURCE, node, 0));
            }
            for neighbor in neighbors(node) {
                if neighbor != excluded {
                    let through = self.compute_level_from_neighbor(
                        neighbor,
                        node,
                        self.get_level(neighbor),
                    );
                    best = best.min(through);
                }
            }
            best
        }

        fn check_neighbors_after_update(
            &self,
            graph: &mut DynamicGraphMinFixedPoint,
            node: i64,
            level: i32,
            decreasing: bool,
        ) {
            for neighbor in neighbors(node) {
                graph.check_neighbor(self, node, neighbor, level, decreasing);
            }
        }

        fn get_level(&self, node: i64) -> i32 {
            if node == SOURCE {
                return 0;
            }
            self.levels.get(&node).copied().unwrap_or(MAX)
        }

        fn set_level(&mut self, node: i64, level: i32) {
            if level >= MAX {
                self.levels.remove(&node);
            } else {
                self.levels.insert(node, level);
            }
        }

        fn compute_level_from_neighbor(&self, from: i64, to: i64, level: i32) -> i32 {
            if self.walls.contains(&to) {
                MAX
            } else if from == SOURCE {
                if self.sources.contains(&to) { 0 } else { MAX }
            } else {
                level + 1
            }
        }
    }

    impl GridDistance {
        fn add_source(&mut self, graph: &mut DynamicGraphMinFixedPoint, node: i64) {
            self.sources.insert(node);
            graph.check_edge(&*self, SOURCE, node, 0, true);
        }

        fn remove_source(&mut self, graph: &mut DynamicGraphMinFixedPoint, node: i64) {
            self.sources.remove(&node);
            graph.check_node(&*self, node);
        }

        fn set_wall(&mut self, graph: &mut DynamicGraphMinFixedPoint, node: i64, wall: bool) {
            if wall {
                self.walls.insert(node);
            } else {
                self.walls.remove(&node);
            }
            graph.check_node(&*self, node);
        }

        /// Plain breadth-first search over the same grid.
        fn expected(&self) -> FxHashMap<i64, i32> {
            let mut distances = FxHashMap::default();
            let mut queue = VecDeque::new();
            for source in &self.sources {
                distances.insert(*source, 0);
                queue.push_back(*source);
            }
            while let Some(current) = queue.pop_front() {
                let distance = distances[&current];
                for neighbor in neighbors(current) {
                    if self.walls.contains(&neighbor) || distances.contains_key(&neighbor) {
                        continue;
                    }
                    distances.insert(neighbor, distance + 1);
                    queue.push_back(neighbor);
                }
            }
            distances.retain(|_, d| *d < MAX);
            distances
        }

        fn assert_settled(&self) {
            assert_eq!(self.levels, self.expected());
        }
    }

    fn graph() -> DynamicGraphMinFixedPoint {
        DynamicGraphMinFixedPoint::new(LEVELS, 16, 256)
    }

    #[test]
    fn test_single_source() {
        let mut graph = graph();
        let mut grid = GridDistance::default();
        grid.add_source(&mut graph, node(12, 12));
        assert!(graph.has_work());

        let left = graph.run_updates(&mut grid, usize::MAX);
        assert!(left > 0);
        assert!(!graph.has_work());
        assert_eq!(grid.get_level(node(12, 12)), 0);
        assert_eq!(grid.get_level(node(12, 20)), 8);
        assert_eq!(grid.get_level(node(0, 0)), MAX);
        grid.assert_settled();
    }

    #[test]
    fn test_walls_and_removal() {
        let mut graph = graph();
        let mut grid = GridDistance::default();
        grid.add_source(&mut graph, node(5, 5));
        graph.run_updates(&mut grid, usize::MAX);

        // A wall across x = 8 with a gap at y = 0.
        for y in 1..SIZE {
            grid.set_wall(&mut graph, node(8, y), true);
        }
        graph.run_updates(&mut grid, usize::MAX);
        grid.assert_settled();
        assert_eq!(grid.get_level(node(9, 5)), 14);

        grid.set_wall(&mut graph, node(8, 5), false);
        graph.run_updates(&mut grid, usize::MAX);
        grid.assert_settled();
        assert_eq!(grid.get_level(node(9, 5)), 4);

        grid.remove_source(&mut graph, node(5, 5));
        graph.run_updates(&mut grid, usize::MAX);
        assert!(grid.levels.is_empty());
        assert_eq!(graph.queue_size(), 0);
    }

    #[test]
    fn test_dominated_removal_keeps_other_source() {
        let mut graph = graph();
        let mut grid = GridDistance::default();
        grid.add_source(&mut graph, node(4, 4));
        grid.add_source(&mut graph, node(10, 4));
        graph.run_updates(&mut grid, usize::MAX);
        grid.assert_settled();

        grid.remove_source(&mut graph, node(4, 4));
        graph.run_updates(&mut grid, usize::MAX);
        grid.assert_settled();
        assert_eq!(grid.get_level(node(4, 4)), 6);
    }

    #[test]
    fn test_budget_chunking_reaches_same_fixed_point() {
        let mut graph = graph();
        let mut grid = GridDistance::default();
        grid.add_source(&mut graph, node(3, 3));
        grid.add_source(&mut graph, node(17, 9));
        for y in 0..12 {
            grid.set_wall(&mut graph, node(10, y), true);
        }

        let mut rounds = 0;
        while graph.has_work() {
            let left = graph.run_updates(&mut grid, 5);
            if graph.has_work() {
                assert_eq!(left, 0);
            }
            rounds += 1;
        }
        assert!(rounds > 10);
        grid.assert_settled();
    }

    #[test]
    fn test_idle_run_returns_budget() {
        let mut graph = graph();
        let mut grid = GridDistance::default();
        assert_eq!(graph.run_updates(&mut grid, 7), 7);
    }

    #[test]
    fn test_remove_if_drops_pending() {
        let mut graph = graph();
        let mut grid = GridDistance::default();
        grid.add_source(&mut graph, node(1, 1));
        grid.add_source(&mut graph, node(20, 20));
        assert_eq!(graph.queue_size(), 2);
        assert_eq!(graph.pending_level(node(1, 1)), Some(0));

        graph.remove_if(&grid, |n| n == node(1, 1));
        assert_eq!(graph.queue_size(), 1);
        assert_eq!(graph.pending_level(node(1, 1)), None);

        graph.remove_from_queue(&grid, node(20, 20));
        assert!(!graph.has_work());
    }

    #[test]
    #[should_panic(expected = "Level count must be < 254.")]
    fn test_level_count_limit() {
        let _ = DynamicGraphMinFixedPoint::new(254, 1, 1);
    }
}
