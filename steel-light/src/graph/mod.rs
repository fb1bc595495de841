//! Incremental min-fixed-point relaxation over an abstract graph of `i64` nodes.
//!
//! This is the general form of level propagation, for level graphs that do not map
//! onto block positions (distance fields, chunk ticket levels). The block and sky
//! light engines in [`crate::light_engine`] run the same relaxation specialised to
//! voxels, with FIFO queues of packed positions and direction masks.

mod dynamic_graph;
mod leveled_priority_queue;

pub use dynamic_graph::{DynamicGraphMinFixedPoint, GraphStrategy};
pub use leveled_priority_queue::LeveledPriorityQueue;
