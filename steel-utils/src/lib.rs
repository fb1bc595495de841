//! Shared value types for the Steel crates: packed world positions, block state ids
//! and a few compact containers.

pub mod codec;
pub mod math;
pub mod types;

pub use types::{BlockPos, BlockStateId, ChunkPos, SectionPos};
