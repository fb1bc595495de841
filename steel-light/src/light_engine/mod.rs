//! Flood-fill light propagation for block and sky light.

mod base;
mod block_light_engine;
mod chunk_cache;
pub mod direction;
mod level_light_engine;
mod light_data;
pub mod light_queue;
pub mod queue_entry;
mod sky_light_engine;
pub mod threaded_level_light_engine;

use std::fmt;

pub use base::{LightEngine, LightEventListener, LightLayerEngine, MAX_LEVEL, MIN_OPACITY};
pub use block_light_engine::{BlockLight, BlockLightEngine};
pub use chunk_cache::ChunkCache;
pub use direction::{Direction, DirectionSet};
pub use level_light_engine::{
    DummyLightLayerEventListener, LayerLightEventListener, LevelLightEngine,
};
pub use light_data::ChunkLightData;
pub use light_queue::LightQueue;
pub use queue_entry::QueueEntry;
pub use sky_light_engine::{SkyLight, SkyLightEngine};
pub use threaded_level_light_engine::{TaskType, ThreadedLevelLightEngine};

/// The two kinds of light a level tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightLayer {
    /// Light coming from the sky.
    Sky,
    /// Light emitted by blocks.
    Block,
}

impl fmt::Display for LightLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sky => f.write_str("sky"),
            Self::Block => f.write_str("block"),
        }
    }
}
