//! Read-only chunk access for the light engines.

use std::sync::Arc;

use parking_lot::RwLock;
use steel_utils::{BlockPos, BlockStateId, SectionPos};

use crate::{block_model::LightBlockModel, light_engine::LightLayer, sky_light_sources::ChunkSkyLightSources};

/// Vertical extent of a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelHeight {
    /// Lowest block Y.
    pub min_y: i32,
    /// Number of block layers.
    pub height: i32,
}

impl LevelHeight {
    #[must_use]
    pub const fn new(min_y: i32, height: i32) -> Self {
        Self { min_y, height }
    }

    /// One past the highest block Y.
    #[must_use]
    pub const fn max_y(self) -> i32 {
        self.min_y + self.height
    }

    #[must_use]
    pub const fn min_section_y(self) -> i32 {
        SectionPos::block_to_section_coord(self.min_y)
    }

    /// One past the highest section Y.
    #[must_use]
    pub const fn max_section_y(self) -> i32 {
        SectionPos::block_to_section_coord(self.max_y() - 1) + 1
    }

    #[must_use]
    pub const fn section_count(self) -> i32 {
        self.max_section_y() - self.min_section_y()
    }

    #[must_use]
    pub const fn is_outside_build_height(self, y: i32) -> bool {
        y < self.min_y || y >= self.max_y()
    }
}

/// A chunk as seen by the light engines.
pub trait LightChunk: Send + Sync {
    /// Block state at a world position. X and Z are taken modulo 16; positions
    /// outside the level's height are air.
    fn block_state(&self, pos: BlockPos) -> BlockStateId;

    /// Section Y of the highest section holding anything but air.
    fn highest_filled_section_y(&self) -> Option<i32>;

    fn section_has_only_air(&self, section_y: i32) -> bool;

    /// Calls `sink` for every block whose state emits light.
    fn find_block_light_sources(
        &self,
        model: &dyn LightBlockModel,
        sink: &mut dyn FnMut(BlockPos, BlockStateId),
    );

    /// The chunk's sky source heightmap. Chunk code keeps it current on block changes.
    fn sky_light_sources(&self) -> Arc<RwLock<ChunkSkyLightSources>>;
}

/// Access to chunks for lighting.
pub trait LightChunkGetter: Send + Sync {
    /// The chunk at the given chunk coordinates, if loaded far enough to light.
    fn chunk_for_lighting(&self, x: i32, z: i32) -> Option<Arc<dyn LightChunk>>;

    fn level_height(&self) -> LevelHeight;

    /// A section's published light changed or bordered a change.
    fn on_light_update(&self, _layer: LightLayer, _section: SectionPos) {}
}
