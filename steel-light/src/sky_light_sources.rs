//! Per-column tracking of where direct sky light stops.

use steel_utils::{BlockPos, BlockStateId, SectionPos};

use crate::{
    block_model::LightBlockModel,
    light_chunk::{LevelHeight, LightChunk},
    light_engine::Direction,
};

/// Returned for columns that are open all the way through the bottom of the world.
pub const NEGATIVE_INFINITY: i32 = i32::MIN;

/// Fixed-width unsigned values packed into `u64` words, never spanning two words.
#[derive(Debug, Clone)]
struct PackedHeights {
    data: Box<[u64]>,
    bits: u32,
    values_per_long: usize,
    mask: u64,
}

impl PackedHeights {
    fn new(bits: u32, size: usize) -> Self {
        let values_per_long = (64 / bits) as usize;
        Self {
            data: vec![0; size.div_ceil(values_per_long)].into_boxed_slice(),
            bits,
            values_per_long,
            mask: (1 << bits) - 1,
        }
    }

    #[inline]
    fn get(&self, index: usize) -> u32 {
        let shift = (index % self.values_per_long) as u32 * self.bits;
        ((self.data[index / self.values_per_long] >> shift) & self.mask) as u32
    }

    #[inline]
    fn set(&mut self, index: usize, value: u32) {
        let shift = (index % self.values_per_long) as u32 * self.bits;
        let word = &mut self.data[index / self.values_per_long];
        *word = (*word & !(self.mask << shift)) | ((u64::from(value) & self.mask) << shift);
    }
}

/// The lowest Y of each column of a chunk at which the block still sees the sky directly.
///
/// Every block at or above that Y is a full-strength sky light source. Columns with
/// no occluding edge down to the bottom of the world report [`NEGATIVE_INFINITY`].
#[derive(Debug, Clone)]
pub struct ChunkSkyLightSources {
    /// One below the level's lowest block.
    min_y: i32,
    min_section_y: i32,
    heightmap: PackedHeights,
}

#[inline]
const fn index(x: i32, z: i32) -> usize {
    ((x & 15) + (z & 15) * 16) as usize
}

impl ChunkSkyLightSources {
    #[must_use]
    pub fn new(level_height: LevelHeight) -> Self {
        let min_y = level_height.min_y - 1;
        let range = (level_height.max_y() - min_y + 1) as u32;
        let bits = range.next_power_of_two().trailing_zeros().max(1);
        Self {
            min_y,
            min_section_y: level_height.min_section_y(),
            heightmap: PackedHeights::new(bits, 256),
        }
    }

    /// Rebuilds every column from the chunk's current blocks.
    pub fn fill_from(&mut self, chunk: &dyn LightChunk, model: &dyn LightBlockModel) {
        let Some(top_section_y) = chunk.highest_filled_section_y() else {
            self.fill(self.min_y);
            return;
        };

        for z in 0..16 {
            for x in 0..16 {
                let y = self
                    .find_lowest_source_y(chunk, model, top_section_y, x, z)
                    .max(self.min_y);
                self.set(index(x, z), y);
            }
        }
    }

    fn find_lowest_source_y(
        &self,
        chunk: &dyn LightChunk,
        model: &dyn LightBlockModel,
        top_section_y: i32,
        x: i32,
        z: i32,
    ) -> i32 {
        let mut above = BlockPos::new(x, SectionPos::section_to_block_coord(top_section_y + 1), z);
        let mut state_above = model.air();

        for section_y in (self.min_section_y..=top_section_y).rev() {
            if chunk.section_has_only_air(section_y) {
                state_above = model.air();
                above.0.y = SectionPos::section_to_block_coord(section_y);
                continue;
            }

            for _ in 0..16 {
                let below = above.offset(0, -1, 0);
                let state_below = chunk.block_state(below);
                if is_edge_occluded(model, above, state_above, below, state_below) {
                    return above.0.y;
                }
                state_above = state_below;
                above = below;
            }
        }

        self.min_y
    }

    /// Patches the column after the block at `pos` changed. Returns whether the
    /// column's lowest source moved.
    pub fn update(&mut self, chunk: &dyn LightChunk, model: &dyn LightBlockModel, pos: BlockPos) -> bool {
        let index = index(pos.0.x, pos.0.z);
        let lowest_source_y = self.get(index);
        if pos.0.y + 1 < lowest_source_y {
            return false;
        }

        let above = pos.offset(0, 1, 0);
        let state_above = chunk.block_state(above);
        let state = chunk.block_state(pos);
        if self.update_edge(chunk, model, index, lowest_source_y, above, state_above, pos, state) {
            return true;
        }

        let below = pos.offset(0, -1, 0);
        let state_below = chunk.block_state(below);
        self.update_edge(chunk, model, index, lowest_source_y, pos, state, below, state_below)
    }

    #[allow(clippy::too_many_arguments)]
    fn update_edge(
        &mut self,
        chunk: &dyn LightChunk,
        model: &dyn LightBlockModel,
        index: usize,
        lowest_source_y: i32,
        above: BlockPos,
        state_above: BlockStateId,
        below: BlockPos,
        state_below: BlockStateId,
    ) -> bool {
        let edge_y = above.0.y;
        if is_edge_occluded(model, above, state_above, below, state_below) {
            if edge_y > lowest_source_y {
                self.set(index, edge_y);
                return true;
            }
        } else if edge_y == lowest_source_y {
            let y = self.find_lowest_source_below(chunk, model, below, state_below);
            self.set(index, y);
            return true;
        }
        false
    }

    fn find_lowest_source_below(
        &self,
        chunk: &dyn LightChunk,
        model: &dyn LightBlockModel,
        pos: BlockPos,
        state: BlockStateId,
    ) -> i32 {
        let mut above = pos;
        let mut state_above = state;
        let mut below = pos.offset(0, -1, 0);

        while below.0.y >= self.min_y {
            let state_below = chunk.block_state(below);
            if is_edge_occluded(model, above, state_above, below, state_below) {
                return above.0.y;
            }
            state_above = state_below;
            above = below;
            below = below.offset(0, -1, 0);
        }

        self.min_y
    }

    /// Lowest sky source Y of the column holding block `(x, z)`.
    #[must_use]
    pub fn get_lowest_source_y(&self, x: i32, z: i32) -> i32 {
        self.extend_sources_below_world(self.get(index(x, z)))
    }

    /// The highest of all columns' lowest sources.
    #[must_use]
    pub fn get_highest_lowest_source_y(&self) -> i32 {
        let highest = (0..256).map(|i| self.heightmap.get(i)).max().unwrap_or(0);
        self.extend_sources_below_world(highest as i32 + self.min_y)
    }

    /// A copy of every column's lowest source, indexed `x + z * 16`.
    #[must_use]
    pub fn lowest_source_ys(&self) -> [i32; 256] {
        std::array::from_fn(|i| self.extend_sources_below_world(self.get(i)))
    }

    fn fill(&mut self, y: i32) {
        let value = (y - self.min_y) as u32;
        for i in 0..256 {
            self.heightmap.set(i, value);
        }
    }

    #[inline]
    fn set(&mut self, index: usize, y: i32) {
        self.heightmap.set(index, (y - self.min_y) as u32);
    }

    #[inline]
    fn get(&self, index: usize) -> i32 {
        self.heightmap.get(index) as i32 + self.min_y
    }

    #[inline]
    fn extend_sources_below_world(&self, y: i32) -> i32 {
        if y == self.min_y { NEGATIVE_INFINITY } else { y }
    }
}

/// Whether sky light cannot pass straight down from `above` into `below`.
fn is_edge_occluded(
    model: &dyn LightBlockModel,
    above: BlockPos,
    state_above: BlockStateId,
    below: BlockPos,
    state_below: BlockStateId,
) -> bool {
    if model.light_block(state_below, below) != 0 {
        return true;
    }
    let above_face = model.occlusion_shape(state_above, above, Direction::Down);
    let below_face = model.occlusion_shape(state_below, below, Direction::Up);
    above_face.occludes(below_face)
}
