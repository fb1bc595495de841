//! In-memory worlds for exercising the light engines in tests and benchmarks.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use steel_utils::{BlockPos, BlockStateId, ChunkPos, SectionPos};

use crate::{
    block_model::{FaceShape, LightBlockModel},
    config::LightEngineConfig,
    light_chunk::{LevelHeight, LightChunk, LightChunkGetter},
    light_engine::{Direction, LevelLightEngine, LightEventListener, LightLayer},
    sky_light_sources::ChunkSkyLightSources,
};

/// A handful of block states with distinct light properties.
#[derive(Debug, Clone, Copy, Default)]
pub struct TestBlocks;

impl TestBlocks {
    pub const AIR: BlockStateId = BlockStateId(0);
    /// Opaque full cube.
    pub const STONE: BlockStateId = BlockStateId(1);
    /// Emits 14, no collision.
    pub const TORCH: BlockStateId = BlockStateId(2);
    /// Takes one level of light.
    pub const LEAVES: BlockStateId = BlockStateId(3);
    /// Transparent full cube.
    pub const GLASS: BlockStateId = BlockStateId(4);
    /// Full bottom face, open top, half-height sides.
    pub const BOTTOM_SLAB: BlockStateId = BlockStateId(5);
}

impl LightBlockModel for TestBlocks {
    fn light_emission(&self, state: BlockStateId) -> u8 {
        match state {
            Self::TORCH => 14,
            _ => 0,
        }
    }

    fn light_block(&self, state: BlockStateId, _pos: BlockPos) -> u8 {
        match state {
            Self::STONE => 15,
            Self::LEAVES => 1,
            _ => 0,
        }
    }

    fn uses_shape_for_light_occlusion(&self, state: BlockStateId) -> bool {
        state == Self::BOTTOM_SLAB
    }

    fn face_occlusion_shape(
        &self,
        state: BlockStateId,
        _pos: BlockPos,
        direction: Direction,
    ) -> FaceShape {
        match (state, direction) {
            (Self::BOTTOM_SLAB, Direction::Down) => FaceShape::FULL,
            (Self::BOTTOM_SLAB, Direction::Up) => FaceShape::EMPTY,
            (Self::BOTTOM_SLAB, _) => FaceShape::LOWER_HALF,
            _ => FaceShape::EMPTY,
        }
    }

    fn opaque_fallback(&self) -> BlockStateId {
        Self::STONE
    }

    fn air(&self) -> BlockStateId {
        Self::AIR
    }
}

#[derive(Default)]
struct ChunkBlocks {
    /// Keyed by chunk-local x and z, world y.
    blocks: FxHashMap<BlockPos, BlockStateId>,
    /// Non-air block count per section Y.
    non_air: FxHashMap<i32, u32>,
}

/// A sparse chunk that is air unless told otherwise.
pub struct TestChunk {
    pos: ChunkPos,
    height: LevelHeight,
    blocks: RwLock<ChunkBlocks>,
    sky_sources: Arc<RwLock<ChunkSkyLightSources>>,
}

impl TestChunk {
    fn new(pos: ChunkPos, height: LevelHeight) -> Self {
        Self {
            pos,
            height,
            blocks: RwLock::new(ChunkBlocks::default()),
            sky_sources: Arc::new(RwLock::new(ChunkSkyLightSources::new(height))),
        }
    }

    #[must_use]
    pub const fn pos(&self) -> ChunkPos {
        self.pos
    }

    /// Rebuilds the sky source heightmap from the current blocks.
    pub fn refresh_sky_sources(&self) {
        self.sky_sources.write().fill_from(self, &TestBlocks);
    }

    fn put(&self, pos: BlockPos, state: BlockStateId) -> BlockStateId {
        let local = BlockPos::new(pos.0.x & 15, pos.0.y, pos.0.z & 15);
        let section_y = SectionPos::block_to_section_coord(pos.0.y);
        let mut blocks = self.blocks.write();
        let old = if state == TestBlocks::AIR {
            blocks.blocks.remove(&local)
        } else {
            blocks.blocks.insert(local, state)
        }
        .unwrap_or(TestBlocks::AIR);

        match (old == TestBlocks::AIR, state == TestBlocks::AIR) {
            (true, false) => *blocks.non_air.entry(section_y).or_default() += 1,
            (false, true) => {
                if let Some(count) = blocks.non_air.get_mut(&section_y) {
                    *count -= 1;
                    if *count == 0 {
                        blocks.non_air.remove(&section_y);
                    }
                }
            }
            _ => {}
        }
        old
    }
}

impl LightChunk for TestChunk {
    fn block_state(&self, pos: BlockPos) -> BlockStateId {
        if self.height.is_outside_build_height(pos.0.y) {
            return TestBlocks::AIR;
        }
        let local = BlockPos::new(pos.0.x & 15, pos.0.y, pos.0.z & 15);
        self.blocks
            .read()
            .blocks
            .get(&local)
            .copied()
            .unwrap_or(TestBlocks::AIR)
    }

    fn highest_filled_section_y(&self) -> Option<i32> {
        self.blocks.read().non_air.keys().copied().max()
    }

    fn section_has_only_air(&self, section_y: i32) -> bool {
        !self.blocks.read().non_air.contains_key(&section_y)
    }

    fn find_block_light_sources(
        &self,
        model: &dyn LightBlockModel,
        sink: &mut dyn FnMut(BlockPos, BlockStateId),
    ) {
        let sources: Vec<(BlockPos, BlockStateId)> = self
            .blocks
            .read()
            .blocks
            .iter()
            .filter(|(_, state)| model.light_emission(**state) > 0)
            .map(|(local, state)| {
                let pos = BlockPos::new(
                    self.pos.min_block_x() + local.0.x,
                    local.0.y,
                    self.pos.min_block_z() + local.0.z,
                );
                (pos, *state)
            })
            .collect();
        for (pos, state) in sources {
            sink(pos, state);
        }
    }

    fn sky_light_sources(&self) -> Arc<RwLock<ChunkSkyLightSources>> {
        self.sky_sources.clone()
    }
}

/// A square of loaded chunks centred on chunk (0, 0).
pub struct TestWorld {
    height: LevelHeight,
    chunks: FxHashMap<ChunkPos, Arc<TestChunk>>,
    light_updates: Mutex<Vec<(LightLayer, SectionPos)>>,
}

impl TestWorld {
    /// Chunks from `-radius` to `radius` on both axes.
    #[must_use]
    pub fn new(min_y: i32, height: i32, radius: i32) -> Self {
        let height = LevelHeight::new(min_y, height);
        let mut chunks = FxHashMap::default();
        for x in -radius..=radius {
            for z in -radius..=radius {
                let pos = ChunkPos::new(x, z);
                chunks.insert(pos, Arc::new(TestChunk::new(pos, height)));
            }
        }
        Self {
            height,
            chunks,
            light_updates: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub const fn height(&self) -> LevelHeight {
        self.height
    }

    /// # Panics
    /// If the chunk is outside the world.
    #[must_use]
    pub fn chunk(&self, x: i32, z: i32) -> Arc<TestChunk> {
        self.chunks
            .get(&ChunkPos::new(x, z))
            .cloned()
            .unwrap_or_else(|| panic!("chunk {x}, {z} is not part of the test world"))
    }

    /// Every chunk, ordered by X then Z.
    #[must_use]
    pub fn chunks(&self) -> Vec<Arc<TestChunk>> {
        let mut chunks: Vec<_> = self.chunks.values().cloned().collect();
        chunks.sort_by_key(|chunk| (chunk.pos.0.x, chunk.pos.0.y));
        chunks
    }

    /// Sets a block without telling any engine. Returns the previous state.
    pub fn put_block(&self, pos: BlockPos, state: BlockStateId) -> BlockStateId {
        let chunk = pos.chunk_pos();
        self.chunk(chunk.0.x, chunk.0.y).put(pos, state)
    }

    /// Sections reported through [`LightChunkGetter::on_light_update`] since the last call.
    pub fn take_light_updates(&self) -> Vec<(LightLayer, SectionPos)> {
        std::mem::take(&mut *self.light_updates.lock())
    }
}

impl LightChunkGetter for TestWorld {
    fn chunk_for_lighting(&self, x: i32, z: i32) -> Option<Arc<dyn LightChunk>> {
        let chunk: Arc<dyn LightChunk> = self.chunks.get(&ChunkPos::new(x, z))?.clone();
        Some(chunk)
    }

    fn level_height(&self) -> LevelHeight {
        self.height
    }

    fn on_light_update(&self, layer: LightLayer, section: SectionPos) {
        self.light_updates.lock().push((layer, section));
    }
}

/// A level engine over `world` using [`TestBlocks`].
#[must_use]
pub fn level_engine(world: &Arc<TestWorld>, config: &LightEngineConfig) -> LevelLightEngine {
    LevelLightEngine::new(world.clone(), Arc::new(TestBlocks), config)
}

/// Loads every chunk into `engine` and seeds its light sources, without propagating.
pub fn prepare_world(world: &TestWorld, engine: &mut impl LightEventListener) {
    let chunks = world.chunks();
    let height = world.height();
    for chunk in &chunks {
        chunk.refresh_sky_sources();
        for section_y in height.min_section_y()..height.max_section_y() {
            if !chunk.section_has_only_air(section_y) {
                engine.update_section_status(SectionPos::of_chunk(chunk.pos, section_y), false);
            }
        }
    }
    for chunk in &chunks {
        engine.set_light_enabled(chunk.pos, true);
    }
    for chunk in &chunks {
        engine.propagate_light_sources(chunk.pos);
    }
}

/// Loads and fully lights every chunk.
pub fn light_world(world: &TestWorld, engine: &mut impl LightEventListener) {
    prepare_world(world, engine);
    while engine.has_light_work() {
        engine.run_light_updates();
    }
}

/// Changes a block the way chunk code does: section status, sky sources, then a
/// light check.
pub fn set_block(
    world: &TestWorld,
    engine: &mut impl LightEventListener,
    pos: BlockPos,
    state: BlockStateId,
) {
    let chunk_pos = pos.chunk_pos();
    let chunk = world.chunk(chunk_pos.0.x, chunk_pos.0.y);
    let section_y = SectionPos::block_to_section_coord(pos.0.y);
    let was_empty = chunk.section_has_only_air(section_y);
    let old = chunk.put(pos, state);
    let is_empty = chunk.section_has_only_air(section_y);
    if was_empty != is_empty {
        engine.update_section_status(SectionPos::of_block(pos), is_empty);
    }
    if TestBlocks.has_different_light_properties(old, state, pos) {
        chunk.sky_sources.write().update(chunk.as_ref(), &TestBlocks, pos);
        engine.check_block(pos);
    }
}
