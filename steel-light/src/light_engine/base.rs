//! The layer-independent half of the light engines.
//!
//! Light spreads breadth-first through two FIFO queues. Decreases always drain
//! before increases so that an increase sees the final post-removal levels of its
//! neighbours. What a queue entry does at a node is decided by the layer.

use std::{marker::PhantomData, num::NonZeroUsize, sync::Arc};

use rustc_hash::FxHashSet;
use steel_utils::{BlockPos, BlockStateId, ChunkPos, SectionPos};

use super::{
    chunk_cache::ChunkCache, direction::Direction, light_queue::LightQueue,
    queue_entry::QueueEntry,
};
use crate::{
    block_model::LightBlockModel,
    data_layer::DataLayer,
    light_chunk::{LightChunk, LightChunkGetter},
    storage::{
        LayerLightReader, LayerLightSectionStorage, SectionDataInbox, SectionType, StorageKind,
    },
};

pub const MAX_LEVEL: u8 = 15;

/// Every block costs at least this much light to cross, even fully transparent ones.
pub const MIN_OPACITY: u8 = 1;

const MIN_NODES_TO_CHECK: usize = 512;

/// How one light layer reacts to queue entries.
pub trait LightLayerEngine: Sized + Send + Sync + 'static {
    type Storage: StorageKind;

    /// Re-evaluates a block whose state may have changed.
    fn check_node(engine: &mut LightEngine<Self>, pos: i64);

    /// Spreads `level`, already stored at `pos`, to the entry's directions.
    fn propagate_increase(engine: &mut LightEngine<Self>, pos: i64, entry: QueueEntry, level: u8);

    /// Clears light that may have come from `pos` and requeues what is still lit.
    fn propagate_decrease(engine: &mut LightEngine<Self>, pos: i64, entry: QueueEntry);

    /// Seeds the queues from everything in the chunk that produces light.
    fn propagate_light_sources(engine: &mut LightEngine<Self>, chunk: ChunkPos);

    fn set_light_enabled(engine: &mut LightEngine<Self>, chunk: ChunkPos, enabled: bool) {
        engine
            .storage
            .set_light_enabled(SectionPos::column_key(chunk.0.x, chunk.0.y), enabled);
    }
}

/// One light layer of a level: its storage plus the propagation queues.
pub struct LightEngine<L: LightLayerEngine> {
    pub(crate) chunk_source: Arc<dyn LightChunkGetter>,
    pub(crate) model: Arc<dyn LightBlockModel>,
    pub(crate) storage: LayerLightSectionStorage<L::Storage>,
    block_nodes_to_check: FxHashSet<i64>,
    pub(crate) decrease_queue: LightQueue,
    pub(crate) increase_queue: LightQueue,
    chunk_cache: ChunkCache<Arc<dyn LightChunk>>,
    _layer: PhantomData<L>,
}

impl<L: LightLayerEngine> LightEngine<L> {
    #[must_use]
    pub fn new(chunk_source: Arc<dyn LightChunkGetter>, model: Arc<dyn LightBlockModel>) -> Self {
        Self {
            chunk_source,
            model,
            storage: LayerLightSectionStorage::new(),
            block_nodes_to_check: FxHashSet::default(),
            decrease_queue: LightQueue::new(),
            increase_queue: LightQueue::new(),
            chunk_cache: ChunkCache::new(),
            _layer: PhantomData,
        }
    }

    #[must_use]
    pub fn storage(&self) -> &LayerLightSectionStorage<L::Storage> {
        &self.storage
    }

    pub(crate) fn chunk(&mut self, x: i32, z: i32) -> Option<Arc<dyn LightChunk>> {
        let source = &self.chunk_source;
        self.chunk_cache
            .get_or_load(ChunkPos::new(x, z), |pos| {
                source.chunk_for_lighting(pos.0.x, pos.0.y)
            })
    }

    /// Block state at a packed position; unavailable chunks read as the opaque fallback.
    pub(crate) fn get_state(&mut self, pos: i64) -> BlockStateId {
        let x = SectionPos::block_to_section_coord(BlockPos::unpack_x(pos));
        let z = SectionPos::block_to_section_coord(BlockPos::unpack_z(pos));
        match self.chunk(x, z) {
            Some(chunk) => chunk.block_state(BlockPos::from_long(pos)),
            None => self.model.opaque_fallback(),
        }
    }

    pub(crate) fn get_opacity(&self, state: BlockStateId, pos: i64) -> u8 {
        self.model
            .light_block(state, BlockPos::from_long(pos))
            .max(MIN_OPACITY)
    }

    pub(crate) fn shape_occludes(
        &self,
        from: i64,
        from_state: BlockStateId,
        to: i64,
        to_state: BlockStateId,
        direction: Direction,
    ) -> bool {
        self.model.shape_occludes(
            from_state,
            BlockPos::from_long(from),
            to_state,
            BlockPos::from_long(to),
            direction,
        )
    }

    pub(crate) fn is_empty_shape(&self, state: BlockStateId) -> bool {
        self.model.is_empty_shape(state)
    }

    #[inline]
    pub(crate) fn enqueue_decrease(&mut self, pos: i64, entry: QueueEntry) {
        self.decrease_queue.enqueue(pos, entry);
    }

    #[inline]
    pub(crate) fn enqueue_increase(&mut self, pos: i64, entry: QueueEntry) {
        self.increase_queue.enqueue(pos, entry);
    }

    /// The increase step both layers share. `after_write` runs for every neighbour
    /// that was brightened.
    pub(crate) fn spread_increase(
        &mut self,
        pos: i64,
        entry: QueueEntry,
        level: u8,
        mut after_write: impl FnMut(&mut Self, i64, Direction, u8),
    ) {
        let mut from_state = None;
        for direction in Direction::ALL {
            if !entry.should_propagate(direction) {
                continue;
            }
            let neighbor = direction.relative_long(pos);
            if !self
                .storage
                .storing_light_for_section(SectionPos::block_to_section(neighbor))
            {
                continue;
            }

            let current = self.storage.get_stored_level(neighbor);
            if level.saturating_sub(1) <= current {
                continue;
            }
            let to_state = self.get_state(neighbor);
            let new_level = level.saturating_sub(self.get_opacity(to_state, neighbor));
            if new_level <= current {
                continue;
            }

            let from = match from_state {
                Some(state) => state,
                None => {
                    let state = if entry.is_from_empty_shape() {
                        self.model.air()
                    } else {
                        self.get_state(pos)
                    };
                    from_state = Some(state);
                    state
                }
            };
            if self.shape_occludes(pos, from, neighbor, to_state, direction) {
                continue;
            }

            self.storage.set_stored_level(neighbor, new_level);
            if new_level > 1 {
                let empty = self.is_empty_shape(to_state);
                self.enqueue_increase(
                    neighbor,
                    QueueEntry::increase_skip_one_direction(new_level, empty, direction.opposite()),
                );
            }
            after_write(self, neighbor, direction, new_level);
        }
    }

    /// Pending checks plus queued entries.
    #[must_use]
    pub fn queued_update_size(&self) -> usize {
        self.block_nodes_to_check.len() + self.decrease_queue.len() + self.increase_queue.len()
    }

    fn has_queued_entries(&self) -> bool {
        !self.decrease_queue.is_empty() || !self.increase_queue.is_empty()
    }

    fn propagate_decreases(&mut self, limit: usize) -> usize {
        let mut processed = 0;
        while processed < limit {
            let Some((pos, entry)) = self.decrease_queue.dequeue() else {
                break;
            };
            processed += 1;
            L::propagate_decrease(self, pos, entry);
        }
        processed
    }

    fn propagate_increases(&mut self, limit: usize) -> usize {
        let mut processed = 0;
        while processed < limit {
            let Some((pos, entry)) = self.increase_queue.dequeue() else {
                break;
            };
            processed += 1;

            let level = entry.level();
            let mut stored = self.storage.get_stored_level(pos);
            if entry.is_from_emission() && stored < level {
                self.storage.set_stored_level(pos, level);
                stored = level;
            }
            // Entries overtaken by a brighter or cleared value are stale.
            if stored == level {
                L::propagate_increase(self, pos, entry, level);
            }
        }
        processed
    }

    /// Published light at `pos`.
    #[must_use]
    pub fn get_light_value(&self, pos: BlockPos) -> u8 {
        self.storage.get_light_value(pos.as_long())
    }

    #[must_use]
    pub fn get_data_layer_data(&self, section: SectionPos) -> Option<Arc<DataLayer>> {
        self.storage.get_data_layer_data(section.as_long())
    }

    #[must_use]
    pub fn debug_section_type(&self, section: SectionPos) -> SectionType {
        self.storage.debug_section_type(section.as_long())
    }

    #[must_use]
    pub fn debug_data(&self, section: SectionPos) -> &'static str {
        self.debug_section_type(section).display()
    }

    pub fn queue_section_data(&mut self, section: SectionPos, layer: Option<DataLayer>) {
        self.storage.queue_section_data(section.as_long(), layer);
    }

    pub fn retain_data(&mut self, chunk: ChunkPos, retain: bool) {
        self.storage
            .retain_data(SectionPos::column_key(chunk.0.x, chunk.0.y), retain);
    }

    #[must_use]
    pub fn reader(&self) -> LayerLightReader<L::Storage> {
        self.storage.reader()
    }

    #[must_use]
    pub fn inbox(&self) -> SectionDataInbox {
        self.storage.inbox()
    }
}

/// The mutating half of a light engine, shared by single layers and whole levels.
pub trait LightEventListener {
    /// Schedules `pos` to be re-evaluated on the next update.
    fn check_block(&mut self, pos: BlockPos);

    fn has_light_work(&self) -> bool;

    /// Runs every pending update and publishes the result. Returns the number of
    /// queue entries processed.
    fn run_light_updates(&mut self) -> usize {
        self.run_light_updates_with_budget(None)
    }

    /// Like [`run_light_updates`](Self::run_light_updates), but processes at most
    /// `budget` queue entries. Whatever is left stays queued for the next call.
    fn run_light_updates_with_budget(&mut self, budget: Option<NonZeroUsize>) -> usize;

    fn update_section_status(&mut self, section: SectionPos, is_empty: bool);

    fn set_light_enabled(&mut self, chunk: ChunkPos, enabled: bool);

    /// Seeds light from every source in the chunk.
    fn propagate_light_sources(&mut self, chunk: ChunkPos);
}

impl<L: LightLayerEngine> LightEventListener for LightEngine<L> {
    fn check_block(&mut self, pos: BlockPos) {
        self.block_nodes_to_check.insert(pos.as_long());
    }

    fn has_light_work(&self) -> bool {
        !self.block_nodes_to_check.is_empty()
            || self.has_queued_entries()
            || self.storage.has_inconsistencies()
    }

    fn run_light_updates_with_budget(&mut self, budget: Option<NonZeroUsize>) -> usize {
        let pending = std::mem::take(&mut self.block_nodes_to_check);
        for pos in pending {
            L::check_node(self, pos);
        }
        self.block_nodes_to_check.shrink_to(MIN_NODES_TO_CHECK);

        let limit = budget.map_or(usize::MAX, NonZeroUsize::get);
        let mut processed = self.propagate_decreases(limit);
        if self.decrease_queue.is_empty() {
            processed += self.propagate_increases(limit - processed);
        }
        if !self.has_queued_entries() {
            self.decrease_queue.trim();
            self.increase_queue.trim();
        }

        self.chunk_cache.clear();
        self.storage.mark_new_inconsistencies();
        self.storage.swap_section_map(self.chunk_source.as_ref());
        processed
    }

    fn update_section_status(&mut self, section: SectionPos, is_empty: bool) {
        self.storage.update_section_status(section.as_long(), is_empty);
    }

    fn set_light_enabled(&mut self, chunk: ChunkPos, enabled: bool) {
        L::set_light_enabled(self, chunk, enabled);
    }

    fn propagate_light_sources(&mut self, chunk: ChunkPos) {
        L::propagate_light_sources(self, chunk);
    }
}
