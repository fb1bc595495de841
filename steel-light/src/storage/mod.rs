//! Sparse per-section light storage.
//!
//! Each light layer keeps two generations of section data. The engine writes to the
//! updating generation during a batch; readers only ever see the visible generation,
//! which is replaced wholesale when a batch ends. Layers are reference counted, so
//! publishing a generation copies pointers and the first write to a shared layer in
//! the next batch copies that one layer.

mod block;
mod data_layer_map;
mod section_state;
mod sky;

use std::{
    marker::PhantomData,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use arc_swap::{ArcSwap, Guard};
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use steel_utils::{BlockPos, SectionPos};

use crate::{data_layer::DataLayer, light_chunk::LightChunkGetter, light_engine::LightLayer};

pub use block::{BlockLightSectionStorage, BlockStorage};
pub use data_layer_map::DataLayerStorageMap;
pub use section_state::{SectionLifecycle, SectionState, SectionType};
pub use sky::{SkyColumns, SkyLightSectionStorage, SkyStorage};

type QueuedSections = Arc<Mutex<FxHashMap<i64, Arc<DataLayer>>>>;

/// Layer-specific behaviour plugged into [`LayerLightSectionStorage`].
pub trait StorageKind: Sized + Send + Sync + 'static {
    /// Extra per-column data kept alongside the layers of each generation.
    type Columns: Clone + Default + Send + Sync + 'static;

    const LAYER: LightLayer;

    /// Light at a packed block position in the given generation.
    fn light_value(map: &DataLayerStorageMap<Self::Columns>, pos: i64) -> u8;

    /// The initial layer for a section that just became tracked.
    fn create_data_layer(storage: &LayerLightSectionStorage<Self>, section: i64) -> Arc<DataLayer> {
        storage.queued_or_empty(section)
    }

    fn on_node_added(_storage: &mut LayerLightSectionStorage<Self>, _section: i64) {}

    fn on_node_removed(_storage: &mut LayerLightSectionStorage<Self>, _section: i64) {}
}

/// Section-relative coordinates of a packed block position.
#[inline]
pub(crate) fn relative(pos: i64) -> (usize, usize, usize) {
    (
        SectionPos::section_relative(BlockPos::unpack_x(pos)) as usize,
        SectionPos::section_relative(BlockPos::unpack_y(pos)) as usize,
        SectionPos::section_relative(BlockPos::unpack_z(pos)) as usize,
    )
}

/// A handle chunk loaders use to hand in saved light data without touching the engine.
///
/// Data waits here until the section becomes tracked; the tick thread claims it at the
/// end of the next batch.
#[derive(Clone)]
pub struct SectionDataInbox {
    sections: QueuedSections,
    has_inconsistencies: Arc<AtomicBool>,
}

impl SectionDataInbox {
    /// Queues `layer` for `section`, or withdraws previously queued data when `None`.
    pub fn queue(&self, section: SectionPos, layer: Option<DataLayer>) {
        let key = section.as_long();
        if let Some(layer) = layer {
            self.sections.lock().insert(key, Arc::new(layer));
            self.has_inconsistencies.store(true, Ordering::Release);
        } else {
            self.sections.lock().remove(&key);
        }
    }
}

/// A view of a layer's published light that any thread can read without locking.
pub struct LayerLightReader<K: StorageKind> {
    visible: Arc<ArcSwap<DataLayerStorageMap<K::Columns>>>,
}

impl<K: StorageKind> Clone for LayerLightReader<K> {
    fn clone(&self) -> Self {
        Self {
            visible: Arc::clone(&self.visible),
        }
    }
}

impl<K: StorageKind> LayerLightReader<K> {
    #[must_use]
    pub fn get_light_value(&self, pos: BlockPos) -> u8 {
        K::light_value(&self.visible.load(), pos.as_long())
    }

    #[must_use]
    pub fn get_data_layer(&self, section: SectionPos) -> Option<Arc<DataLayer>> {
        self.visible.load().layer_arc(section.as_long()).cloned()
    }
}

/// Light layers of every section that needs one, for one light layer of a level.
pub struct LayerLightSectionStorage<K: StorageKind> {
    section_states: FxHashMap<i64, SectionState>,
    columns_with_sources: FxHashSet<i64>,
    visible_section_data: Arc<ArcSwap<DataLayerStorageMap<K::Columns>>>,
    pub(crate) updating_section_data: DataLayerStorageMap<K::Columns>,
    /// Sections written since the last publish.
    changed_sections: FxHashSet<i64>,
    /// Sections whose light may look different to observers after this batch.
    sections_affected_by_light_updates: FxHashSet<i64>,
    queued_sections: QueuedSections,
    columns_to_retain_queued_data_for: FxHashSet<i64>,
    to_remove: FxHashSet<i64>,
    has_inconsistencies: Arc<AtomicBool>,
    _kind: PhantomData<K>,
}

impl<K: StorageKind> Default for LayerLightSectionStorage<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: StorageKind> LayerLightSectionStorage<K> {
    #[must_use]
    pub fn new() -> Self {
        let updating = DataLayerStorageMap::default();
        Self {
            section_states: FxHashMap::default(),
            columns_with_sources: FxHashSet::default(),
            visible_section_data: Arc::new(ArcSwap::from_pointee(updating.clone())),
            updating_section_data: updating,
            changed_sections: FxHashSet::default(),
            sections_affected_by_light_updates: FxHashSet::default(),
            queued_sections: Arc::default(),
            columns_to_retain_queued_data_for: FxHashSet::default(),
            to_remove: FxHashSet::default(),
            has_inconsistencies: Arc::new(AtomicBool::new(false)),
            _kind: PhantomData,
        }
    }

    /// Whether the section currently has a layer the engine writes to.
    #[must_use]
    pub fn storing_light_for_section(&self, section: i64) -> bool {
        self.updating_section_data.has_layer(section)
    }

    /// The published generation. Cheap; never blocks the engine.
    #[must_use]
    pub fn visible_data(&self) -> Guard<Arc<DataLayerStorageMap<K::Columns>>> {
        self.visible_section_data.load()
    }

    /// The published generation, kept alive for as long as the caller holds it.
    #[must_use]
    pub fn snapshot(&self) -> Arc<DataLayerStorageMap<K::Columns>> {
        self.visible_section_data.load_full()
    }

    pub(crate) fn data_layer(&self, section: i64) -> Option<&DataLayer> {
        self.updating_section_data.layer(section)
    }

    /// Write access to a tracked section's layer.
    pub(crate) fn get_data_layer_to_write(&mut self, section: i64) -> Option<&mut DataLayer> {
        if !self.updating_section_data.has_layer(section) {
            return None;
        }
        self.changed_sections.insert(section);
        self.updating_section_data.layer_mut(section)
    }

    /// Light data for saving or sending: queued external data first, then the published layer.
    #[must_use]
    pub fn get_data_layer_data(&self, section: i64) -> Option<Arc<DataLayer>> {
        if let Some(layer) = self.queued_sections.lock().get(&section) {
            return Some(layer.clone());
        }
        self.visible_section_data.load().layer_arc(section).cloned()
    }

    /// Published light at a packed block position.
    #[must_use]
    pub fn get_light_value(&self, pos: i64) -> u8 {
        K::light_value(&self.visible_section_data.load(), pos)
    }

    /// Level the engine is working with at `pos`; 0 for untracked sections.
    pub(crate) fn get_stored_level(&self, pos: i64) -> u8 {
        let (x, y, z) = relative(pos);
        self.data_layer(SectionPos::block_to_section(pos))
            .map_or(0, |layer| layer.get(x, y, z))
    }

    pub(crate) fn set_stored_level(&mut self, pos: i64, level: u8) {
        let (x, y, z) = relative(pos);
        if let Some(layer) = self.get_data_layer_to_write(SectionPos::block_to_section(pos)) {
            layer.set(x, y, z, level);
        }
        SectionPos::around_and_at_block_pos(pos, |section| {
            self.sections_affected_by_light_updates.insert(section);
        });
    }

    pub(crate) fn mark_section_and_neighbors_as_affected(&mut self, section: i64) {
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    self.sections_affected_by_light_updates
                        .insert(SectionPos::offset_long(section, dx, dy, dz));
                }
            }
        }
    }

    pub(crate) fn queued_or_empty(&self, section: i64) -> Arc<DataLayer> {
        self.queued_layer(section)
            .unwrap_or_else(|| Arc::new(DataLayer::new()))
    }

    pub(crate) fn queued_layer(&self, section: i64) -> Option<Arc<DataLayer>> {
        self.queued_sections.lock().get(&section).cloned()
    }

    #[must_use]
    pub fn has_inconsistencies(&self) -> bool {
        self.has_inconsistencies.load(Ordering::Acquire)
    }

    /// Frees sections queued for removal and claims queued external data for
    /// sections that are tracked now.
    pub(crate) fn mark_new_inconsistencies(&mut self) {
        if !self.has_inconsistencies.swap(false, Ordering::AcqRel) {
            return;
        }

        let removed: SmallVec<[i64; 16]> = self.to_remove.drain().collect();
        {
            let mut queued = self.queued_sections.lock();
            for &section in &removed {
                let queued_layer = queued.remove(&section);
                let stored_layer = self.updating_section_data.remove_layer(section);
                if self
                    .columns_to_retain_queued_data_for
                    .contains(&SectionPos::zero_node(section))
                    && let Some(layer) = queued_layer.or(stored_layer)
                {
                    queued.insert(section, layer);
                }
            }
        }

        for &section in &removed {
            K::on_node_removed(self, section);
            self.changed_sections.insert(section);
        }
        if !removed.is_empty() {
            log::debug!("Freed {} {:?} light sections", removed.len(), K::LAYER);
        }

        let updating = &mut self.updating_section_data;
        let changed = &mut self.changed_sections;
        self.queued_sections.lock().retain(|&section, layer| {
            if !updating.has_layer(section) {
                return true;
            }
            let already_set = updating
                .layer_arc(section)
                .is_some_and(|current| Arc::ptr_eq(current, layer));
            if !already_set {
                updating.set_layer(section, layer.clone());
                changed.insert(section);
            }
            false
        });
    }

    pub fn set_light_enabled(&mut self, column: i64, enabled: bool) {
        if enabled {
            self.columns_with_sources.insert(column);
        } else {
            self.columns_with_sources.remove(&column);
        }
    }

    #[must_use]
    pub fn light_on_in_section(&self, section: i64) -> bool {
        self.columns_with_sources
            .contains(&SectionPos::zero_node(section))
    }

    /// Keep (or stop keeping) light data of freed sections in this column around
    /// for when they come back.
    pub fn retain_data(&mut self, column: i64, retain: bool) {
        if retain {
            self.columns_to_retain_queued_data_for.insert(column);
        } else {
            self.columns_to_retain_queued_data_for.remove(&column);
        }
    }

    pub fn queue_section_data(&self, section: i64, layer: Option<DataLayer>) {
        self.inbox().queue(SectionPos::from_long(section), layer);
    }

    #[must_use]
    pub fn reader(&self) -> LayerLightReader<K> {
        LayerLightReader {
            visible: Arc::clone(&self.visible_section_data),
        }
    }

    #[must_use]
    pub fn inbox(&self) -> SectionDataInbox {
        SectionDataInbox {
            sections: Arc::clone(&self.queued_sections),
            has_inconsistencies: Arc::clone(&self.has_inconsistencies),
        }
    }

    /// Records whether `section` contains any non-air block, updating its neighbours'
    /// counts and allocating or scheduling the release of layers as needed.
    pub fn update_section_status(&mut self, section: i64, is_empty: bool) {
        let old = self.section_state(section);
        let new = old.with_data(!is_empty);
        if old == new {
            return;
        }
        self.put_section_state(section, new);

        let delta = if is_empty { -1 } else { 1 };
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    if dx == 0 && dy == 0 && dz == 0 {
                        continue;
                    }
                    let neighbor = SectionPos::offset_long(section, dx, dy, dz);
                    let state = self.section_state(neighbor);
                    let count = i32::from(state.neighbor_count()) + delta;
                    self.put_section_state(neighbor, state.with_neighbor_count(count));
                }
            }
        }
    }

    fn put_section_state(&mut self, section: i64, state: SectionState) {
        if state.is_empty() {
            if self.section_states.remove(&section).is_some() {
                self.remove_section(section);
            }
        } else if self.section_states.insert(section, state).is_none() {
            self.initialize_section(section);
        }
    }

    fn initialize_section(&mut self, section: i64) {
        if self.to_remove.remove(&section) {
            return;
        }
        let layer = K::create_data_layer(self, section);
        self.updating_section_data.set_layer(section, layer);
        self.changed_sections.insert(section);
        K::on_node_added(self, section);
        self.mark_section_and_neighbors_as_affected(section);
        self.has_inconsistencies.store(true, Ordering::Release);
    }

    fn remove_section(&mut self, section: i64) {
        self.to_remove.insert(section);
        self.has_inconsistencies.store(true, Ordering::Release);
    }

    /// Publishes the updating generation if anything changed and tells the chunk
    /// source which sections were affected.
    pub(crate) fn swap_section_map(&mut self, chunk_source: &dyn LightChunkGetter) {
        if !self.changed_sections.is_empty() {
            self.visible_section_data
                .store(Arc::new(self.updating_section_data.clone()));
            self.changed_sections.clear();
        }

        for section in self.sections_affected_by_light_updates.drain() {
            chunk_source.on_light_update(K::LAYER, SectionPos::from_long(section));
        }
    }

    #[must_use]
    pub fn section_state(&self, section: i64) -> SectionState {
        self.section_states
            .get(&section)
            .copied()
            .unwrap_or(SectionState::EMPTY)
    }

    #[must_use]
    pub fn debug_section_type(&self, section: i64) -> SectionType {
        self.section_state(section).section_type()
    }

    #[must_use]
    pub fn lifecycle(&self, section: i64) -> SectionLifecycle {
        if self.to_remove.contains(&section) {
            SectionLifecycle::PendingRemoval
        } else if self.updating_section_data.has_layer(section) {
            SectionLifecycle::Tracked
        } else if self.queued_sections.lock().contains_key(&section) {
            SectionLifecycle::PendingExternalData
        } else {
            SectionLifecycle::Untracked
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use steel_utils::{BlockPos, SectionPos};

    use super::*;
    use crate::light_chunk::{LevelHeight, LightChunk};

    #[derive(Default)]
    struct RecordingGetter {
        updates: Mutex<Vec<(LightLayer, SectionPos)>>,
    }

    impl LightChunkGetter for RecordingGetter {
        fn chunk_for_lighting(&self, _x: i32, _z: i32) -> Option<Arc<dyn LightChunk>> {
            None
        }

        fn level_height(&self) -> LevelHeight {
            LevelHeight::new(-64, 384)
        }

        fn on_light_update(&self, layer: LightLayer, section: SectionPos) {
            self.updates.lock().push((layer, section));
        }
    }

    fn section(x: i32, y: i32, z: i32) -> i64 {
        SectionPos::as_long_xyz(x, y, z)
    }

    #[test]
    fn test_non_empty_section_tracks_neighbors() {
        let mut storage = BlockLightSectionStorage::new();
        storage.update_section_status(section(0, 0, 0), false);

        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    assert!(storage.storing_light_for_section(section(dx, dy, dz)));
                }
            }
        }
        assert!(!storage.storing_light_for_section(section(2, 0, 0)));
        assert_eq!(
            storage.debug_section_type(section(0, 0, 0)),
            SectionType::LightAndData
        );
        assert_eq!(
            storage.debug_section_type(section(1, 1, 1)),
            SectionType::LightOnly
        );
        assert_eq!(storage.section_state(section(1, 0, 0)).neighbor_count(), 1);
        assert!(storage.has_inconsistencies());
    }

    #[test]
    fn test_shared_neighbors_are_counted() {
        let mut storage = BlockLightSectionStorage::new();
        storage.update_section_status(section(0, 0, 0), false);
        storage.update_section_status(section(1, 0, 0), false);
        assert_eq!(storage.section_state(section(1, 1, 0)).neighbor_count(), 2);
        // Repeating a status is a no-op.
        storage.update_section_status(section(1, 0, 0), false);
        assert_eq!(storage.section_state(section(1, 1, 0)).neighbor_count(), 2);
    }

    #[test]
    fn test_removal_is_deferred() {
        let mut storage = BlockLightSectionStorage::new();
        let center = section(0, 0, 0);
        storage.update_section_status(center, false);
        storage.mark_new_inconsistencies();

        storage.update_section_status(center, true);
        assert_eq!(storage.lifecycle(center), SectionLifecycle::PendingRemoval);
        assert!(storage.storing_light_for_section(center));

        storage.mark_new_inconsistencies();
        assert_eq!(storage.lifecycle(center), SectionLifecycle::Untracked);
        assert!(!storage.storing_light_for_section(section(1, 1, 1)));
        assert!(storage.updating_section_data.is_empty());
    }

    #[test]
    fn test_readded_before_flush_keeps_layer() {
        let mut storage = BlockLightSectionStorage::new();
        let center = section(0, 0, 0);
        storage.update_section_status(center, false);
        storage.set_stored_level(BlockPos::as_long_xyz(1, 2, 3), 9);

        storage.update_section_status(center, true);
        storage.update_section_status(center, false);
        storage.mark_new_inconsistencies();

        assert_eq!(storage.lifecycle(center), SectionLifecycle::Tracked);
        assert_eq!(storage.get_stored_level(BlockPos::as_long_xyz(1, 2, 3)), 9);
    }

    #[test]
    fn test_queued_data_is_claimed() {
        let mut storage = BlockLightSectionStorage::new();
        let target = section(0, 4, 0);
        let mut layer = DataLayer::new();
        layer.set(5, 5, 5, 12);
        storage.queue_section_data(target, Some(layer));
        assert_eq!(
            storage.lifecycle(target),
            SectionLifecycle::PendingExternalData
        );
        assert_eq!(
            storage.get_data_layer_data(target).map(|l| l.get(5, 5, 5)),
            Some(12)
        );

        storage.update_section_status(target, false);
        storage.mark_new_inconsistencies();
        assert_eq!(storage.lifecycle(target), SectionLifecycle::Tracked);
        assert_eq!(storage.get_stored_level(BlockPos::as_long_xyz(5, 69, 5)), 12);

        // Nothing is left waiting in the inbox.
        storage.update_section_status(target, true);
        storage.mark_new_inconsistencies();
        assert_eq!(storage.lifecycle(target), SectionLifecycle::Untracked);
    }

    #[test]
    fn test_withdrawn_data_is_dropped() {
        let storage = BlockLightSectionStorage::new();
        let target = section(3, 3, 3);
        storage.queue_section_data(target, Some(DataLayer::filled(4)));
        storage.queue_section_data(target, None);
        assert_eq!(storage.lifecycle(target), SectionLifecycle::Untracked);
    }

    #[test]
    fn test_retained_columns_keep_freed_data() {
        let mut storage = BlockLightSectionStorage::new();
        let target = section(2, 0, 2);
        storage.retain_data(SectionPos::zero_node(target), true);
        storage.update_section_status(target, false);
        storage.mark_new_inconsistencies();
        storage.set_stored_level(BlockPos::as_long_xyz(32, 0, 32), 7);

        storage.update_section_status(target, true);
        storage.mark_new_inconsistencies();
        assert_eq!(
            storage.lifecycle(target),
            SectionLifecycle::PendingExternalData
        );

        storage.update_section_status(target, false);
        storage.mark_new_inconsistencies();
        assert_eq!(storage.get_stored_level(BlockPos::as_long_xyz(32, 0, 32)), 7);
    }

    #[test]
    fn test_readers_see_published_generation_only() {
        let getter = RecordingGetter::default();
        let mut storage = BlockLightSectionStorage::new();
        let pos = BlockPos::as_long_xyz(4, 4, 4);
        storage.update_section_status(section(0, 0, 0), false);
        storage.mark_new_inconsistencies();
        storage.swap_section_map(&getter);
        let before = storage.snapshot();

        storage.set_stored_level(pos, 11);
        assert_eq!(storage.get_stored_level(pos), 11);
        assert_eq!(storage.get_light_value(pos), 0);
        let reader = storage.reader();

        storage.swap_section_map(&getter);
        assert_eq!(storage.get_light_value(pos), 11);
        assert_eq!(reader.get_light_value(BlockPos::from_long(pos)), 11);
        assert_eq!(BlockStorage::light_value(&before, pos), 0);

        let updates = getter.updates.lock();
        assert!(updates.contains(&(LightLayer::Block, SectionPos::new(0, 0, 0))));
        assert!(updates.iter().all(|(layer, _)| *layer == LightLayer::Block));
    }

    #[test]
    fn test_light_enabled_per_column() {
        let mut storage = BlockLightSectionStorage::new();
        let column = SectionPos::column_key(1, 1);
        storage.set_light_enabled(column, true);
        assert!(storage.light_on_in_section(section(1, -3, 1)));
        assert!(!storage.light_on_in_section(section(1, -3, 2)));
        storage.set_light_enabled(column, false);
        assert!(!storage.light_on_in_section(section(1, 0, 1)));
    }
}
