//! Both light layers of a level behind one interface.

use std::{num::NonZeroUsize, sync::Arc};

use steel_utils::{BlockPos, ChunkPos, SectionPos};

use super::{
    LightLayer,
    base::{LightEngine, LightEventListener, LightLayerEngine},
    block_light_engine::BlockLightEngine,
    sky_light_engine::SkyLightEngine,
};
use crate::{
    block_model::LightBlockModel,
    config::LightEngineConfig,
    data_layer::DataLayer,
    light_chunk::{LevelHeight, LightChunkGetter},
    storage::{BlockStorage, LayerLightReader, SectionDataInbox, SectionType, SkyStorage},
};

/// Read access to one light layer.
pub trait LayerLightEventListener: Send + Sync {
    /// The section's light for saving or sending, if any is known.
    fn get_data_layer_data(&self, section: SectionPos) -> Option<Arc<DataLayer>>;

    fn get_light_value(&self, pos: BlockPos) -> u8;
}

impl<L: LightLayerEngine> LayerLightEventListener for LightEngine<L> {
    fn get_data_layer_data(&self, section: SectionPos) -> Option<Arc<DataLayer>> {
        LightEngine::get_data_layer_data(self, section)
    }

    fn get_light_value(&self, pos: BlockPos) -> u8 {
        LightEngine::get_light_value(self, pos)
    }
}

/// Stands in for a light layer the level does not have.
pub struct DummyLightLayerEventListener;

impl LayerLightEventListener for DummyLightLayerEventListener {
    fn get_data_layer_data(&self, _section: SectionPos) -> Option<Arc<DataLayer>> {
        None
    }

    fn get_light_value(&self, _pos: BlockPos) -> u8 {
        0
    }
}

static DUMMY_LISTENER: DummyLightLayerEventListener = DummyLightLayerEventListener;

/// The block and sky light engines of one level.
pub struct LevelLightEngine {
    level_height: LevelHeight,
    block_engine: Option<BlockLightEngine>,
    sky_engine: Option<SkyLightEngine>,
}

impl LevelLightEngine {
    #[must_use]
    pub fn new(
        chunk_source: Arc<dyn LightChunkGetter>,
        model: Arc<dyn LightBlockModel>,
        config: &LightEngineConfig,
    ) -> Self {
        let level_height = chunk_source.level_height();
        let block_engine = config
            .block_light
            .then(|| BlockLightEngine::new(chunk_source.clone(), model.clone()));
        let sky_engine = config
            .sky_light
            .then(|| SkyLightEngine::new(chunk_source, model));
        Self {
            level_height,
            block_engine,
            sky_engine,
        }
    }

    #[must_use]
    pub fn block_engine(&self) -> Option<&BlockLightEngine> {
        self.block_engine.as_ref()
    }

    #[must_use]
    pub fn sky_engine(&self) -> Option<&SkyLightEngine> {
        self.sky_engine.as_ref()
    }

    #[must_use]
    pub const fn level_height(&self) -> LevelHeight {
        self.level_height
    }

    #[must_use]
    pub fn layer_listener(&self, layer: LightLayer) -> &dyn LayerLightEventListener {
        let engine: Option<&dyn LayerLightEventListener> = match layer {
            LightLayer::Block => self
                .block_engine
                .as_ref()
                .map(|engine| engine as &dyn LayerLightEventListener),
            LightLayer::Sky => self
                .sky_engine
                .as_ref()
                .map(|engine| engine as &dyn LayerLightEventListener),
        };
        engine.unwrap_or(&DUMMY_LISTENER)
    }

    #[must_use]
    pub fn block_reader(&self) -> Option<LayerLightReader<BlockStorage>> {
        self.block_engine.as_ref().map(LightEngine::reader)
    }

    #[must_use]
    pub fn sky_reader(&self) -> Option<LayerLightReader<SkyStorage>> {
        self.sky_engine.as_ref().map(LightEngine::reader)
    }

    /// Where chunk loaders can drop saved light for a layer without taking the engine.
    #[must_use]
    pub fn section_data_inbox(&self, layer: LightLayer) -> Option<SectionDataInbox> {
        match layer {
            LightLayer::Block => self.block_engine.as_ref().map(LightEngine::inbox),
            LightLayer::Sky => self.sky_engine.as_ref().map(LightEngine::inbox),
        }
    }

    #[must_use]
    pub fn debug_section_type(&self, layer: LightLayer, section: SectionPos) -> SectionType {
        let section_type = match layer {
            LightLayer::Block => self
                .block_engine
                .as_ref()
                .map(|engine| engine.debug_section_type(section)),
            LightLayer::Sky => self
                .sky_engine
                .as_ref()
                .map(|engine| engine.debug_section_type(section)),
        };
        section_type.unwrap_or(SectionType::Empty)
    }

    #[must_use]
    pub fn debug_data(&self, layer: LightLayer, section: SectionPos) -> String {
        self.debug_section_type(layer, section).display().to_owned()
    }

    /// Hands in previously saved light for a section. `None` withdraws it.
    pub fn queue_section_data(
        &mut self,
        layer: LightLayer,
        section: SectionPos,
        data: Option<DataLayer>,
    ) {
        let section_y = section.0.y;
        if section_y < self.min_light_section() || section_y >= self.max_light_section() {
            log::warn!("Ignoring {layer} light data for section {section} outside the level");
            return;
        }
        match layer {
            LightLayer::Block => match &mut self.block_engine {
                Some(engine) => engine.queue_section_data(section, data),
                None => log::warn!("Block light data queued for a level without block light"),
            },
            LightLayer::Sky => match &mut self.sky_engine {
                Some(engine) => engine.queue_section_data(section, data),
                None => log::warn!("Sky light data queued for a level without sky light"),
            },
        }
    }

    pub fn retain_data(&mut self, chunk: ChunkPos, retain: bool) {
        if let Some(engine) = &mut self.block_engine {
            engine.retain_data(chunk, retain);
        }
        if let Some(engine) = &mut self.sky_engine {
            engine.retain_data(chunk, retain);
        }
    }

    /// The brighter of block light and sky light dimmed by `sky_darken`.
    #[must_use]
    pub fn raw_brightness(&self, pos: BlockPos, sky_darken: u8) -> u8 {
        let sky = self
            .layer_listener(LightLayer::Sky)
            .get_light_value(pos)
            .saturating_sub(sky_darken);
        let block = self.layer_listener(LightLayer::Block).get_light_value(pos);
        block.max(sky)
    }

    #[must_use]
    pub fn light_on_in_section(&self, section: SectionPos) -> bool {
        let key = section.as_long();
        self.block_engine
            .as_ref()
            .is_some_and(|engine| engine.storage().light_on_in_section(key))
            || self
                .sky_engine
                .as_ref()
                .is_some_and(|engine| engine.storage().light_on_in_section(key))
    }

    /// Sections that can hold light, one more than the level on each end.
    #[must_use]
    pub const fn light_section_count(&self) -> i32 {
        self.level_height.section_count() + 2
    }

    #[must_use]
    pub const fn min_light_section(&self) -> i32 {
        self.level_height.min_section_y() - 1
    }

    /// Exclusive.
    #[must_use]
    pub const fn max_light_section(&self) -> i32 {
        self.min_light_section() + self.light_section_count()
    }
}

impl LightEventListener for LevelLightEngine {
    fn check_block(&mut self, pos: BlockPos) {
        if let Some(engine) = &mut self.block_engine {
            engine.check_block(pos);
        }
        if let Some(engine) = &mut self.sky_engine {
            engine.check_block(pos);
        }
    }

    fn has_light_work(&self) -> bool {
        self.block_engine
            .as_ref()
            .is_some_and(LightEventListener::has_light_work)
            || self
                .sky_engine
                .as_ref()
                .is_some_and(LightEventListener::has_light_work)
    }

    /// Block light gets the budget first; sky light runs with whatever is left.
    fn run_light_updates_with_budget(&mut self, budget: Option<NonZeroUsize>) -> usize {
        let mut processed = 0;
        if let Some(engine) = &mut self.block_engine {
            processed += engine.run_light_updates_with_budget(budget);
        }
        if let Some(engine) = &mut self.sky_engine {
            match budget {
                None => processed += engine.run_light_updates_with_budget(None),
                Some(budget) => {
                    let remaining = NonZeroUsize::new(budget.get().saturating_sub(processed));
                    if let Some(remaining) = remaining {
                        processed += engine.run_light_updates_with_budget(Some(remaining));
                    }
                }
            }
        }
        processed
    }

    fn update_section_status(&mut self, section: SectionPos, is_empty: bool) {
        if let Some(engine) = &mut self.block_engine {
            engine.update_section_status(section, is_empty);
        }
        if let Some(engine) = &mut self.sky_engine {
            engine.update_section_status(section, is_empty);
        }
    }

    fn set_light_enabled(&mut self, chunk: ChunkPos, enabled: bool) {
        if let Some(engine) = &mut self.block_engine {
            engine.set_light_enabled(chunk, enabled);
        }
        if let Some(engine) = &mut self.sky_engine {
            engine.set_light_enabled(chunk, enabled);
        }
    }

    fn propagate_light_sources(&mut self, chunk: ChunkPos) {
        if let Some(engine) = &mut self.block_engine {
            engine.propagate_light_sources(chunk);
        }
        if let Some(engine) = &mut self.sky_engine {
            engine.propagate_light_sources(chunk);
        }
    }
}
