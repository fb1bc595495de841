use std::sync::Arc;

use rustc_hash::FxHashMap;
use steel_utils::{BlockPos, SectionPos};

use super::{DataLayerStorageMap, LayerLightSectionStorage, StorageKind, relative};
use crate::{data_layer::DataLayer, light_engine::LightLayer};

/// Per-column bookkeeping of the sky layer.
#[derive(Debug, Clone)]
pub struct SkyColumns {
    /// Lowest section y that has ever been tracked.
    current_lowest_y: i32,
    /// One above the highest tracked section of each column.
    top_sections: FxHashMap<i64, i32>,
}

impl Default for SkyColumns {
    fn default() -> Self {
        Self {
            current_lowest_y: i32::MAX,
            top_sections: FxHashMap::default(),
        }
    }
}

impl SkyColumns {
    /// One above the highest tracked section, or the lowest tracked y when the
    /// column has nothing.
    #[must_use]
    pub fn top(&self, column: i64) -> i32 {
        self.top_sections
            .get(&column)
            .copied()
            .unwrap_or(self.current_lowest_y)
    }

    #[must_use]
    pub const fn current_lowest_y(&self) -> i32 {
        self.current_lowest_y
    }

    fn is_below_top(&self, section: i64) -> Option<i32> {
        let top = self.top(SectionPos::zero_node(section));
        (top != self.current_lowest_y && SectionPos::unpack_y(section) < top).then_some(top)
    }
}

/// Sky light: sections above the top of a column are fully lit, untracked gaps
/// below it take the light of the first tracked section above.
pub struct SkyStorage;

pub type SkyLightSectionStorage = LayerLightSectionStorage<SkyStorage>;

impl StorageKind for SkyStorage {
    type Columns = SkyColumns;

    const LAYER: LightLayer = LightLayer::Sky;

    fn light_value(map: &DataLayerStorageMap<SkyColumns>, pos: i64) -> u8 {
        let mut section = SectionPos::block_to_section(pos);
        let Some(top) = map.columns.is_below_top(section) else {
            return 15;
        };

        let (x, y, z) = relative(pos);
        if let Some(layer) = map.layer(section) {
            return layer.get(x, y, z);
        }
        let mut section_y = SectionPos::unpack_y(section);
        loop {
            section_y += 1;
            if section_y >= top {
                return 15;
            }
            section = SectionPos::offset_long(section, 0, 1, 0);
            if let Some(layer) = map.layer(section) {
                return layer.get(x, 0, z);
            }
        }
    }

    fn create_data_layer(storage: &SkyLightSectionStorage, section: i64) -> Arc<DataLayer> {
        if let Some(layer) = storage.queued_layer(section) {
            return layer;
        }

        let data = &storage.updating_section_data;
        if let Some(top) = data.columns.is_below_top(section) {
            let mut above = SectionPos::offset_long(section, 0, 1, 0);
            while SectionPos::unpack_y(above) < top {
                if let Some(layer) = data.layer(above) {
                    return Arc::new(layer.repeat_first_layer());
                }
                above = SectionPos::offset_long(above, 0, 1, 0);
            }
            log::warn!(
                "Sky column {} claims data up to section {top} but none was found",
                SectionPos::from_long(section)
            );
            return Arc::new(DataLayer::new());
        }

        if storage.light_on_in_section(section) {
            Arc::new(DataLayer::filled(15))
        } else {
            Arc::new(DataLayer::new())
        }
    }

    fn on_node_added(storage: &mut SkyLightSectionStorage, section: i64) {
        let columns = &mut storage.updating_section_data.columns;
        let y = SectionPos::unpack_y(section);
        if columns.current_lowest_y > y {
            columns.current_lowest_y = y;
        }
        let column = SectionPos::zero_node(section);
        if columns.top(column) < y + 1 {
            columns.top_sections.insert(column, y + 1);
        }
    }

    fn on_node_removed(storage: &mut SkyLightSectionStorage, section: i64) {
        let column = SectionPos::zero_node(section);
        let mut y = SectionPos::unpack_y(section);
        if storage.updating_section_data.columns.top(column) != y + 1 {
            return;
        }

        let mut below = section;
        while !storage.storing_light_for_section(below) && storage.has_light_data_at_or_below(y) {
            y -= 1;
            below = SectionPos::offset_long(below, 0, -1, 0);
        }

        let storing = storage.storing_light_for_section(below);
        let columns = &mut storage.updating_section_data.columns;
        if storing {
            columns.top_sections.insert(column, y + 1);
        } else {
            columns.top_sections.remove(&column);
        }
    }
}

impl LayerLightSectionStorage<SkyStorage> {
    /// One above the highest tracked section of the column.
    #[must_use]
    pub fn top_section_y(&self, column: i64) -> i32 {
        self.updating_section_data.columns.top(column)
    }

    #[must_use]
    pub fn bottom_section_y(&self) -> i32 {
        self.updating_section_data.columns.current_lowest_y
    }

    #[must_use]
    pub fn has_light_data_at_or_below(&self, section_y: i32) -> bool {
        section_y >= self.updating_section_data.columns.current_lowest_y
    }

    /// Whether nothing in the column is tracked at or above this section.
    #[must_use]
    pub fn is_above_data(&self, section: i64) -> bool {
        self.updating_section_data.columns.is_below_top(section).is_none()
    }

    /// Sky level the engine is working with, following the same rules readers use.
    #[cfg(test)]
    pub(crate) fn get_updating_light_value(&self, pos: i64) -> u8 {
        let section = SectionPos::block_to_section(pos);
        if self.is_above_data(section) && !self.light_on_in_section(section) {
            return 0;
        }
        SkyStorage::light_value(&self.updating_section_data, pos)
    }

    /// Published sky light at a block position.
    #[must_use]
    pub fn sky_light_at(&self, pos: BlockPos) -> u8 {
        self.get_light_value(pos.as_long())
    }
}
