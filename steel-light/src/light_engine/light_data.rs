//! Per-chunk light snapshot in the shape clients expect it.

use steel_utils::{ChunkPos, SectionPos, codec::BitSet};

use super::{LightLayer, level_light_engine::LevelLightEngine};

/// Light of every section in a chunk column, split into bitmasks and raw arrays.
///
/// Bit `i` of each mask refers to section `min_light_section + i`. A section is either
/// in the data mask with a 2048 byte array, in the empty mask when it is known to be
/// dark, or in neither when the layer has nothing for it.
#[derive(Debug, Clone)]
pub struct ChunkLightData {
    pub sky_y_mask: BitSet,
    pub block_y_mask: BitSet,
    pub empty_sky_y_mask: BitSet,
    pub empty_block_y_mask: BitSet,
    pub sky_updates: Vec<Vec<u8>>,
    pub block_updates: Vec<Vec<u8>>,
}

struct LayerMasks<'a> {
    mask: &'a mut BitSet,
    empty_mask: &'a mut BitSet,
    updates: &'a mut Vec<Vec<u8>>,
}

impl ChunkLightData {
    /// Snapshots the visible light of `chunk`.
    #[must_use]
    pub fn new(engine: &LevelLightEngine, chunk: ChunkPos) -> Self {
        let count = usize::try_from(engine.light_section_count()).unwrap_or(0);
        let mut data = Self {
            sky_y_mask: BitSet::new(count),
            block_y_mask: BitSet::new(count),
            empty_sky_y_mask: BitSet::new(count),
            empty_block_y_mask: BitSet::new(count),
            sky_updates: Vec::new(),
            block_updates: Vec::new(),
        };

        for (index, section_y) in (engine.min_light_section()..engine.max_light_section()).enumerate() {
            let section = SectionPos::of_chunk(chunk, section_y);
            prepare_section_data(
                engine,
                LightLayer::Sky,
                section,
                index,
                LayerMasks {
                    mask: &mut data.sky_y_mask,
                    empty_mask: &mut data.empty_sky_y_mask,
                    updates: &mut data.sky_updates,
                },
            );
            prepare_section_data(
                engine,
                LightLayer::Block,
                section,
                index,
                LayerMasks {
                    mask: &mut data.block_y_mask,
                    empty_mask: &mut data.empty_block_y_mask,
                    updates: &mut data.block_updates,
                },
            );
        }
        data
    }

    /// Whether there is nothing to send for either layer.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sky_y_mask.is_empty()
            && self.block_y_mask.is_empty()
            && self.empty_sky_y_mask.is_empty()
            && self.empty_block_y_mask.is_empty()
    }
}

fn prepare_section_data(
    engine: &LevelLightEngine,
    layer: LightLayer,
    section: SectionPos,
    index: usize,
    masks: LayerMasks<'_>,
) {
    let Some(data) = engine.layer_listener(layer).get_data_layer_data(section) else {
        return;
    };
    if data.is_definitely_filled_with(0) {
        masks.empty_mask.set(index, true);
    } else {
        masks.mask.set(index, true);
        masks.updates.push(data.to_packet_data());
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use steel_utils::{BlockPos, ChunkPos};

    use super::*;
    use crate::{
        config::LightEngineConfig,
        testing::{self, TestBlocks, TestWorld},
    };

    #[test]
    fn test_untracked_chunk_is_empty() {
        let world = Arc::new(TestWorld::new(-64, 384, 0));
        let engine = testing::level_engine(&world, &LightEngineConfig::default());
        let data = ChunkLightData::new(&engine, ChunkPos::new(0, 0));
        assert!(data.is_empty());
        assert!(data.sky_updates.is_empty());
        assert!(data.block_updates.is_empty());
    }

    #[test]
    fn test_masks_follow_tracked_sections() {
        let world = Arc::new(TestWorld::new(-64, 384, 1));
        world.put_block(BlockPos::new(3, 60, 3), TestBlocks::STONE);
        let mut engine = testing::level_engine(&world, &LightEngineConfig::default());
        testing::light_world(&world, &mut engine);

        let data = ChunkLightData::new(&engine, ChunkPos::new(0, 0));
        // Section 3 holds the stone; sections 2 to 4 carry layers, at mask indices 7 to 9.
        for index in 7..=9 {
            assert!(data.sky_y_mask.get(index), "sky section at index {index}");
            assert!(data.empty_block_y_mask.get(index), "block section at index {index}");
        }
        assert_eq!(data.sky_y_mask.count_ones(), 3);
        assert!(data.block_y_mask.is_empty());
        assert!(!data.sky_y_mask.get(6));
        assert_eq!(data.sky_updates.len(), 3);
        assert!(data.sky_updates.iter().all(|array| array.len() == 2048));
        assert!(data.block_updates.is_empty());
    }

    #[test]
    fn test_lit_sections_carry_block_arrays() {
        let world = Arc::new(TestWorld::new(-64, 384, 1));
        world.put_block(BlockPos::new(8, 40, 8), TestBlocks::TORCH);
        let config = LightEngineConfig {
            sky_light: false,
            ..LightEngineConfig::default()
        };
        let mut engine = testing::level_engine(&world, &config);
        testing::light_world(&world, &mut engine);

        let data = ChunkLightData::new(&engine, ChunkPos::new(0, 0));
        assert!(data.sky_y_mask.is_empty());
        assert!(data.empty_sky_y_mask.is_empty());
        // The torch sits in section 2 at index 7 and lights sections 1 to 3.
        assert!(data.block_y_mask.get(7));
        assert!(data.block_y_mask.get(6));
        assert!(data.block_y_mask.get(8));
        assert_eq!(data.block_updates.len(), 3);
        // Torch light 14 at (8, 40, 8): y = 8 within the section.
        let array = &data.block_updates[1];
        let index = 8 * 256 + 8 * 16 + 8;
        let nibble = (array[index >> 1] >> ((index & 1) * 4)) & 0xF;
        assert_eq!(nibble, 14);
    }
}
