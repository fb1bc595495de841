use steel_utils::SectionPos;

use super::{DataLayerStorageMap, LayerLightSectionStorage, StorageKind, relative};
use crate::light_engine::LightLayer;

/// Block light: untracked sections are dark.
pub struct BlockStorage;

pub type BlockLightSectionStorage = LayerLightSectionStorage<BlockStorage>;

impl StorageKind for BlockStorage {
    type Columns = ();

    const LAYER: LightLayer = LightLayer::Block;

    fn light_value(map: &DataLayerStorageMap<()>, pos: i64) -> u8 {
        let (x, y, z) = relative(pos);
        map.layer(SectionPos::block_to_section(pos))
            .map_or(0, |layer| layer.get(x, y, z))
    }
}
