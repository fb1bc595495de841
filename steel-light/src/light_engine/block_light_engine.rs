//! Light emitted by blocks, spreading evenly in all six directions.

use steel_utils::{BlockPos, BlockStateId, ChunkPos, SectionPos};

use super::{
    base::{LightEngine, LightLayerEngine},
    direction::Direction,
    queue_entry::QueueEntry,
};
use crate::storage::BlockStorage;

/// Block light behaviour for [`LightEngine`].
pub struct BlockLight;

pub type BlockLightEngine = LightEngine<BlockLight>;

impl BlockLight {
    /// Emission at `pos`; sources only count once their chunk has light enabled.
    fn emission(engine: &LightEngine<Self>, pos: i64, state: BlockStateId) -> u8 {
        let emission = engine.model.light_emission(state);
        if emission > 0
            && engine
                .storage
                .light_on_in_section(SectionPos::block_to_section(pos))
        {
            emission
        } else {
            0
        }
    }
}

impl LightLayerEngine for BlockLight {
    type Storage = BlockStorage;

    fn check_node(engine: &mut LightEngine<Self>, pos: i64) {
        if !engine
            .storage
            .storing_light_for_section(SectionPos::block_to_section(pos))
        {
            return;
        }

        let state = engine.get_state(pos);
        let emission = Self::emission(engine, pos, state);
        let stored = engine.storage.get_stored_level(pos);
        if emission < stored {
            engine.storage.set_stored_level(pos, 0);
            engine.enqueue_decrease(pos, QueueEntry::decrease_all_directions(stored));
        } else {
            engine.enqueue_decrease(pos, QueueEntry::PULL_LIGHT_IN);
        }

        if emission > 0 {
            let empty = engine.is_empty_shape(state);
            engine.enqueue_increase(pos, QueueEntry::increase_from_emission(emission, empty));
        }
    }

    fn propagate_increase(engine: &mut LightEngine<Self>, pos: i64, entry: QueueEntry, level: u8) {
        engine.spread_increase(pos, entry, level, |_, _, _, _| {});
    }

    fn propagate_decrease(engine: &mut LightEngine<Self>, pos: i64, entry: QueueEntry) {
        let level = entry.level();
        for direction in Direction::ALL {
            if !entry.should_propagate(direction) {
                continue;
            }
            let neighbor = direction.relative_long(pos);
            if !engine
                .storage
                .storing_light_for_section(SectionPos::block_to_section(neighbor))
            {
                continue;
            }

            let current = engine.storage.get_stored_level(neighbor);
            if current == 0 {
                continue;
            }
            if current < level {
                let state = engine.get_state(neighbor);
                let emission = Self::emission(engine, neighbor, state);
                engine.storage.set_stored_level(neighbor, 0);
                if emission < current {
                    engine.enqueue_decrease(
                        neighbor,
                        QueueEntry::decrease_skip_one_direction(current, direction.opposite()),
                    );
                }
                if emission > 0 {
                    let empty = engine.is_empty_shape(state);
                    engine.enqueue_increase(
                        neighbor,
                        QueueEntry::increase_from_emission(emission, empty),
                    );
                }
            } else {
                // Lit from elsewhere: push that light back towards the cleared node.
                engine.enqueue_increase(
                    neighbor,
                    QueueEntry::increase_only_one_direction(current, false, direction.opposite()),
                );
            }
        }
    }

    fn propagate_light_sources(engine: &mut LightEngine<Self>, chunk: ChunkPos) {
        Self::set_light_enabled(engine, chunk, true);
        let Some(light_chunk) = engine
            .chunk_source
            .chunk_for_lighting(chunk.0.x, chunk.0.y)
        else {
            return;
        };

        let model = engine.model.clone();
        let mut sources = Vec::new();
        light_chunk.find_block_light_sources(model.as_ref(), &mut |pos: BlockPos, state| {
            sources.push((pos, state));
        });
        for (pos, state) in sources {
            let entry = QueueEntry::increase_from_emission(
                model.light_emission(state),
                model.is_empty_shape(state),
            );
            engine.enqueue_increase(pos.as_long(), entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{num::NonZeroUsize, sync::Arc};

    use steel_utils::BlockPos;

    use super::*;
    use crate::{
        config::LightEngineConfig,
        light_engine::{LevelLightEngine, LightEventListener, LightLayer},
        testing::{self, TestBlocks, TestWorld},
    };

    fn block_only() -> LightEngineConfig {
        LightEngineConfig {
            sky_light: false,
            ..LightEngineConfig::default()
        }
    }

    fn lit(world: &Arc<TestWorld>) -> LevelLightEngine {
        let mut engine = testing::level_engine(world, &block_only());
        testing::light_world(world, &mut engine);
        engine
    }

    fn light(engine: &LevelLightEngine, x: i32, y: i32, z: i32) -> u8 {
        engine
            .layer_listener(LightLayer::Block)
            .get_light_value(BlockPos::new(x, y, z))
    }

    #[test]
    fn test_lone_source_falls_off_by_distance() {
        let world = Arc::new(TestWorld::new(0, 256, 1));
        world.put_block(BlockPos::new(8, 64, 8), TestBlocks::TORCH);
        let engine = lit(&world);

        assert_eq!(light(&engine, 8, 64, 8), 14);
        assert_eq!(light(&engine, 11, 64, 8), 11);
        assert_eq!(light(&engine, 8, 66, 6), 10);
        assert_eq!(light(&engine, 8, 64, 21), 1);
        assert_eq!(light(&engine, 8, 64, 22), 0);
        // Across the chunk border.
        assert_eq!(light(&engine, -3, 64, 8), 3);
    }

    #[test]
    fn test_second_run_is_idle() {
        let world = Arc::new(TestWorld::new(0, 256, 1));
        world.put_block(BlockPos::new(3, 40, 3), TestBlocks::TORCH);
        let mut engine = lit(&world);
        assert!(!engine.has_light_work());
        assert_eq!(engine.run_light_updates(), 0);
    }

    #[test]
    fn test_budget_does_not_change_result() {
        let world = Arc::new(TestWorld::new(0, 256, 1));
        world.put_block(BlockPos::new(8, 64, 8), TestBlocks::TORCH);
        world.put_block(BlockPos::new(9, 64, 8), TestBlocks::STONE);
        world.put_block(BlockPos::new(2, 70, 12), TestBlocks::TORCH);
        let full = lit(&world);

        let mut budgeted = testing::level_engine(&world, &block_only());
        testing::prepare_world(&world, &mut budgeted);
        let budget = NonZeroUsize::new(64);
        let mut rounds = 0;
        while budgeted.has_light_work() {
            budgeted.run_light_updates_with_budget(budget);
            rounds += 1;
        }
        assert!(rounds > 1);

        for x in -4..20 {
            for y in 56..76 {
                for z in -4..20 {
                    assert_eq!(
                        light(&budgeted, x, y, z),
                        light(&full, x, y, z),
                        "mismatch at {x} {y} {z}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_transparent_block_still_costs_one_level() {
        let world = Arc::new(TestWorld::new(0, 256, 1));
        world.put_block(BlockPos::new(8, 64, 8), TestBlocks::TORCH);
        world.put_block(BlockPos::new(9, 64, 8), TestBlocks::GLASS);
        world.put_block(BlockPos::new(8, 64, 9), TestBlocks::STONE);
        let engine = lit(&world);

        assert_eq!(light(&engine, 9, 64, 8), 13);
        assert_eq!(light(&engine, 10, 64, 8), 12);
        assert_eq!(light(&engine, 8, 64, 9), 0);
        assert_eq!(light(&engine, 8, 64, 10), 10);
    }

    #[test]
    fn test_sealed_box() {
        let world = Arc::new(TestWorld::new(0, 256, 1));
        let center = BlockPos::new(8, 64, 8);
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    world.put_block(center.offset(dx, dy, dz), TestBlocks::STONE);
                }
            }
        }
        world.put_block(center, TestBlocks::TORCH);
        let mut engine = lit(&world);

        assert_eq!(light(&engine, 8, 64, 8), 14);
        assert_eq!(light(&engine, 8, 65, 8), 0);
        assert_eq!(light(&engine, 8, 66, 8), 0);
        assert_eq!(light(&engine, 10, 64, 8), 0);

        testing::set_block(&world, &mut engine, center, TestBlocks::AIR);
        engine.run_light_updates();
        assert_eq!(light(&engine, 8, 64, 8), 0);
    }

    #[test]
    fn test_removing_one_of_two_sources() {
        let world = Arc::new(TestWorld::new(0, 256, 1));
        world.put_block(BlockPos::new(4, 64, 8), TestBlocks::TORCH);
        world.put_block(BlockPos::new(12, 64, 8), TestBlocks::TORCH);
        let mut engine = lit(&world);
        assert_eq!(light(&engine, 4, 64, 8), 14);
        assert_eq!(light(&engine, 8, 64, 8), 10);

        testing::set_block(&world, &mut engine, BlockPos::new(4, 64, 8), TestBlocks::AIR);
        engine.run_light_updates();
        assert_eq!(light(&engine, 4, 64, 8), 6);
        assert_eq!(light(&engine, 0, 64, 8), 2);
        assert_eq!(light(&engine, 12, 64, 8), 14);

        testing::set_block(&world, &mut engine, BlockPos::new(12, 64, 8), TestBlocks::AIR);
        engine.run_light_updates();
        assert_eq!(light(&engine, 12, 64, 8), 0);
        assert_eq!(light(&engine, 8, 64, 8), 0);
    }

    #[test]
    fn test_placed_block_casts_shadow() {
        let world = Arc::new(TestWorld::new(0, 256, 1));
        world.put_block(BlockPos::new(8, 64, 8), TestBlocks::TORCH);
        let mut engine = lit(&world);
        assert_eq!(light(&engine, 10, 64, 8), 12);

        testing::set_block(&world, &mut engine, BlockPos::new(9, 64, 8), TestBlocks::STONE);
        engine.run_light_updates();
        assert_eq!(light(&engine, 9, 64, 8), 0);
        assert_eq!(light(&engine, 10, 64, 8), 10);
    }

    #[test]
    fn test_slab_bottom_face_blocks_light() {
        let world = Arc::new(TestWorld::new(0, 256, 1));
        world.put_block(BlockPos::new(8, 65, 8), TestBlocks::TORCH);
        world.put_block(BlockPos::new(8, 64, 8), TestBlocks::BOTTOM_SLAB);
        let engine = lit(&world);

        // The slab's open top lets light in; its full bottom keeps it from going straight down.
        assert_eq!(light(&engine, 8, 64, 8), 13);
        assert_eq!(light(&engine, 8, 63, 8), 10);
    }

    #[test]
    fn test_sources_wait_for_light_to_be_enabled() {
        let world = Arc::new(TestWorld::new(0, 256, 1));
        let mut engine = testing::level_engine(&world, &block_only());
        let pos = BlockPos::new(8, 64, 8);
        testing::set_block(&world, &mut engine, pos, TestBlocks::TORCH);
        engine.run_light_updates();
        assert_eq!(light(&engine, 8, 64, 8), 0);

        engine.set_light_enabled(ChunkPos::new(0, 0), true);
        engine.check_block(pos);
        engine.run_light_updates();
        assert_eq!(light(&engine, 8, 64, 8), 14);
    }
}
