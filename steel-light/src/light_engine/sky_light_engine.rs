//! Sky light engine.
//!
//! Every block at or above a column's lowest sky source holds full-strength light.
//! From there light spreads like block light, except that runs of untracked air
//! sections below a section edge are filled or cleared in one step instead of
//! one block at a time.

use std::sync::Arc;

use parking_lot::RwLock;
use steel_utils::{BlockPos, ChunkPos, SectionPos};

use super::{
    base::{LightEngine, LightLayerEngine, MAX_LEVEL},
    direction::{Direction, DirectionSet},
    queue_entry::QueueEntry,
};
use crate::{
    sky_light_sources::{ChunkSkyLightSources, NEGATIVE_INFINITY},
    storage::SkyStorage,
};

/// Sky light behaviour for [`LightEngine`].
pub struct SkyLight;

pub type SkyLightEngine = LightEngine<SkyLight>;

const EMPTY_SOURCES: [i32; 256] = [NEGATIVE_INFINITY; 256];

impl SkyLight {
    fn chunk_sources(
        engine: &mut LightEngine<Self>,
        chunk_x: i32,
        chunk_z: i32,
    ) -> Option<Arc<RwLock<ChunkSkyLightSources>>> {
        engine
            .chunk(chunk_x, chunk_z)
            .map(|chunk| chunk.sky_light_sources())
    }

    /// Lowest source Y of every column of a chunk; open all the way down when the
    /// chunk is not available.
    fn source_ys(engine: &mut LightEngine<Self>, chunk_x: i32, chunk_z: i32) -> [i32; 256] {
        Self::chunk_sources(engine, chunk_x, chunk_z)
            .map_or(EMPTY_SOURCES, |sources| sources.read().lowest_source_ys())
    }

    fn lowest_source_y(engine: &mut LightEngine<Self>, x: i32, z: i32, default: i32) -> i32 {
        Self::chunk_sources(
            engine,
            SectionPos::block_to_section_coord(x),
            SectionPos::block_to_section_coord(z),
        )
        .map_or(default, |sources| sources.read().get_lowest_source_y(x, z))
    }

    fn update_sources_in_column(engine: &mut LightEngine<Self>, x: i32, z: i32, lowest_source_y: i32) {
        let bottom_y = SectionPos::section_to_block_coord(engine.storage.bottom_section_y());
        Self::remove_sources_below(engine, x, z, lowest_source_y, bottom_y);
        Self::add_sources_above(engine, x, z, lowest_source_y, bottom_y);
    }

    fn remove_sources_below(
        engine: &mut LightEngine<Self>,
        x: i32,
        z: i32,
        lowest_source_y: i32,
        bottom_y: i32,
    ) {
        if lowest_source_y <= bottom_y {
            return;
        }
        let section_x = SectionPos::block_to_section_coord(x);
        let section_z = SectionPos::block_to_section_coord(z);
        let top_y = lowest_source_y - 1;

        let mut section_y = SectionPos::block_to_section_coord(top_y);
        while engine.storage.has_light_data_at_or_below(section_y) {
            if engine
                .storage
                .storing_light_for_section(SectionPos::as_long_xyz(section_x, section_y, section_z))
            {
                let min_y = SectionPos::section_to_block_coord(section_y);
                let mut y = (min_y + 15).min(top_y);
                while y >= min_y {
                    let pos = BlockPos::as_long_xyz(x, y, z);
                    if engine.storage.get_stored_level(pos) != MAX_LEVEL {
                        return;
                    }
                    engine.storage.set_stored_level(pos, 0);
                    let entry = if y == top_y {
                        QueueEntry::REMOVE_TOP_SKY_SOURCE
                    } else {
                        QueueEntry::REMOVE_SKY_SOURCE
                    };
                    engine.enqueue_decrease(pos, entry);
                    y -= 1;
                }
            }
            section_y -= 1;
        }
    }

    fn add_sources_above(
        engine: &mut LightEngine<Self>,
        x: i32,
        z: i32,
        lowest_source_y: i32,
        bottom_y: i32,
    ) {
        let neighbor_max = [(x - 1, z), (x + 1, z), (x, z - 1), (x, z + 1)]
            .into_iter()
            .map(|(nx, nz)| Self::lowest_source_y(engine, nx, nz, NEGATIVE_INFINITY))
            .max()
            .unwrap_or(NEGATIVE_INFINITY);
        let start_y = lowest_source_y.max(bottom_y);

        let mut section = SectionPos::as_long_xyz(
            SectionPos::block_to_section_coord(x),
            SectionPos::block_to_section_coord(start_y),
            SectionPos::block_to_section_coord(z),
        );
        while !engine.storage.is_above_data(section) {
            if engine.storage.storing_light_for_section(section) {
                let min_y = SectionPos::section_to_block_coord(SectionPos::unpack_y(section));
                for y in min_y.max(start_y)..=min_y + 15 {
                    let pos = BlockPos::as_long_xyz(x, y, z);
                    if engine.storage.get_stored_level(pos) == MAX_LEVEL {
                        return;
                    }
                    engine.storage.set_stored_level(pos, MAX_LEVEL);
                    if y < neighbor_max || y == lowest_source_y {
                        engine.enqueue_increase(pos, QueueEntry::ADD_SKY_SOURCE);
                    }
                }
            }
            section = SectionPos::offset_long(section, 0, 1, 0);
        }
    }

    /// Number of untracked sections directly below `pos`, if `pos` sits on the
    /// bottom plane and outer ring of its section. Zero otherwise.
    fn count_empty_sections_below_if_at_border(engine: &LightEngine<Self>, pos: i64) -> i32 {
        let y = BlockPos::unpack_y(pos);
        if SectionPos::section_relative(y) != 0 {
            return 0;
        }
        let x = BlockPos::unpack_x(pos);
        let z = BlockPos::unpack_z(pos);
        let rel_x = SectionPos::section_relative(x);
        let rel_z = SectionPos::section_relative(z);
        if rel_x != 0 && rel_x != 15 && rel_z != 0 && rel_z != 15 {
            return 0;
        }

        let section_x = SectionPos::block_to_section_coord(x);
        let section_y = SectionPos::block_to_section_coord(y);
        let section_z = SectionPos::block_to_section_coord(z);
        let mut count = 0;
        while !engine.storage.storing_light_for_section(SectionPos::as_long_xyz(
            section_x,
            section_y - count - 1,
            section_z,
        )) && engine.storage.has_light_data_at_or_below(section_y - count - 1)
        {
            count += 1;
        }
        count
    }

    /// Applies a change that just crossed into a new column at a section edge to
    /// every tracked section in the run of `empty_sections` below it.
    fn propagate_from_empty_sections(
        engine: &mut LightEngine<Self>,
        pos: i64,
        direction: Direction,
        level: u8,
        increase: bool,
        empty_sections: i32,
    ) {
        if empty_sections == 0 {
            return;
        }
        let x = BlockPos::unpack_x(pos);
        let z = BlockPos::unpack_z(pos);
        if !crossed_section_edge(
            direction,
            SectionPos::section_relative(x),
            SectionPos::section_relative(z),
        ) {
            return;
        }

        let section_x = SectionPos::block_to_section_coord(x);
        let section_z = SectionPos::block_to_section_coord(z);
        let first = SectionPos::block_to_section_coord(BlockPos::unpack_y(pos)) - 1;
        let last = first - empty_sections + 1;
        for section_y in (last..=first).rev() {
            if !engine
                .storage
                .storing_light_for_section(SectionPos::as_long_xyz(section_x, section_y, section_z))
            {
                continue;
            }
            let min_y = SectionPos::section_to_block_coord(section_y);
            for y in (min_y..min_y + 16).rev() {
                let target = BlockPos::as_long_xyz(x, y, z);
                if increase {
                    engine.storage.set_stored_level(target, level);
                    if level > 1 {
                        engine.enqueue_increase(
                            target,
                            QueueEntry::increase_skip_one_direction(level, true, direction.opposite()),
                        );
                    }
                } else {
                    engine.storage.set_stored_level(target, 0);
                    engine.enqueue_decrease(
                        target,
                        QueueEntry::decrease_skip_one_direction(level, direction.opposite()),
                    );
                }
            }
        }
    }
}

/// Whether a step in `direction` landed on the near edge of a new section.
const fn crossed_section_edge(direction: Direction, rel_x: i32, rel_z: i32) -> bool {
    match direction {
        Direction::North => rel_z == 15,
        Direction::South => rel_z == 0,
        Direction::West => rel_x == 15,
        Direction::East => rel_x == 0,
        Direction::Down | Direction::Up => false,
    }
}

impl LightLayerEngine for SkyLight {
    type Storage = SkyStorage;

    fn check_node(engine: &mut LightEngine<Self>, pos: i64) {
        let x = BlockPos::unpack_x(pos);
        let y = BlockPos::unpack_y(pos);
        let z = BlockPos::unpack_z(pos);
        let section = SectionPos::block_to_section(pos);

        let lowest_source_y = if engine.storage.light_on_in_section(section) {
            Self::lowest_source_y(engine, x, z, i32::MAX)
        } else {
            i32::MAX
        };
        if lowest_source_y != i32::MAX {
            Self::update_sources_in_column(engine, x, z, lowest_source_y);
        }

        if !engine.storage.storing_light_for_section(section) {
            return;
        }
        if y >= lowest_source_y {
            engine.enqueue_decrease(pos, QueueEntry::REMOVE_SKY_SOURCE);
            engine.enqueue_increase(pos, QueueEntry::ADD_SKY_SOURCE);
        } else {
            let stored = engine.storage.get_stored_level(pos);
            if stored > 0 {
                engine.storage.set_stored_level(pos, 0);
                engine.enqueue_decrease(pos, QueueEntry::decrease_all_directions(stored));
            } else {
                engine.enqueue_decrease(pos, QueueEntry::PULL_LIGHT_IN);
            }
        }
    }

    fn propagate_increase(engine: &mut LightEngine<Self>, pos: i64, entry: QueueEntry, level: u8) {
        let empty_sections = Self::count_empty_sections_below_if_at_border(engine, pos);
        engine.spread_increase(pos, entry, level, |engine, neighbor, direction, new_level| {
            Self::propagate_from_empty_sections(
                engine,
                neighbor,
                direction,
                new_level,
                true,
                empty_sections,
            );
        });
    }

    fn propagate_decrease(engine: &mut LightEngine<Self>, pos: i64, entry: QueueEntry) {
        let empty_sections = Self::count_empty_sections_below_if_at_border(engine, pos);
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
                engine.storage.set_stored_level(neighbor, 0);
                engine.enqueue_decrease(
                    neighbor,
                    QueueEntry::decrease_skip_one_direction(current, direction.opposite()),
                );
                Self::propagate_from_empty_sections(
                    engine,
                    neighbor,
                    direction,
                    current,
                    false,
                    empty_sections,
                );
            } else {
                engine.enqueue_increase(
                    neighbor,
                    QueueEntry::increase_only_one_direction(current, false, direction.opposite()),
                );
            }
        }
    }

    /// Pre-fills the untouched sections above every source of the chunk with full light.
    fn set_light_enabled(engine: &mut LightEngine<Self>, chunk: ChunkPos, enabled: bool) {
        let (chunk_x, chunk_z) = (chunk.0.x, chunk.0.y);
        let column = SectionPos::column_key(chunk_x, chunk_z);
        engine.storage.set_light_enabled(column, enabled);
        if !enabled {
            return;
        }

        let highest = Self::chunk_sources(engine, chunk_x, chunk_z).map_or(NEGATIVE_INFINITY, |sources| {
            sources.read().get_highest_lowest_source_y()
        });
        let first_open_section = SectionPos::block_to_section_coord(highest.saturating_sub(1)) + 1;
        let top = engine.storage.top_section_y(column);
        let bottom = engine.storage.bottom_section_y().max(first_open_section);
        for section_y in (bottom..top).rev() {
            let section = SectionPos::as_long_xyz(chunk_x, section_y, chunk_z);
            if let Some(layer) = engine.storage.get_data_layer_to_write(section)
                && layer.is_definitely_filled_with(0)
            {
                layer.fill(MAX_LEVEL);
            }
        }
    }

    /// Writes full light from the top of the column down to each column's lowest
    /// source, queueing only the blocks whose light can still spread somewhere.
    fn propagate_light_sources(engine: &mut LightEngine<Self>, chunk: ChunkPos) {
        let (chunk_x, chunk_z) = (chunk.0.x, chunk.0.y);
        let column = SectionPos::column_key(chunk_x, chunk_z);
        engine.storage.set_light_enabled(column, true);

        let center = Self::source_ys(engine, chunk_x, chunk_z);
        let north = Self::source_ys(engine, chunk_x, chunk_z - 1);
        let south = Self::source_ys(engine, chunk_x, chunk_z + 1);
        let west = Self::source_ys(engine, chunk_x - 1, chunk_z);
        let east = Self::source_ys(engine, chunk_x + 1, chunk_z);

        let top = engine.storage.top_section_y(column);
        let bottom = engine.storage.bottom_section_y();
        let min_x = chunk.min_block_x();
        let min_z = chunk.min_block_z();

        let mut section_y = top - 1;
        while section_y >= bottom {
            let section = SectionPos::as_long_xyz(chunk_x, section_y, chunk_z);
            let Some(layer) = engine.storage.get_data_layer_to_write(section) else {
                section_y -= 1;
                continue;
            };

            let section_min_y = SectionPos::section_to_block_coord(section_y);
            let section_max_y = section_min_y + 15;
            let mut continues_below = false;
            for z in 0..16 {
                for x in 0..16 {
                    let lowest = center[x + z * 16];
                    if lowest > section_max_y {
                        continue;
                    }
                    let north_y = if z == 0 { north[x + 15 * 16] } else { center[x + (z - 1) * 16] };
                    let south_y = if z == 15 { south[x] } else { center[x + (z + 1) * 16] };
                    let west_y = if x == 0 { west[15 + z * 16] } else { center[x - 1 + z * 16] };
                    let east_y = if x == 15 { east[z * 16] } else { center[x + 1 + z * 16] };
                    let neighbor_max = north_y.max(south_y).max(west_y).max(east_y);

                    let mut y = section_max_y;
                    while y >= section_min_y.max(lowest) {
                        layer.set(x, SectionPos::section_relative(y) as usize, z, MAX_LEVEL);
                        if y == lowest || y < neighbor_max {
                            let mut directions = DirectionSet::NONE;
                            for (open, direction) in [
                                (y == lowest, Direction::Down),
                                (y < north_y, Direction::North),
                                (y < south_y, Direction::South),
                                (y < west_y, Direction::West),
                                (y < east_y, Direction::East),
                            ] {
                                if open {
                                    directions = directions.with(direction);
                                }
                            }
                            engine.increase_queue.enqueue(
                                BlockPos::as_long_xyz(min_x + x as i32, y, min_z + z as i32),
                                QueueEntry::increase_sky_source_in_directions(directions),
                            );
                        }
                        y -= 1;
                    }
                    if lowest < section_min_y {
                        continues_below = true;
                    }
                }
            }
            engine.storage.mark_section_and_neighbors_as_affected(section);

            if !continues_below {
                break;
            }
            section_y -= 1;
        }
    }
}
