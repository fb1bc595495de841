//! Packed propagation entries for the light FIFOs.
//!
//! An entry travels with a block position through one batch and is never stored:
//! - Bits 0-3: light level (0-15)
//! - Bits 4-9: faces the update still has to cross, one bit per [`Direction`] ordinal
//! - Bit 10: the source block has an empty occlusion shape
//! - Bit 11: the level comes from the block's own emission

use super::direction::{Direction, DirectionSet};

/// A light level plus the metadata needed to continue propagating it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueEntry(u64);

impl QueueEntry {
    const LEVEL_MASK: u64 = 0x0F;
    const DIRECTIONS_SHIFT: u32 = 4;
    const EMPTY_SHAPE_FLAG: u64 = 0x400;
    const EMISSION_FLAG: u64 = 0x800;

    /// Decrease entry used to re-check a block against its neighbours.
    pub const PULL_LIGHT_IN: Self = Self::decrease_all_directions(1);
    /// Removes a sky source at the top of a column.
    pub const REMOVE_TOP_SKY_SOURCE: Self = Self::decrease_all_directions(15);
    /// Removes a sky source that still has another source above it.
    pub const REMOVE_SKY_SOURCE: Self = Self::decrease_skip_one_direction(15, Direction::Up);
    /// Adds a sky source under another source.
    pub const ADD_SKY_SOURCE: Self = Self::increase_skip_one_direction(15, false, Direction::Up);

    /// Packs an entry. Levels above 15 are clamped.
    #[must_use]
    pub const fn new(
        level: u8,
        directions: DirectionSet,
        from_empty_shape: bool,
        from_emission: bool,
    ) -> Self {
        let level = if level > 15 { 15 } else { level };
        let mut bits = level as u64 | ((directions.bits() as u64) << Self::DIRECTIONS_SHIFT);
        if from_empty_shape {
            bits |= Self::EMPTY_SHAPE_FLAG;
        }
        if from_emission {
            bits |= Self::EMISSION_FLAG;
        }
        Self(bits)
    }

    #[must_use]
    #[inline]
    pub const fn level(self) -> u8 {
        (self.0 & Self::LEVEL_MASK) as u8
    }

    #[must_use]
    #[inline]
    pub const fn directions(self) -> DirectionSet {
        DirectionSet::from_bits((self.0 >> Self::DIRECTIONS_SHIFT) as u8)
    }

    #[must_use]
    #[inline]
    pub const fn should_propagate(self, direction: Direction) -> bool {
        self.directions().contains(direction)
    }

    #[must_use]
    #[inline]
    pub const fn is_from_empty_shape(self) -> bool {
        self.0 & Self::EMPTY_SHAPE_FLAG != 0
    }

    #[must_use]
    #[inline]
    pub const fn is_from_emission(self) -> bool {
        self.0 & Self::EMISSION_FLAG != 0
    }

    #[must_use]
    pub const fn decrease_all_directions(level: u8) -> Self {
        Self::new(level, DirectionSet::ALL, false, false)
    }

    #[must_use]
    pub const fn decrease_skip_one_direction(level: u8, skip: Direction) -> Self {
        Self::new(level, DirectionSet::ALL.without(skip), false, false)
    }

    /// Entry for a block emitting `level` on its own.
    #[must_use]
    pub const fn increase_from_emission(level: u8, from_empty_shape: bool) -> Self {
        Self::new(level, DirectionSet::ALL, from_empty_shape, true)
    }

    #[must_use]
    pub const fn increase_skip_one_direction(
        level: u8,
        from_empty_shape: bool,
        skip: Direction,
    ) -> Self {
        Self::new(level, DirectionSet::ALL.without(skip), from_empty_shape, false)
    }

    #[must_use]
    pub const fn increase_only_one_direction(
        level: u8,
        from_empty_shape: bool,
        direction: Direction,
    ) -> Self {
        Self::new(level, DirectionSet::NONE.with(direction), from_empty_shape, false)
    }

    /// Full-strength sky entry spreading only through `directions`.
    #[must_use]
    pub const fn increase_sky_source_in_directions(directions: DirectionSet) -> Self {
        Self::new(15, directions, false, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_matches_bit_positions() {
        let entry = QueueEntry::new(9, DirectionSet::NONE.with(Direction::Down), true, true);
        assert_eq!(entry.0, 9 | 0x10 | 0x400 | 0x800);
    }

    #[test]
    fn test_level_is_clamped() {
        assert_eq!(QueueEntry::decrease_all_directions(40).level(), 15);
    }

    #[test]
    fn test_pull_light_in() {
        let entry = QueueEntry::PULL_LIGHT_IN;
        assert_eq!(entry.level(), 1);
        assert_eq!(entry.directions(), DirectionSet::ALL);
        assert!(!entry.is_from_emission());
    }

    #[test]
    fn test_sky_source_constants() {
        assert!(QueueEntry::REMOVE_TOP_SKY_SOURCE.should_propagate(Direction::Up));
        assert!(!QueueEntry::REMOVE_SKY_SOURCE.should_propagate(Direction::Up));
        assert!(QueueEntry::REMOVE_SKY_SOURCE.should_propagate(Direction::Down));
        assert!(!QueueEntry::ADD_SKY_SOURCE.should_propagate(Direction::Up));
        assert_eq!(QueueEntry::ADD_SKY_SOURCE.level(), 15);
    }

    #[test]
    fn test_emission_flags() {
        let entry = QueueEntry::increase_from_emission(14, true);
        assert_eq!(entry.level(), 14);
        assert!(entry.is_from_emission());
        assert!(entry.is_from_empty_shape());
        assert_eq!(entry.directions(), DirectionSet::ALL);
    }

    #[test]
    fn test_only_one_direction() {
        let entry = QueueEntry::increase_only_one_direction(7, false, Direction::East);
        assert_eq!(entry.directions().iter().collect::<Vec<_>>(), vec![Direction::East]);
        assert!(!entry.is_from_empty_shape());
    }

    #[test]
    fn test_sky_source_directions() {
        let directions = DirectionSet::NONE
            .with(Direction::Down)
            .with(Direction::North)
            .with(Direction::East);
        let entry = QueueEntry::increase_sky_source_in_directions(directions);
        assert_eq!(entry.level(), 15);
        assert!(entry.should_propagate(Direction::North));
        assert!(!entry.should_propagate(Direction::South));
        assert!(!entry.should_propagate(Direction::Up));
    }
}
