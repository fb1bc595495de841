//! The six block faces light travels through.

use steel_utils::BlockPos;

/// Six cardinal directions for light propagation.
///
/// The ordinals drive the direction bits of [`QueueEntry`](super::QueueEntry), so the
/// declaration order matters.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// -Y
    Down = 0,
    /// +Y
    Up = 1,
    /// -Z
    North = 2,
    /// +Z
    South = 3,
    /// -X
    West = 4,
    /// +X
    East = 5,
}

impl Direction {
    /// All six directions, in ordinal order.
    pub const ALL: [Direction; 6] = [
        Direction::Down,
        Direction::Up,
        Direction::North,
        Direction::South,
        Direction::West,
        Direction::East,
    ];

    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Down => Self::Up,
            Self::Up => Self::Down,
            Self::North => Self::South,
            Self::South => Self::North,
            Self::West => Self::East,
            Self::East => Self::West,
        }
    }

    /// Returns (dx, dy, dz) for this direction.
    #[must_use]
    pub const fn offset(self) -> (i32, i32, i32) {
        match self {
            Self::Down => (0, -1, 0),
            Self::Up => (0, 1, 0),
            Self::North => (0, 0, -1),
            Self::South => (0, 0, 1),
            Self::West => (-1, 0, 0),
            Self::East => (1, 0, 0),
        }
    }

    /// Moves a packed block position one block in this direction.
    #[must_use]
    #[inline]
    pub const fn relative_long(self, packed: i64) -> i64 {
        let (dx, dy, dz) = self.offset();
        BlockPos::offset_long(packed, dx, dy, dz)
    }
}

/// A set of directions stored as one bit per ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DirectionSet(u8);

impl DirectionSet {
    pub const NONE: Self = Self(0);
    pub const ALL: Self = Self(0b11_1111);

    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & Self::ALL.0)
    }

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn with(self, direction: Direction) -> Self {
        Self(self.0 | (1 << direction as u8))
    }

    #[must_use]
    pub const fn without(self, direction: Direction) -> Self {
        Self(self.0 & !(1 << direction as u8))
    }

    #[must_use]
    pub const fn contains(self, direction: Direction) -> bool {
        self.0 & (1 << direction as u8) != 0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The members in ordinal order.
    pub fn iter(self) -> impl Iterator<Item = Direction> {
        Direction::ALL.into_iter().filter(move |d| self.contains(*d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordinals() {
        for (ordinal, direction) in Direction::ALL.iter().enumerate() {
            assert_eq!(*direction as usize, ordinal);
        }
    }

    #[test]
    fn test_opposite_cancels_offset() {
        for direction in Direction::ALL {
            let (x, y, z) = direction.offset();
            let (ox, oy, oz) = direction.opposite().offset();
            assert_eq!((x + ox, y + oy, z + oz), (0, 0, 0));
            assert_eq!(direction.opposite().opposite(), direction);
        }
    }

    #[test]
    fn test_relative_long() {
        let packed = BlockPos::as_long_xyz(0, -64, 15);
        let moved = Direction::South.relative_long(Direction::Down.relative_long(packed));
        assert_eq!(BlockPos::from_long(moved), BlockPos::new(0, -65, 16));
    }

    #[test]
    fn test_direction_set() {
        let set = DirectionSet::ALL.without(Direction::Up);
        assert!(!set.contains(Direction::Up));
        assert_eq!(set.iter().count(), 5);
        assert_eq!(DirectionSet::NONE.with(Direction::East).bits(), 0b10_0000);
        assert!(DirectionSet::from_bits(0xC0).is_empty());
    }
}
