// Wrapper types making it harder to accidentaly use the wrong underlying type.

use std::fmt::{self, Display};

use crate::math::{vector2::Vector2, vector3::Vector3};

// A raw block state id. Using the registry this id can be derived into a block and it's current properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlockStateId(pub u16);

// A chunk position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ChunkPos(pub Vector2<i32>);

// A block position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlockPos(pub Vector3<i32>);

// A section position, a 16x16x16 cube of blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SectionPos(pub Vector3<i32>);

impl ChunkPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self(Vector2::new(x, z))
    }

    /// Packs the position, x in the low half and z in the high half.
    pub const fn as_long(self) -> i64 {
        Self::as_long_xz(self.0.x, self.0.y)
    }

    pub const fn as_long_xz(x: i32, z: i32) -> i64 {
        (x as u32 as i64) | ((z as u32 as i64) << 32)
    }

    pub const fn from_long(packed: i64) -> Self {
        Self::new(packed as i32, (packed >> 32) as i32)
    }

    /// The chunk containing the given block coordinates.
    pub const fn from_block(x: i32, z: i32) -> Self {
        Self::new(x >> 4, z >> 4)
    }

    pub const fn min_block_x(self) -> i32 {
        self.0.x << 4
    }

    pub const fn min_block_z(self) -> i32 {
        self.0.y << 4
    }
}

impl Display for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.0.x, self.0.y)
    }
}

impl BlockPos {
    const PACKED_X_LENGTH: u32 = 26;
    const PACKED_Z_LENGTH: u32 = 26;
    const PACKED_Y_LENGTH: u32 = 12;
    const PACKED_X_MASK: i64 = (1 << Self::PACKED_X_LENGTH) - 1;
    const PACKED_Y_MASK: i64 = (1 << Self::PACKED_Y_LENGTH) - 1;
    const PACKED_Z_MASK: i64 = (1 << Self::PACKED_Z_LENGTH) - 1;
    const Z_OFFSET: u32 = Self::PACKED_Y_LENGTH;
    const X_OFFSET: u32 = Self::PACKED_Y_LENGTH + Self::PACKED_Z_LENGTH;

    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self(Vector3::new(x, y, z))
    }

    pub const fn as_long(self) -> i64 {
        Self::as_long_xyz(self.0.x, self.0.y, self.0.z)
    }

    /// Packs block coordinates into the layout used for light queue keys.
    pub const fn as_long_xyz(x: i32, y: i32, z: i32) -> i64 {
        ((x as i64 & Self::PACKED_X_MASK) << Self::X_OFFSET)
            | (y as i64 & Self::PACKED_Y_MASK)
            | ((z as i64 & Self::PACKED_Z_MASK) << Self::Z_OFFSET)
    }

    pub const fn from_long(packed: i64) -> Self {
        Self::new(
            Self::unpack_x(packed),
            Self::unpack_y(packed),
            Self::unpack_z(packed),
        )
    }

    pub const fn unpack_x(packed: i64) -> i32 {
        (packed >> Self::X_OFFSET) as i32
    }

    pub const fn unpack_y(packed: i64) -> i32 {
        ((packed << (64 - Self::PACKED_Y_LENGTH)) >> (64 - Self::PACKED_Y_LENGTH)) as i32
    }

    pub const fn unpack_z(packed: i64) -> i32 {
        ((packed << (64 - Self::Z_OFFSET - Self::PACKED_Z_LENGTH)) >> (64 - Self::PACKED_Z_LENGTH))
            as i32
    }

    pub const fn offset_long(packed: i64, dx: i32, dy: i32, dz: i32) -> i64 {
        Self::as_long_xyz(
            Self::unpack_x(packed) + dx,
            Self::unpack_y(packed) + dy,
            Self::unpack_z(packed) + dz,
        )
    }

    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.0.x + dx, self.0.y + dy, self.0.z + dz)
    }

    pub const fn chunk_pos(self) -> ChunkPos {
        ChunkPos::from_block(self.0.x, self.0.z)
    }
}

impl Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}]", self.0.x, self.0.y, self.0.z)
    }
}

impl SectionPos {
    const PACKED_X_LENGTH: u32 = 22;
    const PACKED_Z_LENGTH: u32 = 22;
    const PACKED_Y_LENGTH: u32 = 20;
    const PACKED_X_MASK: i64 = (1 << Self::PACKED_X_LENGTH) - 1;
    const PACKED_Y_MASK: i64 = (1 << Self::PACKED_Y_LENGTH) - 1;
    const PACKED_Z_MASK: i64 = (1 << Self::PACKED_Z_LENGTH) - 1;
    const Z_OFFSET: u32 = Self::PACKED_Y_LENGTH;
    const X_OFFSET: u32 = Self::PACKED_Y_LENGTH + Self::PACKED_Z_LENGTH;

    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self(Vector3::new(x, y, z))
    }

    pub const fn of_chunk(chunk: ChunkPos, y: i32) -> Self {
        Self::new(chunk.0.x, y, chunk.0.y)
    }

    pub const fn of_block(pos: BlockPos) -> Self {
        Self::new(
            Self::block_to_section_coord(pos.0.x),
            Self::block_to_section_coord(pos.0.y),
            Self::block_to_section_coord(pos.0.z),
        )
    }

    pub const fn as_long(self) -> i64 {
        Self::as_long_xyz(self.0.x, self.0.y, self.0.z)
    }

    pub const fn as_long_xyz(x: i32, y: i32, z: i32) -> i64 {
        ((x as i64 & Self::PACKED_X_MASK) << Self::X_OFFSET)
            | (y as i64 & Self::PACKED_Y_MASK)
            | ((z as i64 & Self::PACKED_Z_MASK) << Self::Z_OFFSET)
    }

    pub const fn from_long(packed: i64) -> Self {
        Self::new(
            Self::unpack_x(packed),
            Self::unpack_y(packed),
            Self::unpack_z(packed),
        )
    }

    pub const fn unpack_x(packed: i64) -> i32 {
        (packed >> Self::X_OFFSET) as i32
    }

    pub const fn unpack_y(packed: i64) -> i32 {
        ((packed << (64 - Self::PACKED_Y_LENGTH)) >> (64 - Self::PACKED_Y_LENGTH)) as i32
    }

    pub const fn unpack_z(packed: i64) -> i32 {
        ((packed << (64 - Self::Z_OFFSET - Self::PACKED_Z_LENGTH)) >> (64 - Self::PACKED_Z_LENGTH))
            as i32
    }

    pub const fn offset_long(packed: i64, dx: i32, dy: i32, dz: i32) -> i64 {
        Self::as_long_xyz(
            Self::unpack_x(packed) + dx,
            Self::unpack_y(packed) + dy,
            Self::unpack_z(packed) + dz,
        )
    }

    /// The section holding a packed block position.
    pub const fn block_to_section(block: i64) -> i64 {
        Self::as_long_xyz(
            Self::block_to_section_coord(BlockPos::unpack_x(block)),
            Self::block_to_section_coord(BlockPos::unpack_y(block)),
            Self::block_to_section_coord(BlockPos::unpack_z(block)),
        )
    }

    /// The section key with its Y cleared, used to identify a whole column.
    pub const fn zero_node(packed: i64) -> i64 {
        packed & !Self::PACKED_Y_MASK
    }

    pub const fn column_key(x: i32, z: i32) -> i64 {
        Self::as_long_xyz(x, 0, z)
    }

    pub const fn block_to_section_coord(coord: i32) -> i32 {
        coord >> 4
    }

    pub const fn section_to_block_coord(coord: i32) -> i32 {
        coord << 4
    }

    pub const fn section_relative(coord: i32) -> i32 {
        coord & 15
    }

    pub const fn chunk(self) -> ChunkPos {
        ChunkPos::new(self.0.x, self.0.z)
    }

    pub const fn min_block_y(self) -> i32 {
        Self::section_to_block_coord(self.0.y)
    }

    /// Calls `consumer` with every section that contains the block or one of its 26 neighbours.
    pub fn around_and_at_block_pos(block: i64, mut consumer: impl FnMut(i64)) {
        let x = BlockPos::unpack_x(block);
        let y = BlockPos::unpack_y(block);
        let z = BlockPos::unpack_z(block);

        for sx in Self::block_to_section_coord(x - 1)..=Self::block_to_section_coord(x + 1) {
            for sy in Self::block_to_section_coord(y - 1)..=Self::block_to_section_coord(y + 1) {
                for sz in Self::block_to_section_coord(z - 1)..=Self::block_to_section_coord(z + 1)
                {
                    consumer(Self::as_long_xyz(sx, sy, sz));
                }
            }
        }
    }
}

impl Display for SectionPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}]", self.0.x, self.0.y, self.0.z)
    }
}
