//! What the light engines need to know about block states.

use steel_utils::{BlockPos, BlockStateId};

use crate::light_engine::Direction;

/// Coverage of one block face on a 4x4 grid, one bit per cell.
///
/// Cell `(u, v)` is bit `v * 4 + u`. The grid axes are world aligned: `(x, z)` for
/// Up/Down faces, `(x, y)` for North/South faces and `(z, y)` for West/East faces.
/// Touching faces of two neighbours therefore line up bit for bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FaceShape(u16);

impl FaceShape {
    pub const EMPTY: Self = Self(0);
    pub const FULL: Self = Self(u16::MAX);
    /// The two lower rows of a side face, e.g. the side of a bottom slab.
    pub const LOWER_HALF: Self = Self(0x00FF);
    /// The two upper rows of a side face.
    pub const UPPER_HALF: Self = Self(0xFF00);

    #[must_use]
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn bits(self) -> u16 {
        self.0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Two touching faces stop light when together they cover the whole face.
    #[must_use]
    pub const fn occludes(self, other: Self) -> bool {
        self.0 | other.0 == u16::MAX
    }
}

/// Light properties of block states, treated as a pure function of state and position.
pub trait LightBlockModel: Send + Sync {
    /// Light level the state emits on its own, 0-15.
    fn light_emission(&self, state: BlockStateId) -> u8;

    /// How much light the state absorbs, 0-15.
    fn light_block(&self, state: BlockStateId, pos: BlockPos) -> u8;

    /// Whether the state's faces should be checked for occlusion at all.
    fn uses_shape_for_light_occlusion(&self, state: BlockStateId) -> bool;

    /// Shape of the given face. Only queried when
    /// [`uses_shape_for_light_occlusion`](Self::uses_shape_for_light_occlusion) is true.
    fn face_occlusion_shape(
        &self,
        state: BlockStateId,
        pos: BlockPos,
        direction: Direction,
    ) -> FaceShape;

    /// State assumed for positions in chunks that are not available.
    fn opaque_fallback(&self) -> BlockStateId;

    /// The air state, used above the highest section when scanning columns.
    fn air(&self) -> BlockStateId;

    fn is_empty_shape(&self, state: BlockStateId) -> bool {
        !self.uses_shape_for_light_occlusion(state)
    }

    fn occlusion_shape(&self, state: BlockStateId, pos: BlockPos, direction: Direction) -> FaceShape {
        if self.is_empty_shape(state) {
            FaceShape::EMPTY
        } else {
            self.face_occlusion_shape(state, pos, direction)
        }
    }

    /// Whether light moving `direction` from `from` into `to` is blocked by their shapes.
    fn shape_occludes(
        &self,
        from_state: BlockStateId,
        from: BlockPos,
        to_state: BlockStateId,
        to: BlockPos,
        direction: Direction,
    ) -> bool {
        let from_face = self.occlusion_shape(from_state, from, direction);
        let to_face = self.occlusion_shape(to_state, to, direction.opposite());
        from_face.occludes(to_face)
    }

    /// Whether replacing `old` by `new` at `pos` can change light at all.
    fn has_different_light_properties(
        &self,
        old: BlockStateId,
        new: BlockStateId,
        pos: BlockPos,
    ) -> bool {
        if old == new {
            return false;
        }
        self.light_block(old, pos) != self.light_block(new, pos)
            || self.light_emission(old) != self.light_emission(new)
            || self.uses_shape_for_light_occlusion(old)
            || self.uses_shape_for_light_occlusion(new)
    }
}
