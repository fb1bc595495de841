/// Per-section bookkeeping: whether the section holds blocks of its own and how many
/// of its 26 neighbours do.
///
/// A section needs a light layer whenever either part is non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SectionState(u8);

impl SectionState {
    pub const EMPTY: Self = Self(0);
    pub const MAX_NEIGHBORS: u8 = 26;
    const HAS_DATA_BIT: u8 = 0b10_0000;
    const NEIGHBOR_COUNT_BITS: u8 = 0b1_1111;

    #[must_use]
    pub const fn has_data(self) -> bool {
        self.0 & Self::HAS_DATA_BIT != 0
    }

    #[must_use]
    pub const fn with_data(self, has_data: bool) -> Self {
        if has_data {
            Self(self.0 | Self::HAS_DATA_BIT)
        } else {
            Self(self.0 & !Self::HAS_DATA_BIT)
        }
    }

    #[must_use]
    pub const fn neighbor_count(self) -> u8 {
        self.0 & Self::NEIGHBOR_COUNT_BITS
    }

    /// Counts outside `0..=26` are clamped.
    #[must_use]
    pub fn with_neighbor_count(self, count: i32) -> Self {
        debug_assert!(
            (0..=i32::from(Self::MAX_NEIGHBORS)).contains(&count),
            "Neighbor count was not within range [0; 26]"
        );
        let count = count.clamp(0, i32::from(Self::MAX_NEIGHBORS)) as u8;
        Self((self.0 & !Self::NEIGHBOR_COUNT_BITS) | count)
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn section_type(self) -> SectionType {
        if self.is_empty() {
            SectionType::Empty
        } else if self.has_data() {
            SectionType::LightAndData
        } else {
            SectionType::LightOnly
        }
    }
}

/// What a section's state byte says about it, for debug views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionType {
    /// No layer is needed.
    Empty,
    /// Only light from neighbours passes through.
    LightOnly,
    /// The section has blocks of its own.
    LightAndData,
}

impl SectionType {
    #[must_use]
    pub const fn display(self) -> &'static str {
        match self {
            Self::Empty => "Empty",
            Self::LightOnly => "Light Only",
            Self::LightAndData => "Light and Data",
        }
    }
}

/// Where a section is in its storage lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionLifecycle {
    /// Nothing is stored for the section.
    Untracked,
    /// Light data was handed in from outside and waits until the section is tracked.
    PendingExternalData,
    /// A light layer is allocated and updated by the engine.
    Tracked,
    /// The layer is still allocated but will be freed at the end of the batch.
    PendingRemoval,
}
