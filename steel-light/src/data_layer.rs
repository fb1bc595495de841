//! Per-section light data.
//!
//! Light values are stored as 4-bit values (0-15), packed as two values per byte.
//! For a 16x16x16 section, this requires 2048 bytes (4096 blocks / 2). Sections whose
//! values are all the same keep only that value until the first differing write.

use thiserror::Error;

/// The number of bytes needed to store light data for a 16x16x16 section.
pub const LIGHT_ARRAY_SIZE: usize = 2048;

/// Bytes covering one 16x16 horizontal plane of a section.
const LAYER_BYTES: usize = 128;

/// Raised when raw light data has the wrong size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("light data must be {expected} bytes, got {actual}")]
pub struct DataLayerError {
    /// Required length.
    pub expected: usize,
    /// Length that was supplied.
    pub actual: usize,
}

/// Light levels for one section of one light layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataLayer {
    /// Every block in the section has this level.
    Homogeneous(u8),
    /// Packed nibbles, low nibble first. Index is `y << 8 | z << 4 | x`.
    Packed(Box<[u8; LIGHT_ARRAY_SIZE]>),
}

impl Default for DataLayer {
    fn default() -> Self {
        Self::Homogeneous(0)
    }
}

#[inline]
const fn packed_nibbles(level: u8) -> u8 {
    (level & 0x0F) | ((level & 0x0F) << 4)
}

#[inline]
const fn index(x: usize, y: usize, z: usize) -> usize {
    (y << 8) | (z << 4) | x
}

impl DataLayer {
    /// A dark layer.
    #[must_use]
    pub const fn new() -> Self {
        Self::Homogeneous(0)
    }

    /// A layer where every block has `level`. Levels above 15 are clamped.
    #[must_use]
    pub const fn filled(level: u8) -> Self {
        Self::Homogeneous(if level > 15 { 15 } else { level })
    }

    /// Wraps raw packed nibbles, e.g. light data read from disk.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DataLayerError> {
        let data: [u8; LIGHT_ARRAY_SIZE] =
            bytes.try_into().map_err(|_| DataLayerError {
                expected: LIGHT_ARRAY_SIZE,
                actual: bytes.len(),
            })?;
        Ok(Self::Packed(Box::new(data)))
    }

    /// Gets the light level at the given section-relative position (each 0-15).
    #[must_use]
    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> u8 {
        debug_assert!(x < 16 && y < 16 && z < 16, "Coordinates must be 0-15");
        self.get_index(index(x, y, z))
    }

    #[inline]
    fn get_index(&self, block_index: usize) -> u8 {
        match self {
            Self::Homogeneous(level) => *level,
            Self::Packed(data) => {
                let byte = data[block_index >> 1];
                if block_index & 1 == 1 {
                    byte >> 4
                } else {
                    byte & 0x0F
                }
            }
        }
    }

    /// Sets the light level at the given section-relative position.
    ///
    /// A homogeneous layer is expanded when the new level differs from its value.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, z: usize, light_level: u8) {
        debug_assert!(x < 16 && y < 16 && z < 16, "Coordinates must be 0-15");
        let light_level = light_level.min(15);
        let block_index = index(x, y, z);

        if let Self::Homogeneous(current) = *self {
            if current == light_level {
                return;
            }
            *self = Self::Packed(Box::new([packed_nibbles(current); LIGHT_ARRAY_SIZE]));
        }

        if let Self::Packed(data) = self {
            let byte = &mut data[block_index >> 1];
            if block_index & 1 == 1 {
                *byte = (*byte & 0x0F) | (light_level << 4);
            } else {
                *byte = (*byte & 0xF0) | light_level;
            }
        }
    }

    /// Replaces every value with `level`, dropping the packed array.
    pub fn fill(&mut self, level: u8) {
        *self = Self::filled(level);
    }

    /// True while the layer has never diverged from a single value.
    #[must_use]
    pub const fn is_definitely_homogeneous(&self) -> bool {
        matches!(self, Self::Homogeneous(_))
    }

    /// True only when the layer is known to hold `level` everywhere without scanning.
    #[must_use]
    pub fn is_definitely_filled_with(&self, level: u8) -> bool {
        matches!(self, Self::Homogeneous(value) if *value == level)
    }

    /// The packed bytes when the layer is not homogeneous.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8; LIGHT_ARRAY_SIZE]> {
        match self {
            Self::Homogeneous(_) => None,
            Self::Packed(data) => Some(data),
        }
    }

    /// A layer whose 16 horizontal planes all copy this layer's bottom plane.
    #[must_use]
    pub fn repeat_first_layer(&self) -> Self {
        match self {
            Self::Homogeneous(level) => Self::Homogeneous(*level),
            Self::Packed(data) => {
                let mut out = Box::new([0u8; LIGHT_ARRAY_SIZE]);
                for plane in out.chunks_exact_mut(LAYER_BYTES) {
                    plane.copy_from_slice(&data[..LAYER_BYTES]);
                }
                Self::Packed(out)
            }
        }
    }

    /// Returns the raw data for sending to the client or saving.
    #[must_use]
    pub fn to_packet_data(&self) -> Vec<u8> {
        match self {
            Self::Homogeneous(level) => vec![packed_nibbles(*level); LIGHT_ARRAY_SIZE],
            Self::Packed(data) => data.to_vec(),
        }
    }
}
