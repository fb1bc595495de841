//! Compact containers shared by the lighting and chunk code.

mod bit_set;

pub use bit_set::BitSet;
