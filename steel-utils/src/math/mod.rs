//! Small fixed-size vector types.

pub mod vector2;
pub mod vector3;
