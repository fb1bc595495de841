//! # Steel Light
//!
//! Incremental block and sky light for voxel levels: sparse nibble storage per
//! section, flood-fill propagation with bounded per-tick work, and a batched task
//! front end that other threads can feed while readers see published light without
//! locking.

pub mod block_model;
pub mod config;
pub mod data_layer;
pub mod graph;
pub mod light_chunk;
pub mod light_engine;
pub mod sky_light_sources;
pub mod storage;

/// In-memory worlds for tests and benchmarks.
#[cfg(any(test, feature = "benchmarks"))]
pub mod testing;

pub use block_model::{FaceShape, LightBlockModel};
pub use config::LightEngineConfig;
pub use data_layer::DataLayer;
pub use light_chunk::{LevelHeight, LightChunk, LightChunkGetter};
pub use light_engine::{
    ChunkLightData, LevelLightEngine, LightEventListener, LightLayer, ThreadedLevelLightEngine,
};
pub use sky_light_sources::ChunkSkyLightSources;
