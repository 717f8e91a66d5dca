//! World model for the capture pipeline: dimension ranges, chunk columns,
//! the persistence provider trait, and its LevelDB implementation.

pub mod chunk;
pub mod dimension;
pub mod error;
pub mod level_dat;
pub mod provider;

pub use chunk::{Chunk, SubChunk, AIR_RUNTIME_ID};
pub use dimension::Dimension;
pub use error::WorldError;
pub use level_dat::{LevelDat, WorldSettings};
pub use provider::{Column, LevelDbProvider, WorldProvider};
