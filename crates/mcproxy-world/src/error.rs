//! World persistence errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorldError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(String),

    #[error("NBT error: {0}")]
    Nbt(#[from] mcproxy_nbt::NbtError),

    #[error("malformed chunk payload: {0}")]
    MalformedChunk(String),

    #[error("section index {index} outside dimension range")]
    SectionOutOfRange { index: i32 },
}
