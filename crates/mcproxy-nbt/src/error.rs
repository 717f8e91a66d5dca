//! NBT decoding errors. Encoding is infallible.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NbtError {
    #[error("NBT data ended early")]
    UnexpectedEof,

    #[error("root tag must be TAG_Compound, found type {got}")]
    ExpectedCompound { got: u8 },

    #[error("tag type {0} does not exist")]
    UnknownTagType(u8),

    #[error("length {0} is negative")]
    NegativeLength(i32),

    #[error("compound/list nesting exceeds {limit} levels")]
    NestingTooDeep { limit: usize },

    #[error("NBT string is not UTF-8")]
    InvalidUtf8,

    #[error("varint: {0}")]
    VarInt(String),
}
