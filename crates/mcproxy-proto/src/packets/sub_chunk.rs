//! SubChunk (0xAE) — Server → Client.
//!
//! Response to SubChunkRequest: a batch of sub-chunk sections relative to a
//! base position.

use bytes::{Buf, BufMut, Bytes};

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::{SubChunkPos, VarInt};

/// Per-entry result code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubChunkResult {
    Undefined,
    Success,
    ChunkNotFound,
    InvalidDimension,
    PlayerNotFound,
    IndexOutOfBounds,
    SuccessAllAir,
}

impl SubChunkResult {
    fn from_i8(v: i8) -> Self {
        match v {
            1 => Self::Success,
            2 => Self::ChunkNotFound,
            3 => Self::InvalidDimension,
            4 => Self::PlayerNotFound,
            5 => Self::IndexOutOfBounds,
            6 => Self::SuccessAllAir,
            _ => Self::Undefined,
        }
    }

    fn as_i8(self) -> i8 {
        match self {
            Self::Undefined => 0,
            Self::Success => 1,
            Self::ChunkNotFound => 2,
            Self::InvalidDimension => 3,
            Self::PlayerNotFound => 4,
            Self::IndexOutOfBounds => 5,
            Self::SuccessAllAir => 6,
        }
    }
}

/// One sub-chunk section at `base + offset`.
#[derive(Debug, Clone)]
pub struct SubChunkEntry {
    pub offset: [i8; 3],
    pub result: SubChunkResult,
    pub payload: Bytes,
    /// Heightmap type byte plus the 256-byte map when present.
    pub heightmap_type: u8,
    pub heightmap: Bytes,
}

#[derive(Debug, Clone)]
pub struct SubChunk {
    pub cache_enabled: bool,
    pub dimension: i32,
    pub position: SubChunkPos,
    pub entries: Vec<SubChunkEntry>,
}

impl ProtoEncode for SubChunk {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.cache_enabled as u8);
        VarInt(self.dimension).proto_encode(buf);
        self.position.proto_encode(buf);
        buf.put_u32_le(self.entries.len() as u32);
        for entry in &self.entries {
            buf.put_i8(entry.offset[0]);
            buf.put_i8(entry.offset[1]);
            buf.put_i8(entry.offset[2]);
            buf.put_i8(entry.result.as_i8());
            codec::write_byte_slice(buf, &entry.payload);
            buf.put_u8(entry.heightmap_type);
            buf.put_slice(&entry.heightmap);
        }
    }
}

impl ProtoDecode for SubChunk {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let cache_enabled = codec::read_bool(buf)?;
        let dimension = VarInt::proto_decode(buf)?.0;
        let position = SubChunkPos::proto_decode(buf)?;
        if buf.remaining() < 4 {
            return Err(ProtoError::BufferTooShort {
                needed: 4,
                remaining: buf.remaining(),
            });
        }
        let count = buf.get_u32_le() as usize;
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            if buf.remaining() < 4 {
                return Err(ProtoError::BufferTooShort {
                    needed: 4,
                    remaining: buf.remaining(),
                });
            }
            let offset = [buf.get_i8(), buf.get_i8(), buf.get_i8()];
            let result = SubChunkResult::from_i8(buf.get_i8());
            let payload = codec::read_byte_slice(buf)?;
            if !buf.has_remaining() {
                return Err(ProtoError::BufferTooShort {
                    needed: 1,
                    remaining: 0,
                });
            }
            let heightmap_type = buf.get_u8();
            // Type 1 means "map follows"; other types carry no data.
            let heightmap = if heightmap_type == 1 {
                if buf.remaining() < 256 {
                    return Err(ProtoError::BufferTooShort {
                        needed: 256,
                        remaining: buf.remaining(),
                    });
                }
                buf.copy_to_bytes(256)
            } else {
                Bytes::new()
            };
            entries.push(SubChunkEntry {
                offset,
                result,
                payload,
                heightmap_type,
                heightmap,
            });
        }
        Ok(Self {
            cache_enabled,
            dimension,
            position,
            entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn entries_roundtrip() {
        let pkt = SubChunk {
            cache_enabled: false,
            dimension: 0,
            position: SubChunkPos::new(2, 0, -3),
            entries: vec![
                SubChunkEntry {
                    offset: [0, 4, 0],
                    result: SubChunkResult::Success,
                    payload: Bytes::from_static(&[9, 1, 0]),
                    heightmap_type: 0,
                    heightmap: Bytes::new(),
                },
                SubChunkEntry {
                    offset: [0, 5, 0],
                    result: SubChunkResult::SuccessAllAir,
                    payload: Bytes::new(),
                    heightmap_type: 0,
                    heightmap: Bytes::new(),
                },
            ],
        };
        let mut buf = BytesMut::new();
        pkt.proto_encode(&mut buf);
        let decoded = SubChunk::proto_decode(&mut buf.freeze()).unwrap();
        assert_eq!(decoded.entries.len(), 2);
        assert_eq!(decoded.entries[0].offset, [0, 4, 0]);
        assert_eq!(decoded.entries[1].result, SubChunkResult::SuccessAllAir);
    }

    #[test]
    fn unknown_result_maps_to_undefined() {
        assert_eq!(SubChunkResult::from_i8(99), SubChunkResult::Undefined);
    }
}
