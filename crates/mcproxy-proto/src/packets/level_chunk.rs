//! LevelChunk (0x3A) — Server → Client.

use bytes::{Buf, BufMut, Bytes};

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::{ChunkPos, VarInt, VarUInt32};

/// Sentinel sub-chunk counts selecting the request mode.
const COUNT_REQUEST_ALL: u32 = u32::MAX;
const COUNT_REQUEST_LIMIT: u32 = u32::MAX - 1;

/// How the client is expected to obtain the column's sub-chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubChunkRequestMode {
    /// The payload already contains every sub-chunk.
    Legacy,
    /// Request sub-chunks up to the advertised highest index.
    Limit,
    /// Request all sub-chunks in the dimension's range.
    All,
}

/// A full chunk column. In Legacy mode the payload holds the sub-chunk data;
/// otherwise it only carries biomes and the sub-chunks arrive separately.
#[derive(Debug, Clone)]
pub struct LevelChunk {
    pub position: ChunkPos,
    pub dimension: i32,
    pub sub_chunk_count: u32,
    pub highest_sub_chunk: u16,
    pub request_mode: SubChunkRequestMode,
    pub cache_enabled: bool,
    pub payload: Bytes,
}

impl ProtoEncode for LevelChunk {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        self.position.proto_encode(buf);
        VarInt(self.dimension).proto_encode(buf);
        match self.request_mode {
            SubChunkRequestMode::Legacy => {
                VarUInt32(self.sub_chunk_count).proto_encode(buf);
            }
            SubChunkRequestMode::Limit => {
                VarUInt32(COUNT_REQUEST_LIMIT).proto_encode(buf);
                buf.put_u16_le(self.highest_sub_chunk);
            }
            SubChunkRequestMode::All => {
                VarUInt32(COUNT_REQUEST_ALL).proto_encode(buf);
            }
        }
        buf.put_u8(self.cache_enabled as u8);
        codec::write_byte_slice(buf, &self.payload);
    }
}

impl ProtoDecode for LevelChunk {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let position = ChunkPos::proto_decode(buf)?;
        let dimension = VarInt::proto_decode(buf)?.0;
        let raw_count = VarUInt32::proto_decode(buf)?.0;
        let (request_mode, sub_chunk_count, highest_sub_chunk) = match raw_count {
            COUNT_REQUEST_ALL => (SubChunkRequestMode::All, 0, 0),
            COUNT_REQUEST_LIMIT => {
                if buf.remaining() < 2 {
                    return Err(ProtoError::BufferTooShort {
                        needed: 2,
                        remaining: buf.remaining(),
                    });
                }
                let highest = buf.get_u16_le();
                (SubChunkRequestMode::Limit, 0, highest)
            }
            n => (SubChunkRequestMode::Legacy, n, 0),
        };
        let cache_enabled = codec::read_bool(buf)?;
        let payload = codec::read_byte_slice(buf)?;
        Ok(Self {
            position,
            dimension,
            sub_chunk_count,
            highest_sub_chunk,
            request_mode,
            cache_enabled,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    fn roundtrip(pkt: LevelChunk) -> LevelChunk {
        let mut buf = BytesMut::new();
        pkt.proto_encode(&mut buf);
        LevelChunk::proto_decode(&mut buf.freeze()).unwrap()
    }

    #[test]
    fn legacy_mode_keeps_count() {
        let decoded = roundtrip(LevelChunk {
            position: ChunkPos::new(3, -7),
            dimension: 0,
            sub_chunk_count: 24,
            highest_sub_chunk: 0,
            request_mode: SubChunkRequestMode::Legacy,
            cache_enabled: false,
            payload: Bytes::from_static(&[9, 1]),
        });
        assert_eq!(decoded.request_mode, SubChunkRequestMode::Legacy);
        assert_eq!(decoded.sub_chunk_count, 24);
        assert_eq!(decoded.position, ChunkPos::new(3, -7));
    }

    #[test]
    fn limit_mode_carries_highest() {
        let decoded = roundtrip(LevelChunk {
            position: ChunkPos::new(0, 0),
            dimension: 0,
            sub_chunk_count: 0,
            highest_sub_chunk: 5,
            request_mode: SubChunkRequestMode::Limit,
            cache_enabled: false,
            payload: Bytes::new(),
        });
        assert_eq!(decoded.request_mode, SubChunkRequestMode::Limit);
        assert_eq!(decoded.highest_sub_chunk, 5);
    }

    #[test]
    fn all_mode_has_no_highest() {
        let decoded = roundtrip(LevelChunk {
            position: ChunkPos::new(1, 1),
            dimension: 1,
            sub_chunk_count: 0,
            highest_sub_chunk: 0,
            request_mode: SubChunkRequestMode::All,
            cache_enabled: false,
            payload: Bytes::new(),
        });
        assert_eq!(decoded.request_mode, SubChunkRequestMode::All);
        assert_eq!(decoded.dimension, 1);
    }
}
