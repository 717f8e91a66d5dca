//! SubChunkRequest (0xAF) — Client → Server.

use bytes::{Buf, BufMut};

use crate::codec::{ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::{SubChunkPos, VarInt};

/// Requests a batch of sub-chunk sections relative to a base position.
#[derive(Debug, Clone, PartialEq)]
pub struct SubChunkRequest {
    pub dimension: i32,
    pub position: SubChunkPos,
    pub offsets: Vec<[i8; 3]>,
}

impl ProtoEncode for SubChunkRequest {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        VarInt(self.dimension).proto_encode(buf);
        self.position.proto_encode(buf);
        buf.put_u32_le(self.offsets.len() as u32);
        for offset in &self.offsets {
            buf.put_i8(offset[0]);
            buf.put_i8(offset[1]);
            buf.put_i8(offset[2]);
        }
    }
}

impl ProtoDecode for SubChunkRequest {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let dimension = VarInt::proto_decode(buf)?.0;
        let position = SubChunkPos::proto_decode(buf)?;
        if buf.remaining() < 4 {
            return Err(ProtoError::BufferTooShort {
                needed: 4,
                remaining: buf.remaining(),
            });
        }
        let count = buf.get_u32_le() as usize;
        if buf.remaining() < count * 3 {
            return Err(ProtoError::BufferTooShort {
                needed: count * 3,
                remaining: buf.remaining(),
            });
        }
        let mut offsets = Vec::with_capacity(count);
        for _ in 0..count {
            offsets.push([buf.get_i8(), buf.get_i8(), buf.get_i8()]);
        }
        Ok(Self {
            dimension,
            position,
            offsets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn roundtrip() {
        let pkt = SubChunkRequest {
            dimension: 0,
            position: SubChunkPos::new(5, 0, 5),
            offsets: (0..6).map(|y| [0, y as i8, 0]).collect(),
        };
        let mut buf = BytesMut::new();
        pkt.proto_encode(&mut buf);
        let decoded = SubChunkRequest::proto_decode(&mut buf.freeze()).unwrap();
        assert_eq!(decoded, pkt);
    }
}
