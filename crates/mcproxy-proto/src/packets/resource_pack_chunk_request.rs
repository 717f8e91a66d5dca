//! ResourcePackChunkRequest (0x54) — Client → Server.

use bytes::{Buf, BufMut};

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;

#[derive(Debug, Clone)]
pub struct ResourcePackChunkRequest {
    pub pack_id: String,
    pub chunk_index: u32,
}

impl ProtoEncode for ResourcePackChunkRequest {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        codec::write_string(buf, &self.pack_id);
        buf.put_u32_le(self.chunk_index);
    }
}

impl ProtoDecode for ResourcePackChunkRequest {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let pack_id = codec::read_string(buf)?;
        if buf.remaining() < 4 {
            return Err(ProtoError::BufferTooShort {
                needed: 4,
                remaining: buf.remaining(),
            });
        }
        let chunk_index = buf.get_u32_le();
        Ok(Self {
            pack_id,
            chunk_index,
        })
    }
}
