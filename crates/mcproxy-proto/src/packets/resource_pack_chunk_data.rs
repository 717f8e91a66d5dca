//! ResourcePackChunkData (0x53) — Server → Client.

use bytes::{Buf, BufMut, Bytes};

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;

/// One slice of a pack's binary contents.
#[derive(Debug, Clone)]
pub struct ResourcePackChunkData {
    pub pack_id: String,
    pub chunk_index: u32,
    /// Byte offset of this chunk within the pack.
    pub progress: u64,
    pub data: Bytes,
}

impl ProtoEncode for ResourcePackChunkData {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        codec::write_string(buf, &self.pack_id);
        buf.put_u32_le(self.chunk_index);
        buf.put_u64_le(self.progress);
        codec::write_byte_slice(buf, &self.data);
    }
}

impl ProtoDecode for ResourcePackChunkData {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let pack_id = codec::read_string(buf)?;
        if buf.remaining() < 12 {
            return Err(ProtoError::BufferTooShort {
                needed: 12,
                remaining: buf.remaining(),
            });
        }
        let chunk_index = buf.get_u32_le();
        let progress = buf.get_u64_le();
        let data = codec::read_byte_slice(buf)?;
        Ok(Self {
            pack_id,
            chunk_index,
            progress,
            data,
        })
    }
}
