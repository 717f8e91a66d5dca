//! ResourcePackDataInfo (0x52) — Server → Client.
//!
//! Announces one pack's transfer parameters ahead of its chunk stream.

use bytes::{Buf, BufMut, Bytes};

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;

#[derive(Debug, Clone)]
pub struct ResourcePackDataInfo {
    /// Pack UUID + version, e.g. `"uuid_1.0.0"`.
    pub pack_id: String,
    pub max_chunk_size: u32,
    pub chunk_count: u32,
    pub size: u64,
    /// SHA-256 of the pack contents.
    pub hash: Bytes,
    pub premium: bool,
    /// 1 = resource, 2 = behavior.
    pub pack_type: u8,
}

impl ProtoEncode for ResourcePackDataInfo {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        codec::write_string(buf, &self.pack_id);
        buf.put_u32_le(self.max_chunk_size);
        buf.put_u32_le(self.chunk_count);
        buf.put_u64_le(self.size);
        codec::write_byte_slice(buf, &self.hash);
        buf.put_u8(self.premium as u8);
        buf.put_u8(self.pack_type);
    }
}

impl ProtoDecode for ResourcePackDataInfo {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let pack_id = codec::read_string(buf)?;
        if buf.remaining() < 16 {
            return Err(ProtoError::BufferTooShort {
                needed: 16,
                remaining: buf.remaining(),
            });
        }
        let max_chunk_size = buf.get_u32_le();
        let chunk_count = buf.get_u32_le();
        let size = buf.get_u64_le();
        let hash = codec::read_byte_slice(buf)?;
        if buf.remaining() < 2 {
            return Err(ProtoError::BufferTooShort {
                needed: 2,
                remaining: buf.remaining(),
            });
        }
        let premium = buf.get_u8() != 0;
        let pack_type = buf.get_u8();
        Ok(Self {
            pack_id,
            max_chunk_size,
            chunk_count,
            size,
            hash,
            premium,
            pack_type,
        })
    }
}
