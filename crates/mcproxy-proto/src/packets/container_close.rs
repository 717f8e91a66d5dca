//! ContainerClose (0x2F) — bidirectional.

use bytes::{Buf, BufMut};

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;

#[derive(Debug, Clone, Copy)]
pub struct ContainerClose {
    pub window_id: u8,
    pub container_type: u8,
    pub server_side: bool,
}

impl ProtoEncode for ContainerClose {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.window_id);
        buf.put_u8(self.container_type);
        buf.put_u8(self.server_side as u8);
    }
}

impl ProtoDecode for ContainerClose {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        if buf.remaining() < 2 {
            return Err(ProtoError::BufferTooShort {
                needed: 2,
                remaining: buf.remaining(),
            });
        }
        let window_id = buf.get_u8();
        let container_type = buf.get_u8();
        let server_side = codec::read_bool(buf)?;
        Ok(Self {
            window_id,
            container_type,
            server_side,
        })
    }
}
