//! ContainerOpen (0x2E) — Server → Client.

use bytes::{Buf, BufMut};

use crate::codec::{ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::{BlockPos, VarLong};

/// Opens an inventory window backed by a block or entity.
#[derive(Debug, Clone, Copy)]
pub struct ContainerOpen {
    pub window_id: u8,
    pub container_type: u8,
    pub position: BlockPos,
    pub container_unique_id: i64,
}

impl ProtoEncode for ContainerOpen {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.window_id);
        buf.put_u8(self.container_type);
        self.position.proto_encode(buf);
        VarLong(self.container_unique_id).proto_encode(buf);
    }
}

impl ProtoDecode for ContainerOpen {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        if buf.remaining() < 2 {
            return Err(ProtoError::BufferTooShort {
                needed: 2,
                remaining: buf.remaining(),
            });
        }
        let window_id = buf.get_u8();
        let container_type = buf.get_u8();
        let position = BlockPos::proto_decode(buf)?;
        let container_unique_id = VarLong::proto_decode(buf)?.0;
        Ok(Self {
            window_id,
            container_type,
            position,
            container_unique_id,
        })
    }
}
