//! MoveActorAbsolute (0x10) — Server → Client.

use bytes::{Buf, BufMut};

use crate::codec::{ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::{VarUInt64, Vec3};

/// Absolute position update for a non-player entity. Rotation bytes are
/// degrees divided by 360/256.
#[derive(Debug, Clone, Copy)]
pub struct MoveActorAbsolute {
    pub runtime_id: u64,
    pub flags: u8,
    pub position: Vec3,
    pub rotation: [u8; 3],
}

impl ProtoEncode for MoveActorAbsolute {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        VarUInt64(self.runtime_id).proto_encode(buf);
        buf.put_u8(self.flags);
        self.position.proto_encode(buf);
        buf.put_slice(&self.rotation);
    }
}

impl ProtoDecode for MoveActorAbsolute {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let runtime_id = VarUInt64::proto_decode(buf)?.0;
        if !buf.has_remaining() {
            return Err(ProtoError::BufferTooShort {
                needed: 1,
                remaining: 0,
            });
        }
        let flags = buf.get_u8();
        let position = Vec3::proto_decode(buf)?;
        if buf.remaining() < 3 {
            return Err(ProtoError::BufferTooShort {
                needed: 3,
                remaining: buf.remaining(),
            });
        }
        let rotation = [buf.get_u8(), buf.get_u8(), buf.get_u8()];
        Ok(Self {
            runtime_id,
            flags,
            position,
            rotation,
        })
    }
}
