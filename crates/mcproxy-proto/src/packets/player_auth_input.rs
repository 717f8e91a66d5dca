//! PlayerAuthInput (0x90) — Client → Server.
//!
//! Per-tick movement input. The packet is large; only the leading pose
//! fields are decoded and the rest is carried opaquely.

use bytes::{Buf, BufMut, Bytes};

use crate::codec::{ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::Vec3;

#[derive(Debug, Clone)]
pub struct PlayerAuthInput {
    pub pitch: f32,
    pub yaw: f32,
    pub position: Vec3,
    pub move_vector: (f32, f32),
    pub head_yaw: f32,
    pub trailer: Bytes,
}

impl ProtoEncode for PlayerAuthInput {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_f32_le(self.pitch);
        buf.put_f32_le(self.yaw);
        self.position.proto_encode(buf);
        buf.put_f32_le(self.move_vector.0);
        buf.put_f32_le(self.move_vector.1);
        buf.put_f32_le(self.head_yaw);
        buf.put_slice(&self.trailer);
    }
}

impl ProtoDecode for PlayerAuthInput {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        if buf.remaining() < 32 {
            return Err(ProtoError::BufferTooShort {
                needed: 32,
                remaining: buf.remaining(),
            });
        }
        let pitch = buf.get_f32_le();
        let yaw = buf.get_f32_le();
        let position = Vec3::proto_decode(buf)?;
        let move_vector = (buf.get_f32_le(), buf.get_f32_le());
        let head_yaw = buf.get_f32_le();
        let trailer = buf.copy_to_bytes(buf.remaining());
        Ok(Self {
            pitch,
            yaw,
            position,
            move_vector,
            head_yaw,
            trailer,
        })
    }
}
