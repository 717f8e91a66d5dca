//! ChangeDimension (0x3D) — Server → Client.

use bytes::{Buf, BufMut};

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::{VarInt, Vec3};

/// Moves the player to another dimension.
#[derive(Debug, Clone)]
pub struct ChangeDimension {
    pub dimension: i32,
    pub position: Vec3,
    pub respawn: bool,
    /// Loading-screen correlation id (protocol 712+).
    pub loading_screen_id: Option<u32>,
}

impl ProtoEncode for ChangeDimension {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        VarInt(self.dimension).proto_encode(buf);
        self.position.proto_encode(buf);
        buf.put_u8(self.respawn as u8);
        match self.loading_screen_id {
            Some(id) => {
                buf.put_u8(1);
                buf.put_u32_le(id);
            }
            None => buf.put_u8(0),
        }
    }
}

impl ProtoDecode for ChangeDimension {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let dimension = VarInt::proto_decode(buf)?.0;
        let position = Vec3::proto_decode(buf)?;
        let respawn = codec::read_bool(buf)?;
        let loading_screen_id = if codec::read_bool(buf)? {
            if buf.remaining() < 4 {
                return Err(ProtoError::BufferTooShort {
                    needed: 4,
                    remaining: buf.remaining(),
                });
            }
            Some(buf.get_u32_le())
        } else {
            None
        };
        Ok(Self {
            dimension,
            position,
            respawn,
            loading_screen_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn nether_roundtrip() {
        let pkt = ChangeDimension {
            dimension: 1,
            position: Vec3::new(8.0, 70.0, 8.0),
            respawn: false,
            loading_screen_id: Some(7),
        };
        let mut buf = BytesMut::new();
        pkt.proto_encode(&mut buf);
        let decoded = ChangeDimension::proto_decode(&mut buf.freeze()).unwrap();
        assert_eq!(decoded.dimension, 1);
        assert_eq!(decoded.loading_screen_id, Some(7));
    }
}
