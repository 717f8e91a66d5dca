//! AddPlayer (0x0C) — Server → Client.
//!
//! Spawns a remote player entity. Ability layers and device info are carried
//! opaquely; the capture layer only needs identity, position, and equipment.

use bytes::{Buf, BufMut, Bytes};

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::{decode_metadata, encode_metadata, ItemStack, Metadata, Uuid, VarUInt64, Vec3};

#[derive(Debug, Clone)]
pub struct AddPlayer {
    pub uuid: Uuid,
    pub username: String,
    pub runtime_id: u64,
    pub platform_chat_id: String,
    pub position: Vec3,
    pub velocity: Vec3,
    pub pitch: f32,
    pub yaw: f32,
    pub head_yaw: f32,
    pub held_item: ItemStack,
    pub gamemode: i32,
    pub metadata: Metadata,
    /// Ability data, entity links, and device info, unparsed.
    pub trailer: Bytes,
}

impl ProtoEncode for AddPlayer {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        self.uuid.proto_encode(buf);
        codec::write_string(buf, &self.username);
        VarUInt64(self.runtime_id).proto_encode(buf);
        codec::write_string(buf, &self.platform_chat_id);
        self.position.proto_encode(buf);
        self.velocity.proto_encode(buf);
        buf.put_f32_le(self.pitch);
        buf.put_f32_le(self.yaw);
        buf.put_f32_le(self.head_yaw);
        self.held_item.proto_encode(buf);
        crate::types::VarInt(self.gamemode).proto_encode(buf);
        encode_metadata(buf, &self.metadata);
        buf.put_slice(&self.trailer);
    }
}

impl ProtoDecode for AddPlayer {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let uuid = Uuid::proto_decode(buf)?;
        let username = codec::read_string(buf)?;
        let runtime_id = VarUInt64::proto_decode(buf)?.0;
        let platform_chat_id = codec::read_string(buf)?;
        let position = Vec3::proto_decode(buf)?;
        let velocity = Vec3::proto_decode(buf)?;
        if buf.remaining() < 12 {
            return Err(ProtoError::BufferTooShort {
                needed: 12,
                remaining: buf.remaining(),
            });
        }
        let pitch = buf.get_f32_le();
        let yaw = buf.get_f32_le();
        let head_yaw = buf.get_f32_le();
        let held_item = ItemStack::proto_decode(buf)?;
        let gamemode = crate::types::VarInt::proto_decode(buf)?.0;
        let metadata = decode_metadata(buf)?;
        let trailer = buf.copy_to_bytes(buf.remaining());
        Ok(Self {
            uuid,
            username,
            runtime_id,
            platform_chat_id,
            position,
            velocity,
            pitch,
            yaw,
            head_yaw,
            held_item,
            gamemode,
            metadata,
            trailer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn identity_roundtrip() {
        let pkt = AddPlayer {
            uuid: Uuid::new(1, 2),
            username: "Steve".into(),
            runtime_id: 99,
            platform_chat_id: String::new(),
            position: Vec3::new(0.5, 64.0, 0.5),
            velocity: Vec3::ZERO,
            pitch: 0.0,
            yaw: 0.0,
            head_yaw: 0.0,
            held_item: ItemStack::default(),
            gamemode: 0,
            metadata: Metadata::new(),
            trailer: Bytes::from_static(&[1, 2, 3]),
        };
        let mut buf = BytesMut::new();
        pkt.proto_encode(&mut buf);
        let decoded = AddPlayer::proto_decode(&mut buf.freeze()).unwrap();
        assert_eq!(decoded.username, "Steve");
        assert_eq!(decoded.runtime_id, 99);
        assert_eq!(&decoded.trailer[..], &[1, 2, 3]);
    }
}
