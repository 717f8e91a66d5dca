//! AddActor (0x0D) — Server → Client.
//!
//! Spawns a non-player entity.

use bytes::{Buf, BufMut};

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::{
    decode_metadata, encode_metadata, EntityLink, Metadata, VarLong, VarUInt32, VarUInt64, Vec3,
};

/// A named attribute (health, movement speed) carried at spawn.
#[derive(Debug, Clone, PartialEq)]
pub struct ActorAttribute {
    pub name: String,
    pub min: f32,
    pub value: f32,
    pub max: f32,
}

#[derive(Debug, Clone)]
pub struct AddActor {
    pub unique_id: i64,
    pub runtime_id: u64,
    pub entity_type: String,
    pub position: Vec3,
    pub velocity: Vec3,
    pub pitch: f32,
    pub yaw: f32,
    pub head_yaw: f32,
    pub body_yaw: f32,
    pub attributes: Vec<ActorAttribute>,
    pub metadata: Metadata,
    pub links: Vec<EntityLink>,
}

impl ProtoEncode for AddActor {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        VarLong(self.unique_id).proto_encode(buf);
        VarUInt64(self.runtime_id).proto_encode(buf);
        codec::write_string(buf, &self.entity_type);
        self.position.proto_encode(buf);
        self.velocity.proto_encode(buf);
        buf.put_f32_le(self.pitch);
        buf.put_f32_le(self.yaw);
        buf.put_f32_le(self.head_yaw);
        buf.put_f32_le(self.body_yaw);
        VarUInt32(self.attributes.len() as u32).proto_encode(buf);
        for attr in &self.attributes {
            codec::write_string(buf, &attr.name);
            buf.put_f32_le(attr.min);
            buf.put_f32_le(attr.value);
            buf.put_f32_le(attr.max);
        }
        encode_metadata(buf, &self.metadata);
        // Synced entity properties: empty int and float lists.
        VarUInt32(0).proto_encode(buf);
        VarUInt32(0).proto_encode(buf);
        VarUInt32(self.links.len() as u32).proto_encode(buf);
        for link in &self.links {
            link.proto_encode(buf);
        }
    }
}

impl ProtoDecode for AddActor {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let unique_id = VarLong::proto_decode(buf)?.0;
        let runtime_id = VarUInt64::proto_decode(buf)?.0;
        let entity_type = codec::read_string(buf)?;
        let position = Vec3::proto_decode(buf)?;
        let velocity = Vec3::proto_decode(buf)?;
        if buf.remaining() < 16 {
            return Err(ProtoError::BufferTooShort {
                needed: 16,
                remaining: buf.remaining(),
            });
        }
        let pitch = buf.get_f32_le();
        let yaw = buf.get_f32_le();
        let head_yaw = buf.get_f32_le();
        let body_yaw = buf.get_f32_le();
        let attr_count = VarUInt32::proto_decode(buf)?.0 as usize;
        let mut attributes = Vec::with_capacity(attr_count);
        for _ in 0..attr_count {
            let name = codec::read_string(buf)?;
            if buf.remaining() < 12 {
                return Err(ProtoError::BufferTooShort {
                    needed: 12,
                    remaining: buf.remaining(),
                });
            }
            attributes.push(ActorAttribute {
                name,
                min: buf.get_f32_le(),
                value: buf.get_f32_le(),
                max: buf.get_f32_le(),
            });
        }
        let metadata = decode_metadata(buf)?;
        // Synced entity properties (ints then floats), skipped.
        for _ in 0..2 {
            let n = VarUInt32::proto_decode(buf)?.0 as usize;
            for _ in 0..n {
                VarUInt32::proto_decode(buf)?;
                VarUInt32::proto_decode(buf)?;
            }
        }
        let link_count = VarUInt32::proto_decode(buf)?.0 as usize;
        let mut links = Vec::with_capacity(link_count);
        for _ in 0..link_count {
            links.push(EntityLink::proto_decode(buf)?);
        }
        Ok(Self {
            unique_id,
            runtime_id,
            entity_type,
            position,
            velocity,
            pitch,
            yaw,
            head_yaw,
            body_yaw,
            attributes,
            metadata,
            links,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EntityLinkType, MetadataValue};
    use bytes::BytesMut;

    #[test]
    fn spawn_with_link_roundtrip() {
        let mut metadata = Metadata::new();
        metadata.insert(4, MetadataValue::String("Dinnerbone".into()));
        let pkt = AddActor {
            unique_id: -2,
            runtime_id: 17,
            entity_type: "minecraft:pig".into(),
            position: Vec3::new(35.5, 64.0, 0.5),
            velocity: Vec3::ZERO,
            pitch: 0.0,
            yaw: 90.0,
            head_yaw: 90.0,
            body_yaw: 90.0,
            attributes: vec![ActorAttribute {
                name: "minecraft:health".into(),
                min: 0.0,
                value: 10.0,
                max: 10.0,
            }],
            metadata,
            links: vec![EntityLink {
                ridden_unique_id: -2,
                rider_unique_id: -3,
                link_type: EntityLinkType::Rider,
                immediate: false,
                rider_initiated: false,
            }],
        };
        let mut buf = BytesMut::new();
        pkt.proto_encode(&mut buf);
        let decoded = AddActor::proto_decode(&mut buf.freeze()).unwrap();
        assert_eq!(decoded.entity_type, "minecraft:pig");
        assert_eq!(decoded.runtime_id, 17);
        assert_eq!(decoded.links.len(), 1);
        assert_eq!(decoded.attributes[0].value, 10.0);
        assert_eq!(
            decoded.metadata[&4],
            MetadataValue::String("Dinnerbone".into())
        );
    }
}
