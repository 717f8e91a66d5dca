//! ResourcePacksInfo (0x06) — Server → Client.

use bytes::{Buf, BufMut};

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::Uuid;

/// One advertised pack. Behavior and resource packs share this entry shape.
#[derive(Debug, Clone, PartialEq)]
pub struct PackInfoEntry {
    pub pack_id: Uuid,
    pub version: String,
    pub size: u64,
    pub encryption_key: String,
    pub sub_pack_name: String,
    pub content_id: String,
    pub has_scripts: bool,
    pub is_addon_pack: bool,
    pub is_rtx_capable: bool,
    pub cdn_url: String,
}

impl PackInfoEntry {
    pub fn new(pack_id: Uuid, version: impl Into<String>, size: u64) -> Self {
        Self {
            pack_id,
            version: version.into(),
            size,
            encryption_key: String::new(),
            sub_pack_name: String::new(),
            content_id: String::new(),
            has_scripts: false,
            is_addon_pack: false,
            is_rtx_capable: false,
            cdn_url: String::new(),
        }
    }
}

/// Advertises the packs a client must or may download before spawning.
#[derive(Debug, Clone, Default)]
pub struct ResourcePacksInfo {
    pub must_accept: bool,
    pub has_addons: bool,
    pub has_scripts: bool,
    pub force_disable_vibrant_visuals: bool,
    pub world_template_id: Option<Uuid>,
    pub world_template_version: String,
    pub packs: Vec<PackInfoEntry>,
}

impl ProtoEncode for ResourcePacksInfo {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.must_accept as u8);
        buf.put_u8(self.has_addons as u8);
        buf.put_u8(self.has_scripts as u8);
        buf.put_u8(self.force_disable_vibrant_visuals as u8);
        self.world_template_id.unwrap_or(Uuid::ZERO).proto_encode(buf);
        codec::write_string(buf, &self.world_template_version);
        // Pack count is u16_le, not VarUInt32.
        buf.put_u16_le(self.packs.len() as u16);
        for p in &self.packs {
            p.pack_id.proto_encode(buf);
            codec::write_string(buf, &p.version);
            buf.put_u64_le(p.size);
            codec::write_string(buf, &p.encryption_key);
            codec::write_string(buf, &p.sub_pack_name);
            codec::write_string(buf, &p.content_id);
            buf.put_u8(p.has_scripts as u8);
            buf.put_u8(p.is_addon_pack as u8);
            buf.put_u8(p.is_rtx_capable as u8);
            codec::write_string(buf, &p.cdn_url);
        }
    }
}

impl ProtoDecode for ResourcePacksInfo {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        if buf.remaining() < 4 {
            return Err(ProtoError::BufferTooShort {
                needed: 4,
                remaining: buf.remaining(),
            });
        }
        let must_accept = buf.get_u8() != 0;
        let has_addons = buf.get_u8() != 0;
        let has_scripts = buf.get_u8() != 0;
        let force_disable_vibrant_visuals = buf.get_u8() != 0;
        let template_id = Uuid::proto_decode(buf)?;
        let world_template_id = (template_id != Uuid::ZERO).then_some(template_id);
        let world_template_version = codec::read_string(buf)?;
        if buf.remaining() < 2 {
            return Err(ProtoError::BufferTooShort {
                needed: 2,
                remaining: buf.remaining(),
            });
        }
        let count = buf.get_u16_le() as usize;
        let mut packs = Vec::with_capacity(count);
        for _ in 0..count {
            let pack_id = Uuid::proto_decode(buf)?;
            let version = codec::read_string(buf)?;
            if buf.remaining() < 8 {
                return Err(ProtoError::BufferTooShort {
                    needed: 8,
                    remaining: buf.remaining(),
                });
            }
            let size = buf.get_u64_le();
            let encryption_key = codec::read_string(buf)?;
            let sub_pack_name = codec::read_string(buf)?;
            let content_id = codec::read_string(buf)?;
            if buf.remaining() < 3 {
                return Err(ProtoError::BufferTooShort {
                    needed: 3,
                    remaining: buf.remaining(),
                });
            }
            let has_scripts = buf.get_u8() != 0;
            let is_addon_pack = buf.get_u8() != 0;
            let is_rtx_capable = buf.get_u8() != 0;
            let cdn_url = codec::read_string(buf)?;
            packs.push(PackInfoEntry {
                pack_id,
                version,
                size,
                encryption_key,
                sub_pack_name,
                content_id,
                has_scripts,
                is_addon_pack,
                is_rtx_capable,
                cdn_url,
            });
        }
        Ok(Self {
            must_accept,
            has_addons,
            has_scripts,
            force_disable_vibrant_visuals,
            world_template_id,
            world_template_version,
            packs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn two_packs_roundtrip() {
        let pkt = ResourcePacksInfo {
            must_accept: true,
            packs: vec![
                PackInfoEntry::new(Uuid::new(1, 2), "1.0.0", 4096),
                PackInfoEntry::new(Uuid::new(3, 4), "2.1.0", 1 << 20),
            ],
            ..Default::default()
        };
        let mut buf = BytesMut::new();
        pkt.proto_encode(&mut buf);
        let decoded = ResourcePacksInfo::proto_decode(&mut buf.freeze()).unwrap();
        assert!(decoded.must_accept);
        assert_eq!(decoded.packs, pkt.packs);
        assert!(decoded.world_template_id.is_none());
    }
}
