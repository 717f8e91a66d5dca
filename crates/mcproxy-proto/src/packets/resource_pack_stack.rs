//! ResourcePackStack (0x07) — Server → Client.

use bytes::{Buf, BufMut};

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::VarUInt32;

/// One pack reference in the applied stack order.
#[derive(Debug, Clone, PartialEq)]
pub struct StackEntry {
    pub pack_id: String,
    pub version: String,
    pub sub_pack_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct ResourcePackStack {
    pub must_accept: bool,
    pub behaviour_packs: Vec<StackEntry>,
    pub texture_packs: Vec<StackEntry>,
    pub game_version: String,
    pub experiments: Vec<(String, bool)>,
    pub experiments_previously_used: bool,
    pub has_editor_packs: bool,
}

fn encode_entries(buf: &mut impl BufMut, entries: &[StackEntry]) {
    VarUInt32(entries.len() as u32).proto_encode(buf);
    for e in entries {
        codec::write_string(buf, &e.pack_id);
        codec::write_string(buf, &e.version);
        codec::write_string(buf, &e.sub_pack_name);
    }
}

fn decode_entries(buf: &mut impl Buf) -> Result<Vec<StackEntry>, ProtoError> {
    let count = VarUInt32::proto_decode(buf)?.0 as usize;
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        entries.push(StackEntry {
            pack_id: codec::read_string(buf)?,
            version: codec::read_string(buf)?,
            sub_pack_name: codec::read_string(buf)?,
        });
    }
    Ok(entries)
}

impl ProtoEncode for ResourcePackStack {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.must_accept as u8);
        encode_entries(buf, &self.behaviour_packs);
        encode_entries(buf, &self.texture_packs);
        codec::write_string(buf, &self.game_version);
        buf.put_u32_le(self.experiments.len() as u32);
        for (name, enabled) in &self.experiments {
            codec::write_string(buf, name);
            buf.put_u8(*enabled as u8);
        }
        buf.put_u8(self.experiments_previously_used as u8);
        buf.put_u8(self.has_editor_packs as u8);
    }
}

impl ProtoDecode for ResourcePackStack {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let must_accept = codec::read_bool(buf)?;
        let behaviour_packs = decode_entries(buf)?;
        let texture_packs = decode_entries(buf)?;
        let game_version = codec::read_string(buf)?;
        if buf.remaining() < 4 {
            return Err(ProtoError::BufferTooShort {
                needed: 4,
                remaining: buf.remaining(),
            });
        }
        let experiment_count = buf.get_u32_le() as usize;
        let mut experiments = Vec::with_capacity(experiment_count);
        for _ in 0..experiment_count {
            let name = codec::read_string(buf)?;
            experiments.push((name, codec::read_bool(buf)?));
        }
        let experiments_previously_used = codec::read_bool(buf)?;
        let has_editor_packs = codec::read_bool(buf)?;
        Ok(Self {
            must_accept,
            behaviour_packs,
            texture_packs,
            game_version,
            experiments,
            experiments_previously_used,
            has_editor_packs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn stack_roundtrip() {
        let pkt = ResourcePackStack {
            must_accept: false,
            behaviour_packs: vec![StackEntry {
                pack_id: "bp-1".into(),
                version: "1.0.0".into(),
                sub_pack_name: String::new(),
            }],
            texture_packs: vec![],
            game_version: "1.26.0".into(),
            experiments: vec![("data_driven_items".into(), true)],
            experiments_previously_used: true,
            has_editor_packs: false,
        };
        let mut buf = BytesMut::new();
        pkt.proto_encode(&mut buf);
        let decoded = ResourcePackStack::proto_decode(&mut buf.freeze()).unwrap();
        assert_eq!(decoded.behaviour_packs, pkt.behaviour_packs);
        assert_eq!(decoded.experiments, pkt.experiments);
        assert!(decoded.experiments_previously_used);
    }
}
