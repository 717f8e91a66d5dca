//! DimensionData (0xB4) — Server → Client.
//!
//! Custom dimension definitions. Buffered by the session pre-spawn and
//! replayed to the client ahead of StartGame.

use bytes::{Buf, BufMut};

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::{VarInt, VarUInt32};

#[derive(Debug, Clone, PartialEq)]
pub struct DimensionDefinition {
    pub name: String,
    pub range_max: i32,
    pub range_min: i32,
    pub generator: i32,
}

#[derive(Debug, Clone)]
pub struct DimensionData {
    pub definitions: Vec<DimensionDefinition>,
}

impl ProtoEncode for DimensionData {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        VarUInt32(self.definitions.len() as u32).proto_encode(buf);
        for def in &self.definitions {
            codec::write_string(buf, &def.name);
            VarInt(def.range_max).proto_encode(buf);
            VarInt(def.range_min).proto_encode(buf);
            VarInt(def.generator).proto_encode(buf);
        }
    }
}

impl ProtoDecode for DimensionData {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let count = VarUInt32::proto_decode(buf)?.0 as usize;
        let mut definitions = Vec::with_capacity(count);
        for _ in 0..count {
            let name = codec::read_string(buf)?;
            let range_max = VarInt::proto_decode(buf)?.0;
            let range_min = VarInt::proto_decode(buf)?.0;
            let generator = VarInt::proto_decode(buf)?.0;
            definitions.push(DimensionDefinition {
                name,
                range_max,
                range_min,
                generator,
            });
        }
        Ok(Self { definitions })
    }
}
