//! SetTime (0x0A) — Server → Client.

use bytes::{Buf, BufMut};

use crate::codec::{ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::VarInt;

/// Current world time in ticks.
#[derive(Debug, Clone, Copy)]
pub struct SetTime {
    pub time: i32,
}

impl ProtoEncode for SetTime {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        VarInt(self.time).proto_encode(buf);
    }
}

impl ProtoDecode for SetTime {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            time: VarInt::proto_decode(buf)?.0,
        })
    }
}
