//! SetLocalPlayerAsInitialised (0x71) — Client → Server.
//!
//! Marks the end of the spawn sequence; the session flips its `spawned`
//! flag when this id passes through the raw path.

use bytes::{Buf, BufMut};

use crate::codec::{ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::VarUInt64;

#[derive(Debug, Clone, Copy)]
pub struct SetLocalPlayerAsInitialised {
    pub runtime_id: u64,
}

impl ProtoEncode for SetLocalPlayerAsInitialised {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        VarUInt64(self.runtime_id).proto_encode(buf);
    }
}

impl ProtoDecode for SetLocalPlayerAsInitialised {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            runtime_id: VarUInt64::proto_decode(buf)?.0,
        })
    }
}
