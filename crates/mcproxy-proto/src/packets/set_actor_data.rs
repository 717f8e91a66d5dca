//! SetActorData (0x27) — Server → Client.
//!
//! Metadata updates for an already-spawned entity.

use bytes::{Buf, BufMut};

use crate::codec::{ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::{decode_metadata, encode_metadata, Metadata, VarUInt32, VarUInt64};

#[derive(Debug, Clone)]
pub struct SetActorData {
    pub runtime_id: u64,
    pub metadata: Metadata,
    pub tick: u64,
}

impl ProtoEncode for SetActorData {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        VarUInt64(self.runtime_id).proto_encode(buf);
        encode_metadata(buf, &self.metadata);
        // Synced entity properties: empty int and float lists.
        VarUInt32(0).proto_encode(buf);
        VarUInt32(0).proto_encode(buf);
        VarUInt64(self.tick).proto_encode(buf);
    }
}

impl ProtoDecode for SetActorData {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let runtime_id = VarUInt64::proto_decode(buf)?.0;
        let metadata = decode_metadata(buf)?;
        for _ in 0..2 {
            let n = VarUInt32::proto_decode(buf)?.0 as usize;
            for _ in 0..n {
                VarUInt32::proto_decode(buf)?;
                VarUInt32::proto_decode(buf)?;
            }
        }
        let tick = VarUInt64::proto_decode(buf)?.0;
        Ok(Self {
            runtime_id,
            metadata,
            tick,
        })
    }
}
