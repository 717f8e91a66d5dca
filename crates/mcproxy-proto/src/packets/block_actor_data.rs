//! BlockActorData (0x38) — Server → Client.
//!
//! Carries the NBT of a block entity (chest, sign, spawner). The compound is
//! kept as raw network-NBT bytes; the capture layer parses it.

use bytes::{Buf, BufMut, Bytes};

use crate::codec::{ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::BlockPos;

#[derive(Debug, Clone)]
pub struct BlockActorData {
    pub position: BlockPos,
    pub nbt: Bytes,
}

impl ProtoEncode for BlockActorData {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        self.position.proto_encode(buf);
        buf.put_slice(&self.nbt);
    }
}

impl ProtoDecode for BlockActorData {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let position = BlockPos::proto_decode(buf)?;
        let nbt = buf.copy_to_bytes(buf.remaining());
        Ok(Self { position, nbt })
    }
}
