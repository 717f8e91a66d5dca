//! RemoveActor (0x0E) — Server → Client.

use bytes::{Buf, BufMut};

use crate::codec::{ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::VarLong;

/// Despawns an entity by its unique id.
#[derive(Debug, Clone, Copy)]
pub struct RemoveActor {
    pub unique_id: i64,
}

impl ProtoEncode for RemoveActor {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        VarLong(self.unique_id).proto_encode(buf);
    }
}

impl ProtoDecode for RemoveActor {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            unique_id: VarLong::proto_decode(buf)?.0,
        })
    }
}
