//! SetActorLink (0x29) — Server → Client.

use bytes::{Buf, BufMut};

use crate::codec::{ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::EntityLink;

/// Adds or removes a rider/ridden edge between two entities.
#[derive(Debug, Clone, Copy)]
pub struct SetActorLink {
    pub link: EntityLink,
}

impl ProtoEncode for SetActorLink {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        self.link.proto_encode(buf);
    }
}

impl ProtoDecode for SetActorLink {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            link: EntityLink::proto_decode(buf)?,
        })
    }
}
