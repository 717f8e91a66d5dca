//! ResourcePackClientResponse (0x08) — Client → Server.

use bytes::{Buf, BufMut};

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;

/// Client decision in the pack negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackResponseStatus {
    Refused,
    SendPacks,
    HaveAllPacks,
    Completed,
}

impl PackResponseStatus {
    fn from_u8(v: u8) -> Result<Self, ProtoError> {
        match v {
            1 => Ok(Self::Refused),
            2 => Ok(Self::SendPacks),
            3 => Ok(Self::HaveAllPacks),
            4 => Ok(Self::Completed),
            other => Err(ProtoError::InvalidData(format!(
                "pack response status {other}"
            ))),
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Refused => 1,
            Self::SendPacks => 2,
            Self::HaveAllPacks => 3,
            Self::Completed => 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResourcePackClientResponse {
    pub response: PackResponseStatus,
    /// Pack ids (`uuid_version`) this response refers to.
    pub packs_to_download: Vec<String>,
}

impl ProtoEncode for ResourcePackClientResponse {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.response.as_u8());
        buf.put_u16_le(self.packs_to_download.len() as u16);
        for id in &self.packs_to_download {
            codec::write_string(buf, id);
        }
    }
}

impl ProtoDecode for ResourcePackClientResponse {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        if buf.remaining() < 3 {
            return Err(ProtoError::BufferTooShort {
                needed: 3,
                remaining: buf.remaining(),
            });
        }
        let response = PackResponseStatus::from_u8(buf.get_u8())?;
        let count = buf.get_u16_le() as usize;
        let mut packs_to_download = Vec::with_capacity(count);
        for _ in 0..count {
            packs_to_download.push(codec::read_string(buf)?);
        }
        Ok(Self {
            response,
            packs_to_download,
        })
    }
}
