//! Transfer (0x55) — Server → Client.
//!
//! Instructs the client to reconnect to another server address. The proxy
//! intercepts these and rewrites them so the client reconnects through the
//! proxy itself.

use bytes::{Buf, BufMut};

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;

#[derive(Debug, Clone, PartialEq)]
pub struct Transfer {
    pub address: String,
    pub port: u16,
}

impl Transfer {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }
}

impl ProtoEncode for Transfer {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        codec::write_string(buf, &self.address);
        buf.put_u16_le(self.port);
    }
}

impl ProtoDecode for Transfer {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let address = codec::read_string(buf)?;
        if buf.remaining() < 2 {
            return Err(ProtoError::BufferTooShort {
                needed: 2,
                remaining: buf.remaining(),
            });
        }
        let port = buf.get_u16_le();
        Ok(Self { address, port })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn roundtrip() {
        let pkt = Transfer::new("hub2.example.net", 19133);
        let mut buf = BytesMut::new();
        pkt.proto_encode(&mut buf);
        let decoded = Transfer::proto_decode(&mut buf.freeze()).unwrap();
        assert_eq!(decoded, pkt);
    }
}
