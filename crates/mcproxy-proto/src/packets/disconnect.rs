//! Disconnect (0x05) — Server → Client.

use bytes::{Buf, BufMut};

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::VarInt;

/// Kicks the receiving peer with an optional on-screen message.
#[derive(Debug, Clone)]
pub struct Disconnect {
    pub reason: i32,
    pub hide_screen: bool,
    pub message: String,
}

impl ProtoEncode for Disconnect {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        VarInt(self.reason).proto_encode(buf);
        buf.put_u8(self.hide_screen as u8);
        if !self.hide_screen {
            codec::write_string(buf, &self.message);
        }
    }
}

impl ProtoDecode for Disconnect {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let reason = VarInt::proto_decode(buf)?.0;
        let hide_screen = codec::read_bool(buf)?;
        let message = if hide_screen {
            String::new()
        } else {
            codec::read_string(buf)?
        };
        Ok(Self {
            reason,
            hide_screen,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn message_omitted_when_screen_hidden() {
        let pkt = Disconnect {
            reason: 0,
            hide_screen: true,
            message: "ignored".into(),
        };
        let mut buf = BytesMut::new();
        pkt.proto_encode(&mut buf);
        assert_eq!(buf.len(), 2);
        let decoded = Disconnect::proto_decode(&mut buf.freeze()).unwrap();
        assert!(decoded.message.is_empty());
    }

    #[test]
    fn message_roundtrip() {
        let pkt = Disconnect {
            reason: 0,
            hide_screen: false,
            message: "Server closed".into(),
        };
        let mut buf = BytesMut::new();
        pkt.proto_encode(&mut buf);
        let decoded = Disconnect::proto_decode(&mut buf.freeze()).unwrap();
        assert_eq!(decoded.message, "Server closed");
    }
}
