//! CommandRequest (0x4D) — Client → Server.
//!
//! Sent when the player types a `/command` in chat.

use bytes::{Buf, BufMut};

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::{Uuid, VarLong, VarUInt32};

/// Origin information echoed back verbatim in CommandOutput.
#[derive(Debug, Clone)]
pub struct CommandOrigin {
    pub origin_type: u32,
    pub uuid: Uuid,
    pub request_id: String,
    /// Only present when origin_type is 3 (DevConsole) or 5 (Test).
    pub player_entity_id: Option<i64>,
}

impl CommandOrigin {
    pub fn player() -> Self {
        Self {
            origin_type: 0,
            uuid: Uuid::ZERO,
            request_id: String::new(),
            player_entity_id: None,
        }
    }
}

impl ProtoEncode for CommandOrigin {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        VarUInt32(self.origin_type).proto_encode(buf);
        self.uuid.proto_encode(buf);
        codec::write_string(buf, &self.request_id);
        if self.origin_type == 3 || self.origin_type == 5 {
            VarLong(self.player_entity_id.unwrap_or(0)).proto_encode(buf);
        }
    }
}

impl ProtoDecode for CommandOrigin {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let origin_type = VarUInt32::proto_decode(buf)?.0;
        let uuid = Uuid::proto_decode(buf)?;
        let request_id = codec::read_string(buf)?;
        let player_entity_id = if origin_type == 3 || origin_type == 5 {
            Some(VarLong::proto_decode(buf)?.0)
        } else {
            None
        };
        Ok(Self {
            origin_type,
            uuid,
            request_id,
            player_entity_id,
        })
    }
}

/// The raw command line including the leading slash.
#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub command_line: String,
    pub origin: CommandOrigin,
    pub internal: bool,
    pub version: i32,
}

impl ProtoEncode for CommandRequest {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        codec::write_string(buf, &self.command_line);
        self.origin.proto_encode(buf);
        buf.put_u8(self.internal as u8);
        crate::types::VarInt(self.version).proto_encode(buf);
    }
}

impl ProtoDecode for CommandRequest {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let command_line = codec::read_string(buf)?;
        let origin = CommandOrigin::proto_decode(buf)?;
        let internal = codec::read_bool(buf)?;
        let version = crate::types::VarInt::proto_decode(buf)?.0;
        Ok(Self {
            command_line,
            origin,
            internal,
            version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn player_origin_roundtrip() {
        let pkt = CommandRequest {
            command_line: "/zoom 3".into(),
            origin: CommandOrigin::player(),
            internal: false,
            version: 36,
        };
        let mut buf = BytesMut::new();
        pkt.proto_encode(&mut buf);
        let decoded = CommandRequest::proto_decode(&mut buf.freeze()).unwrap();
        assert_eq!(decoded.command_line, "/zoom 3");
        assert!(decoded.origin.player_entity_id.is_none());
    }

    #[test]
    fn dev_console_carries_entity_id() {
        let pkt = CommandRequest {
            command_line: "/stop".into(),
            origin: CommandOrigin {
                origin_type: 3,
                uuid: Uuid::ZERO,
                request_id: "req-1".into(),
                player_entity_id: Some(42),
            },
            internal: false,
            version: 36,
        };
        let mut buf = BytesMut::new();
        pkt.proto_encode(&mut buf);
        let decoded = CommandRequest::proto_decode(&mut buf.freeze()).unwrap();
        assert_eq!(decoded.origin.player_entity_id, Some(42));
    }
}
