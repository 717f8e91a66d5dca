//! MovePlayer (0x13) — bidirectional.

use bytes::{Buf, BufMut};

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::{VarInt, VarUInt64, Vec3};

pub const MOVE_MODE_NORMAL: u8 = 0;
pub const MOVE_MODE_TELEPORT: u8 = 2;

#[derive(Debug, Clone, Copy)]
pub struct MovePlayer {
    pub runtime_id: u64,
    pub position: Vec3,
    pub pitch: f32,
    pub yaw: f32,
    pub head_yaw: f32,
    pub mode: u8,
    pub on_ground: bool,
    pub ridden_runtime_id: u64,
    /// Cause and source type, only present for teleport moves.
    pub teleport_cause: Option<(i32, i32)>,
    pub tick: u64,
}

impl ProtoEncode for MovePlayer {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        VarUInt64(self.runtime_id).proto_encode(buf);
        self.position.proto_encode(buf);
        buf.put_f32_le(self.pitch);
        buf.put_f32_le(self.yaw);
        buf.put_f32_le(self.head_yaw);
        buf.put_u8(self.mode);
        buf.put_u8(self.on_ground as u8);
        VarUInt64(self.ridden_runtime_id).proto_encode(buf);
        if self.mode == MOVE_MODE_TELEPORT {
            let (cause, source) = self.teleport_cause.unwrap_or((0, 0));
            buf.put_i32_le(cause);
            buf.put_i32_le(source);
        }
        VarUInt64(self.tick).proto_encode(buf);
    }
}

impl ProtoDecode for MovePlayer {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let runtime_id = VarUInt64::proto_decode(buf)?.0;
        let position = Vec3::proto_decode(buf)?;
        if buf.remaining() < 14 {
            return Err(ProtoError::BufferTooShort {
                needed: 14,
                remaining: buf.remaining(),
            });
        }
        let pitch = buf.get_f32_le();
        let yaw = buf.get_f32_le();
        let head_yaw = buf.get_f32_le();
        let mode = buf.get_u8();
        let on_ground = codec::read_bool(buf)?;
        let ridden_runtime_id = VarUInt64::proto_decode(buf)?.0;
        let teleport_cause = if mode == MOVE_MODE_TELEPORT {
            if buf.remaining() < 8 {
                return Err(ProtoError::BufferTooShort {
                    needed: 8,
                    remaining: buf.remaining(),
                });
            }
            Some((buf.get_i32_le(), buf.get_i32_le()))
        } else {
            None
        };
        let tick = VarUInt64::proto_decode(buf)?.0;
        Ok(Self {
            runtime_id,
            position,
            pitch,
            yaw,
            head_yaw,
            mode,
            on_ground,
            ridden_runtime_id,
            teleport_cause,
            tick,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn normal_move_roundtrip() {
        let pkt = MovePlayer {
            runtime_id: 1,
            position: Vec3::new(10.0, 65.6, -3.0),
            pitch: 12.0,
            yaw: 180.0,
            head_yaw: 180.0,
            mode: MOVE_MODE_NORMAL,
            on_ground: true,
            ridden_runtime_id: 0,
            teleport_cause: None,
            tick: 400,
        };
        let mut buf = BytesMut::new();
        pkt.proto_encode(&mut buf);
        let decoded = MovePlayer::proto_decode(&mut buf.freeze()).unwrap();
        assert_eq!(decoded.position, pkt.position);
        assert!(decoded.teleport_cause.is_none());
        assert_eq!(decoded.tick, 400);
    }

    #[test]
    fn teleport_carries_cause() {
        let pkt = MovePlayer {
            runtime_id: 1,
            position: Vec3::ZERO,
            pitch: 0.0,
            yaw: 0.0,
            head_yaw: 0.0,
            mode: MOVE_MODE_TELEPORT,
            on_ground: false,
            ridden_runtime_id: 0,
            teleport_cause: Some((2, 0)),
            tick: 0,
        };
        let mut buf = BytesMut::new();
        pkt.proto_encode(&mut buf);
        let decoded = MovePlayer::proto_decode(&mut buf.freeze()).unwrap();
        assert_eq!(decoded.teleport_cause, Some((2, 0)));
    }
}
