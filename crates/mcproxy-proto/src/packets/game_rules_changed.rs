//! GameRulesChanged (0x48) — Server → Client.

use bytes::{Buf, BufMut};

use crate::codec::{ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::{decode_game_rules, encode_game_rules, GameRule};

#[derive(Debug, Clone)]
pub struct GameRulesChanged {
    pub rules: Vec<GameRule>,
}

impl ProtoEncode for GameRulesChanged {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        encode_game_rules(buf, &self.rules);
    }
}

impl ProtoDecode for GameRulesChanged {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            rules: decode_game_rules(buf)?,
        })
    }
}
