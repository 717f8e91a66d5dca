//! Text (0x09) — bidirectional chat and UI text.

use bytes::{Buf, BufMut};

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;

pub const TEXT_TYPE_CHAT: u8 = 1;
pub const TEXT_TYPE_SYSTEM: u8 = 6;
pub const TEXT_TYPE_POPUP: u8 = 3;
pub const TEXT_TYPE_JUKEBOX_POPUP: u8 = 4;
pub const TEXT_TYPE_TIP: u8 = 5;

/// Chat/system/popup text. Source name is only present for the chat-like
/// types; the proxy only emits system and popup messages.
#[derive(Debug, Clone)]
pub struct Text {
    pub text_type: u8,
    pub needs_translation: bool,
    pub source_name: String,
    pub message: String,
    pub xuid: String,
    pub platform_chat_id: String,
}

impl Text {
    pub fn system(message: impl Into<String>) -> Self {
        Self {
            text_type: TEXT_TYPE_SYSTEM,
            needs_translation: false,
            source_name: String::new(),
            message: message.into(),
            xuid: String::new(),
            platform_chat_id: String::new(),
        }
    }

    pub fn popup(message: impl Into<String>) -> Self {
        Self {
            text_type: TEXT_TYPE_POPUP,
            ..Self::system(message)
        }
    }

    fn has_source(&self) -> bool {
        self.text_type == TEXT_TYPE_CHAT
    }
}

impl ProtoEncode for Text {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.text_type);
        buf.put_u8(self.needs_translation as u8);
        if self.has_source() {
            codec::write_string(buf, &self.source_name);
        }
        codec::write_string(buf, &self.message);
        codec::write_string(buf, &self.xuid);
        codec::write_string(buf, &self.platform_chat_id);
    }
}

impl ProtoDecode for Text {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        if buf.remaining() < 2 {
            return Err(ProtoError::BufferTooShort {
                needed: 2,
                remaining: buf.remaining(),
            });
        }
        let text_type = buf.get_u8();
        let needs_translation = buf.get_u8() != 0;
        let source_name = if text_type == TEXT_TYPE_CHAT {
            codec::read_string(buf)?
        } else {
            String::new()
        };
        let message = codec::read_string(buf)?;
        let xuid = codec::read_string(buf)?;
        let platform_chat_id = codec::read_string(buf)?;
        Ok(Self {
            text_type,
            needs_translation,
            source_name,
            message,
            xuid,
            platform_chat_id,
        })
    }
}
