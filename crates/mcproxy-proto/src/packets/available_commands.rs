//! AvailableCommands (0x4C) — Server → Client.
//!
//! The command palette the client autocompletes from. The proxy appends its
//! own in-game commands before forwarding, so only the command descriptions
//! are modeled; enum and parameter tables are carried opaquely.

use bytes::{Buf, BufMut, Bytes};

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::VarUInt32;

/// One command entry visible to the client.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandEntry {
    pub name: String,
    pub description: String,
    pub flags: u16,
    pub permission_level: u8,
    /// Index into the alias enum table; `u32::MAX` means no aliases.
    pub aliases_offset: u32,
}

impl CommandEntry {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            flags: 0,
            permission_level: 0,
            aliases_offset: u32::MAX,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AvailableCommands {
    pub commands: Vec<CommandEntry>,
    /// Enum values, suffixes, enums, and parameter overloads, unparsed.
    pub trailer: Bytes,
}

impl ProtoEncode for AvailableCommands {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        VarUInt32(self.commands.len() as u32).proto_encode(buf);
        for cmd in &self.commands {
            codec::write_string(buf, &cmd.name);
            codec::write_string(buf, &cmd.description);
            buf.put_u16_le(cmd.flags);
            buf.put_u8(cmd.permission_level);
            buf.put_u32_le(cmd.aliases_offset);
        }
        buf.put_slice(&self.trailer);
    }
}

impl ProtoDecode for AvailableCommands {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let count = VarUInt32::proto_decode(buf)?.0 as usize;
        let mut commands = Vec::with_capacity(count);
        for _ in 0..count {
            let name = codec::read_string(buf)?;
            let description = codec::read_string(buf)?;
            if buf.remaining() < 7 {
                return Err(ProtoError::BufferTooShort {
                    needed: 7,
                    remaining: buf.remaining(),
                });
            }
            let flags = buf.get_u16_le();
            let permission_level = buf.get_u8();
            let aliases_offset = buf.get_u32_le();
            commands.push(CommandEntry {
                name,
                description,
                flags,
                permission_level,
                aliases_offset,
            });
        }
        let trailer = buf.copy_to_bytes(buf.remaining());
        Ok(Self { commands, trailer })
    }
}
