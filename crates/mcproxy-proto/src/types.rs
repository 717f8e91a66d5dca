//! Base data types used throughout the Bedrock protocol.

use std::collections::HashMap;
use std::fmt;

use bytes::{Buf, BufMut, Bytes};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum VarIntError {
    #[error("buffer too short")]
    BufferTooShort,
    #[error("VarInt is too long (more than {max_bytes} bytes)")]
    TooManyBytes { max_bytes: usize },
}

// ---------------------------------------------------------------------------
// ZigZag helpers
// ---------------------------------------------------------------------------

#[inline]
fn zigzag_encode_32(v: i32) -> u32 {
    ((v << 1) ^ (v >> 31)) as u32
}

#[inline]
fn zigzag_decode_32(v: u32) -> i32 {
    (v >> 1) as i32 ^ -((v & 1) as i32)
}

#[inline]
fn zigzag_encode_64(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

#[inline]
fn zigzag_decode_64(v: u64) -> i64 {
    (v >> 1) as i64 ^ -((v & 1) as i64)
}

macro_rules! leb128_impl {
    ($name:ident, $raw:ty, $max:expr, |$v:ident| $enc:expr, |$r:ident| $dec:expr) => {
        impl $name {
            /// Maximum bytes this integer can occupy on the wire.
            pub const MAX_BYTES: usize = $max;
        }

        impl ProtoEncode for $name {
            fn proto_encode(&self, buf: &mut impl BufMut) {
                let $v = self.0;
                let mut value: $raw = $enc;
                loop {
                    if value & !0x7F == 0 {
                        buf.put_u8(value as u8);
                        return;
                    }
                    buf.put_u8((value & 0x7F | 0x80) as u8);
                    value >>= 7;
                }
            }
        }

        impl ProtoDecode for $name {
            fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
                let mut $r: $raw = 0;
                let mut shift: u32 = 0;
                for i in 0..Self::MAX_BYTES {
                    if !buf.has_remaining() {
                        return Err(VarIntError::BufferTooShort.into());
                    }
                    let byte = buf.get_u8();
                    $r |= ((byte & 0x7F) as $raw) << shift;
                    if byte & 0x80 == 0 {
                        return Ok($name($dec));
                    }
                    shift += 7;
                    if i == Self::MAX_BYTES - 1 {
                        return Err(VarIntError::TooManyBytes {
                            max_bytes: Self::MAX_BYTES,
                        }
                        .into());
                    }
                }
                Err(VarIntError::BufferTooShort.into())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Variable-length integers
// ---------------------------------------------------------------------------

/// Signed 32-bit VarInt (ZigZag + LEB128).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarInt(pub i32);

leb128_impl!(VarInt, u32, 5, |v| zigzag_encode_32(v), |r| {
    zigzag_decode_32(r)
});

/// Signed 64-bit VarLong (ZigZag + LEB128).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarLong(pub i64);

leb128_impl!(VarLong, u64, 10, |v| zigzag_encode_64(v), |r| {
    zigzag_decode_64(r)
});

/// Unsigned 32-bit VarUInt (plain LEB128, no ZigZag). Used for lengths,
/// counts, and packet IDs.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarUInt32(pub u32);

leb128_impl!(VarUInt32, u32, 5, |v| v, |r| r);

/// Unsigned 64-bit VarUInt (plain LEB128, no ZigZag). Used for entity
/// runtime IDs.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarUInt64(pub u64);

leb128_impl!(VarUInt64, u64, 10, |v| v, |r| r);

// ---------------------------------------------------------------------------
// Vec3 (f32 x, y, z)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl ProtoEncode for Vec3 {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_f32_le(self.x);
        buf.put_f32_le(self.y);
        buf.put_f32_le(self.z);
    }
}

impl ProtoDecode for Vec3 {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        if buf.remaining() < 12 {
            return Err(ProtoError::BufferTooShort {
                needed: 12,
                remaining: buf.remaining(),
            });
        }
        Ok(Self {
            x: buf.get_f32_le(),
            y: buf.get_f32_le(),
            z: buf.get_f32_le(),
        })
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// Uuid (two i64 LE halves, the Bedrock layout)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Uuid {
    pub most_significant: u64,
    pub least_significant: u64,
}

impl Uuid {
    pub const ZERO: Self = Self {
        most_significant: 0,
        least_significant: 0,
    };

    pub fn new(most: u64, least: u64) -> Self {
        Self {
            most_significant: most,
            least_significant: least,
        }
    }
}

impl ProtoEncode for Uuid {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_u64_le(self.most_significant);
        buf.put_u64_le(self.least_significant);
    }
}

impl ProtoDecode for Uuid {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        if buf.remaining() < 16 {
            return Err(ProtoError::BufferTooShort {
                needed: 16,
                remaining: buf.remaining(),
            });
        }
        Ok(Self {
            most_significant: buf.get_u64_le(),
            least_significant: buf.get_u64_le(),
        })
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut b = [0u8; 16];
        b[..8].copy_from_slice(&self.most_significant.to_be_bytes());
        b[8..].copy_from_slice(&self.least_significant.to_be_bytes());
        write!(
            f,
            "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
            b[8], b[9], b[10], b[11], b[12], b[13], b[14], b[15],
        )
    }
}

// ---------------------------------------------------------------------------
// Positions
// ---------------------------------------------------------------------------

/// Absolute block position. Wire format: VarInt(x) + VarUInt32(y) + VarInt(z).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The chunk column containing this block.
    pub fn chunk_pos(&self) -> ChunkPos {
        ChunkPos::new(self.x >> 4, self.z >> 4)
    }

    /// Floor a floating-point position to a block position.
    pub fn from_vec3(v: Vec3) -> Self {
        Self {
            x: v.x.floor() as i32,
            y: v.y.floor() as i32,
            z: v.z.floor() as i32,
        }
    }
}

impl ProtoEncode for BlockPos {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        VarInt(self.x).proto_encode(buf);
        VarUInt32(self.y as u32).proto_encode(buf);
        VarInt(self.z).proto_encode(buf);
    }
}

impl ProtoDecode for BlockPos {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let x = VarInt::proto_decode(buf)?.0;
        let y = VarUInt32::proto_decode(buf)?.0 as i32;
        let z = VarInt::proto_decode(buf)?.0;
        Ok(Self { x, y, z })
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Horizontal chunk column index. Wire format: two ZigZag VarInts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }
}

impl ProtoEncode for ChunkPos {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        VarInt(self.x).proto_encode(buf);
        VarInt(self.z).proto_encode(buf);
    }
}

impl ProtoDecode for ChunkPos {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let x = VarInt::proto_decode(buf)?.0;
        let z = VarInt::proto_decode(buf)?.0;
        Ok(Self { x, z })
    }
}

impl fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// Sub-chunk position: chunk x/z plus a vertical section index.
/// Wire format: three ZigZag VarInts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubChunkPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl SubChunkPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

impl ProtoEncode for SubChunkPos {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        VarInt(self.x).proto_encode(buf);
        VarInt(self.y).proto_encode(buf);
        VarInt(self.z).proto_encode(buf);
    }
}

impl ProtoDecode for SubChunkPos {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let x = VarInt::proto_decode(buf)?.0;
        let y = VarInt::proto_decode(buf)?.0;
        let z = VarInt::proto_decode(buf)?.0;
        Ok(Self { x, y, z })
    }
}

// ---------------------------------------------------------------------------
// ItemStack (trimmed to what the capture pipeline displays)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ItemStack {
    pub network_id: i32,
    pub count: u16,
    pub metadata: u32,
    pub block_runtime_id: i32,
    /// Opaque extra data (NBT, can-place-on lists) carried through unparsed.
    pub extra: Bytes,
}

impl ItemStack {
    pub fn is_empty(&self) -> bool {
        self.network_id == 0
    }
}

impl ProtoEncode for ItemStack {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        VarInt(self.network_id).proto_encode(buf);
        if self.network_id == 0 {
            return; // empty slot
        }
        buf.put_u16_le(self.count);
        VarUInt32(self.metadata).proto_encode(buf);
        VarInt(self.block_runtime_id).proto_encode(buf);
        codec::write_byte_slice(buf, &self.extra);
    }
}

impl ProtoDecode for ItemStack {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let network_id = VarInt::proto_decode(buf)?.0;
        if network_id == 0 {
            return Ok(Self::default());
        }
        if buf.remaining() < 2 {
            return Err(ProtoError::BufferTooShort {
                needed: 2,
                remaining: buf.remaining(),
            });
        }
        let count = buf.get_u16_le();
        let metadata = VarUInt32::proto_decode(buf)?.0;
        let block_runtime_id = VarInt::proto_decode(buf)?.0;
        let extra = codec::read_byte_slice(buf)?;
        Ok(Self {
            network_id,
            count,
            metadata,
            block_runtime_id,
            extra,
        })
    }
}

// ---------------------------------------------------------------------------
// Entity links
// ---------------------------------------------------------------------------

/// Rider/ridden relation carried by AddActor and SetActorLink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityLinkType {
    Remove,
    Rider,
    Passenger,
}

impl EntityLinkType {
    fn from_u8(v: u8) -> Result<Self, ProtoError> {
        match v {
            0 => Ok(Self::Remove),
            1 => Ok(Self::Rider),
            2 => Ok(Self::Passenger),
            other => Err(ProtoError::InvalidData(format!(
                "entity link type {other}"
            ))),
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Remove => 0,
            Self::Rider => 1,
            Self::Passenger => 2,
        }
    }
}

/// Directed edge from the ridden entity to the rider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityLink {
    pub ridden_unique_id: i64,
    pub rider_unique_id: i64,
    pub link_type: EntityLinkType,
    pub immediate: bool,
    pub rider_initiated: bool,
}

impl ProtoEncode for EntityLink {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        VarLong(self.ridden_unique_id).proto_encode(buf);
        VarLong(self.rider_unique_id).proto_encode(buf);
        buf.put_u8(self.link_type.as_u8());
        buf.put_u8(self.immediate as u8);
        buf.put_u8(self.rider_initiated as u8);
    }
}

impl ProtoDecode for EntityLink {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let ridden_unique_id = VarLong::proto_decode(buf)?.0;
        let rider_unique_id = VarLong::proto_decode(buf)?.0;
        if buf.remaining() < 3 {
            return Err(ProtoError::BufferTooShort {
                needed: 3,
                remaining: buf.remaining(),
            });
        }
        let link_type = EntityLinkType::from_u8(buf.get_u8())?;
        let immediate = buf.get_u8() != 0;
        let rider_initiated = buf.get_u8() != 0;
        Ok(Self {
            ridden_unique_id,
            rider_unique_id,
            link_type,
            immediate,
            rider_initiated,
        })
    }
}

// ---------------------------------------------------------------------------
// Game rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameRuleValue {
    Bool(bool),
    Uint(u32),
    Float(f32),
}

/// A single game rule as carried by StartGame and GameRulesChanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRule {
    pub name: String,
    pub editable: bool,
    pub value: GameRuleValue,
}

impl GameRule {
    pub fn bool(name: impl Into<String>, value: bool) -> Self {
        Self {
            name: name.into(),
            editable: false,
            value: GameRuleValue::Bool(value),
        }
    }

    pub fn uint(name: impl Into<String>, value: u32) -> Self {
        Self {
            name: name.into(),
            editable: false,
            value: GameRuleValue::Uint(value),
        }
    }
}

pub fn encode_game_rules(buf: &mut impl BufMut, rules: &[GameRule]) {
    VarUInt32(rules.len() as u32).proto_encode(buf);
    for rule in rules {
        codec::write_string(buf, &rule.name);
        buf.put_u8(rule.editable as u8);
        match rule.value {
            GameRuleValue::Bool(v) => {
                VarUInt32(1).proto_encode(buf);
                buf.put_u8(v as u8);
            }
            GameRuleValue::Uint(v) => {
                VarUInt32(2).proto_encode(buf);
                VarUInt32(v).proto_encode(buf);
            }
            GameRuleValue::Float(v) => {
                VarUInt32(3).proto_encode(buf);
                buf.put_f32_le(v);
            }
        }
    }
}

pub fn decode_game_rules(buf: &mut impl Buf) -> Result<Vec<GameRule>, ProtoError> {
    let count = VarUInt32::proto_decode(buf)?.0 as usize;
    let mut rules = Vec::with_capacity(count);
    for _ in 0..count {
        let name = codec::read_string(buf)?;
        let editable = codec::read_bool(buf)?;
        let value = match VarUInt32::proto_decode(buf)?.0 {
            1 => GameRuleValue::Bool(codec::read_bool(buf)?),
            2 => GameRuleValue::Uint(VarUInt32::proto_decode(buf)?.0),
            3 => {
                if buf.remaining() < 4 {
                    return Err(ProtoError::BufferTooShort {
                        needed: 4,
                        remaining: buf.remaining(),
                    });
                }
                GameRuleValue::Float(buf.get_f32_le())
            }
            other => {
                return Err(ProtoError::InvalidData(format!(
                    "game rule value type {other}"
                )))
            }
        };
        rules.push(GameRule {
            name,
            editable,
            value,
        });
    }
    Ok(rules)
}

// ---------------------------------------------------------------------------
// Entity metadata
// ---------------------------------------------------------------------------

/// Entity metadata value. Types 0-4 and 7 of the wire format; the NBT and
/// vector types are not produced by the packets this proxy decodes typed.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Byte(u8),
    Short(i16),
    Int(i32),
    Float(f32),
    String(String),
    Long(i64),
}

pub type Metadata = HashMap<u32, MetadataValue>;

pub fn encode_metadata(buf: &mut impl BufMut, metadata: &Metadata) {
    VarUInt32(metadata.len() as u32).proto_encode(buf);
    for (&key, value) in metadata {
        VarUInt32(key).proto_encode(buf);
        match value {
            MetadataValue::Byte(v) => {
                VarUInt32(0).proto_encode(buf);
                buf.put_u8(*v);
            }
            MetadataValue::Short(v) => {
                VarUInt32(1).proto_encode(buf);
                buf.put_i16_le(*v);
            }
            MetadataValue::Int(v) => {
                VarUInt32(2).proto_encode(buf);
                VarInt(*v).proto_encode(buf);
            }
            MetadataValue::Float(v) => {
                VarUInt32(3).proto_encode(buf);
                buf.put_f32_le(*v);
            }
            MetadataValue::String(v) => {
                VarUInt32(4).proto_encode(buf);
                codec::write_string(buf, v);
            }
            MetadataValue::Long(v) => {
                VarUInt32(7).proto_encode(buf);
                VarLong(*v).proto_encode(buf);
            }
        }
    }
}

pub fn decode_metadata(buf: &mut impl Buf) -> Result<Metadata, ProtoError> {
    let count = VarUInt32::proto_decode(buf)?.0 as usize;
    let mut metadata = Metadata::with_capacity(count);
    for _ in 0..count {
        let key = VarUInt32::proto_decode(buf)?.0;
        let data_type = VarUInt32::proto_decode(buf)?.0;
        let value = match data_type {
            0 => {
                if !buf.has_remaining() {
                    return Err(ProtoError::BufferTooShort {
                        needed: 1,
                        remaining: 0,
                    });
                }
                MetadataValue::Byte(buf.get_u8())
            }
            1 => {
                if buf.remaining() < 2 {
                    return Err(ProtoError::BufferTooShort {
                        needed: 2,
                        remaining: buf.remaining(),
                    });
                }
                MetadataValue::Short(buf.get_i16_le())
            }
            2 => MetadataValue::Int(VarInt::proto_decode(buf)?.0),
            3 => {
                if buf.remaining() < 4 {
                    return Err(ProtoError::BufferTooShort {
                        needed: 4,
                        remaining: buf.remaining(),
                    });
                }
                MetadataValue::Float(buf.get_f32_le())
            }
            4 => MetadataValue::String(codec::read_string(buf)?),
            7 => MetadataValue::Long(VarLong::proto_decode(buf)?.0),
            other => {
                return Err(ProtoError::InvalidData(format!(
                    "metadata value type {other}"
                )))
            }
        };
        metadata.insert(key, value);
    }
    Ok(metadata)
}
