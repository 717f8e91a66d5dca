//! NBT wire engine.
//!
//! Both flavors share the tag structure and differ only in how integers
//! and length prefixes are laid out, so the flavor travels as a plain
//! value and the few divergent spots branch on it in place. Reading goes
//! through a small stateful [`Reader`] that owns the nesting budget and
//! bounds-checks against untrusted lengths before allocating.

use bytes::{Buf, BufMut};
use mcproxy_proto::codec::{ProtoDecode, ProtoEncode};
use mcproxy_proto::types::{VarInt, VarUInt32};

use crate::error::NbtError;
use crate::value::{NbtCompound, NbtRoot, NbtTag};

/// Integer and length layout of an NBT stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    /// Disk layout: i32_le ints and lengths, u16_le string lengths.
    LittleEndian,
    /// Packet layout: ZigZag VarInt ints and lengths, VarUInt32 string
    /// lengths.
    Network,
}

/// Compounds and lists nested deeper than this are rejected; nothing in a
/// capture stream comes anywhere close.
const DEPTH_LIMIT: u32 = 128;

/// Upper bound on speculative `Vec` preallocation. A hostile length
/// prefix can claim billions of elements; growth beyond this is paid for
/// by actual data.
const PREALLOC_CAP: usize = 4096;

// ---------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------

pub fn write_root(buf: &mut impl BufMut, flavor: Flavor, root: &NbtRoot) {
    buf.put_u8(10); // TAG_Compound
    put_string(buf, flavor, &root.name);
    put_compound(buf, flavor, &root.compound);
}

fn put_compound(buf: &mut impl BufMut, flavor: Flavor, map: &NbtCompound) {
    for (name, tag) in map {
        buf.put_u8(tag.type_id());
        put_string(buf, flavor, name);
        put_tag(buf, flavor, tag);
    }
    buf.put_u8(0); // TAG_End
}

fn put_tag(buf: &mut impl BufMut, flavor: Flavor, tag: &NbtTag) {
    match tag {
        NbtTag::Byte(v) => buf.put_i8(*v),
        NbtTag::Short(v) => buf.put_i16_le(*v),
        NbtTag::Int(v) => put_int(buf, flavor, *v),
        NbtTag::Long(v) => buf.put_i64_le(*v),
        NbtTag::Float(v) => buf.put_f32_le(*v),
        NbtTag::Double(v) => buf.put_f64_le(*v),
        NbtTag::ByteArray(arr) => {
            put_int(buf, flavor, arr.len() as i32);
            for &b in arr {
                buf.put_i8(b);
            }
        }
        NbtTag::String(s) => put_string(buf, flavor, s),
        NbtTag::List(list) => {
            // Empty lists carry TAG_End as their element type.
            buf.put_u8(list.first().map_or(0, NbtTag::type_id));
            put_int(buf, flavor, list.len() as i32);
            for item in list {
                put_tag(buf, flavor, item);
            }
        }
        NbtTag::Compound(map) => put_compound(buf, flavor, map),
        NbtTag::IntArray(arr) => {
            put_int(buf, flavor, arr.len() as i32);
            for &v in arr {
                put_int(buf, flavor, v);
            }
        }
        NbtTag::LongArray(arr) => {
            put_int(buf, flavor, arr.len() as i32);
            for &v in arr {
                buf.put_i64_le(v);
            }
        }
    }
}

fn put_int(buf: &mut impl BufMut, flavor: Flavor, value: i32) {
    match flavor {
        Flavor::LittleEndian => buf.put_i32_le(value),
        Flavor::Network => VarInt(value).proto_encode(buf),
    }
}

fn put_string(buf: &mut impl BufMut, flavor: Flavor, s: &str) {
    match flavor {
        Flavor::LittleEndian => buf.put_u16_le(s.len() as u16),
        Flavor::Network => VarUInt32(s.len() as u32).proto_encode(buf),
    }
    buf.put_slice(s.as_bytes());
}

// ---------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------

pub fn read_root<B: Buf>(buf: &mut B, flavor: Flavor) -> Result<NbtRoot, NbtError> {
    let mut r = Reader {
        buf,
        flavor,
        depth: 0,
    };
    let tag_type = r.byte()?;
    if tag_type != 10 {
        return Err(NbtError::ExpectedCompound { got: tag_type });
    }
    let name = r.string()?;
    let compound = r.compound()?;
    Ok(NbtRoot { name, compound })
}

struct Reader<'a, B: Buf> {
    buf: &'a mut B,
    flavor: Flavor,
    depth: u32,
}

impl<B: Buf> Reader<'_, B> {
    fn need(&self, n: usize) -> Result<(), NbtError> {
        if self.buf.remaining() < n {
            return Err(NbtError::UnexpectedEof);
        }
        Ok(())
    }

    fn byte(&mut self) -> Result<u8, NbtError> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    fn int(&mut self) -> Result<i32, NbtError> {
        match self.flavor {
            Flavor::LittleEndian => {
                self.need(4)?;
                Ok(self.buf.get_i32_le())
            }
            Flavor::Network => VarInt::proto_decode(self.buf)
                .map(|v| v.0)
                .map_err(|e| NbtError::VarInt(e.to_string())),
        }
    }

    /// A length prefix; negative values are rejected here so every array
    /// and list shares the check.
    fn len(&mut self) -> Result<usize, NbtError> {
        let len = self.int()?;
        if len < 0 {
            return Err(NbtError::NegativeLength(len));
        }
        Ok(len as usize)
    }

    fn string(&mut self) -> Result<String, NbtError> {
        let len = match self.flavor {
            Flavor::LittleEndian => {
                self.need(2)?;
                self.buf.get_u16_le() as usize
            }
            Flavor::Network => {
                VarUInt32::proto_decode(self.buf)
                    .map_err(|e| NbtError::VarInt(e.to_string()))?
                    .0 as usize
            }
        };
        self.need(len)?;
        let raw = self.buf.copy_to_bytes(len);
        String::from_utf8(raw.to_vec()).map_err(|_| NbtError::InvalidUtf8)
    }

    fn enter(&mut self) -> Result<(), NbtError> {
        self.depth += 1;
        if self.depth > DEPTH_LIMIT {
            return Err(NbtError::NestingTooDeep {
                limit: DEPTH_LIMIT as usize,
            });
        }
        Ok(())
    }

    fn compound(&mut self) -> Result<NbtCompound, NbtError> {
        self.enter()?;
        let mut map = NbtCompound::new();
        loop {
            let tag_type = self.byte()?;
            if tag_type == 0 {
                break; // TAG_End
            }
            let name = self.string()?;
            let tag = self.tag(tag_type)?;
            map.insert(name, tag);
        }
        self.depth -= 1;
        Ok(map)
    }

    fn tag(&mut self, tag_type: u8) -> Result<NbtTag, NbtError> {
        Ok(match tag_type {
            1 => NbtTag::Byte(self.byte()? as i8),
            2 => {
                self.need(2)?;
                NbtTag::Short(self.buf.get_i16_le())
            }
            3 => NbtTag::Int(self.int()?),
            4 => {
                self.need(8)?;
                NbtTag::Long(self.buf.get_i64_le())
            }
            5 => {
                self.need(4)?;
                NbtTag::Float(self.buf.get_f32_le())
            }
            6 => {
                self.need(8)?;
                NbtTag::Double(self.buf.get_f64_le())
            }
            7 => {
                let len = self.len()?;
                self.need(len)?;
                // Bulk copy; i8 and u8 share a representation.
                let raw = self.buf.copy_to_bytes(len);
                NbtTag::ByteArray(raw.iter().map(|&b| b as i8).collect())
            }
            8 => NbtTag::String(self.string()?),
            9 => {
                let element_type = self.byte()?;
                let len = self.len()?;
                self.enter()?;
                let mut list = Vec::with_capacity(len.min(PREALLOC_CAP));
                for _ in 0..len {
                    list.push(self.tag(element_type)?);
                }
                self.depth -= 1;
                NbtTag::List(list)
            }
            10 => NbtTag::Compound(self.compound()?),
            11 => {
                let len = self.len()?;
                let mut arr = Vec::with_capacity(len.min(PREALLOC_CAP));
                for _ in 0..len {
                    arr.push(self.int()?);
                }
                NbtTag::IntArray(arr)
            }
            12 => {
                let len = self.len()?;
                // Fixed-width payload, so the whole size is known up front.
                self.need(len.saturating_mul(8))?;
                let mut arr = Vec::with_capacity(len.min(PREALLOC_CAP));
                for _ in 0..len {
                    arr.push(self.buf.get_i64_le());
                }
                NbtTag::LongArray(arr)
            }
            other => return Err(NbtError::UnknownTagType(other)),
        })
    }
}
