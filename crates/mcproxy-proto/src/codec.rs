//! Protocol encoding/decoding traits and helpers.

use bytes::{Buf, BufMut, Bytes};

use crate::error::ProtoError;
use crate::types::VarUInt32;

/// Encode a value onto a buffer.
pub trait ProtoEncode {
    fn proto_encode(&self, buf: &mut impl BufMut);
}

/// Decode a value from a buffer.
pub trait ProtoDecode: Sized {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError>;
}

/// Write a Bedrock protocol string (VarUInt32 length + UTF-8).
pub fn write_string(buf: &mut impl BufMut, s: &str) {
    VarUInt32(s.len() as u32).proto_encode(buf);
    buf.put_slice(s.as_bytes());
}

/// Read a Bedrock protocol string (VarUInt32 length + UTF-8).
pub fn read_string(buf: &mut impl Buf) -> Result<String, ProtoError> {
    let len = VarUInt32::proto_decode(buf)?.0 as usize;
    if buf.remaining() < len {
        return Err(ProtoError::BufferTooShort {
            needed: len,
            remaining: buf.remaining(),
        });
    }
    let data = buf.copy_to_bytes(len);
    String::from_utf8(data.to_vec()).map_err(|_| ProtoError::InvalidUtf8)
}

/// Write a VarUInt32-length-prefixed byte slice.
pub fn write_byte_slice(buf: &mut impl BufMut, data: &[u8]) {
    VarUInt32(data.len() as u32).proto_encode(buf);
    buf.put_slice(data);
}

/// Read a VarUInt32-length-prefixed byte slice.
pub fn read_byte_slice(buf: &mut impl Buf) -> Result<Bytes, ProtoError> {
    let len = VarUInt32::proto_decode(buf)?.0 as usize;
    if buf.remaining() < len {
        return Err(ProtoError::BufferTooShort {
            needed: len,
            remaining: buf.remaining(),
        });
    }
    Ok(buf.copy_to_bytes(len))
}

/// Read a bool encoded as a single byte.
pub fn read_bool(buf: &mut impl Buf) -> Result<bool, ProtoError> {
    if !buf.has_remaining() {
        return Err(ProtoError::BufferTooShort {
            needed: 1,
            remaining: 0,
        });
    }
    Ok(buf.get_u8() != 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn string_roundtrip() {
        let mut buf = BytesMut::new();
        write_string(&mut buf, "play.example.net");
        let result = read_string(&mut buf.freeze()).unwrap();
        assert_eq!(result, "play.example.net");
    }

    #[test]
    fn string_truncated() {
        let mut buf = BytesMut::new();
        write_string(&mut buf, "hello");
        let truncated = buf.freeze().slice(..3);
        assert!(read_string(&mut truncated.clone()).is_err());
    }

    #[test]
    fn byte_slice_roundtrip() {
        let mut buf = BytesMut::new();
        write_byte_slice(&mut buf, &[9, 1, 0, 255]);
        let out = read_byte_slice(&mut buf.freeze()).unwrap();
        assert_eq!(&out[..], &[9, 1, 0, 255]);
    }

    #[test]
    fn bool_values() {
        let data = bytes::Bytes::from_static(&[0x00, 0x01, 0x7F]);
        let mut buf = data.clone();
        assert!(!read_bool(&mut buf).unwrap());
        assert!(read_bool(&mut buf).unwrap());
        assert!(read_bool(&mut buf).unwrap());
        assert!(read_bool(&mut buf).is_err());
    }
}
