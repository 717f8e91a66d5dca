//! NBT (Named Binary Tag) support for the Bedrock capture pipeline.
//!
//! Two wire flavors are needed: the standard little-endian form used by
//! LevelDB values and `level.dat`, and the network form (ZigZag VarInt
//! ints/lengths) used inside game packets such as BlockActorData.

pub mod codec;
pub mod error;
pub mod value;

pub use codec::Flavor;
pub use error::NbtError;
pub use value::{NbtCompound, NbtRoot, NbtTag};

use bytes::{Buf, BufMut};

/// Read a little-endian NBT compound (disk flavor).
pub fn read_le(buf: &mut impl Buf) -> Result<NbtRoot, NbtError> {
    codec::read_root(buf, Flavor::LittleEndian)
}

/// Write a little-endian NBT compound (disk flavor).
pub fn write_le(buf: &mut impl BufMut, root: &NbtRoot) {
    codec::write_root(buf, Flavor::LittleEndian, root)
}

/// Read a network NBT compound (packet flavor).
pub fn read_network(buf: &mut impl Buf) -> Result<NbtRoot, NbtError> {
    codec::read_root(buf, Flavor::Network)
}

/// Write a network NBT compound (packet flavor).
pub fn write_network(buf: &mut impl BufMut, root: &NbtRoot) {
    codec::write_root(buf, Flavor::Network, root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    fn sample_root() -> NbtRoot {
        let mut pos = NbtCompound::new();
        pos.insert("x".into(), NbtTag::Int(160));
        pos.insert("y".into(), NbtTag::Int(64));
        pos.insert("z".into(), NbtTag::Int(-32));

        let mut c = NbtCompound::new();
        c.insert("id".into(), NbtTag::String("Chest".into()));
        c.insert("pos".into(), NbtTag::Compound(pos));
        c.insert("ticks".into(), NbtTag::Long(1_000_000));
        c.insert(
            "items".into(),
            NbtTag::List(vec![NbtTag::Byte(1), NbtTag::Byte(2)]),
        );
        NbtRoot::new("", c)
    }

    #[test]
    fn le_roundtrip() {
        let root = sample_root();
        let mut buf = BytesMut::new();
        write_le(&mut buf, &root);
        let decoded = read_le(&mut buf.freeze()).unwrap();
        assert_eq!(decoded, root);
    }

    #[test]
    fn network_roundtrip() {
        let root = sample_root();
        let mut buf = BytesMut::new();
        write_network(&mut buf, &root);
        let decoded = read_network(&mut buf.freeze()).unwrap();
        assert_eq!(decoded, root);
    }

    #[test]
    fn flavors_differ_on_the_wire() {
        let root = sample_root();
        let mut le = BytesMut::new();
        write_le(&mut le, &root);
        let mut net = BytesMut::new();
        write_network(&mut net, &root);
        // LE uses i32_le ints and u16_le string lengths; network uses VarInts.
        assert_ne!(le, net);
    }

    #[test]
    fn empty_buffer_is_an_error() {
        let data = bytes::Bytes::new();
        assert!(read_le(&mut data.clone()).is_err());
        assert!(read_network(&mut data.clone()).is_err());
    }

    #[test]
    fn non_compound_root_rejected() {
        let data = bytes::Bytes::from_static(&[3]); // TAG_Int at root
        assert!(matches!(
            read_le(&mut data.clone()),
            Err(NbtError::ExpectedCompound { got: 3 })
        ));
    }
}
