//! Bedrock protocol model for the proxy: wire primitives, typed packet
//! definitions, and the tagged [`Packet`](packets::Packet) enum the session
//! pipeline operates on.
//!
//! Only packets the proxy inspects get a typed variant; everything else is
//! carried as `Packet::Unknown` and forwarded byte-for-byte.

pub mod codec;
pub mod error;
pub mod packets;
pub mod types;
