//! MobArmourEquipment (0x20) — Server → Client.

use bytes::{Buf, BufMut};

use crate::codec::{ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::{ItemStack, VarUInt64};

/// The four armour pieces plus body slot worn by an entity.
#[derive(Debug, Clone)]
pub struct MobArmourEquipment {
    pub runtime_id: u64,
    pub helmet: ItemStack,
    pub chestplate: ItemStack,
    pub leggings: ItemStack,
    pub boots: ItemStack,
    pub body: ItemStack,
}

impl ProtoEncode for MobArmourEquipment {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        VarUInt64(self.runtime_id).proto_encode(buf);
        self.helmet.proto_encode(buf);
        self.chestplate.proto_encode(buf);
        self.leggings.proto_encode(buf);
        self.boots.proto_encode(buf);
        self.body.proto_encode(buf);
    }
}

impl ProtoDecode for MobArmourEquipment {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            runtime_id: VarUInt64::proto_decode(buf)?.0,
            helmet: ItemStack::proto_decode(buf)?,
            chestplate: ItemStack::proto_decode(buf)?,
            leggings: ItemStack::proto_decode(buf)?,
            boots: ItemStack::proto_decode(buf)?,
            body: ItemStack::proto_decode(buf)?,
        })
    }
}
