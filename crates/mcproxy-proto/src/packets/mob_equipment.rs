//! MobEquipment (0x1F) — Server → Client.
//!
//! The item an entity holds in its main hand (or off hand, window 119).

use bytes::{Buf, BufMut};

use crate::codec::{ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::{ItemStack, VarUInt64};

#[derive(Debug, Clone)]
pub struct MobEquipment {
    pub runtime_id: u64,
    pub item: ItemStack,
    pub inventory_slot: u8,
    pub hotbar_slot: u8,
    pub window_id: u8,
}

impl ProtoEncode for MobEquipment {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        VarUInt64(self.runtime_id).proto_encode(buf);
        self.item.proto_encode(buf);
        buf.put_u8(self.inventory_slot);
        buf.put_u8(self.hotbar_slot);
        buf.put_u8(self.window_id);
    }
}

impl ProtoDecode for MobEquipment {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let runtime_id = VarUInt64::proto_decode(buf)?.0;
        let item = ItemStack::proto_decode(buf)?;
        if buf.remaining() < 3 {
            return Err(ProtoError::BufferTooShort {
                needed: 3,
                remaining: buf.remaining(),
            });
        }
        Ok(Self {
            runtime_id,
            item,
            inventory_slot: buf.get_u8(),
            hotbar_slot: buf.get_u8(),
            window_id: buf.get_u8(),
        })
    }
}
