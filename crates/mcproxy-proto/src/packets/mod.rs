//! Typed packet definitions and the tagged [`Packet`] enum.

pub mod add_actor;
pub mod add_player;
pub mod available_commands;
pub mod block_actor_data;
pub mod change_dimension;
pub mod command_request;
pub mod container_close;
pub mod container_open;
pub mod dimension_data;
pub mod disconnect;
pub mod game_rules_changed;
pub mod level_chunk;
pub mod mob_armour_equipment;
pub mod mob_equipment;
pub mod move_actor_absolute;
pub mod move_player;
pub mod player_auth_input;
pub mod remove_actor;
pub mod resource_pack_chunk_data;
pub mod resource_pack_chunk_request;
pub mod resource_pack_client_response;
pub mod resource_pack_data_info;
pub mod resource_pack_stack;
pub mod resource_packs_info;
pub mod set_actor_data;
pub mod set_actor_link;
pub mod set_local_player_as_initialised;
pub mod set_time;
pub mod sub_chunk;
pub mod sub_chunk_request;
pub mod text;
pub mod transfer;

pub use add_actor::{ActorAttribute, AddActor};
pub use add_player::AddPlayer;
pub use available_commands::{AvailableCommands, CommandEntry};
pub use block_actor_data::BlockActorData;
pub use change_dimension::ChangeDimension;
pub use command_request::{CommandOrigin, CommandRequest};
pub use container_close::ContainerClose;
pub use container_open::ContainerOpen;
pub use dimension_data::{DimensionData, DimensionDefinition};
pub use disconnect::Disconnect;
pub use game_rules_changed::GameRulesChanged;
pub use level_chunk::{LevelChunk, SubChunkRequestMode};
pub use mob_armour_equipment::MobArmourEquipment;
pub use mob_equipment::MobEquipment;
pub use move_actor_absolute::MoveActorAbsolute;
pub use move_player::MovePlayer;
pub use player_auth_input::PlayerAuthInput;
pub use remove_actor::RemoveActor;
pub use resource_pack_chunk_data::ResourcePackChunkData;
pub use resource_pack_chunk_request::ResourcePackChunkRequest;
pub use resource_pack_client_response::{PackResponseStatus, ResourcePackClientResponse};
pub use resource_pack_data_info::ResourcePackDataInfo;
pub use resource_pack_stack::{ResourcePackStack, StackEntry};
pub use resource_packs_info::{PackInfoEntry, ResourcePacksInfo};
pub use set_actor_data::SetActorData;
pub use set_actor_link::SetActorLink;
pub use set_local_player_as_initialised::SetLocalPlayerAsInitialised;
pub use set_time::SetTime;
pub use sub_chunk::{SubChunk, SubChunkEntry, SubChunkResult};
pub use sub_chunk_request::SubChunkRequest;
pub use text::Text;
pub use transfer::Transfer;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::codec::{ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::VarUInt32;

/// Game packet IDs.
pub mod id {
    pub const DISCONNECT: u32 = 0x05;
    pub const RESOURCE_PACKS_INFO: u32 = 0x06;
    pub const RESOURCE_PACK_STACK: u32 = 0x07;
    pub const RESOURCE_PACK_CLIENT_RESPONSE: u32 = 0x08;
    pub const TEXT: u32 = 0x09;
    pub const SET_TIME: u32 = 0x0A;
    pub const START_GAME: u32 = 0x0B;
    pub const ADD_PLAYER: u32 = 0x0C;
    pub const ADD_ACTOR: u32 = 0x0D;
    pub const REMOVE_ACTOR: u32 = 0x0E;
    pub const MOVE_ACTOR_ABSOLUTE: u32 = 0x10;
    pub const MOVE_PLAYER: u32 = 0x13;
    pub const MOB_EQUIPMENT: u32 = 0x1F;
    pub const MOB_ARMOUR_EQUIPMENT: u32 = 0x20;
    pub const SET_ACTOR_DATA: u32 = 0x27;
    pub const SET_ACTOR_LINK: u32 = 0x29;
    pub const CONTAINER_OPEN: u32 = 0x2E;
    pub const CONTAINER_CLOSE: u32 = 0x2F;
    pub const BLOCK_ACTOR_DATA: u32 = 0x38;
    pub const LEVEL_CHUNK: u32 = 0x3A;
    pub const CHANGE_DIMENSION: u32 = 0x3D;
    pub const GAME_RULES_CHANGED: u32 = 0x48;
    pub const AVAILABLE_COMMANDS: u32 = 0x4C;
    pub const COMMAND_REQUEST: u32 = 0x4D;
    pub const RESOURCE_PACK_DATA_INFO: u32 = 0x52;
    pub const RESOURCE_PACK_CHUNK_DATA: u32 = 0x53;
    pub const RESOURCE_PACK_CHUNK_REQUEST: u32 = 0x54;
    pub const TRANSFER: u32 = 0x55;
    pub const SET_LOCAL_PLAYER_AS_INITIALISED: u32 = 0x71;
    pub const PLAYER_AUTH_INPUT: u32 = 0x90;
    pub const SUB_CHUNK: u32 = 0xAE;
    pub const SUB_CHUNK_REQUEST: u32 = 0xAF;
    pub const DIMENSION_DATA: u32 = 0xB4;
    pub const REQUEST_NETWORK_SETTINGS: u32 = 0xC1;
}

/// Frame header: packet id in bits 0-9, sender and target sub-client ids
/// in bits 10-11 and 12-13.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacketHeader {
    pub packet_id: u32,
    pub sender_subclient: u8,
    pub target_subclient: u8,
}

impl PacketHeader {
    pub fn new(packet_id: u32) -> Self {
        Self {
            packet_id,
            sender_subclient: 0,
            target_subclient: 0,
        }
    }
}

impl ProtoEncode for PacketHeader {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        let value = self.packet_id & 0x3FF
            | (self.sender_subclient as u32 & 0x3) << 10
            | (self.target_subclient as u32 & 0x3) << 12;
        VarUInt32(value).proto_encode(buf);
    }
}

impl ProtoDecode for PacketHeader {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let value = VarUInt32::proto_decode(buf)?.0;
        Ok(Self {
            packet_id: value & 0x3FF,
            sender_subclient: (value >> 10 & 0x3) as u8,
            target_subclient: (value >> 12 & 0x3) as u8,
        })
    }
}

/// A decoded game packet. Packets the proxy does not inspect are carried
/// verbatim in `Unknown` so forwarding never alters them.
#[derive(Debug, Clone)]
pub enum Packet {
    Disconnect(Disconnect),
    ResourcePacksInfo(ResourcePacksInfo),
    ResourcePackStack(ResourcePackStack),
    ResourcePackClientResponse(ResourcePackClientResponse),
    ResourcePackDataInfo(ResourcePackDataInfo),
    ResourcePackChunkData(ResourcePackChunkData),
    ResourcePackChunkRequest(ResourcePackChunkRequest),
    Text(Text),
    SetTime(SetTime),
    AddPlayer(AddPlayer),
    AddActor(AddActor),
    RemoveActor(RemoveActor),
    MoveActorAbsolute(MoveActorAbsolute),
    MovePlayer(MovePlayer),
    MobEquipment(MobEquipment),
    MobArmourEquipment(MobArmourEquipment),
    SetActorData(SetActorData),
    SetActorLink(SetActorLink),
    ContainerOpen(ContainerOpen),
    ContainerClose(ContainerClose),
    BlockActorData(BlockActorData),
    LevelChunk(LevelChunk),
    ChangeDimension(ChangeDimension),
    GameRulesChanged(GameRulesChanged),
    AvailableCommands(AvailableCommands),
    CommandRequest(CommandRequest),
    Transfer(Transfer),
    SetLocalPlayerAsInitialised(SetLocalPlayerAsInitialised),
    PlayerAuthInput(PlayerAuthInput),
    SubChunk(SubChunk),
    SubChunkRequest(SubChunkRequest),
    DimensionData(DimensionData),
    Unknown { packet_id: u32, payload: Bytes },
}

impl Packet {
    /// The wire packet id of this variant.
    pub fn packet_id(&self) -> u32 {
        match self {
            Packet::Disconnect(_) => id::DISCONNECT,
            Packet::ResourcePacksInfo(_) => id::RESOURCE_PACKS_INFO,
            Packet::ResourcePackStack(_) => id::RESOURCE_PACK_STACK,
            Packet::ResourcePackClientResponse(_) => id::RESOURCE_PACK_CLIENT_RESPONSE,
            Packet::ResourcePackDataInfo(_) => id::RESOURCE_PACK_DATA_INFO,
            Packet::ResourcePackChunkData(_) => id::RESOURCE_PACK_CHUNK_DATA,
            Packet::ResourcePackChunkRequest(_) => id::RESOURCE_PACK_CHUNK_REQUEST,
            Packet::Text(_) => id::TEXT,
            Packet::SetTime(_) => id::SET_TIME,
            Packet::AddPlayer(_) => id::ADD_PLAYER,
            Packet::AddActor(_) => id::ADD_ACTOR,
            Packet::RemoveActor(_) => id::REMOVE_ACTOR,
            Packet::MoveActorAbsolute(_) => id::MOVE_ACTOR_ABSOLUTE,
            Packet::MovePlayer(_) => id::MOVE_PLAYER,
            Packet::MobEquipment(_) => id::MOB_EQUIPMENT,
            Packet::MobArmourEquipment(_) => id::MOB_ARMOUR_EQUIPMENT,
            Packet::SetActorData(_) => id::SET_ACTOR_DATA,
            Packet::SetActorLink(_) => id::SET_ACTOR_LINK,
            Packet::ContainerOpen(_) => id::CONTAINER_OPEN,
            Packet::ContainerClose(_) => id::CONTAINER_CLOSE,
            Packet::BlockActorData(_) => id::BLOCK_ACTOR_DATA,
            Packet::LevelChunk(_) => id::LEVEL_CHUNK,
            Packet::ChangeDimension(_) => id::CHANGE_DIMENSION,
            Packet::GameRulesChanged(_) => id::GAME_RULES_CHANGED,
            Packet::AvailableCommands(_) => id::AVAILABLE_COMMANDS,
            Packet::CommandRequest(_) => id::COMMAND_REQUEST,
            Packet::Transfer(_) => id::TRANSFER,
            Packet::SetLocalPlayerAsInitialised(_) => id::SET_LOCAL_PLAYER_AS_INITIALISED,
            Packet::PlayerAuthInput(_) => id::PLAYER_AUTH_INPUT,
            Packet::SubChunk(_) => id::SUB_CHUNK,
            Packet::SubChunkRequest(_) => id::SUB_CHUNK_REQUEST,
            Packet::DimensionData(_) => id::DIMENSION_DATA,
            Packet::Unknown { packet_id, .. } => *packet_id,
        }
    }

    /// Human-readable packet name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Packet::Disconnect(_) => "Disconnect",
            Packet::ResourcePacksInfo(_) => "ResourcePacksInfo",
            Packet::ResourcePackStack(_) => "ResourcePackStack",
            Packet::ResourcePackClientResponse(_) => "ResourcePackClientResponse",
            Packet::ResourcePackDataInfo(_) => "ResourcePackDataInfo",
            Packet::ResourcePackChunkData(_) => "ResourcePackChunkData",
            Packet::ResourcePackChunkRequest(_) => "ResourcePackChunkRequest",
            Packet::Text(_) => "Text",
            Packet::SetTime(_) => "SetTime",
            Packet::AddPlayer(_) => "AddPlayer",
            Packet::AddActor(_) => "AddActor",
            Packet::RemoveActor(_) => "RemoveActor",
            Packet::MoveActorAbsolute(_) => "MoveActorAbsolute",
            Packet::MovePlayer(_) => "MovePlayer",
            Packet::MobEquipment(_) => "MobEquipment",
            Packet::MobArmourEquipment(_) => "MobArmourEquipment",
            Packet::SetActorData(_) => "SetActorData",
            Packet::SetActorLink(_) => "SetActorLink",
            Packet::ContainerOpen(_) => "ContainerOpen",
            Packet::ContainerClose(_) => "ContainerClose",
            Packet::BlockActorData(_) => "BlockActorData",
            Packet::LevelChunk(_) => "LevelChunk",
            Packet::ChangeDimension(_) => "ChangeDimension",
            Packet::GameRulesChanged(_) => "GameRulesChanged",
            Packet::AvailableCommands(_) => "AvailableCommands",
            Packet::CommandRequest(_) => "CommandRequest",
            Packet::Transfer(_) => "Transfer",
            Packet::SetLocalPlayerAsInitialised(_) => "SetLocalPlayerAsInitialised",
            Packet::PlayerAuthInput(_) => "PlayerAuthInput",
            Packet::SubChunk(_) => "SubChunk",
            Packet::SubChunkRequest(_) => "SubChunkRequest",
            Packet::DimensionData(_) => "DimensionData",
            Packet::Unknown { .. } => "Unknown",
        }
    }
}

/// Decode a framed packet body into a typed [`Packet`].
///
/// IDs without a typed representation come back as `Packet::Unknown`;
/// decode errors on known IDs are reported so callers can decide whether
/// to skip or forward the raw frame.
pub fn decode_packet(header: PacketHeader, payload: Bytes) -> Result<Packet, ProtoError> {
    let mut buf = payload.clone();
    let pk = match header.packet_id {
        id::DISCONNECT => Packet::Disconnect(Disconnect::proto_decode(&mut buf)?),
        id::RESOURCE_PACKS_INFO => {
            Packet::ResourcePacksInfo(ResourcePacksInfo::proto_decode(&mut buf)?)
        }
        id::RESOURCE_PACK_STACK => {
            Packet::ResourcePackStack(ResourcePackStack::proto_decode(&mut buf)?)
        }
        id::RESOURCE_PACK_CLIENT_RESPONSE => {
            Packet::ResourcePackClientResponse(ResourcePackClientResponse::proto_decode(&mut buf)?)
        }
        id::RESOURCE_PACK_DATA_INFO => {
            Packet::ResourcePackDataInfo(ResourcePackDataInfo::proto_decode(&mut buf)?)
        }
        id::RESOURCE_PACK_CHUNK_DATA => {
            Packet::ResourcePackChunkData(ResourcePackChunkData::proto_decode(&mut buf)?)
        }
        id::RESOURCE_PACK_CHUNK_REQUEST => {
            Packet::ResourcePackChunkRequest(ResourcePackChunkRequest::proto_decode(&mut buf)?)
        }
        id::TEXT => Packet::Text(Text::proto_decode(&mut buf)?),
        id::SET_TIME => Packet::SetTime(SetTime::proto_decode(&mut buf)?),
        id::ADD_PLAYER => Packet::AddPlayer(AddPlayer::proto_decode(&mut buf)?),
        id::ADD_ACTOR => Packet::AddActor(AddActor::proto_decode(&mut buf)?),
        id::REMOVE_ACTOR => Packet::RemoveActor(RemoveActor::proto_decode(&mut buf)?),
        id::MOVE_ACTOR_ABSOLUTE => {
            Packet::MoveActorAbsolute(MoveActorAbsolute::proto_decode(&mut buf)?)
        }
        id::MOVE_PLAYER => Packet::MovePlayer(MovePlayer::proto_decode(&mut buf)?),
        id::MOB_EQUIPMENT => Packet::MobEquipment(MobEquipment::proto_decode(&mut buf)?),
        id::MOB_ARMOUR_EQUIPMENT => {
            Packet::MobArmourEquipment(MobArmourEquipment::proto_decode(&mut buf)?)
        }
        id::SET_ACTOR_DATA => Packet::SetActorData(SetActorData::proto_decode(&mut buf)?),
        id::SET_ACTOR_LINK => Packet::SetActorLink(SetActorLink::proto_decode(&mut buf)?),
        id::CONTAINER_OPEN => Packet::ContainerOpen(ContainerOpen::proto_decode(&mut buf)?),
        id::CONTAINER_CLOSE => Packet::ContainerClose(ContainerClose::proto_decode(&mut buf)?),
        id::BLOCK_ACTOR_DATA => Packet::BlockActorData(BlockActorData::proto_decode(&mut buf)?),
        id::LEVEL_CHUNK => Packet::LevelChunk(LevelChunk::proto_decode(&mut buf)?),
        id::CHANGE_DIMENSION => Packet::ChangeDimension(ChangeDimension::proto_decode(&mut buf)?),
        id::GAME_RULES_CHANGED => {
            Packet::GameRulesChanged(GameRulesChanged::proto_decode(&mut buf)?)
        }
        id::AVAILABLE_COMMANDS => {
            Packet::AvailableCommands(AvailableCommands::proto_decode(&mut buf)?)
        }
        id::COMMAND_REQUEST => Packet::CommandRequest(CommandRequest::proto_decode(&mut buf)?),
        id::TRANSFER => Packet::Transfer(Transfer::proto_decode(&mut buf)?),
        id::SET_LOCAL_PLAYER_AS_INITIALISED => Packet::SetLocalPlayerAsInitialised(
            SetLocalPlayerAsInitialised::proto_decode(&mut buf)?,
        ),
        id::PLAYER_AUTH_INPUT => Packet::PlayerAuthInput(PlayerAuthInput::proto_decode(&mut buf)?),
        id::SUB_CHUNK => Packet::SubChunk(SubChunk::proto_decode(&mut buf)?),
        id::SUB_CHUNK_REQUEST => Packet::SubChunkRequest(SubChunkRequest::proto_decode(&mut buf)?),
        id::DIMENSION_DATA => Packet::DimensionData(DimensionData::proto_decode(&mut buf)?),
        packet_id => Packet::Unknown { packet_id, payload },
    };
    Ok(pk)
}

/// Encode a typed packet back to its framed body.
pub fn encode_packet(pk: &Packet) -> (PacketHeader, Bytes) {
    let mut buf = BytesMut::new();
    match pk {
        Packet::Disconnect(p) => p.proto_encode(&mut buf),
        Packet::ResourcePacksInfo(p) => p.proto_encode(&mut buf),
        Packet::ResourcePackStack(p) => p.proto_encode(&mut buf),
        Packet::ResourcePackClientResponse(p) => p.proto_encode(&mut buf),
        Packet::ResourcePackDataInfo(p) => p.proto_encode(&mut buf),
        Packet::ResourcePackChunkData(p) => p.proto_encode(&mut buf),
        Packet::ResourcePackChunkRequest(p) => p.proto_encode(&mut buf),
        Packet::Text(p) => p.proto_encode(&mut buf),
        Packet::SetTime(p) => p.proto_encode(&mut buf),
        Packet::AddPlayer(p) => p.proto_encode(&mut buf),
        Packet::AddActor(p) => p.proto_encode(&mut buf),
        Packet::RemoveActor(p) => p.proto_encode(&mut buf),
        Packet::MoveActorAbsolute(p) => p.proto_encode(&mut buf),
        Packet::MovePlayer(p) => p.proto_encode(&mut buf),
        Packet::MobEquipment(p) => p.proto_encode(&mut buf),
        Packet::MobArmourEquipment(p) => p.proto_encode(&mut buf),
        Packet::SetActorData(p) => p.proto_encode(&mut buf),
        Packet::SetActorLink(p) => p.proto_encode(&mut buf),
        Packet::ContainerOpen(p) => p.proto_encode(&mut buf),
        Packet::ContainerClose(p) => p.proto_encode(&mut buf),
        Packet::BlockActorData(p) => p.proto_encode(&mut buf),
        Packet::LevelChunk(p) => p.proto_encode(&mut buf),
        Packet::ChangeDimension(p) => p.proto_encode(&mut buf),
        Packet::GameRulesChanged(p) => p.proto_encode(&mut buf),
        Packet::AvailableCommands(p) => p.proto_encode(&mut buf),
        Packet::CommandRequest(p) => p.proto_encode(&mut buf),
        Packet::Transfer(p) => p.proto_encode(&mut buf),
        Packet::SetLocalPlayerAsInitialised(p) => p.proto_encode(&mut buf),
        Packet::PlayerAuthInput(p) => p.proto_encode(&mut buf),
        Packet::SubChunk(p) => p.proto_encode(&mut buf),
        Packet::SubChunkRequest(p) => p.proto_encode(&mut buf),
        Packet::DimensionData(p) => p.proto_encode(&mut buf),
        Packet::Unknown { payload, .. } => buf.extend_from_slice(payload),
    }
    (PacketHeader::new(pk.packet_id()), buf.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_packs_subclients() {
        let header = PacketHeader {
            packet_id: id::LEVEL_CHUNK,
            sender_subclient: 1,
            target_subclient: 2,
        };
        let mut buf = BytesMut::new();
        header.proto_encode(&mut buf);
        let decoded = PacketHeader::proto_decode(&mut buf.freeze()).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn unknown_id_passes_through() {
        let payload = Bytes::from_static(&[1, 2, 3, 4]);
        let pk = decode_packet(PacketHeader::new(0x3FF), payload.clone()).unwrap();
        match &pk {
            Packet::Unknown {
                packet_id,
                payload: p,
            } => {
                assert_eq!(*packet_id, 0x3FF);
                assert_eq!(p, &payload);
            }
            other => panic!("expected Unknown, got {}", other.name()),
        }
        let (header, encoded) = encode_packet(&pk);
        assert_eq!(header.packet_id, 0x3FF);
        assert_eq!(encoded, payload);
    }

    #[test]
    fn typed_decode_dispatch() {
        let transfer = Transfer::new("hub.example.net", 19132);
        let mut buf = BytesMut::new();
        transfer.proto_encode(&mut buf);
        let pk = decode_packet(PacketHeader::new(id::TRANSFER), buf.freeze()).unwrap();
        match pk {
            Packet::Transfer(t) => assert_eq!(t.address, "hub.example.net"),
            other => panic!("expected Transfer, got {}", other.name()),
        }
    }

    #[test]
    fn encode_decode_identity() {
        let pk = Packet::SetTime(SetTime { time: 6000 });
        let (header, body) = encode_packet(&pk);
        assert_eq!(header.packet_id, id::SET_TIME);
        let decoded = decode_packet(header, body).unwrap();
        match decoded {
            Packet::SetTime(st) => assert_eq!(st.time, 6000),
            other => panic!("expected SetTime, got {}", other.name()),
        }
    }
}
