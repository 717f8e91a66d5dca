//! The world-capture handler: reassembles chunk columns from the observed
//! server stream, tracks entities, and owns the capture world's lifecycle.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use mcproxy_nbt::{NbtCompound, NbtTag};
use mcproxy_proto::packets::{
    self, CommandEntry, LevelChunk, Packet, SubChunk as SubChunkPacket, SubChunkRequestMode,
    SubChunkResult,
};
use mcproxy_proto::types::{BlockPos, ChunkPos, SubChunkPos};
use mcproxy_session::handler::lock;
use mcproxy_session::player::Player;
use mcproxy_session::{Connector, GameData, Handler, Proxy};
use mcproxy_world::{Chunk, Dimension};
use tracing::{debug, error, info, warn};

use crate::behaviourpack::BehaviourPack;
use crate::entities::EntityState;
use crate::render::MapRenderer;
use crate::state::{ItemContainer, World};

/// Highest sub-chunk offset ever requested in one batch.
const MAX_SUB_CHUNK_OFFSET: u16 = 23;

#[derive(Debug, Clone)]
pub struct WorldsConfig {
    /// Base name for saved worlds; the dimension id is appended.
    pub world_name: String,
    /// Parent directory for world folders.
    pub base_dir: PathBuf,
    /// Entity types never persisted.
    pub exclude_mobs: Vec<String>,
    /// Save with a void generator instead of the server's.
    pub void_gen: bool,
    /// Write PNG map tiles alongside the world.
    pub render_maps: bool,
    /// Default radius (in chunks) for `resume` without an argument.
    pub resume_radius: i32,
}

impl Default for WorldsConfig {
    fn default() -> Self {
        Self {
            world_name: "world".into(),
            base_dir: "worlds".into(),
            exclude_mobs: Vec::new(),
            void_gen: false,
            render_maps: false,
            resume_radius: 3,
        }
    }
}

/// Capture state driven by the handler chain. All mutation happens behind
/// one mutex, shared by the packet callback and the in-game commands.
pub struct WorldsHandler {
    config: WorldsConfig,
    world: Option<World>,
    /// Assembly buffer: columns still receiving sub-chunks. First write
    /// wins; later LevelChunks for the same position are discarded.
    columns: HashMap<ChunkPos, Chunk>,
    game_data: GameData,
    behaviour_pack: BehaviourPack,
    map: Option<MapRenderer>,
}

impl WorldsHandler {
    pub fn new(config: WorldsConfig) -> Self {
        Self {
            config,
            world: None,
            columns: HashMap::new(),
            game_data: GameData::default(),
            behaviour_pack: BehaviourPack::default(),
            map: None,
        }
    }

    /// Test/bench seam: start from an existing world instead of a folder.
    pub fn with_world(config: WorldsConfig, world: World) -> Self {
        let mut this = Self::new(config);
        this.world = Some(world);
        this
    }

    /// Register the capture handler and its in-game commands on a proxy.
    pub fn attach<C: Connector>(
        proxy: &Proxy<C>,
        config: WorldsConfig,
    ) -> Arc<Mutex<WorldsHandler>> {
        let io = proxy.io();
        let this = Arc::new(Mutex::new(WorldsHandler::new(config)));

        let cb_this = this.clone();
        let cb_io = io.clone();
        let gd_this = this.clone();
        let end_this = this.clone();
        let end_io = io.clone();
        proxy.add_handler(Handler {
            name: "Worlds",
            game_data_modifier: Some(Box::new(move |gd| {
                lock(&gd_this).on_game_data(gd.clone());
            })),
            packet_callback: Some(Box::new(move |pk, to_server, _received, _pre_login| {
                let outbound = lock(&cb_this).on_packet(&pk, to_server, cb_io.player());
                for out in outbound {
                    cb_io.server_write(out);
                }
                Ok(Some(pk))
            })),
            on_session_end: Some(Box::new(move || {
                lock(&end_this).save_and_reset(None, end_io.player());
            })),
            ..Default::default()
        });

        let pause_this = this.clone();
        let pause_io = io.clone();
        proxy.add_command(
            CommandEntry::new("pause", "Pause world capture"),
            Box::new(move |_args| {
                lock(&pause_this).pause();
                pause_io.send_message("world capture paused");
                true
            }),
        );

        let resume_this = this.clone();
        let resume_io = io.clone();
        proxy.add_command(
            CommandEntry::new("resume", "Resume capture, keeping chunks around you"),
            Box::new(move |args| {
                let mut handler = lock(&resume_this);
                let radius = args
                    .first()
                    .and_then(|a| a.parse().ok())
                    .unwrap_or(handler.config.resume_radius);
                let around = BlockPos::from_vec3(resume_io.player().position);
                let (kept, dropped) = handler.resume(around, radius);
                drop(handler);
                resume_io.send_message(&format!(
                    "capture resumed: kept {kept} chunks, dropped {dropped}"
                ));
                true
            }),
        );

        let save_this = this.clone();
        let save_io = io.clone();
        proxy.add_command(
            CommandEntry::new("save-world", "Write the captured world to disk now"),
            Box::new(move |_args| {
                let mut handler = lock(&save_this);
                let dim = handler.world.as_ref().map(World::dimension);
                handler.save_and_reset(dim, save_io.player());
                drop(handler);
                save_io.send_message("world saved");
                true
            }),
        );

        this
    }

    pub fn on_game_data(&mut self, gd: GameData) {
        if self.world.is_none() {
            let dimension = Dimension::from_id(gd.dimension).unwrap_or_default();
            self.create_world(dimension);
        }
        if let Some(world) = self.world.as_mut() {
            world.time = gd.time;
            world.time_sync = Instant::now();
        }
        self.game_data = gd;
    }

    /// Route one observed packet; returned packets go to the server.
    pub fn on_packet(&mut self, pk: &Packet, to_server: bool, player: Player) -> Vec<Packet> {
        if to_server {
            return Vec::new();
        }
        match pk {
            Packet::LevelChunk(p) => return self.on_level_chunk(p),
            Packet::SubChunk(p) => self.on_sub_chunk(p),
            Packet::AddActor(p) => self.on_add_actor(p),
            Packet::AddPlayer(p) => self.on_add_player(p),
            Packet::SetActorData(p) => self.with_entity(p.runtime_id, |es| {
                es.metadata.extend(p.metadata.clone());
            }),
            Packet::MoveActorAbsolute(p) => self.with_entity(p.runtime_id, |es| {
                es.position = p.position;
            }),
            Packet::MobEquipment(p) => self.with_entity(p.runtime_id, |es| {
                if p.window_id == 0 {
                    es.held_item = p.item.clone();
                }
            }),
            Packet::MobArmourEquipment(p) => self.with_entity(p.runtime_id, |es| {
                es.armour = [
                    p.helmet.clone(),
                    p.chestplate.clone(),
                    p.leggings.clone(),
                    p.boots.clone(),
                ];
            }),
            Packet::SetActorLink(p) => {
                if let Some(world) = self.world.as_mut() {
                    world.add_entity_link(p.link);
                }
            }
            Packet::BlockActorData(p) => self.on_block_actor_data(p),
            Packet::SetTime(p) => {
                if let Some(world) = self.world.as_mut() {
                    world.time = p.time as i64;
                    world.time_sync = Instant::now();
                }
            }
            Packet::GameRulesChanged(p) => {
                for rule in &p.rules {
                    match self
                        .game_data
                        .game_rules
                        .iter_mut()
                        .find(|r| r.name == rule.name)
                    {
                        Some(existing) => *existing = rule.clone(),
                        None => self.game_data.game_rules.push(rule.clone()),
                    }
                }
            }
            Packet::ContainerOpen(p) => {
                if let Some(world) = self.world.as_mut() {
                    world.open_containers.insert(
                        p.window_id,
                        ItemContainer {
                            position: p.position,
                            container_type: p.container_type,
                        },
                    );
                }
            }
            Packet::ContainerClose(p) => {
                if let Some(world) = self.world.as_mut() {
                    world.open_containers.remove(&p.window_id);
                }
            }
            Packet::ChangeDimension(p) => {
                let Some(dimension) = Dimension::from_id(p.dimension) else {
                    warn!(dimension = p.dimension, "unknown dimension");
                    return Vec::new();
                };
                info!(%dimension, "dimension change, saving current world");
                self.save_and_reset(Some(dimension), player);
            }
            _ => {}
        }
        Vec::new()
    }

    fn on_level_chunk(&mut self, pk: &LevelChunk) -> Vec<Packet> {
        let Some(world) = self.world.as_mut() else {
            return Vec::new();
        };
        let dimension = world.dimension();

        let count = match pk.request_mode {
            SubChunkRequestMode::Legacy => pk.sub_chunk_count as usize,
            _ => 0,
        };
        let chunk = match Chunk::network_decode(dimension, &pk.payload, count) {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!(pos = %pk.position, error = %e, "failed to decode chunk");
                return Vec::new();
            }
        };

        // First write wins, but sub-chunk requests still go out so the
        // existing column keeps filling in.
        self.columns.entry(pk.position).or_insert(chunk);

        match pk.request_mode {
            SubChunkRequestMode::Legacy => {
                let chunk = self.columns[&pk.position].clone();
                world.store_chunk(pk.position, chunk, HashMap::new(), false);
                self.redraw(&[pk.position]);
                Vec::new()
            }
            SubChunkRequestMode::Limit | SubChunkRequestMode::All => {
                let highest = match pk.request_mode {
                    SubChunkRequestMode::Limit => pk.highest_sub_chunk.min(MAX_SUB_CHUNK_OFFSET),
                    _ => MAX_SUB_CHUNK_OFFSET,
                };
                let offsets = (0..=highest).map(|y| [0, y as i8, 0]).collect();
                vec![Packet::SubChunkRequest(packets::SubChunkRequest {
                    dimension: dimension.id(),
                    position: SubChunkPos::new(pk.position.x, 0, pk.position.z),
                    offsets,
                })]
            }
        }
    }

    fn on_sub_chunk(&mut self, pk: &SubChunkPacket) {
        let Some(world) = self.world.as_mut() else {
            return;
        };
        let mut touched = HashSet::new();
        for entry in &pk.entries {
            let abs_x = pk.position.x + entry.offset[0] as i32;
            let abs_y = pk.position.y + entry.offset[1] as i32;
            let abs_z = pk.position.z + entry.offset[2] as i32;
            let pos = ChunkPos::new(abs_x, abs_z);

            let Some(column) = self.columns.get_mut(&pos) else {
                warn!(%pos, "sub chunk for a column the server never sent");
                continue;
            };
            match entry.result {
                SubChunkResult::Success => {
                    if let Err(e) = column.apply_sub_chunk(abs_y, &entry.payload) {
                        warn!(%pos, section = abs_y, error = %e, "bad sub chunk entry");
                        continue;
                    }
                }
                SubChunkResult::SuccessAllAir => column.set_section(abs_y, None),
                other => {
                    warn!(%pos, section = abs_y, result = ?other, "sub chunk request failed");
                    continue;
                }
            }
            touched.insert(pos);
        }

        let touched: Vec<ChunkPos> = touched.into_iter().collect();
        for pos in &touched {
            let chunk = self.columns[pos].clone();
            world.store_chunk(*pos, chunk, HashMap::new(), true);
        }
        self.redraw(&touched);
    }

    fn on_add_actor(&mut self, pk: &packets::AddActor) {
        self.behaviour_pack.add_entity(&pk.entity_type);
        let Some(world) = self.world.as_mut() else {
            return;
        };
        world.store_entity(
            pk.runtime_id,
            EntityState {
                runtime_id: pk.runtime_id,
                unique_id: pk.unique_id,
                entity_type: pk.entity_type.clone(),
                position: pk.position,
                velocity: pk.velocity,
                pitch: pk.pitch,
                yaw: pk.yaw,
                metadata: pk.metadata.clone(),
                ..Default::default()
            },
        );
        for link in &pk.links {
            world.add_entity_link(*link);
        }
    }

    fn on_add_player(&mut self, pk: &packets::AddPlayer) {
        let Some(world) = self.world.as_mut() else {
            return;
        };
        world.store_entity(
            pk.runtime_id,
            EntityState {
                runtime_id: pk.runtime_id,
                unique_id: pk.runtime_id as i64,
                entity_type: "minecraft:player".into(),
                position: pk.position,
                velocity: pk.velocity,
                pitch: pk.pitch,
                yaw: pk.yaw,
                metadata: pk.metadata.clone(),
                held_item: pk.held_item.clone(),
                ..Default::default()
            },
        );
    }

    fn on_block_actor_data(&mut self, pk: &packets::BlockActorData) {
        let Some(world) = self.world.as_mut() else {
            return;
        };
        let mut buf = pk.nbt.clone();
        match mcproxy_nbt::read_network(&mut buf) {
            Ok(root) => world.set_block_nbt(pk.position, root.compound, false),
            Err(e) => debug!(pos = %pk.position, error = %e, "undecodable block entity"),
        }
    }

    fn with_entity(&mut self, runtime_id: u64, f: impl FnOnce(&mut EntityState)) {
        if let Some(world) = self.world.as_mut() {
            if let Some(es) = world.get_entity_mut(runtime_id) {
                f(es);
            }
        }
    }

    pub fn pause(&mut self) {
        if let Some(world) = self.world.as_mut() {
            world.pause_capture();
        }
    }

    /// Resume capture; returns `(kept, dropped)` chunk counts.
    pub fn resume(&mut self, around: BlockPos, radius: i32) -> (usize, usize) {
        let Some(world) = self.world.as_mut() else {
            return (0, 0);
        };
        let mut kept = 0;
        let mut dropped = 0;
        let map = self.map.as_ref();
        world.unpause_capture(around, radius, &mut |pos, chunk| match chunk {
            Some(chunk) => {
                kept += 1;
                if let Some(map) = map {
                    map.render(pos, chunk);
                }
            }
            None => {
                dropped += 1;
                if let Some(map) = map {
                    map.invalidate(pos);
                }
            }
        });
        (kept, dropped)
    }

    /// Finalize the current world and optionally begin a fresh one for the
    /// next dimension.
    pub fn save_and_reset(&mut self, next: Option<Dimension>, player: Player) {
        if let Some(world) = self.world.take() {
            let spawn = BlockPos::from_vec3(player.position);
            if let Err(e) = world.finish(
                player_nbt(player),
                spawn,
                &self.game_data,
                &self.behaviour_pack,
            ) {
                error!(error = %e, "failed to finalize world");
            }
        }
        self.columns.clear();
        if let Some(dimension) = next {
            self.create_world(dimension);
        }
    }

    fn create_world(&mut self, dimension: Dimension) {
        match World::create(&self.config.world_name, &self.config.base_dir, dimension) {
            Ok(mut world) => {
                world.exclude_mobs = self.config.exclude_mobs.clone();
                world.void_gen = self.config.void_gen;
                if self.config.render_maps {
                    self.map = Some(MapRenderer::new(&crate::state::world_folder(
                        &self.config.base_dir,
                        &self.config.world_name,
                        dimension,
                    )));
                }
                self.world = Some(world);
            }
            Err(e) => error!(%dimension, error = %e, "failed to create world"),
        }
    }

    fn redraw(&self, touched: &[ChunkPos]) {
        let Some(map) = self.map.as_ref() else {
            return;
        };
        for pos in touched {
            if let Some(chunk) = self.columns.get(pos) {
                map.render(*pos, chunk);
            }
        }
    }

    pub fn world(&self) -> Option<&World> {
        self.world.as_ref()
    }
}

/// Local player data persisted with the world.
fn player_nbt(player: Player) -> NbtCompound {
    let mut c = NbtCompound::new();
    c.insert(
        "Pos".into(),
        NbtTag::List(vec![
            NbtTag::Float(player.position.x),
            NbtTag::Float(player.position.y),
            NbtTag::Float(player.position.z),
        ]),
    );
    c.insert(
        "Rotation".into(),
        NbtTag::List(vec![
            NbtTag::Float(player.yaw),
            NbtTag::Float(player.pitch),
        ]),
    );
    c.insert("identifier".into(), NbtTag::String("minecraft:player".into()));
    c
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MemProvider;
    use bytes::Bytes;
    use mcproxy_proto::types::{Metadata, Vec3};
    use mcproxy_world::chunk::encode_section;
    use mcproxy_world::{SubChunk, AIR_RUNTIME_ID};

    /// One serialized network section holding a single block type.
    fn section_payload(runtime_id: u32) -> Bytes {
        let mut buf = bytes::BytesMut::new();
        let mut section = SubChunk::new_single(AIR_RUNTIME_ID);
        section.set_block(0, 0, 0, runtime_id);
        encode_section(&mut buf, &section, 0);
        buf.freeze()
    }

    fn handler_with_world() -> (WorldsHandler, MemProvider) {
        let provider = MemProvider::new();
        let world = World::with_provider("t", Dimension::Overworld, Box::new(provider.clone()));
        (
            WorldsHandler::with_world(WorldsConfig::default(), world),
            provider,
        )
    }

    fn level_chunk(mode: SubChunkRequestMode, highest: u16, payload: Bytes) -> LevelChunk {
        LevelChunk {
            position: ChunkPos::new(5, 5),
            dimension: 0,
            sub_chunk_count: 0,
            highest_sub_chunk: highest,
            request_mode: mode,
            cache_enabled: false,
            payload,
        }
    }

    #[test]
    fn limit_mode_requests_offsets_up_to_highest() {
        let (mut handler, _provider) = handler_with_world();
        let out = handler.on_level_chunk(&level_chunk(SubChunkRequestMode::Limit, 5, Bytes::new()));
        assert_eq!(out.len(), 1);
        match &out[0] {
            Packet::SubChunkRequest(req) => {
                assert_eq!(req.position, SubChunkPos::new(5, 0, 5));
                assert_eq!(req.offsets.len(), 6); // y = 0..=5
                assert_eq!(req.offsets[0], [0, 0, 0]);
                assert_eq!(req.offsets[5], [0, 5, 0]);
            }
            other => panic!("unexpected {}", other.name()),
        }
    }

    #[test]
    fn limit_mode_clamps_excessive_highest() {
        let (mut handler, _provider) = handler_with_world();
        let out =
            handler.on_level_chunk(&level_chunk(SubChunkRequestMode::Limit, 200, Bytes::new()));
        match &out[0] {
            Packet::SubChunkRequest(req) => assert_eq!(req.offsets.len(), 24),
            other => panic!("unexpected {}", other.name()),
        }
    }

    #[test]
    fn legacy_mode_stores_immediately() {
        let (mut handler, provider) = handler_with_world();
        let payload = section_payload(42);
        let mut pk = level_chunk(SubChunkRequestMode::Legacy, 0, payload);
        pk.sub_chunk_count = 1;
        let out = handler.on_level_chunk(&pk);
        assert!(out.is_empty(), "legacy chunks need no follow-up requests");
        assert_eq!(provider.column_count(), 1);
    }

    #[test]
    fn first_level_chunk_wins() {
        let (mut handler, _provider) = handler_with_world();
        let mut first = level_chunk(SubChunkRequestMode::Legacy, 0, section_payload(1));
        first.sub_chunk_count = 1;
        let mut second = level_chunk(SubChunkRequestMode::Legacy, 0, section_payload(2));
        second.sub_chunk_count = 1;

        handler.on_level_chunk(&first);
        handler.on_level_chunk(&second);
        // The assembly buffer still holds the first payload's block.
        let column = handler.columns.get(&ChunkPos::new(5, 5)).unwrap();
        assert_eq!(column.block(0, -64, 0), 1);
    }

    #[test]
    fn sub_chunk_without_column_is_skipped() {
        let (mut handler, provider) = handler_with_world();
        handler.on_sub_chunk(&SubChunkPacket {
            cache_enabled: false,
            dimension: 0,
            position: SubChunkPos::new(9, 0, 9),
            entries: vec![packets::SubChunkEntry {
                offset: [0, 0, 0],
                result: SubChunkResult::Success,
                payload: section_payload(3),
                heightmap_type: 0,
                heightmap: Bytes::new(),
            }],
        });
        assert_eq!(provider.column_count(), 0);
    }

    #[test]
    fn sub_chunk_entries_fill_requested_column() {
        let (mut handler, provider) = handler_with_world();
        handler.on_level_chunk(&level_chunk(SubChunkRequestMode::Limit, 1, Bytes::new()));

        handler.on_sub_chunk(&SubChunkPacket {
            cache_enabled: false,
            dimension: 0,
            position: SubChunkPos::new(5, 0, 5),
            entries: vec![
                packets::SubChunkEntry {
                    offset: [0, 0, 0],
                    result: SubChunkResult::Success,
                    payload: section_payload(7),
                    heightmap_type: 0,
                    heightmap: Bytes::new(),
                },
                packets::SubChunkEntry {
                    offset: [0, 1, 0],
                    result: SubChunkResult::SuccessAllAir,
                    payload: Bytes::new(),
                    heightmap_type: 0,
                    heightmap: Bytes::new(),
                },
            ],
        });

        assert_eq!(provider.column_count(), 1);
        let column = handler.columns.get(&ChunkPos::new(5, 5)).unwrap();
        // Section y=0 covers blocks 0..16.
        assert_eq!(column.block(0, 0, 0), 7);
        assert!(column.sections()[handler.columns[&ChunkPos::new(5, 5)].section_index(1)].is_none());
    }

    #[test]
    fn add_actor_tracks_entity_and_links() {
        let (mut handler, _provider) = handler_with_world();
        handler.on_packet(
            &Packet::AddActor(packets::AddActor {
                unique_id: -9,
                runtime_id: 12,
                entity_type: "minecraft:horse".into(),
                position: Vec3::new(8.0, 70.0, 8.0),
                velocity: Vec3::ZERO,
                pitch: 0.0,
                yaw: 0.0,
                head_yaw: 0.0,
                body_yaw: 0.0,
                attributes: Vec::new(),
                metadata: Metadata::new(),
                links: Vec::new(),
            }),
            false,
            Player::default(),
        );
        let world = handler.world().unwrap();
        assert!(!world.paused());
        // Position updates flow into the stored entity.
        handler.on_packet(
            &Packet::MoveActorAbsolute(packets::MoveActorAbsolute {
                runtime_id: 12,
                flags: 0,
                position: Vec3::new(20.0, 70.0, 8.0),
                rotation: [0; 3],
            }),
            false,
            Player::default(),
        );
        let world = handler.world.as_mut().unwrap();
        assert_eq!(world.get_entity_mut(12).unwrap().position.x, 20.0);
    }

    #[test]
    fn serverbound_packets_are_ignored() {
        let (mut handler, provider) = handler_with_world();
        let mut pk = level_chunk(SubChunkRequestMode::Legacy, 0, section_payload(1));
        pk.sub_chunk_count = 1;
        let out = handler.on_packet(&Packet::LevelChunk(pk), true, Player::default());
        assert!(out.is_empty());
        assert_eq!(provider.column_count(), 0);
    }

    #[test]
    fn game_rules_changed_updates_game_data() {
        let (mut handler, _provider) = handler_with_world();
        handler.game_data.game_rules = vec![mcproxy_proto::types::GameRule::bool("pvp", true)];
        handler.on_packet(
            &Packet::GameRulesChanged(packets::GameRulesChanged {
                rules: vec![
                    mcproxy_proto::types::GameRule::bool("pvp", false),
                    mcproxy_proto::types::GameRule::uint("spawnradius", 9),
                ],
            }),
            false,
            Player::default(),
        );
        assert_eq!(handler.game_data.game_rules.len(), 2);
        assert_eq!(
            handler.game_data.game_rules[0].value,
            mcproxy_proto::types::GameRuleValue::Bool(false)
        );
    }
}
