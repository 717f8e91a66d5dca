//! The dual world state: a durable view writing through to the provider
//! and a deferred in-memory view used while capture is paused, with the
//! merge that promotes deferred data around a point of interest on resume.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Instant;

use mcproxy_nbt::NbtCompound;
use mcproxy_proto::types::{BlockPos, ChunkPos};
use mcproxy_session::GameData;
use mcproxy_world::{
    Chunk, Column, Dimension, LevelDbProvider, WorldError, WorldProvider,
};
use tracing::{error, info, warn};

use crate::behaviourpack::BehaviourPack;
use crate::entities::{DummyBlock, EntityRuntimeId, EntityState, WorldEntities};

/// The deferred (paused) view: plain maps, nothing touches the provider.
#[derive(Default)]
struct DeferredView {
    chunks: HashMap<ChunkPos, Chunk>,
    block_nbts: HashMap<ChunkPos, HashMap<BlockPos, DummyBlock>>,
    ents: WorldEntities,
}

/// A container window the player has open, tracked by window byte.
#[derive(Debug, Clone, Copy)]
pub struct ItemContainer {
    pub position: BlockPos,
    pub container_type: u8,
}

/// One captured world: durable provider plus an optional deferred overlay.
///
/// Exactly one view is the active sink at any time; handlers call
/// [`World::store_chunk`] and friends and the world routes the write.
/// Mutation happens under the session's single world lock.
pub struct World {
    dimension: Dimension,
    durable: WorldEntities,
    deferred: Option<DeferredView>,
    use_deferred: bool,
    stored_chunks: HashSet<ChunkPos>,
    pub open_containers: HashMap<u8, ItemContainer>,
    pub exclude_mobs: Vec<String>,
    pub void_gen: bool,
    pub time_sync: Instant,
    pub time: i64,
    pub name: String,
    provider: Box<dyn WorldProvider>,
}

/// Flat-world layer string producing a void world.
const VOID_WORLD_LAYERS: &str = r#"{"biome_id":1,"block_layers":[{"block_data":0,"block_id":0,"count":1},{"block_data":0,"block_id":0,"count":2},{"block_data":0,"block_id":0,"count":1}],"encoding_version":3,"structure_options":null}"#;

impl World {
    /// Create a world at `<base_dir>/<name>-dim-<n>/`, wiping any previous
    /// contents, with a LevelDB provider.
    pub fn create(name: &str, base_dir: &Path, dimension: Dimension) -> Result<Self, WorldError> {
        let folder = world_folder(base_dir, name, dimension);
        if folder.exists() {
            std::fs::remove_dir_all(&folder)?;
        }
        std::fs::create_dir_all(&folder)?;
        let provider = Box::new(LevelDbProvider::open(&folder)?);
        Ok(Self::with_provider(name, dimension, provider))
    }

    /// Build a world over an already-open provider.
    pub fn with_provider(
        name: &str,
        dimension: Dimension,
        provider: Box<dyn WorldProvider>,
    ) -> Self {
        Self {
            dimension,
            durable: WorldEntities::default(),
            deferred: None,
            use_deferred: false,
            stored_chunks: HashSet::new(),
            open_containers: HashMap::new(),
            exclude_mobs: Vec::new(),
            void_gen: false,
            time_sync: Instant::now(),
            time: 0,
            name: name.to_string(),
            provider,
        }
    }

    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    pub fn paused(&self) -> bool {
        self.use_deferred
    }

    pub fn chunk_count(&self) -> usize {
        self.stored_chunks.len()
    }

    pub fn have_stored_chunk(&self, pos: ChunkPos) -> bool {
        self.stored_chunks.contains(&pos)
    }

    /// Store a chunk through the active view.
    pub fn store_chunk(
        &mut self,
        pos: ChunkPos,
        chunk: Chunk,
        block_nbts: HashMap<BlockPos, DummyBlock>,
        overwrite: bool,
    ) {
        self.stored_chunks.insert(pos);
        if self.use_deferred {
            let deferred = self.deferred.as_mut().expect("deferred view while paused");
            deferred.chunks.insert(pos, chunk);
            deferred.block_nbts.insert(pos, block_nbts);
        } else {
            self.store_chunk_durable(pos, chunk, block_nbts, overwrite);
        }
    }

    fn store_chunk_durable(
        &mut self,
        pos: ChunkPos,
        chunk: Chunk,
        block_nbts: HashMap<BlockPos, DummyBlock>,
        overwrite: bool,
    ) {
        let block_entities = block_nbts
            .iter()
            .map(|(p, b)| b.to_nbt(*p))
            .collect::<Vec<_>>();
        if !block_nbts.is_empty() {
            self.durable
                .block_nbts
                .entry(pos)
                .or_default()
                .extend(block_nbts);
        }
        let column = Column {
            chunk,
            block_entities,
        };
        if let Err(e) = self
            .provider
            .store_column(pos, self.dimension, &column, overwrite)
        {
            error!(%pos, error = %e, "failed to store column");
        }
    }

    fn active_ents(&mut self) -> &mut WorldEntities {
        if self.use_deferred {
            &mut self.deferred.as_mut().expect("deferred view while paused").ents
        } else {
            &mut self.durable
        }
    }

    pub fn store_entity(&mut self, id: EntityRuntimeId, es: EntityState) {
        self.active_ents().store_entity(id, es);
    }

    pub fn get_entity_mut(&mut self, id: EntityRuntimeId) -> Option<&mut EntityState> {
        self.active_ents().get_entity_mut(id)
    }

    pub fn add_entity_link(&mut self, link: mcproxy_proto::types::EntityLink) {
        self.active_ents().add_entity_link(link);
    }

    pub fn set_block_nbt(&mut self, pos: BlockPos, nbt: NbtCompound, merge: bool) {
        self.active_ents().set_block_nbt(pos, nbt, merge);
    }

    /// Switch the active sink to a fresh deferred view. No data moves.
    pub fn pause_capture(&mut self) {
        self.deferred = Some(DeferredView::default());
        self.use_deferred = true;
    }

    /// Merge the deferred view back into the durable one around a point of
    /// interest, then drop it.
    ///
    /// Chunks within `radius` (in chunks) of `around` are promoted;
    /// `on_decide` reports every surviving chunk with `Some` for promoted
    /// and `None` for dropped, so callers can invalidate map tiles.
    /// Entities are promoted within `radius * 16` blocks, or when the
    /// durable view already tracks them.
    pub fn unpause_capture(
        &mut self,
        around: BlockPos,
        radius: i32,
        on_decide: &mut dyn FnMut(ChunkPos, Option<&Chunk>),
    ) {
        let Some(mut deferred) = self.deferred.take() else {
            return;
        };
        self.use_deferred = false;

        // All-air chunks are culled before the distance check.
        deferred.chunks.retain(|_, chunk| !chunk.is_empty());

        for (pos, chunk) in deferred.chunks {
            let dx = (pos.x - around.x / 16) as i64;
            let dz = (pos.z - around.z / 16) as i64;
            let dist = ((dx * dx + dz * dz) as u64).isqrt() as i32;
            if dist <= radius {
                on_decide(pos, Some(&chunk));
                let block_nbts = deferred.block_nbts.remove(&pos).unwrap_or_default();
                self.store_chunk_durable(pos, chunk, block_nbts, true);
            } else {
                on_decide(pos, None);
            }
        }

        for (id, es) in deferred.ents.entities {
            let dx = (es.position.x as i32 - around.x) as i64;
            let dz = (es.position.z as i32 - around.z) as i64;
            let dist = ((dx * dx + dz * dz) as u64).isqrt() as i32;
            // The "already durable" clause keeps an entity's updates in one
            // view even when it wandered out of range.
            if dist < radius * 16 || self.durable.have_entity(id) {
                self.durable.store_entity(id, es);
            }
        }
    }

    /// Flush entities to the provider, excluding configured types. Errors
    /// are logged per bucket; persistence is best effort.
    fn save_entities(&mut self) {
        let mut chunk_entities: HashMap<ChunkPos, Vec<NbtCompound>> = HashMap::new();
        for es in self.durable.entities.values() {
            if self.exclude_mobs.contains(&es.entity_type) {
                continue;
            }
            let riders = self.durable.riders_of(es.unique_id);
            chunk_entities
                .entry(es.chunk_pos())
                .or_default()
                .push(es.to_nbt(&riders));
        }
        for (pos, entities) in chunk_entities {
            if let Err(e) = self.provider.store_entities(pos, self.dimension, &entities) {
                error!(%pos, error = %e, "failed to store entities");
            }
        }
    }

    fn save_block_nbts(&mut self) -> Result<(), WorldError> {
        let buckets: Vec<(ChunkPos, Vec<NbtCompound>)> = self
            .durable
            .block_nbts
            .iter()
            .map(|(pos, blocks)| {
                (
                    *pos,
                    blocks.iter().map(|(p, b)| b.to_nbt(*p)).collect(),
                )
            })
            .collect();
        for (pos, blocks) in buckets {
            self.provider.store_block_nbts(pos, self.dimension, &blocks)?;
        }
        Ok(())
    }

    /// Finalize the world: entities, player data, level settings, game
    /// rules, then settings save and provider close.
    pub fn finish(
        mut self,
        player_data: NbtCompound,
        spawn: BlockPos,
        gd: &GameData,
        bp: &BehaviourPack,
    ) -> Result<(), WorldError> {
        self.save_entities();
        self.save_block_nbts()?;
        self.provider.save_local_player_data(player_data)?;

        let mut settings = self.provider.settings();
        settings.spawn = spawn;
        settings.name = self.name.clone();

        {
            let ld = self.provider.level_dat_mut();
            ld.cheats_enabled = true;
            ld.random_seed = gd.world_seed;
            apply_game_rules(ld, &gd.game_rules);

            if self.void_gen {
                ld.flat_world_layers = VOID_WORLD_LAYERS.to_string();
                ld.generator = 2;
            }

            // Frozen regardless of what the server advertised.
            ld.random_tick_speed = 0;

            settings.current_tick = gd.time;
            let ticks_since = (self.time_sync.elapsed().as_millis() / 50) as i64;
            settings.time = self.time;
            if ld.do_day_light_cycle {
                settings.time += ticks_since;
                settings.time_cycle = true;
            }

            if bp.has_content() {
                ld.experiments.insert("data_driven_items".into(), true);
                ld.experiments.insert("experiments_ever_used".into(), true);
                ld.experiments
                    .insert("saved_with_toggled_experiments".into(), true);
            }
        }

        self.provider.save_settings(settings);
        info!(world = %self.name, chunks = self.stored_chunks.len(), "world saved");
        self.provider.close()
    }
}

/// `<base>/<name>-dim-<n>`, the per-session world directory.
pub fn world_folder(base_dir: &Path, name: &str, dimension: Dimension) -> PathBuf {
    base_dir.join(format!("{name}-dim-{}", dimension.id()))
}

/// Apply the closed game-rule enumeration onto the level.dat fields.
/// Unknown rules are logged and skipped; `commandblocksenabled` is
/// accepted and ignored.
fn apply_game_rules(
    ld: &mut mcproxy_world::LevelDat,
    rules: &[mcproxy_proto::types::GameRule],
) {
    use mcproxy_proto::types::GameRuleValue;

    for rule in rules {
        let bool_value = |default: bool| match rule.value {
            GameRuleValue::Bool(v) => v,
            _ => default,
        };
        let int_value = |default: i32| match rule.value {
            GameRuleValue::Uint(v) => v as i32,
            _ => default,
        };

        match rule.name.to_lowercase().as_str() {
            "commandblockoutput" => ld.command_block_output = bool_value(ld.command_block_output),
            "dodaylightcycle" => ld.do_day_light_cycle = bool_value(ld.do_day_light_cycle),
            "doentitydrops" => ld.do_entity_drops = bool_value(ld.do_entity_drops),
            "dofiretick" => ld.do_fire_tick = bool_value(ld.do_fire_tick),
            "domobloot" => ld.do_mob_loot = bool_value(ld.do_mob_loot),
            "domobspawning" => ld.do_mob_spawning = bool_value(ld.do_mob_spawning),
            "dotiledrops" => ld.do_tile_drops = bool_value(ld.do_tile_drops),
            "doweathercycle" => ld.do_weather_cycle = bool_value(ld.do_weather_cycle),
            "drowningdamage" => ld.drowning_damage = bool_value(ld.drowning_damage),
            "doinsomnia" => ld.do_insomnia = bool_value(ld.do_insomnia),
            "falldamage" => ld.fall_damage = bool_value(ld.fall_damage),
            "firedamage" => ld.fire_damage = bool_value(ld.fire_damage),
            "keepinventory" => ld.keep_inventory = bool_value(ld.keep_inventory),
            "mobgriefing" => ld.mob_griefing = bool_value(ld.mob_griefing),
            "pvp" => ld.pvp = bool_value(ld.pvp),
            "showcoordinates" => ld.show_coordinates = bool_value(ld.show_coordinates),
            "naturalregeneration" => ld.natural_regeneration = bool_value(ld.natural_regeneration),
            "tntexplodes" => ld.tnt_explodes = bool_value(ld.tnt_explodes),
            "sendcommandfeedback" => ld.send_command_feedback = bool_value(ld.send_command_feedback),
            "doimmediaterespawn" => ld.do_immediate_respawn = bool_value(ld.do_immediate_respawn),
            "showdeathmessages" => ld.show_death_messages = bool_value(ld.show_death_messages),
            "showtags" => ld.show_tags = bool_value(ld.show_tags),
            "freezedamage" => ld.freeze_damage = bool_value(ld.freeze_damage),
            "respawnblocksexplode" => {
                ld.respawn_blocks_explode = bool_value(ld.respawn_blocks_explode)
            }
            "showbordereffect" => ld.show_border_effect = bool_value(ld.show_border_effect),
            "maxcommandchainlength" => {
                ld.max_command_chain_length = int_value(ld.max_command_chain_length)
            }
            "randomtickspeed" => ld.random_tick_speed = int_value(ld.random_tick_speed),
            "functioncommandlimit" => {
                ld.function_command_limit = int_value(ld.function_command_limit)
            }
            "spawnradius" => ld.spawn_radius = int_value(ld.spawn_radius),
            "commandblocksenabled" => {} // accepted, intentionally not persisted
            other => warn!(rule = other, "unknown game rule"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MemProvider;
    use mcproxy_proto::types::{GameRule, Vec3};
    use mcproxy_world::{SubChunk, AIR_RUNTIME_ID};

    fn solid_chunk(dim: Dimension) -> Chunk {
        let mut chunk = Chunk::empty(dim);
        let mut section = SubChunk::new_single(AIR_RUNTIME_ID);
        section.set_block(0, 0, 0, 7);
        chunk.set_section(4, Some(section));
        chunk
    }

    fn entity_at(id: u64, unique: i64, x: f32, z: f32) -> EntityState {
        EntityState {
            runtime_id: id,
            unique_id: unique,
            entity_type: "minecraft:pig".into(),
            position: Vec3::new(x, 64.0, z),
            ..Default::default()
        }
    }

    fn test_world() -> (World, MemProvider) {
        let provider = MemProvider::new();
        let world = World::with_provider("test", Dimension::Overworld, Box::new(provider.clone()));
        (world, provider)
    }

    #[test]
    fn stored_chunks_tracks_every_store() {
        let (mut world, provider) = test_world();
        world.store_chunk(
            ChunkPos::new(0, 0),
            solid_chunk(Dimension::Overworld),
            HashMap::new(),
            false,
        );
        assert!(world.have_stored_chunk(ChunkPos::new(0, 0)));
        assert_eq!(provider.column_count(), 1);
    }

    #[test]
    fn pause_routes_to_deferred() {
        let (mut world, provider) = test_world();
        world.pause_capture();
        world.store_chunk(
            ChunkPos::new(1, 0),
            solid_chunk(Dimension::Overworld),
            HashMap::new(),
            false,
        );
        assert!(world.paused());
        assert_eq!(provider.column_count(), 0, "paused stores stay in memory");
        // storedChunks still superset of everything handed to any sink.
        assert!(world.have_stored_chunk(ChunkPos::new(1, 0)));
    }

    #[test]
    fn unpause_merge_scenario() {
        // Durable already has (0,0) and (1,0); while paused we observe
        // (2,0), (10,10), and an entity at x=35.
        let (mut world, provider) = test_world();
        world.store_chunk(
            ChunkPos::new(0, 0),
            solid_chunk(Dimension::Overworld),
            HashMap::new(),
            false,
        );
        world.store_chunk(
            ChunkPos::new(1, 0),
            solid_chunk(Dimension::Overworld),
            HashMap::new(),
            false,
        );

        world.pause_capture();
        world.store_chunk(
            ChunkPos::new(2, 0),
            solid_chunk(Dimension::Overworld),
            HashMap::new(),
            false,
        );
        world.store_chunk(
            ChunkPos::new(10, 10),
            solid_chunk(Dimension::Overworld),
            HashMap::new(),
            false,
        );
        world.store_entity(5, entity_at(5, 50, 35.0, 0.0));

        let mut decisions = Vec::new();
        world.unpause_capture(BlockPos::new(0, 64, 0), 3, &mut |pos, chunk| {
            decisions.push((pos, chunk.is_some()));
        });

        decisions.sort_by_key(|(pos, _)| (pos.x, pos.z));
        assert_eq!(
            decisions,
            vec![
                (ChunkPos::new(2, 0), true),   // distance 2 <= 3
                (ChunkPos::new(10, 10), false) // distance 14 > 3
            ]
        );
        assert_eq!(provider.column_count(), 3, "(2,0) promoted to durable");
        // Entity at block distance 35 < 3*16 = 48: promoted.
        assert!(world.durable.have_entity(5));
        assert!(!world.paused());
    }

    #[test]
    fn unpause_radius_zero_drops_everything_new() {
        let (mut world, provider) = test_world();
        world.pause_capture();
        world.store_chunk(
            ChunkPos::new(3, 3),
            solid_chunk(Dimension::Overworld),
            HashMap::new(),
            false,
        );
        world.store_entity(9, entity_at(9, 90, 100.0, 100.0));

        let mut dropped = 0;
        world.unpause_capture(BlockPos::new(0, 64, 0), 0, &mut |_, chunk| {
            if chunk.is_none() {
                dropped += 1;
            }
        });
        assert_eq!(dropped, 1);
        assert_eq!(provider.column_count(), 0);
        assert!(!world.durable.have_entity(9));
    }

    #[test]
    fn unpause_keeps_already_durable_entity_updates() {
        let (mut world, _provider) = test_world();
        world.store_entity(7, entity_at(7, 70, 0.0, 0.0));

        world.pause_capture();
        // Same runtime id, now far away: still promoted to keep its
        // history in one view.
        world.store_entity(7, entity_at(7, 70, 1000.0, 1000.0));
        world.unpause_capture(BlockPos::new(0, 64, 0), 1, &mut |_, _| {});

        let es = world.durable.entities.get(&7).unwrap();
        assert_eq!(es.position.x, 1000.0);
    }

    #[test]
    fn all_air_deferred_chunks_are_culled() {
        let (mut world, _provider) = test_world();
        world.pause_capture();
        world.store_chunk(
            ChunkPos::new(0, 0),
            Chunk::empty(Dimension::Overworld),
            HashMap::new(),
            false,
        );
        let mut seen = 0;
        world.unpause_capture(BlockPos::new(0, 64, 0), 10, &mut |_, _| seen += 1);
        assert_eq!(seen, 0, "culled chunks never reach the decision callback");
    }

    #[test]
    fn finish_excludes_configured_mobs() {
        let (mut world, provider) = test_world();
        world.exclude_mobs = vec!["minecraft:bat".into()];
        world.store_entity(1, entity_at(1, 10, 0.0, 0.0));
        world.store_entity(
            2,
            EntityState {
                runtime_id: 2,
                unique_id: 20,
                entity_type: "minecraft:bat".into(),
                position: Vec3::new(0.0, 64.0, 0.0),
                ..Default::default()
            },
        );

        world
            .finish(
                NbtCompound::new(),
                BlockPos::new(0, 64, 0),
                &GameData::default(),
                &BehaviourPack::default(),
            )
            .unwrap();

        let stored = provider.stored_entity_types();
        assert!(stored.contains(&"minecraft:pig".to_string()));
        assert!(!stored.contains(&"minecraft:bat".to_string()));
        assert!(provider.is_closed());
    }

    #[test]
    fn finish_applies_game_rules_and_overrides() {
        let (mut world, provider) = test_world();
        world.time = 1000;
        let gd = GameData {
            time: 777,
            world_seed: 42,
            game_rules: vec![
                GameRule::bool("doDayLightCycle", true),
                GameRule::uint("randomTickSpeed", 20),
                GameRule::bool("unknownrule", true),
            ],
            ..Default::default()
        };
        world
            .finish(
                NbtCompound::new(),
                BlockPos::new(5, 70, 5),
                &gd,
                &BehaviourPack::default(),
            )
            .unwrap();

        let (settings, ld) = provider.final_state();
        assert!(ld.do_day_light_cycle);
        assert_eq!(ld.random_tick_speed, 0, "overridden after the rule loop");
        assert_eq!(ld.random_seed, 42);
        assert!(ld.cheats_enabled);
        assert_eq!(settings.current_tick, 777);
        assert!(settings.time_cycle);
        assert!(settings.time >= 1000);
        assert_eq!(settings.spawn, BlockPos::new(5, 70, 5));
    }

    #[test]
    fn finish_void_gen_and_experiments() {
        let (mut world, provider) = test_world();
        world.void_gen = true;
        let mut bp = BehaviourPack::default();
        bp.add_entity("custom:robot");
        world
            .finish(
                NbtCompound::new(),
                BlockPos::new(0, 0, 0),
                &GameData::default(),
                &bp,
            )
            .unwrap();

        let (_, ld) = provider.final_state();
        assert_eq!(ld.generator, 2);
        assert!(ld.flat_world_layers.contains("block_layers"));
        assert_eq!(ld.experiments.get("data_driven_items"), Some(&true));
        assert_eq!(ld.experiments.get("experiments_ever_used"), Some(&true));
    }

    #[test]
    fn world_folder_layout() {
        assert_eq!(
            world_folder(Path::new("worlds"), "hub", Dimension::Nether),
            PathBuf::from("worlds/hub-dim-1")
        );
    }
}
