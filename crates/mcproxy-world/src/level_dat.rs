//! level.dat metadata and world settings.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::BufMut;
use mcproxy_nbt::{NbtCompound, NbtRoot, NbtTag};
use mcproxy_proto::types::BlockPos;

use crate::error::WorldError;

/// Settings the finalizer patches before the provider closes.
#[derive(Debug, Clone, Default)]
pub struct WorldSettings {
    pub name: String,
    pub spawn: BlockPos,
    pub time: i64,
    pub current_tick: i64,
    pub time_cycle: bool,
}

/// World metadata stored in level.dat, including the game-rule fields the
/// capture finalizer populates from the server's game data.
#[derive(Debug, Clone)]
pub struct LevelDat {
    pub level_name: String,
    pub storage_version: i32,
    pub game_type: i32,
    pub generator: i32,
    pub random_seed: i64,
    pub spawn_x: i32,
    pub spawn_y: i32,
    pub spawn_z: i32,
    pub time: i64,
    pub current_tick: i64,
    pub last_played: i64,
    pub cheats_enabled: bool,
    pub flat_world_layers: String,
    pub experiments: HashMap<String, bool>,

    // Game rules (bool).
    pub command_block_output: bool,
    pub do_day_light_cycle: bool,
    pub do_entity_drops: bool,
    pub do_fire_tick: bool,
    pub do_mob_loot: bool,
    pub do_mob_spawning: bool,
    pub do_tile_drops: bool,
    pub do_weather_cycle: bool,
    pub drowning_damage: bool,
    pub do_insomnia: bool,
    pub fall_damage: bool,
    pub fire_damage: bool,
    pub keep_inventory: bool,
    pub mob_griefing: bool,
    pub pvp: bool,
    pub show_coordinates: bool,
    pub natural_regeneration: bool,
    pub tnt_explodes: bool,
    pub send_command_feedback: bool,
    pub do_immediate_respawn: bool,
    pub show_death_messages: bool,
    pub show_tags: bool,
    pub freeze_damage: bool,
    pub respawn_blocks_explode: bool,
    pub show_border_effect: bool,

    // Game rules (int).
    pub max_command_chain_length: i32,
    pub random_tick_speed: i32,
    pub function_command_limit: i32,
    pub spawn_radius: i32,
}

impl Default for LevelDat {
    fn default() -> Self {
        Self {
            level_name: "world".into(),
            storage_version: 10,
            game_type: 1,
            generator: 1,
            random_seed: 0,
            spawn_x: 0,
            spawn_y: 64,
            spawn_z: 0,
            time: 0,
            current_tick: 0,
            last_played: unix_timestamp(),
            cheats_enabled: false,
            flat_world_layers: String::new(),
            experiments: HashMap::new(),
            command_block_output: true,
            do_day_light_cycle: true,
            do_entity_drops: true,
            do_fire_tick: true,
            do_mob_loot: true,
            do_mob_spawning: true,
            do_tile_drops: true,
            do_weather_cycle: true,
            drowning_damage: true,
            do_insomnia: true,
            fall_damage: true,
            fire_damage: true,
            keep_inventory: false,
            mob_griefing: true,
            pvp: true,
            show_coordinates: false,
            natural_regeneration: true,
            tnt_explodes: true,
            send_command_feedback: true,
            do_immediate_respawn: false,
            show_death_messages: true,
            show_tags: true,
            freeze_damage: true,
            respawn_blocks_explode: true,
            show_border_effect: true,
            max_command_chain_length: 65536,
            random_tick_speed: 1,
            function_command_limit: 10000,
            spawn_radius: 5,
        }
    }
}

impl LevelDat {
    fn to_nbt(&self) -> NbtRoot {
        let mut c = NbtCompound::new();
        c.insert("LevelName".into(), NbtTag::String(self.level_name.clone()));
        c.insert("StorageVersion".into(), NbtTag::Int(self.storage_version));
        c.insert("GameType".into(), NbtTag::Int(self.game_type));
        c.insert("Generator".into(), NbtTag::Int(self.generator));
        c.insert("RandomSeed".into(), NbtTag::Long(self.random_seed));
        c.insert("SpawnX".into(), NbtTag::Int(self.spawn_x));
        c.insert("SpawnY".into(), NbtTag::Int(self.spawn_y));
        c.insert("SpawnZ".into(), NbtTag::Int(self.spawn_z));
        c.insert("Time".into(), NbtTag::Long(self.time));
        c.insert("currentTick".into(), NbtTag::Long(self.current_tick));
        c.insert("LastPlayed".into(), NbtTag::Long(self.last_played));
        c.insert("cheatsEnabled".into(), NbtTag::Byte(self.cheats_enabled as i8));
        c.insert(
            "FlatWorldLayers".into(),
            NbtTag::String(self.flat_world_layers.clone()),
        );
        if !self.experiments.is_empty() {
            let mut exp = NbtCompound::new();
            for (name, enabled) in &self.experiments {
                exp.insert(name.clone(), NbtTag::Byte(*enabled as i8));
            }
            c.insert("experiments".into(), NbtTag::Compound(exp));
        }

        for (name, value) in self.bool_rules() {
            c.insert(name.into(), NbtTag::Byte(value as i8));
        }
        c.insert(
            "maxcommandchainlength".into(),
            NbtTag::Int(self.max_command_chain_length),
        );
        c.insert("randomtickspeed".into(), NbtTag::Int(self.random_tick_speed));
        c.insert(
            "functioncommandlimit".into(),
            NbtTag::Int(self.function_command_limit),
        );
        c.insert("spawnradius".into(), NbtTag::Int(self.spawn_radius));

        NbtRoot::new("", c)
    }

    fn bool_rules(&self) -> [(&'static str, bool); 25] {
        [
            ("commandblockoutput", self.command_block_output),
            ("dodaylightcycle", self.do_day_light_cycle),
            ("doentitydrops", self.do_entity_drops),
            ("dofiretick", self.do_fire_tick),
            ("domobloot", self.do_mob_loot),
            ("domobspawning", self.do_mob_spawning),
            ("dotiledrops", self.do_tile_drops),
            ("doweathercycle", self.do_weather_cycle),
            ("drowningdamage", self.drowning_damage),
            ("doinsomnia", self.do_insomnia),
            ("falldamage", self.fall_damage),
            ("firedamage", self.fire_damage),
            ("keepinventory", self.keep_inventory),
            ("mobgriefing", self.mob_griefing),
            ("pvp", self.pvp),
            ("showcoordinates", self.show_coordinates),
            ("naturalregeneration", self.natural_regeneration),
            ("tntexplodes", self.tnt_explodes),
            ("sendcommandfeedback", self.send_command_feedback),
            ("doimmediaterespawn", self.do_immediate_respawn),
            ("showdeathmessages", self.show_death_messages),
            ("showtags", self.show_tags),
            ("freezedamage", self.freeze_damage),
            ("respawnblocksexplode", self.respawn_blocks_explode),
            ("showbordereffect", self.show_border_effect),
        ]
    }

    /// Load level.dat: `[version:i32_le][length:i32_le][NBT]`.
    pub fn load(path: &Path) -> Result<Self, WorldError> {
        let data = std::fs::read(path)?;
        if data.len() < 8 {
            return Err(WorldError::Database("level.dat too short".into()));
        }
        let data_length =
            i32::from_le_bytes([data[4], data[5], data[6], data[7]]) as usize;
        if data.len() < 8 + data_length {
            return Err(WorldError::Database("level.dat truncated".into()));
        }
        let mut cursor = Cursor::new(&data[8..8 + data_length]);
        let root = mcproxy_nbt::read_le(&mut cursor)?;
        let c = &root.compound;

        let get_bool = |name: &str, default: bool| {
            c.get(name).and_then(NbtTag::as_byte).map_or(default, |v| v != 0)
        };
        let get_int = |name: &str, default: i32| {
            c.get(name)
                .and_then(NbtTag::as_i64_lenient)
                .map_or(default, |v| v as i32)
        };
        let get_long =
            |name: &str, default: i64| c.get(name).and_then(NbtTag::as_i64_lenient).unwrap_or(default);

        let defaults = Self::default();
        Ok(Self {
            level_name: c
                .get("LevelName")
                .and_then(NbtTag::as_string)
                .unwrap_or("world")
                .to_string(),
            storage_version: get_int("StorageVersion", 10),
            game_type: get_int("GameType", 1),
            generator: get_int("Generator", 1),
            random_seed: get_long("RandomSeed", 0),
            spawn_x: get_int("SpawnX", 0),
            spawn_y: get_int("SpawnY", 64),
            spawn_z: get_int("SpawnZ", 0),
            time: get_long("Time", 0),
            current_tick: get_long("currentTick", 0),
            last_played: get_long("LastPlayed", 0),
            cheats_enabled: get_bool("cheatsEnabled", false),
            flat_world_layers: c
                .get("FlatWorldLayers")
                .and_then(NbtTag::as_string)
                .unwrap_or_default()
                .to_string(),
            experiments: c
                .get("experiments")
                .and_then(NbtTag::as_compound)
                .map(|exp| {
                    exp.iter()
                        .filter_map(|(k, v)| v.as_byte().map(|b| (k.clone(), b != 0)))
                        .collect()
                })
                .unwrap_or_default(),
            command_block_output: get_bool("commandblockoutput", defaults.command_block_output),
            do_day_light_cycle: get_bool("dodaylightcycle", defaults.do_day_light_cycle),
            do_entity_drops: get_bool("doentitydrops", defaults.do_entity_drops),
            do_fire_tick: get_bool("dofiretick", defaults.do_fire_tick),
            do_mob_loot: get_bool("domobloot", defaults.do_mob_loot),
            do_mob_spawning: get_bool("domobspawning", defaults.do_mob_spawning),
            do_tile_drops: get_bool("dotiledrops", defaults.do_tile_drops),
            do_weather_cycle: get_bool("doweathercycle", defaults.do_weather_cycle),
            drowning_damage: get_bool("drowningdamage", defaults.drowning_damage),
            do_insomnia: get_bool("doinsomnia", defaults.do_insomnia),
            fall_damage: get_bool("falldamage", defaults.fall_damage),
            fire_damage: get_bool("firedamage", defaults.fire_damage),
            keep_inventory: get_bool("keepinventory", defaults.keep_inventory),
            mob_griefing: get_bool("mobgriefing", defaults.mob_griefing),
            pvp: get_bool("pvp", defaults.pvp),
            show_coordinates: get_bool("showcoordinates", defaults.show_coordinates),
            natural_regeneration: get_bool("naturalregeneration", defaults.natural_regeneration),
            tnt_explodes: get_bool("tntexplodes", defaults.tnt_explodes),
            send_command_feedback: get_bool("sendcommandfeedback", defaults.send_command_feedback),
            do_immediate_respawn: get_bool("doimmediaterespawn", defaults.do_immediate_respawn),
            show_death_messages: get_bool("showdeathmessages", defaults.show_death_messages),
            show_tags: get_bool("showtags", defaults.show_tags),
            freeze_damage: get_bool("freezedamage", defaults.freeze_damage),
            respawn_blocks_explode: get_bool("respawnblocksexplode", defaults.respawn_blocks_explode),
            show_border_effect: get_bool("showbordereffect", defaults.show_border_effect),
            max_command_chain_length: get_int(
                "maxcommandchainlength",
                defaults.max_command_chain_length,
            ),
            random_tick_speed: get_int("randomtickspeed", defaults.random_tick_speed),
            function_command_limit: get_int(
                "functioncommandlimit",
                defaults.function_command_limit,
            ),
            spawn_radius: get_int("spawnradius", defaults.spawn_radius),
        })
    }

    /// Save level.dat with the 8-byte storage header, backing up any
    /// previous file to `level.dat_old`.
    pub fn save(&self, path: &Path) -> Result<(), WorldError> {
        if path.exists() {
            let backup = path.with_extension("dat_old");
            std::fs::copy(path, backup).ok();
        }

        let mut nbt_buf = Vec::new();
        mcproxy_nbt::write_le(&mut nbt_buf, &self.to_nbt());

        let mut file_buf = Vec::with_capacity(8 + nbt_buf.len());
        file_buf.put_i32_le(self.storage_version);
        file_buf.put_i32_le(nbt_buf.len() as i32);
        file_buf.extend_from_slice(&nbt_buf);
        std::fs::write(path, &file_buf)?;
        Ok(())
    }

    pub fn touch(&mut self) {
        self.last_played = unix_timestamp();
    }
}

fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
