//! The world provider boundary and its LevelDB implementation.
//!
//! Keys follow the Bedrock LevelDB layout: `[x:i32_le][z:i32_le]` followed
//! by an optional `[dim:i32_le]` for non-overworld dimensions, then a tag
//! byte.

use std::path::{Path, PathBuf};

use bytes::BytesMut;
use mcproxy_nbt::{NbtCompound, NbtRoot};
use mcproxy_proto::types::ChunkPos;
use rusty_leveldb::DB;
use tracing::debug;

use crate::chunk::{Chunk, SubChunk};
use crate::dimension::Dimension;
use crate::error::WorldError;
use crate::level_dat::{LevelDat, WorldSettings};

// LevelDB key tags.
const TAG_CHUNK_VERSION: u8 = 0x2C;
const TAG_DATA_2D: u8 = 0x2D;
const TAG_SUB_CHUNK_PREFIX: u8 = 0x2F;
const TAG_BLOCK_ENTITY: u8 = 0x31;
const TAG_ENTITY: u8 = 0x32;
const TAG_FINALIZED_STATE: u8 = 0x36;

/// Current chunk format version byte.
const CHUNK_VERSION: u8 = 40;

/// A chunk column plus the block entities captured inside it.
pub struct Column {
    pub chunk: Chunk,
    pub block_entities: Vec<NbtCompound>,
}

/// Durable world sink the capture pipeline writes through.
pub trait WorldProvider: Send {
    fn store_column(
        &mut self,
        pos: ChunkPos,
        dim: Dimension,
        column: &Column,
        overwrite: bool,
    ) -> Result<(), WorldError>;

    fn store_entities(
        &mut self,
        pos: ChunkPos,
        dim: Dimension,
        entities: &[NbtCompound],
    ) -> Result<(), WorldError>;

    fn store_block_nbts(
        &mut self,
        pos: ChunkPos,
        dim: Dimension,
        blocks: &[NbtCompound],
    ) -> Result<(), WorldError>;

    fn save_local_player_data(&mut self, data: NbtCompound) -> Result<(), WorldError>;

    fn settings(&self) -> WorldSettings;
    fn save_settings(&mut self, settings: WorldSettings);
    fn level_dat_mut(&mut self) -> &mut LevelDat;

    /// Flush metadata and release the database. Must be called exactly once.
    fn close(&mut self) -> Result<(), WorldError>;
}

// -----------------------------------------------------------------------
// Key builders
// -----------------------------------------------------------------------

fn chunk_key(pos: ChunkPos, dim: Dimension, tag: u8) -> Vec<u8> {
    let mut key = Vec::with_capacity(13);
    key.extend_from_slice(&pos.x.to_le_bytes());
    key.extend_from_slice(&pos.z.to_le_bytes());
    if dim != Dimension::Overworld {
        key.extend_from_slice(&dim.id().to_le_bytes());
    }
    key.push(tag);
    key
}

fn sub_chunk_key(pos: ChunkPos, dim: Dimension, y_index: i8) -> Vec<u8> {
    let mut key = chunk_key(pos, dim, TAG_SUB_CHUNK_PREFIX);
    key.push(y_index as u8);
    key
}

// -----------------------------------------------------------------------
// Disk serialization
// -----------------------------------------------------------------------

fn bits_per_block_for_palette(palette_size: usize) -> u8 {
    match palette_size {
        0..=1 => 0,
        2 => 1,
        3..=4 => 2,
        5..=8 => 3,
        9..=16 => 4,
        17..=32 => 5,
        33..=64 => 6,
        65..=256 => 8,
        _ => 16,
    }
}

/// Disk sub-chunk format: `[version=9][num_layers=1][palette_header]
/// [packed words][palette_size:i32_le][palette:u32_le[]]`. Header bit 0 is
/// clear for persistence encoding.
fn serialize_section_disk(section: &SubChunk) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.push(9);
    buf.push(1);

    let palette_size = section.palette.len();
    if palette_size <= 1 {
        buf.push(0x00);
        buf.extend_from_slice(&(palette_size as i32).to_le_bytes());
        if palette_size == 1 {
            buf.extend_from_slice(&section.palette[0].to_le_bytes());
        }
        return buf;
    }

    let bpb = bits_per_block_for_palette(palette_size);
    buf.push(bpb << 1);
    let blocks_per_word = 32 / bpb as usize;
    let word_count = 4096_usize.div_ceil(blocks_per_word);
    for word_idx in 0..word_count {
        let mut word: u32 = 0;
        for slot in 0..blocks_per_word {
            let block_idx = word_idx * blocks_per_word + slot;
            if block_idx < 4096 {
                word |= (section.blocks[block_idx] as u32) << (bpb as u32 * slot as u32);
            }
        }
        buf.extend_from_slice(&word.to_le_bytes());
    }
    buf.extend_from_slice(&(palette_size as i32).to_le_bytes());
    for &runtime_id in &section.palette {
        buf.extend_from_slice(&runtime_id.to_le_bytes());
    }
    buf
}

/// Data2D: per-column heightmap (i16_le[256]) followed by 256 biome bytes.
fn serialize_data_2d(chunk: &Chunk) -> Vec<u8> {
    let mut buf = Vec::with_capacity(768);
    for height in chunk.heightmap() {
        buf.extend_from_slice(&height.to_le_bytes());
    }
    // Biomes arrive in the newer 3D payload format; the flat map is zeroed.
    buf.extend_from_slice(&[0u8; 256]);
    buf
}

fn serialize_compounds(compounds: &[NbtCompound]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    for compound in compounds {
        mcproxy_nbt::write_le(&mut buf, &NbtRoot::new("", compound.clone()));
    }
    buf.to_vec()
}

// -----------------------------------------------------------------------
// LevelDB provider
// -----------------------------------------------------------------------

/// Provider backed by a `rusty_leveldb` database inside the world folder.
pub struct LevelDbProvider {
    db: DB,
    folder: PathBuf,
    level_dat: LevelDat,
    settings: WorldSettings,
    closed: bool,
}

impl LevelDbProvider {
    /// Open (creating if missing) the database under `<folder>/db`.
    pub fn open(folder: &Path) -> Result<Self, WorldError> {
        std::fs::create_dir_all(folder)?;
        let opts = rusty_leveldb::Options {
            create_if_missing: true,
            ..rusty_leveldb::Options::default()
        };
        let db = DB::open(folder.join("db"), opts)
            .map_err(|e| WorldError::Database(format!("open leveldb: {e}")))?;
        Ok(Self {
            db,
            folder: folder.to_path_buf(),
            level_dat: LevelDat::default(),
            settings: WorldSettings::default(),
            closed: false,
        })
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), WorldError> {
        self.db
            .put(key, value)
            .map_err(|e| WorldError::Database(format!("put: {e}")))
    }

    #[cfg(test)]
    fn get_raw(&mut self, key: &[u8]) -> Option<Vec<u8>> {
        self.db.get(key)
    }
}

impl WorldProvider for LevelDbProvider {
    fn store_column(
        &mut self,
        pos: ChunkPos,
        dim: Dimension,
        column: &Column,
        overwrite: bool,
    ) -> Result<(), WorldError> {
        let version_key = chunk_key(pos, dim, TAG_CHUNK_VERSION);
        if !overwrite && self.db.get(&version_key).is_some() {
            debug!(%pos, "column already stored, skipping");
            return Ok(());
        }

        self.put(&version_key, &[CHUNK_VERSION])?;
        self.put(&chunk_key(pos, dim, TAG_DATA_2D), &serialize_data_2d(&column.chunk))?;

        let min_section = dim.min_section();
        for (idx, section) in column.chunk.sections().iter().enumerate() {
            let Some(section) = section else { continue };
            if section.is_empty() {
                continue;
            }
            let y_index = (min_section + idx as i32) as i8;
            self.put(
                &sub_chunk_key(pos, dim, y_index),
                &serialize_section_disk(section),
            )?;
        }

        if !column.block_entities.is_empty() {
            self.put(
                &chunk_key(pos, dim, TAG_BLOCK_ENTITY),
                &serialize_compounds(&column.block_entities),
            )?;
        }

        self.put(&chunk_key(pos, dim, TAG_FINALIZED_STATE), &2i32.to_le_bytes())
    }

    fn store_entities(
        &mut self,
        pos: ChunkPos,
        dim: Dimension,
        entities: &[NbtCompound],
    ) -> Result<(), WorldError> {
        if entities.is_empty() {
            return Ok(());
        }
        self.put(&chunk_key(pos, dim, TAG_ENTITY), &serialize_compounds(entities))
    }

    fn store_block_nbts(
        &mut self,
        pos: ChunkPos,
        dim: Dimension,
        blocks: &[NbtCompound],
    ) -> Result<(), WorldError> {
        if blocks.is_empty() {
            return Ok(());
        }
        self.put(
            &chunk_key(pos, dim, TAG_BLOCK_ENTITY),
            &serialize_compounds(blocks),
        )
    }

    fn save_local_player_data(&mut self, data: NbtCompound) -> Result<(), WorldError> {
        let mut buf = BytesMut::new();
        mcproxy_nbt::write_le(&mut buf, &NbtRoot::new("", data));
        self.put(b"~local_player", &buf)
    }

    fn settings(&self) -> WorldSettings {
        self.settings.clone()
    }

    fn save_settings(&mut self, settings: WorldSettings) {
        self.settings = settings;
    }

    fn level_dat_mut(&mut self) -> &mut LevelDat {
        &mut self.level_dat
    }

    fn close(&mut self) -> Result<(), WorldError> {
        if self.closed {
            return Err(WorldError::Database("provider already closed".into()));
        }
        self.closed = true;

        self.level_dat.level_name = self.settings.name.clone();
        self.level_dat.spawn_x = self.settings.spawn.x;
        self.level_dat.spawn_y = self.settings.spawn.y;
        self.level_dat.spawn_z = self.settings.spawn.z;
        self.level_dat.time = self.settings.time;
        self.level_dat.current_tick = self.settings.current_tick;
        self.level_dat.touch();
        self.level_dat.save(&self.folder.join("level.dat"))?;
        std::fs::write(self.folder.join("levelname.txt"), &self.settings.name)?;

        self.db
            .flush()
            .map_err(|e| WorldError::Database(format!("flush: {e}")))
    }
}
