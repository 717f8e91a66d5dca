//! World capture for the Bedrock proxy: chunk assembly, entity tracking,
//! the dual durable/deferred world state, and finalization to a playable
//! saved world.

pub mod behaviourpack;
pub mod entities;
pub mod render;
pub mod state;
pub mod worlds;

pub use behaviourpack::BehaviourPack;
pub use entities::{DummyBlock, EntityState, WorldEntities};
pub use state::World;
pub use worlds::{WorldsConfig, WorldsHandler};

#[cfg(test)]
pub(crate) mod testutil {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use mcproxy_nbt::{NbtCompound, NbtTag};
    use mcproxy_proto::types::ChunkPos;
    use mcproxy_world::{Column, Dimension, LevelDat, WorldError, WorldProvider, WorldSettings};

    #[derive(Default)]
    pub struct MemInner {
        pub columns: HashMap<(ChunkPos, i32), usize>,
        pub entities: HashMap<(ChunkPos, i32), Vec<NbtCompound>>,
        pub block_nbts: HashMap<(ChunkPos, i32), Vec<NbtCompound>>,
        pub player_data: Option<NbtCompound>,
        pub final_settings: Option<WorldSettings>,
        pub final_level_dat: Option<LevelDat>,
        pub closed: bool,
    }

    /// In-memory provider whose state survives `World::finish` through a
    /// shared handle, so tests can inspect what was persisted.
    #[derive(Clone)]
    pub struct MemProvider {
        inner: Arc<Mutex<MemInner>>,
        settings: WorldSettings,
        level_dat: LevelDat,
    }

    impl MemProvider {
        pub fn new() -> Self {
            Self {
                inner: Arc::new(Mutex::new(MemInner::default())),
                settings: WorldSettings::default(),
                level_dat: LevelDat::default(),
            }
        }

        pub fn column_count(&self) -> usize {
            self.inner.lock().unwrap().columns.len()
        }

        pub fn is_closed(&self) -> bool {
            self.inner.lock().unwrap().closed
        }

        pub fn stored_entity_types(&self) -> Vec<String> {
            self.inner
                .lock()
                .unwrap()
                .entities
                .values()
                .flatten()
                .filter_map(|c| c.get("identifier").and_then(NbtTag::as_string))
                .map(str::to_string)
                .collect()
        }

        /// Settings and level.dat as captured at close time.
        pub fn final_state(&self) -> (WorldSettings, LevelDat) {
            let inner = self.inner.lock().unwrap();
            (
                inner.final_settings.clone().expect("provider not closed"),
                inner.final_level_dat.clone().expect("provider not closed"),
            )
        }
    }

    impl WorldProvider for MemProvider {
        fn store_column(
            &mut self,
            pos: ChunkPos,
            dim: Dimension,
            column: &Column,
            overwrite: bool,
        ) -> Result<(), WorldError> {
            let mut inner = self.inner.lock().unwrap();
            let key = (pos, dim.id());
            if !overwrite && inner.columns.contains_key(&key) {
                return Ok(());
            }
            let sections = column
                .chunk
                .sections()
                .iter()
                .filter(|s| s.is_some())
                .count();
            inner.columns.insert(key, sections);
            Ok(())
        }

        fn store_entities(
            &mut self,
            pos: ChunkPos,
            dim: Dimension,
            entities: &[NbtCompound],
        ) -> Result<(), WorldError> {
            self.inner
                .lock()
                .unwrap()
                .entities
                .insert((pos, dim.id()), entities.to_vec());
            Ok(())
        }

        fn store_block_nbts(
            &mut self,
            pos: ChunkPos,
            dim: Dimension,
            blocks: &[NbtCompound],
        ) -> Result<(), WorldError> {
            self.inner
                .lock()
                .unwrap()
                .block_nbts
                .insert((pos, dim.id()), blocks.to_vec());
            Ok(())
        }

        fn save_local_player_data(&mut self, data: NbtCompound) -> Result<(), WorldError> {
            self.inner.lock().unwrap().player_data = Some(data);
            Ok(())
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
            let mut inner = self.inner.lock().unwrap();
            if inner.closed {
                return Err(WorldError::Database("provider already closed".into()));
            }
            inner.closed = true;
            inner.final_settings = Some(self.settings.clone());
            inner.final_level_dat = Some(self.level_dat.clone());
            Ok(())
        }
    }
}
