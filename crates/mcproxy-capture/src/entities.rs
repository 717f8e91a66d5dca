//! Entity, entity-link, and block-entity tracking for one world view.

use std::collections::{HashMap, HashSet};

use mcproxy_nbt::{NbtCompound, NbtTag};
use mcproxy_proto::types::{
    BlockPos, ChunkPos, EntityLink, EntityLinkType, ItemStack, Metadata, Vec3,
};

pub type EntityRuntimeId = u64;
pub type EntityUniqueId = i64;

/// Everything the capture layer knows about one entity. Runtime id is the
/// session-scoped wire identity; unique id is the stable identity used for
/// links and persistence.
#[derive(Debug, Clone, Default)]
pub struct EntityState {
    pub runtime_id: EntityRuntimeId,
    pub unique_id: EntityUniqueId,
    pub entity_type: String,
    pub position: Vec3,
    pub velocity: Vec3,
    pub pitch: f32,
    pub yaw: f32,
    pub metadata: Metadata,
    pub held_item: ItemStack,
    pub armour: [ItemStack; 4],
}

impl EntityState {
    /// Chunk column containing this entity.
    pub fn chunk_pos(&self) -> ChunkPos {
        ChunkPos::new(
            (self.position.x.floor() as i32) >> 4,
            (self.position.z.floor() as i32) >> 4,
        )
    }

    /// Serialize for the world provider, attaching the currently known
    /// rider set.
    pub fn to_nbt(&self, riders: &[EntityUniqueId]) -> NbtCompound {
        let mut c = NbtCompound::new();
        c.insert(
            "identifier".into(),
            NbtTag::String(self.entity_type.clone()),
        );
        c.insert("UniqueID".into(), NbtTag::Long(self.unique_id));
        c.insert(
            "Pos".into(),
            NbtTag::List(vec![
                NbtTag::Float(self.position.x),
                NbtTag::Float(self.position.y),
                NbtTag::Float(self.position.z),
            ]),
        );
        c.insert(
            "Rotation".into(),
            NbtTag::List(vec![NbtTag::Float(self.yaw), NbtTag::Float(self.pitch)]),
        );
        c.insert(
            "Motion".into(),
            NbtTag::List(vec![
                NbtTag::Float(self.velocity.x),
                NbtTag::Float(self.velocity.y),
                NbtTag::Float(self.velocity.z),
            ]),
        );
        if !riders.is_empty() {
            c.insert(
                "LinksTag".into(),
                NbtTag::List(
                    riders
                        .iter()
                        .map(|&rider| {
                            let mut link = NbtCompound::new();
                            link.insert("entityID".into(), NbtTag::Long(rider));
                            link.insert("linkID".into(), NbtTag::Int(0));
                            NbtTag::Compound(link)
                        })
                        .collect(),
                ),
            );
        }
        c
    }
}

/// A captured block entity, keyed by absolute position in an outer
/// chunk-binned map.
#[derive(Debug, Clone)]
pub struct DummyBlock {
    pub id: String,
    pub nbt: NbtCompound,
}

impl DummyBlock {
    /// Provider representation with the position baked in.
    pub fn to_nbt(&self, pos: BlockPos) -> NbtCompound {
        let mut c = self.nbt.clone();
        c.insert("id".into(), NbtTag::String(self.id.clone()));
        c.insert("x".into(), NbtTag::Int(pos.x));
        c.insert("y".into(), NbtTag::Int(pos.y));
        c.insert("z".into(), NbtTag::Int(pos.z));
        c
    }
}

/// Entity, link, and block-entity state of one world view (durable or
/// deferred). Callers hold the world's single lock.
#[derive(Default)]
pub struct WorldEntities {
    pub entities: HashMap<EntityRuntimeId, EntityState>,
    /// ridden unique id -> set of rider unique ids.
    pub entity_links: HashMap<EntityUniqueId, HashSet<EntityUniqueId>>,
    pub block_nbts: HashMap<ChunkPos, HashMap<BlockPos, DummyBlock>>,
}

impl WorldEntities {
    pub fn store_entity(&mut self, id: EntityRuntimeId, es: EntityState) {
        self.entities.insert(id, es);
    }

    pub fn have_entity(&self, id: EntityRuntimeId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn get_entity_mut(&mut self, id: EntityRuntimeId) -> Option<&mut EntityState> {
        self.entities.get_mut(&id)
    }

    /// Apply a link edge. Adding an existing edge is idempotent; `Remove`
    /// deletes the edge.
    pub fn add_entity_link(&mut self, link: EntityLink) {
        match link.link_type {
            EntityLinkType::Rider | EntityLinkType::Passenger => {
                self.entity_links
                    .entry(link.ridden_unique_id)
                    .or_default()
                    .insert(link.rider_unique_id);
            }
            EntityLinkType::Remove => {
                if let Some(riders) = self.entity_links.get_mut(&link.ridden_unique_id) {
                    riders.remove(&link.rider_unique_id);
                }
            }
        }
    }

    /// Riders currently linked to an entity, for persistence.
    pub fn riders_of(&self, unique_id: EntityUniqueId) -> Vec<EntityUniqueId> {
        self.entity_links
            .get(&unique_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Record or update a block entity. With `merge`, the new compound is
    /// shallow-merged onto the existing one; otherwise it replaces it.
    /// The block id is fixed when the position is first seen; later writes
    /// only touch the compound.
    pub fn set_block_nbt(&mut self, pos: BlockPos, nbt: NbtCompound, merge: bool) {
        let chunk_nbts = self.block_nbts.entry(pos.chunk_pos()).or_default();
        match chunk_nbts.get_mut(&pos) {
            Some(existing) if merge => {
                existing.nbt.extend(nbt);
            }
            Some(existing) => {
                existing.nbt = nbt;
            }
            None => {
                let id = nbt
                    .get("id")
                    .and_then(NbtTag::as_string)
                    .unwrap_or_default()
                    .to_string();
                chunk_nbts.insert(pos, DummyBlock { id, nbt });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(ridden: i64, rider: i64, link_type: EntityLinkType) -> EntityLink {
        EntityLink {
            ridden_unique_id: ridden,
            rider_unique_id: rider,
            link_type,
            immediate: false,
            rider_initiated: false,
        }
    }

    #[test]
    fn link_add_then_remove_leaves_no_edge() {
        let mut ents = WorldEntities::default();
        ents.add_entity_link(link(1, 2, EntityLinkType::Rider));
        ents.add_entity_link(link(1, 3, EntityLinkType::Passenger));
        ents.add_entity_link(link(1, 2, EntityLinkType::Remove));
        assert_eq!(ents.riders_of(1).len(), 1);
        assert!(!ents.riders_of(1).contains(&2));
        assert!(ents.riders_of(1).contains(&3));
    }

    #[test]
    fn duplicate_link_is_idempotent() {
        let mut ents = WorldEntities::default();
        ents.add_entity_link(link(1, 2, EntityLinkType::Rider));
        ents.add_entity_link(link(1, 2, EntityLinkType::Rider));
        assert_eq!(ents.riders_of(1).len(), 1);
    }

    #[test]
    fn remove_unknown_edge_is_harmless() {
        let mut ents = WorldEntities::default();
        ents.add_entity_link(link(9, 10, EntityLinkType::Remove));
        assert!(ents.riders_of(9).is_empty());
    }

    #[test]
    fn block_nbt_replace_and_merge() {
        let mut ents = WorldEntities::default();
        let pos = BlockPos::new(33, 64, -2);

        let mut first = NbtCompound::new();
        first.insert("id".into(), NbtTag::String("Chest".into()));
        first.insert("Items".into(), NbtTag::List(vec![]));
        ents.set_block_nbt(pos, first, false);

        let mut update = NbtCompound::new();
        update.insert("CustomName".into(), NbtTag::String("loot".into()));
        ents.set_block_nbt(pos, update, true);

        let chunk = ents.block_nbts.get(&ChunkPos::new(2, -1)).unwrap();
        let block = chunk.get(&pos).unwrap();
        assert_eq!(block.id, "Chest");
        assert!(block.nbt.contains_key("Items"), "merge keeps old keys");
        assert!(block.nbt.contains_key("CustomName"));

        let mut replacement = NbtCompound::new();
        replacement.insert("id".into(), NbtTag::String("Barrel".into()));
        ents.set_block_nbt(pos, replacement, false);
        let chunk = ents.block_nbts.get(&ChunkPos::new(2, -1)).unwrap();
        let block = chunk.get(&pos).unwrap();
        assert_eq!(block.id, "Chest", "id is fixed at first sight");
        assert!(!block.nbt.contains_key("CustomName"), "replace drops old keys");
    }

    #[test]
    fn entity_chunk_bucketing() {
        let es = EntityState {
            position: Vec3::new(35.2, 64.0, -0.5),
            ..Default::default()
        };
        assert_eq!(es.chunk_pos(), ChunkPos::new(2, -1));
    }

    #[test]
    fn entity_nbt_has_links() {
        let es = EntityState {
            unique_id: -7,
            entity_type: "minecraft:horse".into(),
            position: Vec3::new(1.0, 70.0, 1.0),
            ..Default::default()
        };
        let nbt = es.to_nbt(&[21]);
        assert_eq!(
            nbt.get("identifier").and_then(NbtTag::as_string),
            Some("minecraft:horse")
        );
        assert_eq!(nbt.get("UniqueID").and_then(NbtTag::as_long), Some(-7));
        let links = nbt.get("LinksTag").and_then(NbtTag::as_list).unwrap();
        assert_eq!(links.len(), 1);
    }
}
