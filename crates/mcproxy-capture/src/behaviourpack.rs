//! Collects non-vanilla content observed in the stream. Worlds saved with
//! such content need the data-driven experiments enabled to load.

use std::collections::BTreeSet;

#[derive(Debug, Default)]
pub struct BehaviourPack {
    entities: BTreeSet<String>,
}

impl BehaviourPack {
    /// Record an entity identifier; vanilla (`minecraft:`) ids are ignored.
    pub fn add_entity(&mut self, identifier: &str) {
        if identifier.is_empty() || identifier.starts_with("minecraft:") {
            return;
        }
        self.entities.insert(identifier.to_string());
    }

    pub fn has_content(&self) -> bool {
        !self.entities.is_empty()
    }

    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.entities.iter().map(String::as_str)
    }
}
