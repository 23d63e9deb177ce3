use std::collections::BTreeMap;

use fleetwatch_shared::filter::FleetFilter;
use fleetwatch_shared::models::{Entity, EntityId, EntityStatus};

/// Synchronous entity lookup.
pub trait EntityCatalog {
    fn get_entity(&self, id: &str) -> Option<&Entity>;
}

/// The fleet loaded at startup, keyed by entity id.
#[derive(Debug, Clone, Default)]
pub struct Fleet {
    entities: BTreeMap<EntityId, Entity>,
}

impl Fleet {
    /// Build from a list. A repeated id keeps the last record.
    pub fn new(entities: Vec<Entity>) -> Self {
        let mut map = BTreeMap::new();
        for entity in entities {
            if let Some(previous) = map.insert(entity.id.clone(), entity) {
                tracing::warn!(entity_id = %previous.id, "Duplicate entity id in catalog, keeping the last one");
            }
        }
        Fleet { entities: map }
    }

    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Apply a status reported by upstream ingestion. Returns true if it changed.
    pub fn set_status(&mut self, id: &str, status: EntityStatus) -> bool {
        match self.entities.get_mut(id) {
            Some(entity) if entity.status != status => {
                tracing::debug!(entity_id = id, from = %entity.status, to = %status, "Entity status changed");
                entity.status = status;
                true
            }
            _ => false,
        }
    }

    /// Entities matching `filter`, ordered by id. An empty filter returns all.
    pub fn filter(&self, filter: &FleetFilter) -> Vec<&Entity> {
        if !filter.is_active() {
            return self.entities.values().collect();
        }
        let hits = filter.apply(self.entities.values());
        tracing::debug!(?filter, hits = hits.len(), "Filtered fleet");
        hits
    }
}

impl EntityCatalog for Fleet {
    fn get_entity(&self, id: &str) -> Option<&Entity> {
        self.get(id)
    }
}
