//! Recency tracking for loaded entities.

use std::collections::HashMap;

use tix_types::EntityId;

#[derive(Debug, Default)]
pub(crate) struct Lru {
    tick: u64,
    last_used: HashMap<EntityId, u64>,
}

impl Lru {
    /// Insert `id` or mark it as the most recently used.
    pub fn touch(&mut self, id: EntityId) {
        self.tick += 1;
        self.last_used.insert(id, self.tick);
    }

    pub fn remove(&mut self, id: &EntityId) {
        self.last_used.remove(id);
    }

    pub fn len(&self) -> usize {
        self.last_used.len()
    }

    pub fn oldest_first(&self) -> Vec<EntityId> {
        let mut ids: Vec<(u64, EntityId)> =
            self.last_used.iter().map(|(id, tick)| (*tick, *id)).collect();
        ids.sort_unstable();
        ids.into_iter().map(|(_, id)| id).collect()
    }
}
