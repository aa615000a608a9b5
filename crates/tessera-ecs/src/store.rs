//! Generational storage for a world's entities.

use crate::entity::{Entity, EntityAllocator, EntityId};

/// Owns every entity of one world, indexed by [`EntityId`].
///
/// An entity can be taken out while its hooks run and put back afterwards;
/// its id stays allocated in between, so lookups of a detached entity simply
/// miss.
#[derive(Debug, Default)]
pub struct EntityStore {
    allocator: EntityAllocator,
    slots: Vec<Option<Entity>>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an id and store the entity built from it.
    pub(crate) fn insert_with(&mut self, build: impl FnOnce(EntityId) -> Entity) -> EntityId {
        let id = self.allocator.allocate();
        let idx = id.index() as usize;
        if self.slots.len() <= idx {
            self.slots.resize_with(idx + 1, || None);
        }
        self.slots[idx] = Some(build(id));
        id
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        if !self.allocator.is_alive(id) {
            return None;
        }
        self.slots.get(id.index() as usize)?.as_ref()
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        if !self.allocator.is_alive(id) {
            return None;
        }
        self.slots.get_mut(id.index() as usize)?.as_mut()
    }

    /// Detach an entity, keeping its id allocated.
    pub(crate) fn take(&mut self, id: EntityId) -> Option<Entity> {
        if !self.allocator.is_alive(id) {
            return None;
        }
        self.slots.get_mut(id.index() as usize)?.take()
    }

    /// Reattach an entity detached with [`take`](Self::take). Dropped if its
    /// id was freed meanwhile.
    pub(crate) fn restore(&mut self, entity: Entity) {
        let id = entity.id();
        if !self.allocator.is_alive(id) {
            return;
        }
        if let Some(slot) = self.slots.get_mut(id.index() as usize) {
            *slot = Some(entity);
        }
    }

    /// Free the id and return the entity if it was attached.
    pub(crate) fn remove(&mut self, id: EntityId) -> Option<Entity> {
        if !self.allocator.is_alive(id) {
            return None;
        }
        let entity = self.slots.get_mut(id.index() as usize)?.take();
        self.allocator.deallocate(id);
        entity
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.allocator.is_alive(id)
    }

    /// Allocated ids, detached entities included.
    pub fn len(&self) -> usize {
        self.allocator.alive_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.slots.iter().flatten()
    }

    pub fn ids(&self) -> Vec<EntityId> {
        self.iter().map(Entity::id).collect()
    }

    /// First attached entity named `name`.
    pub fn find_by_name(&self, name: &str) -> Option<EntityId> {
        self.iter().find(|e| e.name() == name).map(Entity::id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::PreparedEntity;
    use crate::property::PropertyMap;

    fn prepared(name: &str) -> PreparedEntity {
        PreparedEntity {
            name: name.to_owned(),
            definition: name.to_owned(),
            is_static: false,
            props: PropertyMap::new(),
            components: Vec::new(),
            resources: Vec::new(),
        }
    }

    #[test]
    fn take_and_restore_keep_the_id() {
        let mut store = EntityStore::new();
        let id = store.insert_with(|id| Entity::new(id, prepared("A")));
        let entity = store.take(id).unwrap();
        assert!(store.get(id).is_none());
        assert!(store.contains(id));
        store.restore(entity);
        assert_eq!(store.get(id).unwrap().name(), "A");
    }

    #[test]
    fn removed_ids_go_stale() {
        let mut store = EntityStore::new();
        let a = store.insert_with(|id| Entity::new(id, prepared("A")));
        assert!(store.remove(a).is_some());
        let b = store.insert_with(|id| Entity::new(id, prepared("B")));
        assert_eq!(a.index(), b.index());
        assert!(store.get(a).is_none());
        assert_eq!(store.find_by_name("B"), Some(b));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn detached_entities_still_count_as_live() {
        let mut store = EntityStore::new();
        let ids: Vec<EntityId> = ["A", "B", "C"]
            .iter()
            .map(|name| store.insert_with(|id| Entity::new(id, prepared(name))))
            .collect();
        assert_eq!(store.len(), 3);

        let b = store.take(ids[1]).unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.ids(), vec![ids[0], ids[2]]);
        store.restore(b);

        assert!(store.remove(ids[0]).is_some());
        assert!(store.remove(ids[0]).is_none());
        assert_eq!(store.len(), 2);
        assert!(!store.contains(ids[0]));
    }

    #[test]
    fn freed_slots_are_reused_oldest_first() {
        let mut store = EntityStore::new();
        let a = store.insert_with(|id| Entity::new(id, prepared("A")));
        let b = store.insert_with(|id| Entity::new(id, prepared("B")));
        store.remove(b);
        store.remove(a);

        let c = store.insert_with(|id| Entity::new(id, prepared("C")));
        let d = store.insert_with(|id| Entity::new(id, prepared("D")));
        assert_eq!((c.index(), c.generation()), (b.index(), 1));
        assert_eq!((d.index(), d.generation()), (a.index(), 1));
        assert_eq!(c.to_string(), format!("{}v1", b.index()));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn restore_after_remove_is_dropped() {
        let mut store = EntityStore::new();
        let a = store.insert_with(|id| Entity::new(id, prepared("A")));
        let entity = store.take(a).unwrap();
        store.remove(a);
        store.restore(entity);
        assert!(store.is_empty());
        assert_eq!(store.iter().count(), 0);
    }
}
