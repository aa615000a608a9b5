//! The view a component hook gets of its entity and world.

use std::collections::HashMap;
use std::sync::Arc;

use crate::command::{CommandKind, WorldCommands};
use crate::component::{CmpRef, Component, ComponentType, StaticRef};
use crate::entity::{Entity, EntityId, EntityState};
use crate::factory::EntityInstance;
use crate::message::{Message, MessageTarget};
use crate::property::{PropertyMap, PropertyValue};
use crate::resource::{Resource, ResourceUrl};
use crate::store::EntityStore;
use crate::world::WorldServices;

/// `"$ComponentName"` to the publishing entity and component slot.
pub(crate) type Statics = HashMap<String, (EntityId, usize)>;

/// Mutable world state lent to lifecycle drivers.
pub(crate) struct WorldEnv<'a> {
    pub(crate) world: &'a str,
    pub(crate) time: f64,
    pub(crate) store: &'a mut EntityStore,
    pub(crate) statics: &'a mut Statics,
    pub(crate) services: &'a WorldServices,
    pub(crate) commands: &'a mut WorldCommands,
}

impl WorldEnv<'_> {
    pub(crate) fn ctx<'b>(&'b mut self, entity: &'b mut Entity, slot: usize) -> EntityCtx<'b> {
        EntityCtx {
            entity,
            slot,
            world: self.world,
            time: self.time,
            store: &mut *self.store,
            statics: &mut *self.statics,
            services: self.services,
            commands: &mut *self.commands,
        }
    }

    /// Detach entity `id`, run `f` on it, and put it back.
    pub(crate) fn with_entity<R>(
        &mut self,
        id: EntityId,
        f: impl FnOnce(&mut Entity, &mut WorldEnv<'_>) -> R,
    ) -> Option<R> {
        let mut entity = self.store.take(id)?;
        let result = f(&mut entity, self);
        self.store.restore(entity);
        Some(result)
    }
}

/// Handed to every [`Component`] hook.
///
/// Sibling lookups see the entity's other initialised components; the
/// component running the hook is detached and never visible through here.
pub struct EntityCtx<'a> {
    entity: &'a mut Entity,
    slot: usize,
    world: &'a str,
    time: f64,
    store: &'a mut EntityStore,
    statics: &'a mut Statics,
    services: &'a WorldServices,
    commands: &'a mut WorldCommands,
}

impl EntityCtx<'_> {
    // -- the entity ---------------------------------------------------------

    pub fn id(&self) -> EntityId {
        self.entity.id()
    }

    pub fn name(&self) -> &str {
        self.entity.name()
    }

    pub fn definition(&self) -> &str {
        self.entity.definition()
    }

    pub fn state(&self) -> EntityState {
        self.entity.state()
    }

    pub fn is_static(&self) -> bool {
        self.entity.is_static()
    }

    pub fn props(&self) -> &PropertyMap {
        self.entity.props()
    }

    pub fn props_mut(&mut self) -> &mut PropertyMap {
        self.entity.props_mut()
    }

    /// Position of the running component in the entity's list.
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn world_name(&self) -> &str {
        self.world
    }

    /// Seconds of populated time in this world.
    pub fn time(&self) -> f64 {
        self.time
    }

    // -- siblings -----------------------------------------------------------

    pub fn find_component<T: Component>(&self) -> Option<&T> {
        self.entity.find_component::<T>()
    }

    pub fn find_component_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.entity.find_component_mut::<T>()
    }

    pub fn cmp_ref<T: ComponentType>(&self) -> Option<CmpRef<T>> {
        self.entity.component_index::<T>().map(CmpRef::new)
    }

    pub fn component<T: Component>(&self, handle: &CmpRef<T>) -> Option<&T> {
        self.entity.component_at(handle.index())
    }

    pub fn component_mut<T: Component>(&mut self, handle: &CmpRef<T>) -> Option<&mut T> {
        self.entity.component_at_mut(handle.index())
    }

    // -- other entities -----------------------------------------------------

    /// Another entity of the world. Misses entities whose hooks are running.
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.store.get(id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.store.get_mut(id)
    }

    pub fn find_entity(&self, name: &str) -> Option<EntityId> {
        self.store.find_by_name(name)
    }

    // -- statics ------------------------------------------------------------

    /// The component published as `$T::NAME` by a static entity.
    pub fn static_ref<T: ComponentType>(&self) -> Option<StaticRef<T>> {
        let (entity, index) = *self.statics.get(&format!("${}", T::NAME))?;
        Some(StaticRef::new(entity, index))
    }

    pub fn static_component<T: Component>(&self, handle: &StaticRef<T>) -> Option<&T> {
        let owner: &Entity = if handle.entity() == self.entity.id() {
            &*self.entity
        } else {
            self.store.get(handle.entity())?
        };
        owner.component_at(handle.index())
    }

    pub fn static_component_mut<T: Component>(&mut self, handle: &StaticRef<T>) -> Option<&mut T> {
        if handle.entity() == self.entity.id() {
            self.entity.component_at_mut(handle.index())
        } else {
            self.store
                .get_mut(handle.entity())?
                .component_at_mut(handle.index())
        }
    }

    // -- globals and resources ----------------------------------------------

    pub fn global(&self, key: &str) -> Option<PropertyValue> {
        self.services.globals.borrow().get(key).cloned()
    }

    pub fn set_global(&mut self, key: &str, value: PropertyValue) {
        self.services.globals.borrow_mut().insert(key, value);
    }

    pub fn resource(&self, url: &ResourceUrl) -> Option<Resource> {
        self.services.resources.borrow().get(url)
    }

    pub fn resource_typed<T: Send + Sync + 'static>(&self, url: &ResourceUrl) -> Option<Arc<T>> {
        self.services.resources.borrow().get_typed::<T>(url)
    }

    // -- deferred commands --------------------------------------------------

    /// Queue an entity for preloading. It joins the world once its resources
    /// are in, at the earliest on the next frame.
    pub fn spawn(&mut self, instance: EntityInstance) {
        let id = self.id();
        self.commands.spawn(instance, Some(id));
    }

    pub fn dispose(&mut self, target: EntityId) {
        let id = self.id();
        self.commands.dispose(target, Some(id));
    }

    pub fn dispose_self(&mut self) {
        let id = self.id();
        self.commands.dispose(id, Some(id));
    }

    /// Subscribe this entity to `on_render` calls.
    pub fn request_render_events(&mut self, enabled: bool) {
        let id = self.id();
        self.commands.render_events(id, enabled);
    }

    pub fn send(&mut self, target: MessageTarget, message: Message) {
        let id = self.id();
        self.commands.send(target, message, Some(id));
    }

    pub fn post_to_world(&mut self, world: &str, message: Message) {
        let id = self.id();
        self.commands.post_to_world(world, message, Some(id));
    }

    pub fn stop_world(&mut self) {
        let id = self.id();
        self.commands.push(CommandKind::StopWorld, Some(id));
    }

    pub fn restart_world(&mut self) {
        let id = self.id();
        self.commands.push(CommandKind::RestartWorld, Some(id));
    }
}
