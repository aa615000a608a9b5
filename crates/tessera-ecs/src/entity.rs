//! Entity identifiers, allocation and the per-entity lifecycle.
//!
//! An [`EntityId`] names a storage slot and the generation of that slot. The
//! generation moves on whenever a slot is freed, so a handle to a disposed
//! entity never resolves to its successor.
//!
//! An [`Entity`] owns its components in declared order. Lifecycle drivers
//! (`init`, `activate`, `update`, ...) detach one component at a time and
//! hand it an [`EntityCtx`] over the rest of the entity and the world.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::component::{Component, ComponentEntry, InitError};
use crate::context::{EntityCtx, WorldEnv};
use crate::factory::PreparedEntity;
use crate::message::Message;
use crate::property::PropertyMap;
use crate::render::Renderer;

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// Handle to an entity of one world. A slot number plus the generation that
/// slot had when the entity was stored, so a handle kept past removal stops
/// resolving once the slot is reused.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId {
    slot: u32,
    generation: u32,
}

impl EntityId {
    pub fn new(slot: u32, generation: u32) -> Self {
        Self { slot, generation }
    }

    pub fn index(self) -> u32 {
        self.slot
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity#{}.{}", self.slot, self.generation)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.slot, self.generation)
    }
}

// ---------------------------------------------------------------------------
// EntityAllocator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
struct SlotState {
    generation: u32,
    occupied: bool,
}

/// Hands out [`EntityId`]s for an [`EntityStore`](crate::store::EntityStore).
///
/// Freed slots are reused oldest first.
#[derive(Debug, Default)]
pub struct EntityAllocator {
    slots: Vec<SlotState>,
    free: VecDeque<u32>,
    live: usize,
}

impl EntityAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> EntityId {
        self.live += 1;
        let slot = match self.free.pop_front() {
            Some(slot) => slot,
            None => {
                self.slots.push(SlotState::default());
                (self.slots.len() - 1) as u32
            }
        };
        let state = &mut self.slots[slot as usize];
        state.occupied = true;
        EntityId::new(slot, state.generation)
    }

    /// Returns `false` for an id that is not live.
    pub fn deallocate(&mut self, id: EntityId) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        let state = &mut self.slots[id.slot as usize];
        state.occupied = false;
        state.generation = state.generation.wrapping_add(1);
        self.free.push_back(id.slot);
        self.live -= 1;
        true
    }

    pub fn is_alive(&self, id: EntityId) -> bool {
        self.slots
            .get(id.slot as usize)
            .is_some_and(|s| s.occupied && s.generation == id.generation)
    }

    pub fn alive_count(&self) -> usize {
        self.live
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// Where an entity is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityState {
    Uninited,
    Initing,
    Inited,
    Active,
    Deactive,
    /// Prepared but never placed in a world.
    Ignored,
    Error,
    Disposed,
}

pub(crate) struct ComponentSlot {
    pub(crate) entry: Arc<ComponentEntry>,
    /// `None` while the component is detached for a hook.
    pub(crate) component: Option<Box<dyn Component>>,
    pub(crate) inited: bool,
}

/// A named, instantiated definition.
pub struct Entity {
    id: EntityId,
    name: String,
    definition: String,
    is_static: bool,
    props: PropertyMap,
    state: EntityState,
    issue: Option<String>,
    slots: Vec<ComponentSlot>,
    render_events: bool,
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state)
            .field("components", &self.component_names())
            .finish()
    }
}

impl Entity {
    /// Constructs default instances of every component; nothing runs yet.
    pub(crate) fn new(id: EntityId, prepared: PreparedEntity) -> Self {
        let slots = prepared
            .components
            .into_iter()
            .map(|entry| ComponentSlot {
                component: Some(entry.construct()),
                entry,
                inited: false,
            })
            .collect();
        Self {
            id,
            name: prepared.name,
            definition: prepared.definition,
            is_static: prepared.is_static,
            props: prepared.props,
            state: EntityState::Uninited,
            issue: None,
            slots,
            render_events: false,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn definition(&self) -> &str {
        &self.definition
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn props(&self) -> &PropertyMap {
        &self.props
    }

    pub fn props_mut(&mut self) -> &mut PropertyMap {
        &mut self.props
    }

    pub fn state(&self) -> EntityState {
        self.state
    }

    /// Why init failed, for entities in [`EntityState::Error`].
    pub fn issue(&self) -> Option<&str> {
        self.issue.as_deref()
    }

    /// Garbage is removed from the activation lists on the next pass.
    pub fn is_garbage(&self) -> bool {
        matches!(
            self.state,
            EntityState::Disposed | EntityState::Error | EntityState::Ignored
        )
    }

    /// Driven by the `alwaysActive` property.
    pub fn is_always_active(&self) -> bool {
        self.props.get_bool("alwaysActive").unwrap_or(false)
    }

    pub fn wants_render_events(&self) -> bool {
        self.render_events
    }

    pub fn component_names(&self) -> Vec<&'static str> {
        self.slots.iter().map(|s| s.entry.name()).collect()
    }

    pub fn component_count(&self) -> usize {
        self.slots.len()
    }

    /// First initialised component of type `T`.
    pub fn find_component<T: Component>(&self) -> Option<&T> {
        self.slots
            .iter()
            .filter(|s| s.inited)
            .find_map(|s| s.component.as_deref()?.as_any().downcast_ref::<T>())
    }

    pub fn find_component_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.slots
            .iter_mut()
            .filter(|s| s.inited)
            .find_map(|s| s.component.as_deref_mut()?.as_any_mut().downcast_mut::<T>())
    }

    pub(crate) fn component_index<T: Component>(&self) -> Option<usize> {
        self.slots.iter().position(|s| {
            s.inited
                && s.component
                    .as_deref()
                    .is_some_and(|c| c.as_any().is::<T>())
        })
    }

    pub(crate) fn component_at<T: Component>(&self, index: usize) -> Option<&T> {
        self.slots
            .get(index)?
            .component
            .as_deref()?
            .as_any()
            .downcast_ref::<T>()
    }

    pub(crate) fn component_at_mut<T: Component>(&mut self, index: usize) -> Option<&mut T> {
        self.slots
            .get_mut(index)?
            .component
            .as_deref_mut()?
            .as_any_mut()
            .downcast_mut::<T>()
    }

    pub(crate) fn set_render_events(&mut self, enabled: bool) {
        self.render_events = enabled;
    }

    pub(crate) fn ignore(&mut self) {
        self.state = EntityState::Ignored;
    }

    // -- lifecycle ----------------------------------------------------------

    /// Detaches the component at `index`, runs `f`, and puts it back.
    fn with_component<R>(
        &mut self,
        index: usize,
        env: &mut WorldEnv<'_>,
        f: impl FnOnce(&mut dyn Component, &mut EntityCtx<'_>) -> R,
    ) -> Option<R> {
        let mut component = self.slots.get_mut(index)?.component.take()?;
        let result = {
            let mut ctx = env.ctx(self, index);
            f(&mut *component, &mut ctx)
        };
        if let Some(slot) = self.slots.get_mut(index) {
            slot.component = Some(component);
        }
        Some(result)
    }

    fn each_inited(
        &mut self,
        env: &mut WorldEnv<'_>,
        mut f: impl FnMut(&mut dyn Component, &mut EntityCtx<'_>),
    ) {
        for index in 0..self.slots.len() {
            if self.slots[index].inited {
                self.with_component(index, env, |c, ctx| f(c, ctx));
            }
        }
    }

    /// Runs injection and `on_init` per component in declared order, then
    /// `on_after_init` on all of them. The first failure puts the entity in
    /// [`EntityState::Error`] and withdraws anything it published to the
    /// world's statics.
    pub(crate) fn init(&mut self, env: &mut WorldEnv<'_>) -> Result<(), InitError> {
        if self.state != EntityState::Uninited {
            return Err(InitError::new(format!(
                "entity '{}' is {:?}, not uninitialised",
                self.name, self.state
            )));
        }
        self.state = EntityState::Initing;

        for index in 0..self.slots.len() {
            if let Err(err) = self.init_component(index, env) {
                env.statics.retain(|_, (owner, _)| *owner != self.id);
                tracing::warn!(
                    entity = %self.name,
                    component = self.slots[index].entry.name(),
                    issue = %err,
                    "entity failed to initialise"
                );
                self.state = EntityState::Error;
                self.issue = Some(err.issue.clone());
                return Err(err);
            }
        }

        for index in 0..self.slots.len() {
            self.with_component(index, env, |c, ctx| c.on_after_init(ctx));
        }
        self.state = EntityState::Inited;
        Ok(())
    }

    fn init_component(&mut self, index: usize, env: &mut WorldEnv<'_>) -> Result<(), InitError> {
        let entry = Arc::clone(&self.slots[index].entry);
        let requirements = entry.requirements();
        if let Some(missing) = requirements
            .props
            .iter()
            .find(|info| info.required && !self.props.contains(&info.name))
        {
            return Err(InitError::new(format!(
                "{}: missing required property '{}'",
                entry.name(),
                missing.name
            )));
        }

        self.with_component(index, env, |component, ctx| {
            if let Some(hook) = &requirements.before_init {
                hook(&mut *component, &mut *ctx)?;
            }
            component.on_init(ctx)
        })
        .unwrap_or_else(|| Err(InitError::new("component detached during init")))?;
        self.slots[index].inited = true;

        if self.is_static {
            let key = format!("${}", entry.name());
            if let Some((owner, _)) = env.statics.get(&key).copied() {
                if owner != self.id {
                    return Err(InitError::new(format!(
                        "static key '{key}' is already bound to entity {owner}"
                    )));
                }
            }
            env.statics.insert(key, (self.id, index));
        }
        Ok(())
    }

    pub(crate) fn before_world_start(&mut self, env: &mut WorldEnv<'_>) {
        self.each_inited(env, |c, ctx| c.before_world_start(ctx));
    }

    pub(crate) fn activate(&mut self, env: &mut WorldEnv<'_>) {
        if self.is_garbage() {
            return;
        }
        self.state = EntityState::Active;
        self.each_inited(env, |c, ctx| c.on_activate(ctx));
    }

    pub(crate) fn deactivate(&mut self, env: &mut WorldEnv<'_>) {
        if self.is_garbage() {
            return;
        }
        self.state = EntityState::Deactive;
        self.each_inited(env, |c, ctx| c.on_deactivate(ctx));
    }

    pub(crate) fn update(&mut self, env: &mut WorldEnv<'_>, elapsed: f64) {
        if self.state != EntityState::Active {
            return;
        }
        for index in 0..self.slots.len() {
            // A hook may dispose its own entity mid-frame.
            if self.state != EntityState::Active {
                break;
            }
            if self.slots[index].inited {
                self.with_component(index, env, |c, ctx| c.on_update(ctx, elapsed));
            }
        }
    }

    pub(crate) fn deliver(&mut self, env: &mut WorldEnv<'_>, message: &Message) {
        if self.is_garbage() {
            return;
        }
        self.each_inited(env, |c, ctx| c.on_message(ctx, message));
    }

    pub(crate) fn render(&mut self, env: &mut WorldEnv<'_>, renderer: &mut dyn Renderer, elapsed: f64) {
        if self.is_garbage() || !self.render_events {
            return;
        }
        self.each_inited(env, |c, ctx| c.on_render(ctx, &mut *renderer, elapsed));
    }

    /// Idempotent. Runs `on_dispose` on initialised components and drops the
    /// entity's statics.
    pub(crate) fn dispose(&mut self, env: &mut WorldEnv<'_>) {
        if self.state == EntityState::Disposed {
            return;
        }
        self.state = EntityState::Disposed;
        self.each_inited(env, |c, ctx| c.on_dispose(ctx));
        for slot in &mut self.slots {
            slot.inited = false;
        }
        self.render_events = false;
        env.statics.retain(|_, (owner, _)| *owner != self.id);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_states() {
        let prepared = PreparedEntity {
            name: "Rock".into(),
            definition: "Rock".into(),
            is_static: false,
            props: PropertyMap::new(),
            components: Vec::new(),
            resources: Vec::new(),
        };
        let mut entity = Entity::new(EntityId::new(0, 0), prepared);
        assert!(!entity.is_garbage());
        entity.ignore();
        assert!(entity.is_garbage());
    }
}
