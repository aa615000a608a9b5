//! Deciding which entities receive updates.
//!
//! Every world keeps four id lists: `actives` and `always_actives` get
//! `on_update`, `deactives` are kept but skipped, and `new_entities` holds
//! freshly initialised entities waiting for their first placement. Once per
//! frame [`update_entity_activation`] moves ids between them:
//!
//! 1. garbage is removed from `always_actives` and disposed;
//! 2. in `actives`, garbage is disposed and entities failing the activator's
//!    check are deactivated;
//! 3. in `deactives`, garbage is disposed and entities passing the check are
//!    activated;
//! 4. the entities deactivated in step 2 join `deactives`;
//! 5. `new_entities` are drained from the back: `alwaysActive` ones go to
//!    `always_actives` (activated), garbage goes to `deactives` to be
//!    disposed on the next pass, the rest are checked and placed.
//!
//! The pass never checks an entity twice and, once settled, running it again
//! without state changes leaves all lists untouched.

use crate::component::AsAny;
use crate::entity::{Entity, EntityId};

/// The four per-world id lists.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ActivationLists {
    pub actives: Vec<EntityId>,
    pub always_actives: Vec<EntityId>,
    pub deactives: Vec<EntityId>,
    pub new_entities: Vec<EntityId>,
}

impl ActivationLists {
    /// Entities in any list.
    pub fn live_count(&self) -> usize {
        self.actives.len() + self.always_actives.len() + self.deactives.len() + self.new_entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live_count() == 0
    }

    pub fn all_ids(&self) -> Vec<EntityId> {
        self.always_actives
            .iter()
            .chain(&self.actives)
            .chain(&self.deactives)
            .chain(&self.new_entities)
            .copied()
            .collect()
    }

    pub fn clear(&mut self) {
        self.actives.clear();
        self.always_actives.clear();
        self.deactives.clear();
        self.new_entities.clear();
    }
}

/// What the activation pass needs from the world.
pub trait ActivationTarget {
    fn is_garbage(&self, id: EntityId) -> bool;
    fn is_always_active(&self, id: EntityId) -> bool;
    /// Whether `id` should be active right now.
    fn check(&self, id: EntityId) -> bool;
    fn activate(&mut self, id: EntityId);
    fn deactivate(&mut self, id: EntityId);
    fn dispose(&mut self, id: EntityId);
}

/// The standard four-list pass.
pub fn update_entity_activation(lists: &mut ActivationLists, target: &mut dyn ActivationTarget) {
    let mut i = 0;
    while i < lists.always_actives.len() {
        let id = lists.always_actives[i];
        if target.is_garbage(id) {
            lists.always_actives.swap_remove(i);
            target.dispose(id);
        } else {
            i += 1;
        }
    }

    let mut demoted = Vec::new();
    let mut i = 0;
    while i < lists.actives.len() {
        let id = lists.actives[i];
        if target.is_garbage(id) {
            lists.actives.swap_remove(i);
            target.dispose(id);
        } else if !target.check(id) {
            lists.actives.swap_remove(i);
            target.deactivate(id);
            demoted.push(id);
        } else {
            i += 1;
        }
    }

    let mut i = 0;
    while i < lists.deactives.len() {
        let id = lists.deactives[i];
        if target.is_garbage(id) {
            lists.deactives.swap_remove(i);
            target.dispose(id);
        } else if target.check(id) {
            lists.deactives.swap_remove(i);
            target.activate(id);
            lists.actives.push(id);
        } else {
            i += 1;
        }
    }
    lists.deactives.append(&mut demoted);

    while let Some(id) = lists.new_entities.pop() {
        if target.is_garbage(id) {
            lists.deactives.push(id);
        } else if target.is_always_active(id) {
            target.activate(id);
            lists.always_actives.push(id);
        } else if target.check(id) {
            target.activate(id);
            lists.actives.push(id);
        } else {
            target.deactivate(id);
            lists.deactives.push(id);
        }
    }
}

// ---------------------------------------------------------------------------
// Activators
// ---------------------------------------------------------------------------

/// Per-world activation policy.
pub trait EntityActivator: AsAny {
    fn check(&self, entity: &Entity) -> bool;

    /// Override to replace the pass itself; the default runs
    /// [`update_entity_activation`].
    fn update_entity_activation(&self, lists: &mut ActivationLists, target: &mut dyn ActivationTarget) {
        update_entity_activation(lists, target);
    }
}

/// Everything is active.
#[derive(Debug, Default, Clone, Copy)]
pub struct BaseEntityActivator;

impl EntityActivator for BaseEntityActivator {
    fn check(&self, _entity: &Entity) -> bool {
        true
    }
}

/// Active when the entity's `x`/`y` properties fall inside a rectangle grown
/// by `margin`. Entities without a position are always active.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct RegionActivator {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub margin: f64,
}

impl RegionActivator {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            margin: 0.0,
        }
    }

    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin;
        self
    }

    pub fn set_region(&mut self, x: f64, y: f64, width: f64, height: f64) {
        self.x = x;
        self.y = y;
        self.width = width;
        self.height = height;
    }

    pub fn move_to(&mut self, x: f64, y: f64) {
        self.x = x;
        self.y = y;
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x - self.margin
            && x <= self.x + self.width + self.margin
            && y >= self.y - self.margin
            && y <= self.y + self.height + self.margin
    }
}

impl EntityActivator for RegionActivator {
    fn check(&self, entity: &Entity) -> bool {
        let props = entity.props();
        match (props.get_f64("x"), props.get_f64("y")) {
            (Some(x), Some(y)) => self.contains(x, y),
            _ => true,
        }
    }
}

/// Active when a closure says so.
pub struct PredicateActivator {
    predicate: Box<dyn Fn(&Entity) -> bool>,
}

impl PredicateActivator {
    pub fn new(predicate: impl Fn(&Entity) -> bool + 'static) -> Self {
        Self {
            predicate: Box::new(predicate),
        }
    }
}

impl std::fmt::Debug for PredicateActivator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PredicateActivator")
    }
}

impl EntityActivator for PredicateActivator {
    fn check(&self, entity: &Entity) -> bool {
        (self.predicate)(entity)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
