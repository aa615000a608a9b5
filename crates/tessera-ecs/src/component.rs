//! Component traits, requirement descriptors and injection handles.
//!
//! A component is a plain struct implementing [`Component`] (lifecycle hooks,
//! all optional) and [`ComponentType`] (registry name plus requirements).
//! Requirements come in one of two styles:
//!
//! - [`ComponentType::requirements`] returns a [`ComponentRequirements`]
//!   value built by hand;
//! - [`ComponentType::description`] returns a
//!   [`ComponentDescription`](crate::description::ComponentDescription) that
//!   also injects properties, resources, siblings and static links into
//!   [`Injected`] fields before `on_init` runs.
//!
//! A type supplying both is rejected at registration.
//!
//! # Example
//!
//! ```
//! use tessera_ecs::prelude::*;
//!
//! #[derive(Default)]
//! struct Spin {
//!     angle: f64,
//! }
//!
//! impl Component for Spin {
//!     fn on_update(&mut self, ctx: &mut EntityCtx<'_>, elapsed: f64) {
//!         let speed = ctx.props().get_f64("speed").unwrap_or(1.0);
//!         self.angle += speed * elapsed;
//!     }
//! }
//!
//! impl ComponentType for Spin {
//!     const NAME: &'static str = "Spin";
//!
//!     fn requirements() -> Option<ComponentRequirements> {
//!         Some(ComponentRequirements::new().opt("speed", "number", serde_json::json!(1)))
//!     }
//! }
//! ```

use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;

use crate::context::EntityCtx;
use crate::description::ComponentDescription;
use crate::entity::EntityId;
use crate::message::Message;
use crate::parsers::PropertyInfo;
use crate::property::PropertyMap;
use crate::render::Renderer;

// ---------------------------------------------------------------------------
// InitError
// ---------------------------------------------------------------------------

/// An expected failure while initialising an entity.
///
/// Returned from `on_init` or an injection step, it moves the entity to
/// [`EntityState::Error`](crate::entity::EntityState::Error). Anything else
/// that goes wrong in a hook is a panic and is not caught.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{issue}")]
pub struct InitError {
    pub issue: String,
}

impl InitError {
    pub fn new(issue: impl Into<String>) -> Self {
        Self {
            issue: issue.into(),
        }
    }
}

impl From<String> for InitError {
    fn from(issue: String) -> Self {
        Self { issue }
    }
}

impl From<&str> for InitError {
    fn from(issue: &str) -> Self {
        Self::new(issue)
    }
}

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

/// Downcasting support for trait objects.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Lifecycle hooks. Every hook defaults to a no-op.
///
/// Hooks run in the component's declared order within its entity. While a
/// hook runs, the component itself is detached from the entity, so sibling
/// lookups through `ctx` never return it.
pub trait Component: AsAny {
    /// Runs once after injection. An `Err` fails the whole entity.
    fn on_init(&mut self, _ctx: &mut EntityCtx<'_>) -> Result<(), InitError> {
        Ok(())
    }

    /// Runs once every component of the entity has passed `on_init`.
    fn on_after_init(&mut self, _ctx: &mut EntityCtx<'_>) {}

    /// Runs on static entities after all statics are initialised.
    fn before_world_start(&mut self, _ctx: &mut EntityCtx<'_>) {}

    fn on_update(&mut self, _ctx: &mut EntityCtx<'_>, _elapsed: f64) {}

    fn on_activate(&mut self, _ctx: &mut EntityCtx<'_>) {}

    fn on_deactivate(&mut self, _ctx: &mut EntityCtx<'_>) {}

    /// Only called for entities that requested render events.
    fn on_render(&mut self, _ctx: &mut EntityCtx<'_>, _renderer: &mut dyn Renderer, _elapsed: f64) {
    }

    fn on_message(&mut self, _ctx: &mut EntityCtx<'_>, _message: &Message) {}

    fn on_dispose(&mut self, _ctx: &mut EntityCtx<'_>) {}
}

/// A registrable component type.
pub trait ComponentType: Component + Default + Sized {
    /// Registry name, as written after `@` in definition files.
    const NAME: &'static str;

    /// Hand-written requirements.
    fn requirements() -> Option<ComponentRequirements> {
        None
    }

    /// Declarative requirements with field injection.
    fn description() -> Option<ComponentDescription<Self>> {
        None
    }
}

// ---------------------------------------------------------------------------
// Injection handles
// ---------------------------------------------------------------------------

/// A field filled in before `on_init`. Must be unset on a default-constructed
/// component.
#[derive(Clone, PartialEq)]
pub struct Injected<T>(Option<T>);

impl<T> Default for Injected<T> {
    fn default() -> Self {
        Self(None)
    }
}

impl<T: fmt::Debug> fmt::Debug for Injected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(v) => write!(f, "Injected({v:?})"),
            None => f.write_str("Injected(<unset>)"),
        }
    }
}

impl<T> Injected<T> {
    /// A pre-set value. Registration rejects components whose defaults
    /// contain one.
    pub fn new(value: T) -> Self {
        Self(Some(value))
    }

    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }

    pub fn get(&self) -> Option<&T> {
        self.0.as_ref()
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.0.as_mut()
    }

    pub fn set(&mut self, value: T) {
        self.0 = Some(value);
    }

    pub fn clear(&mut self) {
        self.0 = None;
    }
}

impl<T: Clone> Injected<T> {
    pub fn cloned_or(&self, fallback: T) -> T {
        self.0.clone().unwrap_or(fallback)
    }
}

/// Typed index of a sibling component on the same entity.
pub struct CmpRef<T> {
    index: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> CmpRef<T> {
    pub(crate) fn new(index: usize) -> Self {
        Self {
            index,
            _marker: PhantomData,
        }
    }

    /// Position in the entity's component list.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl<T> Clone for CmpRef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for CmpRef<T> {}

impl<T> PartialEq for CmpRef<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> fmt::Debug for CmpRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CmpRef({})", self.index)
    }
}

/// Typed handle of a component published in a world's statics.
pub struct StaticRef<T> {
    entity: EntityId,
    index: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> StaticRef<T> {
    pub(crate) fn new(entity: EntityId, index: usize) -> Self {
        Self {
            entity,
            index,
            _marker: PhantomData,
        }
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

impl<T> Clone for StaticRef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for StaticRef<T> {}

impl<T> PartialEq for StaticRef<T> {
    fn eq(&self, other: &Self) -> bool {
        self.entity == other.entity && self.index == other.index
    }
}

impl<T> fmt::Debug for StaticRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StaticRef({}#{})", self.entity, self.index)
    }
}

// ---------------------------------------------------------------------------
// ComponentRequirements
// ---------------------------------------------------------------------------

/// Resource URLs wanted for a given set of parsed properties. Items are URL
/// strings (`"type:path"` or legacy `"type!path"`) or `["type", "path"]`.
pub type ResourceFn = Arc<dyn Fn(&PropertyMap) -> Vec<Value> + Send + Sync>;

/// Child definitions to preload for a given set of parsed properties.
pub type ChildrenFn = Arc<dyn Fn(&PropertyMap) -> Vec<String> + Send + Sync>;

/// Runs once per instantiated component, before `on_init`.
pub type BeforeInitFn =
    Arc<dyn Fn(&mut dyn Component, &mut EntityCtx<'_>) -> Result<(), InitError> + Send + Sync>;

/// What a component type needs from its entity.
#[derive(Clone, Default)]
pub struct ComponentRequirements {
    pub props: Vec<PropertyInfo>,
    /// Sibling components that must be listed in the same definition.
    pub cmps: Vec<String>,
    pub cmps_optional: Vec<String>,
    pub res: Option<ResourceFn>,
    pub children: Option<ChildrenFn>,
    pub before_init: Option<BeforeInitFn>,
}

impl fmt::Debug for ComponentRequirements {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRequirements")
            .field("props", &self.props)
            .field("cmps", &self.cmps)
            .field("cmps_optional", &self.cmps_optional)
            .field("res", &self.res.is_some())
            .field("children", &self.children.is_some())
            .field("before_init", &self.before_init.is_some())
            .finish()
    }
}

impl ComponentRequirements {
    pub fn new() -> Self {
        Self::default()
    }

    /// A required property.
    pub fn need(mut self, name: &str, type_id: &str) -> Self {
        self.props.push(PropertyInfo::required(name, type_id));
        self
    }

    /// An optional property with a raw default.
    pub fn opt(mut self, name: &str, type_id: &str, default: Value) -> Self {
        self.props
            .push(PropertyInfo::optional(name, type_id, Some(default)));
        self
    }

    /// An optional property left unset when absent.
    pub fn maybe(mut self, name: &str, type_id: &str) -> Self {
        self.props.push(PropertyInfo::optional(name, type_id, None));
        self
    }

    pub fn cmp(mut self, name: &str) -> Self {
        self.cmps.push(name.to_owned());
        self
    }

    pub fn cmp_optional(mut self, name: &str) -> Self {
        self.cmps_optional.push(name.to_owned());
        self
    }

    pub fn res<F>(mut self, f: F) -> Self
    where
        F: Fn(&PropertyMap) -> Vec<Value> + Send + Sync + 'static,
    {
        self.res = Some(Arc::new(f));
        self
    }

    pub fn children<F>(mut self, f: F) -> Self
    where
        F: Fn(&PropertyMap) -> Vec<String> + Send + Sync + 'static,
    {
        self.children = Some(Arc::new(f));
        self
    }

    pub fn before_init<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut dyn Component, &mut EntityCtx<'_>) -> Result<(), InitError>
            + Send
            + Sync
            + 'static,
    {
        self.before_init = Some(Arc::new(f));
        self
    }

    pub fn resources_for(&self, props: &PropertyMap) -> Vec<Value> {
        self.res.as_ref().map(|f| f(props)).unwrap_or_default()
    }

    pub fn children_for(&self, props: &PropertyMap) -> Vec<String> {
        self.children.as_ref().map(|f| f(props)).unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// ComponentEntry
// ---------------------------------------------------------------------------

/// A registered component type.
pub struct ComponentEntry {
    name: &'static str,
    type_id: TypeId,
    construct: fn() -> Box<dyn Component>,
    requirements: ComponentRequirements,
}

impl fmt::Debug for ComponentEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentEntry")
            .field("name", &self.name)
            .field("requirements", &self.requirements)
            .finish()
    }
}

fn construct<T: ComponentType>() -> Box<dyn Component> {
    Box::new(T::default())
}

impl ComponentEntry {
    pub(crate) fn of<T: ComponentType>(requirements: ComponentRequirements) -> Self {
        Self {
            name: T::NAME,
            type_id: TypeId::of::<T>(),
            construct: construct::<T>,
            requirements,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn requirements(&self) -> &ComponentRequirements {
        &self.requirements
    }

    /// A fresh, uninitialised instance.
    pub fn construct(&self) -> Box<dyn Component> {
        (self.construct)()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
