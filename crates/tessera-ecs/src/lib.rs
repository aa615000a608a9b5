//! Tessera ECS -- component-based entities driven by definition files.
//!
//! Entities are instances of definitions loaded with `tessera-edf`. Each one
//! owns a list of boxed components with lifecycle hooks. A [`World`] loads a
//! definition set, starts its static entities, and then runs frames: update,
//! deferred commands, the activation pass, and message delivery. Resources
//! are loaded asynchronously and shared between worlds by reference count.
//!
//! # Quick Start
//!
//! ```
//! use std::rc::Rc;
//! use tessera_ecs::prelude::*;
//! use tessera_edf::prelude::MemoryTextSource;
//!
//! #[derive(Default)]
//! struct Score {
//!     points: i64,
//! }
//!
//! impl Component for Score {
//!     fn on_message(&mut self, _ctx: &mut EntityCtx<'_>, message: &Message) {
//!         if message.is("scored") {
//!             self.points += message.payload.as_i64().unwrap_or(0);
//!         }
//!     }
//! }
//!
//! impl ComponentType for Score {
//!     const NAME: &'static str = "Score";
//! }
//!
//! let mut components = ComponentManager::new();
//! components.register::<Score>().unwrap();
//! let source = MemoryTextSource::new().with_file("game.edf", "[!Board]\n@Score\n");
//! let mut world = World::new("game", "game.edf", WorldServices::new(components.freeze(), Rc::new(source)));
//!
//! world.start();
//! for _ in 0..3 {
//!     world.update(0.016);
//! }
//! world.send_message(MessageTarget::Broadcast, Message::with_payload("scored", serde_json::json!(5)));
//! world.update(0.016);
//! assert_eq!(world.static_component::<Score>().map(|s| s.points), Some(5));
//! ```

#![deny(unsafe_code)]

pub mod activator;
pub mod command;
pub mod component;
pub mod context;
pub mod description;
pub mod entity;
pub mod factory;
pub mod manager;
pub mod message;
pub mod parsers;
pub mod property;
pub mod render;
pub mod resource;
pub mod store;
pub mod world;

use tessera_edf::task::LoadError;
use tessera_edf::EdfError;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// A component type that cannot be registered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("component '{component}' provides both requirements() and description()")]
    MixedRequirementStyles { component: String },

    /// An injected field already holds a value on `Default::default()`.
    #[error("component '{component}': injected field '{field}' is set on the default instance")]
    DefaultOnInjectedField { component: String, field: String },
}

/// Why an instance was dropped while preloading.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FactoryError {
    #[error("entity '{entity}': no definition named '{definition}'")]
    UnknownDefinition { entity: String, definition: String },

    #[error("definition '{definition}' is a property family, not an entity")]
    NotAnEntity { definition: String },

    #[error("definition '{definition}' has no components")]
    NoComponents { definition: String },

    #[error("entity '{entity}': component '{component}' is not registered")]
    UnknownComponent { entity: String, component: String },

    #[error("entity '{entity}': component '{component}' requires sibling '{required}'")]
    MissingSibling {
        entity: String,
        component: String,
        required: String,
    },

    /// Two components declare the same property with different types.
    #[error("entity '{entity}': property '{property}' declared as {first} and {second}")]
    PropertyTypeConflict {
        entity: String,
        property: String,
        first: String,
        second: String,
    },

    #[error("entity '{entity}': property '{property}' has unknown type '{type_id}'")]
    UnknownPropertyType {
        entity: String,
        property: String,
        type_id: String,
    },

    #[error("entity '{entity}': property '{property}': {reason}")]
    InvalidProperty {
        entity: String,
        property: String,
        reason: String,
    },

    #[error("entity '{entity}': no component declares property '{property}'")]
    UnknownProperty { entity: String, property: String },

    #[error("entity '{entity}': bad resource url: {reason}")]
    BadResourceUrl { entity: String, reason: LoadError },

    #[error("entity '{entity}': resource '{loader}:{url}' failed: {reason}")]
    ResourceFailed {
        entity: String,
        url: String,
        loader: String,
        reason: LoadError,
    },

    #[error("child preloading reached depth {depth} (max {max})")]
    ChildDepthExceeded { depth: usize, max: usize },
}

/// A world-level failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorldError {
    #[error("world '{world}': {source}")]
    Definitions { world: String, source: EdfError },

    #[error("world '{world}': static entity '{name}' failed: {reason}")]
    StaticFailed {
        world: String,
        name: String,
        reason: String,
    },

    #[error("world '{world}' is {state:?}, not populated")]
    NotPopulated {
        world: String,
        state: world::WorldState,
    },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::activator::{
        ActivationLists, ActivationTarget, BaseEntityActivator, EntityActivator, PredicateActivator,
        RegionActivator,
    };
    pub use crate::component::{
        CmpRef, Component, ComponentRequirements, ComponentType, InitError, Injected, StaticRef,
    };
    pub use crate::context::EntityCtx;
    pub use crate::description::ComponentDescription;
    pub use crate::entity::{Entity, EntityId, EntityState};
    pub use crate::factory::{EntityInstance, FactoryConfig, UnknownPropertyPolicy};
    pub use crate::manager::ComponentManager;
    pub use crate::message::{Message, MessageTarget};
    pub use crate::parsers::{PropertyInfo, PropertyParser, PropertyParsers};
    pub use crate::property::{Color, Ease, PropertyMap, PropertyValue};
    pub use crate::render::{DrawCommand, RecordingRenderer, Renderer};
    pub use crate::resource::{FnLoader, LoadContext, Resource, ResourceLoader, ResourceManager, ResourceUrl};
    pub use crate::world::{World, WorldConfig, WorldServices, WorldState};
    pub use crate::{FactoryError, RegistrationError, WorldError};
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_name_the_culprit() {
        let err = FactoryError::MissingSibling {
            entity: "Ship".into(),
            component: "Body".into(),
            required: "Sprite".into(),
        };
        assert_eq!(
            err.to_string(),
            "entity 'Ship': component 'Body' requires sibling 'Sprite'"
        );

        let err = WorldError::NotPopulated {
            world: "menu".into(),
            state: world::WorldState::Loading,
        };
        assert_eq!(err.to_string(), "world 'menu' is Loading, not populated");
    }
}
