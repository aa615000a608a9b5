//! The [`WorldManager`]: every world of a game sharing one component
//! registry, one resource cache and one set of globals.
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use tessera_engine::prelude::*;
//! use tessera_edf::prelude::MemoryTextSource;
//!
//! #[derive(Default)]
//! struct Title;
//! impl Component for Title {}
//! impl ComponentType for Title {
//!     const NAME: &'static str = "Title";
//! }
//!
//! let source = MemoryTextSource::new().with_file("menu.edf", "[!Banner]\n@Title\n");
//! let mut manager = WorldManager::builder()
//!     .component::<Title>()
//!     .text_source(Rc::new(source))
//!     .world("menu", "menu.edf")
//!     .build()
//!     .unwrap();
//!
//! manager.start_world("menu").unwrap();
//! for _ in 0..3 {
//!     manager.update(0.016);
//! }
//! assert_eq!(manager.world("menu").map(|w| w.state()), Some(WorldState::Populated));
//! ```

use std::cell::{Ref, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use tessera_ecs::activator::EntityActivator;
use tessera_ecs::component::ComponentType;
use tessera_ecs::factory::EntityInstance;
use tessera_ecs::manager::ComponentManager;
use tessera_ecs::message::{Message, MessageTarget};
use tessera_ecs::parsers::{PropertyParser, PropertyParsers};
use tessera_ecs::property::{PropertyMap, PropertyValue};
use tessera_ecs::render::Renderer;
use tessera_ecs::resource::{ResourceLoader, ResourceManager};
use tessera_ecs::world::{World, WorldServices};
use tessera_edf::source::TextSource;

use crate::config::{EngineConfig, WorldEntry};
use crate::fs::{FsTextSource, JsonLoader, TextLoader};
use crate::logging::init_logging;
use crate::EngineError;

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Collects registrations, then creates every world at once.
///
/// Registration errors are kept and reported by [`build`](Self::build), so
/// the calls chain.
#[derive(Default)]
pub struct WorldManagerBuilder {
    config: EngineConfig,
    components: ComponentManager,
    registration_errors: Vec<tessera_ecs::RegistrationError>,
    parsers: Vec<Arc<dyn PropertyParser>>,
    loaders: Vec<Arc<dyn ResourceLoader>>,
    globals: PropertyMap,
    text_source: Option<Rc<dyn TextSource>>,
    worlds: Vec<WorldEntry>,
    activators: HashMap<String, Box<dyn EntityActivator>>,
    install_logging: bool,
}

impl std::fmt::Debug for WorldManagerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldManagerBuilder")
            .field("components", &self.components.len())
            .field("worlds", &self.worlds.len())
            .finish()
    }
}

impl WorldManagerBuilder {
    /// Replace the configuration. Worlds listed in it are created in
    /// addition to those added with [`world`](Self::world).
    ///
    /// [`build`](Self::build) then installs a subscriber filtered by the
    /// config's `log_filter`, unless one is already installed or
    /// [`logging(false)`](Self::logging) follows.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self.install_logging = true;
        self
    }

    /// Whether [`build`](Self::build) installs the `tracing` subscriber.
    pub fn logging(mut self, install: bool) -> Self {
        self.install_logging = install;
        self
    }

    pub fn component<T: ComponentType>(mut self) -> Self {
        if let Err(err) = self.components.register::<T>() {
            self.registration_errors.push(err);
        }
        self
    }

    pub fn property_parser(mut self, parser: impl PropertyParser + 'static) -> Self {
        self.parsers.push(Arc::new(parser));
        self
    }

    /// Add a resource loader. Replaces a built-in loader with the same id.
    pub fn resource_loader(mut self, loader: impl ResourceLoader + 'static) -> Self {
        self.loaders.push(Arc::new(loader));
        self
    }

    pub fn global(mut self, key: &str, value: PropertyValue) -> Self {
        self.globals.insert(key, value);
        self
    }

    /// Where definition files come from. Defaults to the filesystem under
    /// the configured asset root.
    pub fn text_source(mut self, source: Rc<dyn TextSource>) -> Self {
        self.text_source = Some(source);
        self
    }

    pub fn world(mut self, name: &str, start_file: &str) -> Self {
        self.worlds.push(WorldEntry {
            name: name.to_owned(),
            start_file: start_file.to_owned(),
            activator: Default::default(),
        });
        self
    }

    /// Override the activator of world `name`.
    pub fn activator(mut self, name: &str, activator: Box<dyn EntityActivator>) -> Self {
        self.activators.insert(name.to_owned(), activator);
        self
    }

    pub fn build(self) -> Result<WorldManager, EngineError> {
        let Self {
            config,
            components,
            registration_errors,
            parsers: extra_parsers,
            loaders,
            globals,
            text_source,
            worlds: extra_worlds,
            mut activators,
            install_logging,
        } = self;

        if install_logging && init_logging(&config.log_filter) {
            tracing::debug!(filter = %config.log_filter, "logging installed");
        }

        if let Some(err) = registration_errors.into_iter().next() {
            return Err(err.into());
        }

        let mut parsers = PropertyParsers::with_builtins();
        for parser in extra_parsers {
            parsers.register(parser);
        }

        let mut resources = ResourceManager::new();
        resources.set_timeout(config.load_timeout());
        resources.register_loader(Arc::new(TextLoader::new(&config.asset_root)));
        resources.register_loader(Arc::new(JsonLoader::new(&config.asset_root)));
        for loader in loaders {
            resources.register_loader(loader);
        }

        let text_source = text_source.unwrap_or_else(|| {
            Rc::new(FsTextSource::new(&config.asset_root).with_timeout(config.load_timeout())) as Rc<dyn TextSource>
        });
        let services = WorldServices {
            components: components.freeze(),
            parsers: Arc::new(parsers),
            resources: Rc::new(RefCell::new(resources)),
            globals: Rc::new(RefCell::new(globals)),
            text_source,
        };

        let entries: Vec<WorldEntry> = config.worlds.iter().cloned().chain(extra_worlds).collect();
        let mut worlds: Vec<World> = Vec::with_capacity(entries.len());
        for entry in entries {
            if worlds.iter().any(|w| w.name() == entry.name) {
                return Err(EngineError::DuplicateWorld(entry.name));
            }
            let mut world = World::with_config(
                &entry.name,
                &entry.start_file,
                services.clone(),
                config.world_config(),
            );
            let activator = activators
                .remove(&entry.name)
                .unwrap_or_else(|| entry.activator.build());
            world.set_activator(activator);
            worlds.push(world);
        }
        if let Some(name) = activators.into_keys().next() {
            return Err(EngineError::UnknownWorld(name));
        }

        tracing::info!(
            worlds = worlds.len(),
            components = services.components.len(),
            "world manager ready"
        );
        Ok(WorldManager {
            config,
            services,
            worlds,
        })
    }
}

// ---------------------------------------------------------------------------
// WorldManager
// ---------------------------------------------------------------------------

pub struct WorldManager {
    config: EngineConfig,
    services: WorldServices,
    worlds: Vec<World>,
}

impl std::fmt::Debug for WorldManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldManager")
            .field("worlds", &self.worlds)
            .finish()
    }
}

impl WorldManager {
    pub fn builder() -> WorldManagerBuilder {
        WorldManagerBuilder::default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn services(&self) -> &WorldServices {
        &self.services
    }

    pub fn world(&self, name: &str) -> Option<&World> {
        self.worlds.iter().find(|w| w.name() == name)
    }

    pub fn world_mut(&mut self, name: &str) -> Option<&mut World> {
        self.worlds.iter_mut().find(|w| w.name() == name)
    }

    /// Worlds in creation order.
    pub fn worlds(&self) -> impl Iterator<Item = &World> {
        self.worlds.iter()
    }

    pub fn world_names(&self) -> Vec<&str> {
        self.worlds.iter().map(World::name).collect()
    }

    fn require(&mut self, name: &str) -> Result<&mut World, EngineError> {
        self.world_mut(name)
            .ok_or_else(|| EngineError::UnknownWorld(name.to_owned()))
    }

    pub fn start_world(&mut self, name: &str) -> Result<(), EngineError> {
        self.require(name)?.start();
        Ok(())
    }

    pub fn start_all(&mut self) {
        for world in &mut self.worlds {
            world.start();
        }
    }

    pub fn stop_world(&mut self, name: &str) -> Result<(), EngineError> {
        self.require(name)?.stop();
        Ok(())
    }

    pub fn restart_world(&mut self, name: &str) -> Result<(), EngineError> {
        self.require(name)?.restart();
        Ok(())
    }

    pub fn spawn(&mut self, world: &str, instance: EntityInstance) -> Result<(), EngineError> {
        self.require(world)?.spawn(instance)?;
        Ok(())
    }

    /// Broadcast `message` inside world `name` on its next frame.
    pub fn send_to_world(&mut self, name: &str, message: Message) -> Result<(), EngineError> {
        self.require(name)?
            .send_message(MessageTarget::Broadcast, message);
        Ok(())
    }

    /// Broadcast `message` in every world.
    pub fn broadcast(&mut self, message: Message) {
        for world in &mut self.worlds {
            world.send_message(MessageTarget::Broadcast, message.clone());
        }
    }

    /// Update every world, then route messages they posted to each other.
    /// Returns the number of routed messages.
    pub fn update(&mut self, elapsed: f64) -> usize {
        for world in &mut self.worlds {
            world.update(elapsed);
        }
        self.route_outboxes()
    }

    pub(crate) fn route_outboxes(&mut self) -> usize {
        let mut posted = Vec::new();
        for world in &mut self.worlds {
            let from = world.name().to_owned();
            posted.extend(world.take_outbox().into_iter().map(|(to, msg)| (from.clone(), to, msg)));
        }
        let mut routed = 0;
        for (from, to, message) in posted {
            match self.world_mut(&to) {
                Some(world) => {
                    world.send_message(MessageTarget::Broadcast, message);
                    routed += 1;
                }
                None => {
                    tracing::warn!(from = %from, to = %to, message = %message.name, "message to unknown world dropped");
                }
            }
        }
        routed
    }

    /// Render every world in creation order.
    pub fn render(&mut self, elapsed: f64, renderer: &mut dyn Renderer) {
        for world in &mut self.worlds {
            world.render(elapsed, &mut *renderer);
        }
    }

    pub fn globals(&self) -> Ref<'_, PropertyMap> {
        self.services.globals.borrow()
    }

    pub fn set_global(&mut self, key: &str, value: PropertyValue) {
        self.services.globals.borrow_mut().insert(key, value);
    }

    pub fn resources(&self) -> Ref<'_, ResourceManager> {
        self.services.resources.borrow()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
