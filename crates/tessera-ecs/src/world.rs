//! The [`World`]: one loaded definition set and the entities living in it.
//!
//! A world moves through [`WorldState`]s:
//!
//! ```text
//! Empty --start--> Loading --statics ok--> Populated
//!                     |                        |
//!                     +--failure--> Error      +--stop/restart--> PendingStop / PendingRestart
//!                                                                  |
//!                     Empty <------------- Clearing <--------------+
//! ```
//!
//! Nothing blocks. Definition files, resources and spawn preloads are polled
//! at the start of every [`World::update`]; a frame never waits on them.
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use tessera_ecs::prelude::*;
//! use tessera_edf::prelude::MemoryTextSource;
//!
//! #[derive(Default)]
//! struct Clock {
//!     ticks: u32,
//! }
//! impl Component for Clock {
//!     fn on_update(&mut self, _ctx: &mut EntityCtx<'_>, _elapsed: f64) {
//!         self.ticks += 1;
//!     }
//! }
//! impl ComponentType for Clock {
//!     const NAME: &'static str = "Clock";
//! }
//!
//! let mut components = ComponentManager::new();
//! components.register::<Clock>().unwrap();
//! let source = MemoryTextSource::new().with_file("main.edf", "[!Timer]\n@Clock\n");
//! let services = WorldServices::new(components.freeze(), Rc::new(source));
//!
//! let mut world = World::new("main", "main.edf", services);
//! world.start();
//! for _ in 0..5 {
//!     world.update(0.016);
//! }
//! assert_eq!(world.state(), WorldState::Populated);
//! assert!(world.static_component::<Clock>().is_some_and(|c| c.ticks > 0));
//! ```

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::task::Poll;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tessera_edf::definition::LinkedEdf;
use tessera_edf::loader::EdfLoadJob;
use tessera_edf::sink::TracingSink;
use tessera_edf::source::TextSource;
use tessera_edf::task::DEFAULT_TIMEOUT;
use tessera_edf::EdfError;

use crate::activator::{ActivationLists, ActivationTarget, BaseEntityActivator, EntityActivator};
use crate::command::{Command, CommandKind, WorldCommands};
use crate::component::{ComponentType, InitError};
use crate::context::{Statics, WorldEnv};
use crate::entity::{Entity, EntityId};
use crate::factory::{EntityFactory, EntityInstance, FactoryConfig, PreloadJob, PreloadOutcome, PreparedEntity};
use crate::manager::ComponentManager;
use crate::message::{Message, MessageTarget};
use crate::parsers::PropertyParsers;
use crate::property::{PropertyMap, PropertyValue};
use crate::render::Renderer;
use crate::resource::{ResourceManager, LOADING_OWNER};
use crate::store::EntityStore;
use crate::WorldError;

/// Command batches applied per frame before the rest are dropped.
const MAX_COMMAND_ROUNDS: usize = 16;

// ---------------------------------------------------------------------------
// Services and configuration
// ---------------------------------------------------------------------------

/// Everything a world borrows from its surroundings. Cloning shares it.
#[derive(Clone)]
pub struct WorldServices {
    pub components: Arc<ComponentManager>,
    pub parsers: Arc<PropertyParsers>,
    pub resources: Rc<RefCell<ResourceManager>>,
    pub globals: Rc<RefCell<PropertyMap>>,
    pub text_source: Rc<dyn TextSource>,
}

impl std::fmt::Debug for WorldServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldServices")
            .field("components", &self.components.len())
            .field("parsers", &self.parsers.len())
            .field("globals", &self.globals.borrow().len())
            .finish()
    }
}

impl WorldServices {
    /// Fresh services with the built-in property parsers, an empty resource
    /// cache and no globals.
    pub fn new(components: Arc<ComponentManager>, text_source: Rc<dyn TextSource>) -> Self {
        Self {
            components,
            parsers: Arc::new(PropertyParsers::with_builtins()),
            resources: Rc::new(RefCell::new(ResourceManager::new())),
            globals: Rc::new(RefCell::new(PropertyMap::new())),
            text_source,
        }
    }

    pub fn with_parsers(mut self, parsers: Arc<PropertyParsers>) -> Self {
        self.parsers = parsers;
        self
    }

    pub fn with_resources(mut self, resources: Rc<RefCell<ResourceManager>>) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_globals(mut self, globals: Rc<RefCell<PropertyMap>>) -> Self {
        self.globals = globals;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorldConfig {
    /// Cleanup rounds on stop before remaining entities are dropped.
    pub stop_sanity_cap: usize,
    /// Deadline for every definition file fetch.
    pub load_timeout: Duration,
    pub factory: FactoryConfig,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            stop_sanity_cap: 64,
            load_timeout: DEFAULT_TIMEOUT,
            factory: FactoryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorldState {
    Empty,
    Loading,
    Populated,
    PendingStop,
    PendingRestart,
    Clearing,
    Error,
}

enum LoadPhase {
    Definitions(EdfLoadJob),
    Statics { order: Vec<String>, job: PreloadJob },
}

enum LoadStep {
    Definitions(Result<LinkedEdf, EdfError>),
    Statics(PreloadOutcome),
}

/// Resources held across a restart, until the reloaded world takes them over.
fn loading_owner(world: &str) -> String {
    format!("{LOADING_OWNER}:{world}")
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

pub struct World {
    name: String,
    start_file: String,
    config: WorldConfig,
    services: WorldServices,
    factory: EntityFactory,
    activator: Box<dyn EntityActivator>,
    state: WorldState,
    error: Option<WorldError>,
    loading: Option<LoadPhase>,
    definitions: LinkedEdf,
    store: EntityStore,
    lists: ActivationLists,
    statics: Statics,
    render_subscribers: Vec<EntityId>,
    spawn_jobs: Vec<PreloadJob>,
    commands: WorldCommands,
    messages: Vec<(MessageTarget, Message)>,
    outbox: Vec<(String, Message)>,
    time: f64,
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("entities", &self.store.len())
            .field("pending_injections", &self.spawn_jobs.len())
            .finish()
    }
}

impl World {
    pub fn new(name: &str, start_file: &str, services: WorldServices) -> Self {
        Self::with_config(name, start_file, services, WorldConfig::default())
    }

    pub fn with_config(name: &str, start_file: &str, services: WorldServices, config: WorldConfig) -> Self {
        let factory = EntityFactory::new(
            Arc::clone(&services.components),
            Arc::clone(&services.parsers),
            config.factory.clone(),
        );
        Self {
            name: name.to_owned(),
            start_file: start_file.to_owned(),
            config,
            services,
            factory,
            activator: Box::new(BaseEntityActivator),
            state: WorldState::Empty,
            error: None,
            loading: None,
            definitions: LinkedEdf::default(),
            store: EntityStore::new(),
            lists: ActivationLists::default(),
            statics: Statics::new(),
            render_subscribers: Vec::new(),
            spawn_jobs: Vec::new(),
            commands: WorldCommands::new(),
            messages: Vec::new(),
            outbox: Vec::new(),
            time: 0.0,
        }
    }

    // -- accessors ----------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start_file(&self) -> &str {
        &self.start_file
    }

    pub fn state(&self) -> WorldState {
        self.state
    }

    /// Why the world is in [`WorldState::Error`].
    pub fn error(&self) -> Option<&WorldError> {
        self.error.as_ref()
    }

    /// Populated seconds since the last start.
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn services(&self) -> &WorldServices {
        &self.services
    }

    pub fn definitions(&self) -> &LinkedEdf {
        &self.definitions
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.store.get(id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.store.get_mut(id)
    }

    pub fn find_entity(&self, name: &str) -> Option<EntityId> {
        self.store.find_by_name(name)
    }

    pub fn entity_count(&self) -> usize {
        self.store.len()
    }

    pub fn actives(&self) -> &[EntityId] {
        &self.lists.actives
    }

    pub fn always_actives(&self) -> &[EntityId] {
        &self.lists.always_actives
    }

    pub fn deactives(&self) -> &[EntityId] {
        &self.lists.deactives
    }

    /// Initialised entities not yet placed by the activation pass.
    pub fn new_entities(&self) -> &[EntityId] {
        &self.lists.new_entities
    }

    /// Entities in any activation list.
    pub fn live_count(&self) -> usize {
        self.lists.live_count()
    }

    /// Spawn batches still waiting on resources.
    pub fn pending_injections(&self) -> usize {
        self.spawn_jobs.len()
    }

    /// The component published as `$T::NAME` by a static entity.
    pub fn static_component<T: ComponentType>(&self) -> Option<&T> {
        let (id, index) = *self.statics.get(&format!("${}", T::NAME))?;
        self.store.get(id)?.component_at(index)
    }

    pub fn activator(&self) -> &dyn EntityActivator {
        self.activator.as_ref()
    }

    /// The current activator, if it is an `A`.
    pub fn activator_mut<A: EntityActivator>(&mut self) -> Option<&mut A> {
        self.activator.as_mut().as_any_mut().downcast_mut::<A>()
    }

    pub fn set_activator(&mut self, activator: Box<dyn EntityActivator>) {
        self.activator = activator;
    }

    /// Messages addressed to other worlds since the last call.
    pub fn take_outbox(&mut self) -> Vec<(String, Message)> {
        std::mem::take(&mut self.outbox)
    }

    // -- lifecycle ----------------------------------------------------------

    /// Begin loading. Only valid from [`WorldState::Empty`].
    pub fn start(&mut self) {
        if self.state != WorldState::Empty {
            tracing::warn!(world = %self.name, state = ?self.state, "start ignored");
            return;
        }
        self.begin_loading();
    }

    /// Tear the world down on the next update.
    pub fn stop(&mut self) {
        match self.state {
            WorldState::Loading | WorldState::Populated | WorldState::Error | WorldState::PendingRestart => {
                tracing::info!(world = %self.name, "stop requested");
                self.state = WorldState::PendingStop;
            }
            WorldState::Empty | WorldState::PendingStop | WorldState::Clearing => {
                tracing::debug!(world = %self.name, state = ?self.state, "stop ignored");
            }
        }
    }

    /// Tear down and load again on the next update. Resources still needed
    /// after the reload are not reloaded.
    pub fn restart(&mut self) {
        match self.state {
            WorldState::Empty => self.start(),
            WorldState::Clearing | WorldState::PendingRestart => {
                tracing::debug!(world = %self.name, state = ?self.state, "restart ignored");
            }
            _ => {
                tracing::info!(world = %self.name, "restart requested");
                self.state = WorldState::PendingRestart;
            }
        }
    }

    /// Preload `instance`; it joins the world after its resources load.
    pub fn spawn(&mut self, instance: EntityInstance) -> Result<(), WorldError> {
        self.spawn_batch(vec![instance])
    }

    /// Preload several instances as one resource batch.
    pub fn spawn_batch(&mut self, instances: Vec<EntityInstance>) -> Result<(), WorldError> {
        if self.state != WorldState::Populated {
            return Err(WorldError::NotPopulated {
                world: self.name.clone(),
                state: self.state,
            });
        }
        let job = self.factory.preload(
            instances,
            &self.definitions,
            &mut self.services.resources.borrow_mut(),
            &self.name,
        );
        self.spawn_jobs.push(job);
        Ok(())
    }

    /// Queue a message for delivery after the next activation pass.
    pub fn send_message(&mut self, target: MessageTarget, message: Message) {
        self.messages.push((target, message));
    }

    /// Dispose an entity now; it leaves the lists on the next activation pass.
    pub fn dispose(&mut self, id: EntityId) {
        self.env().with_entity(id, |entity, env| entity.dispose(env));
        self.render_subscribers.retain(|s| *s != id);
    }

    /// One frame: poll pending work, then update, apply commands, run the
    /// activation pass and deliver messages.
    pub fn update(&mut self, elapsed: f64) {
        self.drain_tasks();

        match self.state {
            WorldState::PendingStop | WorldState::PendingRestart if !self.spawn_jobs.is_empty() => {
                tracing::debug!(
                    world = %self.name,
                    pending = self.spawn_jobs.len(),
                    "teardown waits for pending spawns"
                );
                return;
            }
            WorldState::PendingStop => {
                self.clear(false);
                return;
            }
            WorldState::PendingRestart => {
                self.clear(true);
                self.begin_loading();
                return;
            }
            WorldState::Populated => {}
            _ => return,
        }

        self.time += elapsed;
        for id in self.lists.actives.clone() {
            self.env().with_entity(id, |entity, env| entity.update(env, elapsed));
        }
        for id in self.lists.always_actives.clone() {
            self.env().with_entity(id, |entity, env| entity.update(env, elapsed));
        }
        self.apply_commands();
        self.run_activation();
        self.deliver_messages();
        self.apply_commands();
    }

    /// Call `on_render` on entities that asked for render events.
    pub fn render(&mut self, elapsed: f64, renderer: &mut dyn Renderer) {
        if self.state != WorldState::Populated {
            return;
        }
        for id in self.render_subscribers.clone() {
            self.env()
                .with_entity(id, |entity, env| entity.render(env, &mut *renderer, elapsed));
        }
    }

    // -- internals ----------------------------------------------------------

    fn env(&mut self) -> WorldEnv<'_> {
        WorldEnv {
            world: &self.name,
            time: self.time,
            store: &mut self.store,
            statics: &mut self.statics,
            services: &self.services,
            commands: &mut self.commands,
        }
    }

    fn begin_loading(&mut self) {
        tracing::info!(world = %self.name, file = %self.start_file, "loading world");
        self.state = WorldState::Loading;
        self.error = None;
        self.loading = Some(LoadPhase::Definitions(
            EdfLoadJob::new(&self.start_file).with_timeout(self.config.load_timeout),
        ));
    }

    fn fail(&mut self, error: WorldError) {
        tracing::error!(world = %self.name, %error, "world failed to load");
        self.loading = None;
        self.state = WorldState::Error;
        self.error = Some(error);
        self.services
            .resources
            .borrow_mut()
            .release(&loading_owner(&self.name));
    }

    fn drain_tasks(&mut self) {
        self.services.resources.borrow_mut().poll();
        self.poll_loading();
        self.poll_spawn_jobs();
    }

    fn poll_loading(&mut self) {
        let step = match self.loading.as_mut() {
            None => return,
            Some(LoadPhase::Definitions(job)) => {
                let mut sink = TracingSink;
                match job.poll(&*self.services.text_source, &mut sink) {
                    Poll::Pending => return,
                    Poll::Ready(result) => LoadStep::Definitions(result),
                }
            }
            Some(LoadPhase::Statics { job, .. }) => {
                let mut resources = self.services.resources.borrow_mut();
                match job.poll(&self.factory, &self.definitions, &mut resources) {
                    Poll::Pending => return,
                    Poll::Ready(outcome) => LoadStep::Statics(outcome),
                }
            }
        };

        match step {
            LoadStep::Definitions(Ok(linked)) => self.definitions_loaded(linked),
            LoadStep::Definitions(Err(source)) => self.fail(WorldError::Definitions {
                world: self.name.clone(),
                source,
            }),
            LoadStep::Statics(outcome) => {
                if let Some(LoadPhase::Statics { order, .. }) = self.loading.take() {
                    self.statics_preloaded(order, outcome);
                }
            }
        }
    }

    fn definitions_loaded(&mut self, linked: LinkedEdf) {
        tracing::info!(
            world = %self.name,
            definitions = linked.len(),
            files = linked.files.len(),
            "definitions loaded"
        );
        {
            let mut globals = self.services.globals.borrow_mut();
            for (key, value) in &linked.globals {
                globals.insert(key.clone(), PropertyValue::from_json(value));
            }
        }

        let order = match linked.static_start_order() {
            Ok(order) => order,
            Err(source) => {
                self.definitions = linked;
                return self.fail(WorldError::Definitions {
                    world: self.name.clone(),
                    source,
                });
            }
        };
        self.definitions = linked;

        let instances = order
            .iter()
            .map(|key| {
                let name = self.definitions.get(key).map_or(key.as_str(), |d| d.name.as_str());
                EntityInstance::new(name)
            })
            .collect();
        let job = self.factory.preload(
            instances,
            &self.definitions,
            &mut self.services.resources.borrow_mut(),
            &self.name,
        );
        self.loading = Some(LoadPhase::Statics { order, job });
    }

    fn statics_preloaded(&mut self, order: Vec<String>, outcome: PreloadOutcome) {
        let PreloadOutcome { mut ready, errors, .. } = outcome;

        let mut prepared = Vec::with_capacity(order.len());
        for key in &order {
            match ready.iter().position(|p| p.definition.eq_ignore_ascii_case(key)) {
                Some(index) => prepared.push(ready.swap_remove(index)),
                None => {
                    let reason = if errors.is_empty() {
                        "was not prepared".to_owned()
                    } else {
                        errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
                    };
                    return self.fail(WorldError::StaticFailed {
                        world: self.name.clone(),
                        name: key.clone(),
                        reason,
                    });
                }
            }
        }

        let mut ids = Vec::with_capacity(prepared.len());
        for entity in prepared {
            let name = entity.name.clone();
            match self.instantiate(entity) {
                Ok(id) => ids.push(id),
                Err(err) => {
                    for id in ids.into_iter().rev() {
                        self.dispose(id);
                        self.store.remove(id);
                    }
                    return self.fail(WorldError::StaticFailed {
                        world: self.name.clone(),
                        name,
                        reason: err.issue,
                    })
                }
            }
        }

        for id in &ids {
            self.env()
                .with_entity(*id, |entity, env| entity.before_world_start(env));
        }
        self.lists.new_entities.extend(ids);
        self.services
            .resources
            .borrow_mut()
            .release(&loading_owner(&self.name));
        self.state = WorldState::Populated;
        tracing::info!(world = %self.name, statics = order.len(), "world populated");
    }

    /// Store and initialise an entity. On failure it is removed again.
    fn instantiate(&mut self, prepared: PreparedEntity) -> Result<EntityId, InitError> {
        let id = self.store.insert_with(|id| Entity::new(id, prepared));
        let result = self
            .env()
            .with_entity(id, |entity, env| entity.init(env))
            .unwrap_or_else(|| Err(InitError::new("entity vanished during init")));
        if result.is_err() {
            self.store.remove(id);
        }
        result.map(|()| id)
    }

    fn poll_spawn_jobs(&mut self) {
        if self.spawn_jobs.is_empty() {
            return;
        }
        let mut finished = Vec::new();
        {
            let mut resources = self.services.resources.borrow_mut();
            let mut i = 0;
            while i < self.spawn_jobs.len() {
                match self.spawn_jobs[i].poll(&self.factory, &self.definitions, &mut resources) {
                    Poll::Ready(outcome) => {
                        self.spawn_jobs.remove(i);
                        finished.push(outcome);
                    }
                    Poll::Pending => i += 1,
                }
            }
        }

        for outcome in finished {
            for prepared in outcome.ready {
                if self.state != WorldState::Populated {
                    let mut late = Entity::new(EntityId::new(u32::MAX, 0), prepared);
                    late.ignore();
                    tracing::debug!(world = %self.name, entity = %late.name(), "spawn ignored; world is not populated");
                    continue;
                }
                if let Ok(id) = self.instantiate(prepared) {
                    self.lists.new_entities.push(id);
                }
            }
        }
    }

    fn apply_commands(&mut self) {
        let mut rounds = 0;
        while !self.commands.is_empty() {
            if rounds == MAX_COMMAND_ROUNDS {
                tracing::warn!(
                    world = %self.name,
                    dropped = self.commands.len(),
                    "commands keep producing commands; dropping the rest"
                );
                self.commands.clear();
                break;
            }
            rounds += 1;
            for command in self.commands.take() {
                self.apply(command);
            }
        }
    }

    fn apply(&mut self, command: Command) {
        match command.kind {
            CommandKind::Spawn(instance) => {
                if let Err(error) = self.spawn(instance) {
                    tracing::warn!(%error, issued_by = ?command.issued_by, "spawn dropped");
                }
            }
            CommandKind::Dispose(id) => self.dispose(id),
            CommandKind::RenderEvents { entity, enabled } => {
                let Some(target) = self.store.get_mut(entity) else {
                    return;
                };
                if target.is_garbage() {
                    return;
                }
                target.set_render_events(enabled);
                self.render_subscribers.retain(|s| *s != entity);
                if enabled {
                    self.render_subscribers.push(entity);
                }
            }
            CommandKind::Send { target, message } => self.messages.push((target, message)),
            CommandKind::PostToWorld { world, message } => {
                if world == self.name {
                    self.messages.push((MessageTarget::Broadcast, message));
                } else {
                    self.outbox.push((world, message));
                }
            }
            CommandKind::StopWorld => self.stop(),
            CommandKind::RestartWorld => self.restart(),
        }
    }

    fn run_activation(&mut self) {
        let activator: &dyn EntityActivator = self.activator.as_ref();
        let mut target = WorldActivation {
            activator,
            env: WorldEnv {
                world: &self.name,
                time: self.time,
                store: &mut self.store,
                statics: &mut self.statics,
                services: &self.services,
                commands: &mut self.commands,
            },
            render_subscribers: &mut self.render_subscribers,
        };
        activator.update_entity_activation(&mut self.lists, &mut target);
    }

    fn deliver_messages(&mut self) {
        for (target, message) in std::mem::take(&mut self.messages) {
            let ids = match target {
                MessageTarget::Entity(id) => vec![id],
                MessageTarget::Broadcast => self.lists.all_ids(),
            };
            for id in ids {
                self.env()
                    .with_entity(id, |entity, env| entity.deliver(env, &message));
            }
        }
    }

    /// Dispose everything, free resources and return to `Empty`.
    fn clear(&mut self, restarting: bool) {
        tracing::info!(world = %self.name, restarting, "clearing world");
        self.state = WorldState::Clearing;
        self.loading = None;
        self.messages.clear();

        let cap = self.config.stop_sanity_cap.max(1);
        let mut rounds = 0;
        while !self.lists.is_empty() {
            if rounds == cap {
                tracing::warn!(
                    world = %self.name,
                    remaining = self.lists.live_count(),
                    "entities survived {cap} cleanup rounds"
                );
                break;
            }
            rounds += 1;
            for id in self.lists.all_ids() {
                self.dispose(id);
            }
            self.apply_commands();
            self.run_activation();
        }
        for id in self.store.ids() {
            self.dispose(id);
            self.store.remove(id);
        }

        self.lists.clear();
        self.statics.clear();
        self.render_subscribers.clear();
        self.spawn_jobs.clear();
        self.commands.clear();
        self.messages.clear();
        self.definitions = LinkedEdf::default();
        self.time = 0.0;

        let mut resources = self.services.resources.borrow_mut();
        if restarting {
            resources.reparent(&self.name, &loading_owner(&self.name));
        } else {
            let evicted = resources.release(&self.name);
            tracing::debug!(world = %self.name, evicted, "released world resources");
        }
        drop(resources);
        self.state = WorldState::Empty;
    }
}

// ---------------------------------------------------------------------------
// Activation target
// ---------------------------------------------------------------------------

struct WorldActivation<'a> {
    activator: &'a dyn EntityActivator,
    env: WorldEnv<'a>,
    render_subscribers: &'a mut Vec<EntityId>,
}

impl ActivationTarget for WorldActivation<'_> {
    fn is_garbage(&self, id: EntityId) -> bool {
        self.env.store.get(id).map_or(true, Entity::is_garbage)
    }

    fn is_always_active(&self, id: EntityId) -> bool {
        self.env.store.get(id).is_some_and(Entity::is_always_active)
    }

    fn check(&self, id: EntityId) -> bool {
        self.env.store.get(id).is_some_and(|e| self.activator.check(e))
    }

    fn activate(&mut self, id: EntityId) {
        self.env.with_entity(id, |entity, env| entity.activate(env));
    }

    fn deactivate(&mut self, id: EntityId) {
        self.env.with_entity(id, |entity, env| entity.deactivate(env));
    }

    fn dispose(&mut self, id: EntityId) {
        self.env.with_entity(id, |entity, env| entity.dispose(env));
        self.env.store.remove(id);
        self.render_subscribers.retain(|s| *s != id);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
