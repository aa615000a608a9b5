//! End-to-end world scenarios: definition files in memory, resources from
//! closure loaders, and a handful of frames per step.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use serde_json::json;
use tessera_ecs::prelude::*;
use tessera_edf::prelude::MemoryTextSource;
use tessera_edf::task::{LoadError, Pending};

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Marker;
impl Component for Marker {}
impl ComponentType for Marker {
    const NAME: &'static str = "Marker";
    fn requirements() -> Option<ComponentRequirements> {
        Some(ComponentRequirements::new().maybe("tag", "string"))
    }
}

/// Needs the image named by its `image` property.
#[derive(Default)]
struct Sprite {
    texture: Injected<Arc<String>>,
}
impl Component for Sprite {}
impl ComponentType for Sprite {
    const NAME: &'static str = "Sprite";
    fn description() -> Option<ComponentDescription<Self>> {
        Some(
            ComponentDescription::new()
                .res_from("image", "image", |c: &mut Sprite| &mut c.texture),
        )
    }
}

#[derive(Default)]
struct Scoreboard {
    best: Injected<i64>,
    gravity: Injected<f64>,
    hits: u32,
}
impl Component for Scoreboard {
    fn on_message(&mut self, _ctx: &mut EntityCtx<'_>, message: &Message) {
        if message.is("hit") {
            self.hits += 1;
        }
    }
}
impl ComponentType for Scoreboard {
    const NAME: &'static str = "Scoreboard";
    fn description() -> Option<ComponentDescription<Self>> {
        Some(
            ComponentDescription::new()
                .prop_optional("best", "int", json!(10), |c: &mut Scoreboard| &mut c.best)
                .link_global("gravity", |c: &mut Scoreboard| &mut c.gravity),
        )
    }
}

/// Reports hits to the scoreboard static and reads its sibling marker.
#[derive(Default)]
struct Shooter {
    board: Injected<StaticRef<Scoreboard>>,
    marker: Injected<CmpRef<Marker>>,
    power: Injected<f64>,
}
impl Component for Shooter {
    fn on_update(&mut self, ctx: &mut EntityCtx<'_>, _elapsed: f64) {
        if let Some(board) = self.board.get().copied() {
            if let Some(board) = ctx.static_component_mut(&board) {
                board.hits += 1;
            }
        }
    }
}
impl ComponentType for Shooter {
    const NAME: &'static str = "Shooter";
    fn description() -> Option<ComponentDescription<Self>> {
        Some(
            ComponentDescription::new()
                .cmp(|c: &mut Shooter| &mut c.marker)
                .link(|c: &mut Shooter| &mut c.board)
                .prop("power", "number", |c: &mut Shooter| &mut c.power),
        )
    }
}

/// Refuses to initialise without an `hp` property.
#[derive(Default)]
struct Vitals;
impl Component for Vitals {}
impl ComponentType for Vitals {
    const NAME: &'static str = "Vitals";
    fn requirements() -> Option<ComponentRequirements> {
        Some(ComponentRequirements::new().need("hp", "int"))
    }
}

thread_local! {
    static ACTIVATED: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
    static DISPOSED: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

#[derive(Default)]
struct Probe;
impl Component for Probe {
    fn on_activate(&mut self, ctx: &mut EntityCtx<'_>) {
        let name = ctx.name().to_owned();
        ACTIVATED.with(|log| log.borrow_mut().push(name));
    }
    fn on_dispose(&mut self, ctx: &mut EntityCtx<'_>) {
        let name = ctx.name().to_owned();
        DISPOSED.with(|log| log.borrow_mut().push(name));
    }
}
impl ComponentType for Probe {
    const NAME: &'static str = "Probe";
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

fn image_loader() -> FnLoader {
    FnLoader::new("image", |path, _| {
        if path.starts_with("missing") {
            Pending::failed(LoadError::NotFound(path.to_owned()))
        } else {
            Pending::ready(Arc::new(format!("pixels of {path}")) as Resource)
        }
    })
}

fn world(text: &str) -> World {
    let mut components = ComponentManager::new();
    components.register::<Marker>().unwrap();
    components.register::<Sprite>().unwrap();
    components.register::<Scoreboard>().unwrap();
    components.register::<Shooter>().unwrap();
    components.register::<Probe>().unwrap();
    components.register::<Vitals>().unwrap();

    let mut resources = ResourceManager::new();
    resources.register_loader(Arc::new(image_loader()));

    let source = MemoryTextSource::new().with_file("main.edf", text);
    let services = WorldServices::new(components.freeze(), Rc::new(source))
        .with_resources(Rc::new(RefCell::new(resources)));
    World::new("main", "main.edf", services)
}

fn settle(world: &mut World) {
    for _ in 0..10 {
        world.update(0.016);
    }
}

fn started(text: &str) -> World {
    let mut world = world(text);
    world.start();
    settle(&mut world);
    world
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn static_without_components_fails_the_world() {
    let world = started("[!Root]\n");
    assert_eq!(world.state(), WorldState::Error);
    assert!(matches!(world.error(), Some(WorldError::StaticFailed { name, .. }) if name.eq_ignore_ascii_case("Root")));
    assert_eq!(world.entity_count(), 0);
}

#[test]
fn static_failing_a_later_component_withdraws_its_keys() {
    let mut world = world("[!Bad]\n@Probe\n@Vitals\n");
    world.start();
    settle(&mut world);
    assert_eq!(world.state(), WorldState::Error);
    assert!(matches!(world.error(), Some(WorldError::StaticFailed { reason, .. }) if reason.contains("'hp'")));
    assert!(world.static_component::<Probe>().is_none());
    assert!(world.static_component::<Vitals>().is_none());
    assert_eq!(world.entity_count(), 0);
}

#[test]
fn failed_static_disposes_the_statics_started_before_it() {
    DISPOSED.with(|log| log.borrow_mut().clear());
    let world = started("[!First]\n@Probe\n[!Bad->First]\n@Marker\n@Vitals\n");
    assert_eq!(world.state(), WorldState::Error);
    assert_eq!(world.entity_count(), 0);
    assert!(world.static_component::<Probe>().is_none());
    assert!(world.static_component::<Marker>().is_none());
    assert!(world.find_entity("First").is_none());
    DISPOSED.with(|log| assert_eq!(*log.borrow(), vec!["First"]));
}

#[test]
fn circular_static_dependencies_fail_the_world() {
    let world = started("[!A->B]\n@Marker\n[!B->A]\n@Marker\n");
    assert_eq!(world.state(), WorldState::Error);
    assert!(matches!(world.error(), Some(WorldError::Definitions { .. })));
}

#[test]
fn statics_start_in_dependency_order() {
    let world = started("[!Gun->Board]\n@Marker\n@Shooter\npower = 2\n[!Board]\n@Scoreboard\n[*]\ngravity = 9.5\n");
    assert_eq!(world.state(), WorldState::Populated);
    assert_eq!(world.entity_count(), 2);

    let board = world.static_component::<Scoreboard>().unwrap();
    assert!(board.hits > 0);
    assert_eq!(board.best.get(), Some(&10));
    assert_eq!(board.gravity.get(), Some(&9.5));
}

#[test]
fn failed_resource_drops_only_its_entity() {
    let mut world = started("[!Hud]\n@Marker\n[Tree]\n@Sprite\nimage = tree.png\n");
    world
        .spawn_batch(vec![
            EntityInstance::new("Tree").named("Good"),
            EntityInstance::new("Tree").named("Bad").with("image", json!("missing.png")),
        ])
        .unwrap();
    settle(&mut world);

    let good = world.find_entity("Good").unwrap();
    assert!(world.find_entity("Bad").is_none());
    assert!(world.actives().contains(&good));
    let sprite = world.entity(good).unwrap().find_component::<Sprite>().unwrap();
    assert_eq!(sprite.texture.get().map(|t| t.as_str()), Some("pixels of tree.png"));
}

#[test]
fn missing_static_resource_fails_the_world() {
    let world = started("[!Splash]\n@Sprite\nimage = missing.png\n");
    assert_eq!(world.state(), WorldState::Error);
    assert!(matches!(world.error(), Some(WorldError::StaticFailed { .. })));
}

#[test]
fn unknown_component_does_not_block_the_batch() {
    let mut world = started("[!Hud]\n@Marker\n[Rock]\n@Marker\n[Weird]\n@Nonexistent\n");
    world
        .spawn_batch(vec![
            EntityInstance::new("Rock").named("R1"),
            EntityInstance::new("Weird"),
            EntityInstance::new("Rock").named("R2"),
        ])
        .unwrap();
    settle(&mut world);
    assert!(world.find_entity("R1").is_some());
    assert!(world.find_entity("R2").is_some());
    assert_eq!(world.entity_count(), 3);
}

#[test]
fn new_entities_are_placed_newest_first() {
    ACTIVATED.with(|log| log.borrow_mut().clear());
    let mut world = started("[!Hud]\n@Marker\n[Blip]\n@Probe\n");
    world.spawn(EntityInstance::new("Blip").named("E1")).unwrap();
    world.spawn(EntityInstance::new("Blip").named("E2")).unwrap();
    settle(&mut world);

    let e1 = world.find_entity("E1").unwrap();
    let e2 = world.find_entity("E2").unwrap();
    let spawned: Vec<EntityId> = world
        .actives()
        .iter()
        .copied()
        .filter(|id| *id == e1 || *id == e2)
        .collect();
    assert_eq!(spawned, vec![e2, e1]);
    ACTIVATED.with(|log| assert_eq!(*log.borrow(), vec!["E2", "E1"]));
}

#[test]
fn instance_properties_override_the_definition() {
    let mut world = started("[!Hud]\n@Marker\n[Rock]\n@Marker\ntag = plain\n");
    world
        .spawn(EntityInstance::new("Rock").named("Shiny").with("tag", json!("shiny")))
        .unwrap();
    world.spawn(EntityInstance::new("Rock").named("Dull")).unwrap();
    settle(&mut world);

    let shiny = world.find_entity("Shiny").unwrap();
    let dull = world.find_entity("Dull").unwrap();
    assert_eq!(world.entity(shiny).unwrap().props().get_str("tag"), Some("shiny"));
    assert_eq!(world.entity(dull).unwrap().props().get_str("tag"), Some("plain"));
}

#[test]
fn failed_injection_leaves_the_entity_out() {
    // No scoreboard static to link against.
    let mut world = started("[!Hud]\n@Marker\n[Gun]\n@Marker\n@Shooter\npower = 1\n");
    world.spawn(EntityInstance::new("Gun")).unwrap();
    settle(&mut world);
    assert!(world.find_entity("Gun").is_none());
    assert_eq!(world.entity_count(), 1);
}

#[test]
fn always_active_entities_skip_the_activator() {
    let mut world = world("[!Hud]\n@Marker\nalwaysActive = true\nx = 9999\ny = 9999\n[Rock]\n@Marker\nx = 9999\ny = 9999\n");
    world.set_activator(Box::new(RegionActivator::new(0.0, 0.0, 10.0, 10.0)));
    world.start();
    settle(&mut world);
    world.spawn(EntityInstance::new("Rock")).unwrap();
    settle(&mut world);

    let hud = world.find_entity("Hud").unwrap();
    let rock = world.find_entity("Rock").unwrap();
    assert_eq!(world.always_actives(), &[hud]);
    assert_eq!(world.deactives(), &[rock]);
}

#[test]
fn stop_waits_for_pending_spawns() {
    let (completer, pending) = Pending::channel();
    let gate = Mutex::new(Some(pending));

    let mut world = world("[!Hud]\n@Marker\n[Slow]\n@Sprite\nimage = slow.png\n");
    let slow = FnLoader::new("image", move |path, _| {
        if path == "slow.png" {
            if let Some(pending) = gate.lock().unwrap().take() {
                return pending;
            }
        }
        Pending::ready(Arc::new(path.to_owned()) as Resource)
    });
    world.services().resources.borrow_mut().register_loader(Arc::new(slow));
    world.start();
    settle(&mut world);
    world.spawn(EntityInstance::new("Slow")).unwrap();
    world.update(0.016);
    assert_eq!(world.pending_injections(), 1);

    world.stop();
    world.update(0.016);
    assert_eq!(world.state(), WorldState::PendingStop);

    completer.complete(Ok(Arc::new("late".to_owned()) as Resource));
    settle(&mut world);
    assert_eq!(world.state(), WorldState::Empty);
    assert_eq!(world.entity_count(), 0);
    assert_eq!(world.pending_injections(), 0);
}

#[test]
fn commands_and_messages_flow_through_a_frame() {
    let mut world = started("[!Board]\n@Scoreboard\n[*]\ngravity = 1\n");
    world.send_message(MessageTarget::Broadcast, Message::new("hit"));
    world.send_message(MessageTarget::Broadcast, Message::new("miss"));
    world.update(0.016);
    assert_eq!(world.static_component::<Scoreboard>().unwrap().hits, 1);
}
