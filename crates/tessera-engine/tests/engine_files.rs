//! The engine against a real asset directory: config file, definition files
//! with requires, and text/json resources read on background threads.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tessera_engine::prelude::*;

static NEXT_DIR: AtomicU32 = AtomicU32::new(0);

fn asset_dir(files: &[(&str, &str)]) -> PathBuf {
    let root = std::env::temp_dir().join(format!(
        "tessera-engine-{}-{}",
        std::process::id(),
        NEXT_DIR.fetch_add(1, Ordering::Relaxed)
    ));
    for (path, text) in files {
        let full = root.join(path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, text).unwrap();
    }
    root
}

/// Run frames until `done` holds, giving background reads time to finish.
fn run_until(frames: &mut FrameLoop, done: impl Fn(&WorldManager) -> bool) {
    for _ in 0..500 {
        frames.frame();
        if done(frames.manager()) {
            return;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    panic!("condition never held: {:?}", frames.manager());
}

fn state(manager: &WorldManager, world: &str) -> WorldState {
    manager.world(world).map_or(WorldState::Error, World::state)
}

#[derive(Default)]
struct Dialogue {
    intro: Injected<Arc<String>>,
    level: Injected<Arc<Value>>,
}
impl Component for Dialogue {}
impl ComponentType for Dialogue {
    const NAME: &'static str = "Dialogue";
    fn description() -> Option<ComponentDescription<Self>> {
        Some(
            ComponentDescription::new()
                .res_from("text", "script", |c: &mut Dialogue| &mut c.intro)
                .res("json:data/level.json", |c: &mut Dialogue| &mut c.level),
        )
    }
}

#[derive(Default)]
struct Tag;
impl Component for Tag {}
impl ComponentType for Tag {
    const NAME: &'static str = "Tag";
}

fn frames_for(root: &PathBuf) -> FrameLoop {
    let config = EngineConfig::load(root.join("engine.json")).unwrap();
    let config = EngineConfig {
        asset_root: root.clone(),
        ..config
    };
    let manager = WorldManager::builder()
        .config(config)
        .component::<Dialogue>()
        .component::<Tag>()
        .build()
        .unwrap();
    FrameLoop::new(manager, FrameConfig::default())
}

#[test]
fn worlds_load_definitions_and_resources_from_disk() {
    let root = asset_dir(&[
        (
            "engine.json",
            r#"{ "worlds": [{ "name": "story", "start_file": "defs/story.edf" }] }"#,
        ),
        ("defs/story.edf", "[$require]\ncommon.edf\n\n[!Narrator(Speaker)]\nscript = text/intro.txt\n"),
        ("defs/common.edf", "[Speaker]\n@Tag\n@Dialogue\n"),
        ("text/intro.txt", "Once upon a time"),
        ("data/level.json", r#"{ "rooms": 4 }"#),
    ]);
    let mut frames = frames_for(&root);
    frames.manager_mut().start_all();
    run_until(&mut frames, |m| state(m, "story") != WorldState::Loading);

    let manager = frames.manager();
    assert_eq!(state(manager, "story"), WorldState::Populated);
    let dialogue = manager.world("story").unwrap().static_component::<Dialogue>().unwrap();
    assert_eq!(dialogue.intro.get().map(|s| s.as_str()), Some("Once upon a time"));
    assert_eq!(dialogue.level.get().map(|v| v["rooms"].clone()), Some(Value::from(4)));
    assert_eq!(manager.resources().len(), 2);
}

#[test]
fn missing_resource_fails_only_its_world() {
    let root = asset_dir(&[
        (
            "engine.json",
            r#"{ "worlds": [{ "name": "broken", "start_file": "broken.edf" },
                           { "name": "fine", "start_file": "fine.edf" }] }"#,
        ),
        ("broken.edf", "[!Narrator]\n@Dialogue\nscript = nope.txt\n"),
        ("fine.edf", "[!Marker]\n@Tag\n"),
    ]);
    let mut frames = frames_for(&root);
    frames.manager_mut().start_all();
    run_until(&mut frames, |m| {
        state(m, "broken") != WorldState::Loading && state(m, "fine") != WorldState::Loading
    });

    let manager = frames.manager();
    assert_eq!(state(manager, "broken"), WorldState::Error);
    assert_eq!(state(manager, "fine"), WorldState::Populated);
}

#[test]
fn restart_reuses_loaded_resources_and_stop_releases_them() {
    let root = asset_dir(&[
        (
            "engine.json",
            r#"{ "worlds": [{ "name": "story", "start_file": "story.edf" }] }"#,
        ),
        ("story.edf", "[!Narrator]\n@Dialogue\nscript = intro.txt\n"),
        ("intro.txt", "Again"),
        ("data/level.json", "[]"),
    ]);
    let mut frames = frames_for(&root);
    frames.manager_mut().start_all();
    run_until(&mut frames, |m| state(m, "story") == WorldState::Populated);
    assert_eq!(frames.manager().resources().len(), 2);

    frames.manager_mut().restart_world("story").unwrap();
    run_until(&mut frames, |m| state(m, "story") == WorldState::Populated);
    assert_eq!(frames.manager().resources().len(), 2);

    frames.manager_mut().stop_world("story").unwrap();
    run_until(&mut frames, |m| state(m, "story") == WorldState::Empty);
    assert!(frames.manager().resources().is_empty());
}

#[test]
fn missing_start_file_is_reported() {
    let root = asset_dir(&[(
        "engine.json",
        r#"{ "worlds": [{ "name": "ghost", "start_file": "ghost.edf" }] }"#,
    )]);
    let mut frames = frames_for(&root);
    frames.manager_mut().start_all();
    run_until(&mut frames, |m| state(m, "ghost") != WorldState::Loading);
    let world = frames.manager().world("ghost").unwrap();
    assert!(matches!(world.error(), Some(WorldError::Definitions { .. })));
}
