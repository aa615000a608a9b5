//! Tessera Engine -- worlds from configuration, files from disk, and the
//! frame loop that drives them.
//!
//! This crate ties [`tessera_ecs`] to the outside: an [`EngineConfig`]
//! (JSON), a [`WorldManager`] that owns every world and routes messages
//! between them, filesystem loaders for definition files and resources, a
//! fixed-step [`FrameLoop`], and `tracing` setup.
//!
//! # Quick Start
//!
//! ```
//! use std::rc::Rc;
//! use tessera_engine::prelude::*;
//! use tessera_edf::prelude::MemoryTextSource;
//!
//! #[derive(Default)]
//! struct Lives {
//!     count: Injected<i64>,
//! }
//! impl Component for Lives {}
//! impl ComponentType for Lives {
//!     const NAME: &'static str = "Lives";
//!     fn description() -> Option<ComponentDescription<Self>> {
//!         Some(ComponentDescription::new().prop("count", "int", |c: &mut Lives| &mut c.count))
//!     }
//! }
//!
//! let config = EngineConfig::from_json_str(r#"{ "worlds": [{ "name": "game", "start_file": "game.edf" }] }"#).unwrap();
//! let source = MemoryTextSource::new().with_file("game.edf", "[!Player]\n@Lives\ncount = 3\n");
//! let manager = WorldManager::builder()
//!     .config(config)
//!     .component::<Lives>()
//!     .text_source(Rc::new(source))
//!     .build()
//!     .unwrap();
//!
//! let mut frames = FrameLoop::new(manager, FrameConfig::default());
//! frames.manager_mut().start_all();
//! frames.run_frames(5);
//!
//! let world = frames.manager().world("game").unwrap();
//! assert_eq!(world.static_component::<Lives>().and_then(|l| l.count.get().copied()), Some(3));
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod frame;
pub mod fs;
pub mod logging;
pub mod manager;

pub use config::EngineConfig;
pub use frame::FrameLoop;
pub use manager::WorldManager;

/// Re-export the ECS crate for convenience.
pub use tessera_ecs;

/// Re-export the definition format crate for convenience.
pub use tessera_edf;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Registration(#[from] tessera_ecs::RegistrationError),

    #[error(transparent)]
    World(#[from] tessera_ecs::WorldError),

    #[error("world '{0}' is defined twice")]
    DuplicateWorld(String),

    #[error("no world named '{0}'")]
    UnknownWorld(String),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    pub use tessera_ecs::prelude::*;

    pub use crate::config::{ActivatorConfig, EngineConfig, WorldEntry};
    pub use crate::frame::{FrameConfig, FrameDiagnostics, FrameLoop};
    pub use crate::fs::{FsTextSource, JsonLoader, TextLoader};
    pub use crate::logging::init_logging;
    pub use crate::manager::{WorldManager, WorldManagerBuilder};
    pub use crate::EngineError;
}
