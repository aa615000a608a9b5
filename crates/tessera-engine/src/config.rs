//! Engine configuration, read from JSON.
//!
//! Every field has a default, so an empty object is a valid config:
//!
//! ```
//! use tessera_engine::config::{ActivatorConfig, EngineConfig};
//!
//! let config = EngineConfig::from_json_str(r#"{
//!     "asset_root": "assets",
//!     "worlds": [
//!         { "name": "menu", "start_file": "menu.edf" },
//!         { "name": "level", "start_file": "level1.edf",
//!           "activator": { "region": { "x": 0, "y": 0, "width": 640, "height": 480, "margin": 64 } } }
//!     ]
//! }"#).unwrap();
//!
//! assert_eq!(config.load_timeout_secs, 50);
//! assert_eq!(config.worlds[0].activator, ActivatorConfig::Base);
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tessera_ecs::activator::{BaseEntityActivator, EntityActivator, RegionActivator};
use tessera_ecs::factory::{FactoryConfig, UnknownPropertyPolicy};
use tessera_ecs::world::WorldConfig;

/// Activation policy of one configured world.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivatorConfig {
    /// Every entity is active.
    #[default]
    Base,
    /// Entities are active inside a rectangle grown by `margin`.
    Region {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        #[serde(default)]
        margin: f64,
    },
}

impl ActivatorConfig {
    pub fn build(&self) -> Box<dyn EntityActivator> {
        match *self {
            ActivatorConfig::Base => Box::new(BaseEntityActivator),
            ActivatorConfig::Region {
                x,
                y,
                width,
                height,
                margin,
            } => Box::new(RegionActivator::new(x, y, width, height).with_margin(margin)),
        }
    }
}

/// A world to create at build time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldEntry {
    pub name: String,
    pub start_file: String,
    #[serde(default)]
    pub activator: ActivatorConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory that definition files and resource paths are relative to.
    pub asset_root: PathBuf,
    /// Deadline for each file fetch and resource load.
    pub load_timeout_secs: u64,
    pub max_child_depth: usize,
    /// Cleanup rounds when a world stops.
    pub stop_sanity_cap: usize,
    pub unknown_properties: UnknownPropertyPolicy,
    /// `tracing` filter directive; `RUST_LOG` takes precedence.
    pub log_filter: String,
    pub worlds: Vec<WorldEntry>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from("."),
            load_timeout_secs: 50,
            max_child_depth: 20,
            stop_sanity_cap: 64,
            unknown_properties: UnknownPropertyPolicy::PassThrough,
            log_filter: "info".to_owned(),
            worlds: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(text: &str) -> anyhow::Result<Self> {
        serde_json::from_str(text).context("invalid engine config")
    }

    /// Read a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading engine config {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("in {}", path.display()))
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }

    pub fn world_config(&self) -> WorldConfig {
        WorldConfig {
            stop_sanity_cap: self.stop_sanity_cap,
            load_timeout: self.load_timeout(),
            factory: FactoryConfig {
                max_child_depth: self.max_child_depth,
                unknown_properties: self.unknown_properties,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_uses_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        let world = config.world_config();
        assert_eq!(world.stop_sanity_cap, 64);
        assert_eq!(world.load_timeout, Duration::from_secs(50));
        assert_eq!(world.factory.max_child_depth, 20);
    }

    #[test]
    fn policy_and_activators_parse() {
        let config = EngineConfig::from_json_str(
            r#"{
                "unknown_properties": "reject",
                "worlds": [{ "name": "w", "start_file": "w.edf",
                             "activator": { "region": { "x": 1, "y": 2, "width": 3, "height": 4 } } }]
            }"#,
        )
        .unwrap();
        assert_eq!(config.unknown_properties, UnknownPropertyPolicy::Reject);
        assert_eq!(
            config.worlds[0].activator,
            ActivatorConfig::Region {
                x: 1.0,
                y: 2.0,
                width: 3.0,
                height: 4.0,
                margin: 0.0
            }
        );
        let activator = config.worlds[0].activator.build();
        assert!(activator.as_ref().as_any().downcast_ref::<RegionActivator>().is_some());
    }

    #[test]
    fn bad_config_reports_context() {
        let err = EngineConfig::from_json_str("{ \"worlds\": 3 }").unwrap_err();
        assert!(format!("{err:#}").starts_with("invalid engine config"));

        let err = EngineConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(err.to_string().contains("reading engine config"));
    }
}
