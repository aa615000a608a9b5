//! Filesystem-backed definition source and resource loaders.
//!
//! Every read runs on its own background thread and resolves through a
//! [`Pending`], so the frame loop never blocks on disk.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tessera_ecs::resource::{LoadContext, Resource, ResourceLoader};
use tessera_edf::loader::normalize_path;
use tessera_edf::source::TextSource;
use tessera_edf::task::{LoadError, Pending, DEFAULT_TIMEOUT};

/// Resolve `path` under `root`, refusing to climb above it.
fn resolve(root: &Path, path: &str) -> PathBuf {
    root.join(normalize_path(path))
}

fn read_text(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

/// Map a read failure onto the loader error vocabulary.
fn load_error(err: anyhow::Error, requested: &str) -> LoadError {
    let missing = err
        .downcast_ref::<io::Error>()
        .is_some_and(|e| e.kind() == io::ErrorKind::NotFound);
    if missing {
        LoadError::NotFound(requested.to_owned())
    } else {
        LoadError::Failed(format!("{err:#}"))
    }
}

// ---------------------------------------------------------------------------
// FsTextSource
// ---------------------------------------------------------------------------

/// Reads definition files below a root directory.
#[derive(Debug, Clone)]
pub struct FsTextSource {
    root: PathBuf,
    timeout: Duration,
}

impl FsTextSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl TextSource for FsTextSource {
    fn fetch(&self, path: &str) -> Pending<String> {
        let full = resolve(&self.root, path);
        let requested = path.to_owned();
        tracing::debug!(file = %full.display(), "fetching definition file");
        Pending::spawn(move || read_text(&full).map_err(|e| load_error(e, &requested)))
            .with_timeout(self.timeout)
    }
}

// ---------------------------------------------------------------------------
// Loaders
// ---------------------------------------------------------------------------

/// `text:<path>` resources, loaded as `String`.
#[derive(Debug, Clone)]
pub struct TextLoader {
    root: PathBuf,
}

impl TextLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ResourceLoader for TextLoader {
    fn id(&self) -> &str {
        "text"
    }

    fn load(&self, path: &str, _ctx: &LoadContext) -> Pending<Resource> {
        let full = resolve(&self.root, path);
        let requested = path.to_owned();
        Pending::spawn(move || {
            read_text(&full)
                .map(|text| Arc::new(text) as Resource)
                .map_err(|e| load_error(e, &requested))
        })
    }
}

/// `json:<path>` resources, loaded as `serde_json::Value`.
#[derive(Debug, Clone)]
pub struct JsonLoader {
    root: PathBuf,
}

impl JsonLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ResourceLoader for JsonLoader {
    fn id(&self) -> &str {
        "json"
    }

    fn load(&self, path: &str, _ctx: &LoadContext) -> Pending<Resource> {
        let full = resolve(&self.root, path);
        let requested = path.to_owned();
        Pending::spawn(move || {
            let parsed = read_text(&full).and_then(|text| {
                serde_json::from_str::<serde_json::Value>(&text)
                    .with_context(|| format!("parsing {}", full.display()))
            });
            parsed
                .map(|value| Arc::new(value) as Resource)
                .map_err(|e| load_error(e, &requested))
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
