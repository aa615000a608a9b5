//! Resource URLs, loaders and the shared reference-counted resource cache.
//!
//! Resources are addressed by canonical `"loader:path"` URLs. A
//! [`ResourceManager`] caches every loaded resource and counts references per
//! owner (a world name). Loads are requested in batches and complete
//! asynchronously; callers poll once per frame and collect the batch outcome
//! with [`ResourceManager::take_outcome`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tessera_ecs::resource::{FnLoader, ResourceManager, ResourceUrl};
//! use tessera_edf::task::Pending;
//!
//! let mut resources = ResourceManager::new();
//! resources.register_loader(Arc::new(FnLoader::new("text", |path, _ctx| {
//!     Pending::ready(Arc::new(format!("contents of {path}")) as tessera_ecs::resource::Resource)
//! })));
//!
//! let url = ResourceUrl::parse("text:readme.txt").unwrap();
//! let request = resources.request([url.clone()], "main");
//! resources.poll();
//! let outcome = resources.take_outcome(request).unwrap();
//! assert!(outcome.is_success());
//! assert_eq!(
//!     resources.get_typed::<String>(&url).as_deref().map(String::as_str),
//!     Some("contents of readme.txt")
//! );
//! ```

use std::any::Any;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::task::Poll;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tessera_edf::task::{LoadError, Pending, DEFAULT_TIMEOUT};

/// A loaded resource. Downcast with [`ResourceManager::get_typed`].
pub type Resource = Arc<dyn Any + Send + Sync>;

/// Pseudo-owner holding resources across a world restart.
pub const LOADING_OWNER: &str = "$loading";

// ---------------------------------------------------------------------------
// ResourceUrl
// ---------------------------------------------------------------------------

/// A canonical `loader:path` resource address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceUrl {
    loader: String,
    path: String,
}

impl ResourceUrl {
    pub fn new(loader: &str, path: &str) -> Result<Self, LoadError> {
        let (loader, path) = (loader.trim(), path.trim());
        if loader.is_empty() || path.is_empty() {
            return Err(LoadError::MalformedUrl(format!("{loader}:{path}")));
        }
        Ok(Self {
            loader: loader.to_owned(),
            path: path.to_owned(),
        })
    }

    /// Parse `loader:path` or the legacy `loader!path`. The first separator
    /// wins, so paths may contain further colons.
    pub fn parse(text: &str) -> Result<Self, LoadError> {
        let split = text
            .char_indices()
            .find(|&(_, c)| c == ':' || c == '!')
            .map(|(i, _)| i)
            .ok_or_else(|| LoadError::MalformedUrl(text.to_owned()))?;
        Self::new(&text[..split], &text[split + 1..])
            .map_err(|_| LoadError::MalformedUrl(text.to_owned()))
    }

    /// Accept a URL string or a `["loader", "path"]` pair.
    pub fn from_json(value: &Value) -> Result<Self, LoadError> {
        match value {
            Value::String(s) => Self::parse(s),
            Value::Array(pair) => match pair.as_slice() {
                [Value::String(loader), Value::String(path)] => Self::new(loader, path)
                    .map_err(|_| LoadError::MalformedUrl(value.to_string())),
                _ => Err(LoadError::MalformedUrl(value.to_string())),
            },
            _ => Err(LoadError::MalformedUrl(value.to_string())),
        }
    }

    pub fn loader(&self) -> &str {
        &self.loader
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for ResourceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.loader, self.path)
    }
}

impl FromStr for ResourceUrl {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ---------------------------------------------------------------------------
// Loaders
// ---------------------------------------------------------------------------

/// Loads resources of one type.
pub trait ResourceLoader: Send + Sync {
    /// Loader id, the part of a URL before the separator.
    fn id(&self) -> &str;

    /// Begin loading `path`. `ctx` gives access to the other loaders.
    fn load(&self, path: &str, ctx: &LoadContext) -> Pending<Resource>;

    /// Called once the last owner releases a loaded resource.
    fn unload(&self, _path: &str, _resource: &Resource) {}
}

type LoadFn = dyn Fn(&str, &LoadContext) -> Pending<Resource> + Send + Sync;

/// A loader backed by a closure.
pub struct FnLoader {
    id: String,
    load: Box<LoadFn>,
}

impl FnLoader {
    pub fn new<F>(id: &str, load: F) -> Self
    where
        F: Fn(&str, &LoadContext) -> Pending<Resource> + Send + Sync + 'static,
    {
        Self {
            id: id.to_owned(),
            load: Box::new(load),
        }
    }
}

impl fmt::Debug for FnLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnLoader").field("id", &self.id).finish()
    }
}

impl ResourceLoader for FnLoader {
    fn id(&self) -> &str {
        &self.id
    }

    fn load(&self, path: &str, ctx: &LoadContext) -> Pending<Resource> {
        (self.load)(path, ctx)
    }
}

/// The sub-loader handed to [`ResourceLoader::load`].
///
/// Cheap to clone and `Send`, so loaders may move it into worker threads.
/// Sub-loads bypass the cache and are not reference counted.
#[derive(Clone, Default)]
pub struct LoadContext {
    loaders: Arc<HashMap<String, Arc<dyn ResourceLoader>>>,
}

impl fmt::Debug for LoadContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.loaders.keys().collect();
        ids.sort();
        f.debug_struct("LoadContext").field("loaders", &ids).finish()
    }
}

impl LoadContext {
    pub fn has_loader(&self, id: &str) -> bool {
        self.loaders.contains_key(id)
    }

    /// Load `url` through the loader it names.
    pub fn load_url(&self, url: &ResourceUrl) -> Pending<Resource> {
        match self.loaders.get(url.loader()) {
            Some(loader) => loader.load(url.path(), self),
            None => Pending::failed(LoadError::UnknownLoader(url.loader().to_owned())),
        }
    }

    /// Parse and load `url`.
    pub fn load(&self, url: &str) -> Pending<Resource> {
        match ResourceUrl::parse(url) {
            Ok(url) => self.load_url(&url),
            Err(e) => Pending::failed(e),
        }
    }

    fn unload(&self, url: &ResourceUrl, resource: &Resource) {
        if let Some(loader) = self.loaders.get(url.loader()) {
            loader.unload(url.path(), resource);
        }
    }
}

// ---------------------------------------------------------------------------
// ResourceManager
// ---------------------------------------------------------------------------

enum Entry {
    Loading(Pending<Resource>),
    Loaded(Resource),
    Failed(LoadError),
}

struct Slot {
    entry: Entry,
    owners: HashMap<String, usize>,
}

/// Handle for one batched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

/// How a batched request ended.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOutcome {
    pub loaded: Vec<ResourceUrl>,
    pub failed: Vec<(ResourceUrl, LoadError)>,
}

impl RequestOutcome {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failure(&self, url: &ResourceUrl) -> Option<&LoadError> {
        self.failed.iter().find(|(u, _)| u == url).map(|(_, e)| e)
    }
}

/// Reference-counted resource cache shared by every world.
pub struct ResourceManager {
    ctx: LoadContext,
    slots: HashMap<ResourceUrl, Slot>,
    open: HashMap<RequestId, Vec<ResourceUrl>>,
    done: HashMap<RequestId, RequestOutcome>,
    next_request: u64,
    timeout: Duration,
}

impl fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceManager")
            .field("loaders", &self.ctx)
            .field("resources", &self.slots.len())
            .field("open_requests", &self.open.len())
            .finish()
    }
}

impl Default for ResourceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceManager {
    pub fn new() -> Self {
        Self {
            ctx: LoadContext::default(),
            slots: HashMap::new(),
            open: HashMap::new(),
            done: HashMap::new(),
            next_request: 0,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Deadline for every load started after this call.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Add a loader. A second loader with the same id replaces the first.
    pub fn register_loader(&mut self, loader: Arc<dyn ResourceLoader>) {
        let id = loader.id().to_owned();
        tracing::debug!(loader = %id, "registered resource loader");
        Arc::make_mut(&mut self.ctx.loaders).insert(id, loader);
    }

    pub fn load_context(&self) -> &LoadContext {
        &self.ctx
    }

    /// Request `urls` on behalf of `owner`. Every URL gains one reference for
    /// the owner, whether or not it loads. Failed entries are retried.
    pub fn request<I>(&mut self, urls: I, owner: &str) -> RequestId
    where
        I: IntoIterator<Item = ResourceUrl>,
    {
        let id = RequestId(self.next_request);
        self.next_request += 1;

        let urls: Vec<ResourceUrl> = urls.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
        for url in &urls {
            let start_load = match self.slots.get(url) {
                None => true,
                Some(slot) => matches!(slot.entry, Entry::Failed(_)),
            };
            if start_load {
                tracing::debug!(url = %url, owner, "loading resource");
                let pending = self.ctx.load_url(url).with_timeout(self.timeout);
                let slot = self.slots.entry(url.clone()).or_insert_with(|| Slot {
                    entry: Entry::Failed(LoadError::Abandoned),
                    owners: HashMap::new(),
                });
                slot.entry = Entry::Loading(pending);
            }
            if let Some(slot) = self.slots.get_mut(url) {
                *slot.owners.entry(owner.to_owned()).or_insert(0) += 1;
            }
        }
        self.open.insert(id, urls);
        id
    }

    /// Advance every in-flight load and complete finished requests.
    pub fn poll(&mut self) {
        for (url, slot) in &mut self.slots {
            if let Entry::Loading(pending) = &mut slot.entry {
                match pending.poll() {
                    Poll::Pending => {}
                    Poll::Ready(Ok(resource)) => {
                        tracing::debug!(url = %url, "resource loaded");
                        slot.entry = Entry::Loaded(resource);
                    }
                    Poll::Ready(Err(error)) => {
                        tracing::warn!(url = %url, %error, "resource failed to load");
                        slot.entry = Entry::Failed(error);
                    }
                }
            }
        }

        let slots = &self.slots;
        let finished: Vec<RequestId> = self
            .open
            .iter()
            .filter(|(_, urls)| {
                urls.iter()
                    .all(|u| !matches!(slots.get(u).map(|s| &s.entry), Some(Entry::Loading(_))))
            })
            .map(|(id, _)| *id)
            .collect();

        for id in finished {
            let Some(urls) = self.open.remove(&id) else {
                continue;
            };
            let mut outcome = RequestOutcome::default();
            for url in urls {
                match self.slots.get(&url).map(|s| &s.entry) {
                    Some(Entry::Loaded(_)) => outcome.loaded.push(url),
                    Some(Entry::Failed(e)) => {
                        let error = e.clone();
                        outcome.failed.push((url, error));
                    }
                    // Released while loading.
                    Some(Entry::Loading(_)) | None => outcome.failed.push((url, LoadError::Abandoned)),
                }
            }
            self.done.insert(id, outcome);
        }
    }

    /// Whether `id` is complete; does not consume the outcome.
    pub fn is_complete(&self, id: RequestId) -> bool {
        self.done.contains_key(&id)
    }

    /// Collect the outcome of a completed request.
    pub fn take_outcome(&mut self, id: RequestId) -> Option<RequestOutcome> {
        self.done.remove(&id)
    }

    pub fn get(&self, url: &ResourceUrl) -> Option<Resource> {
        match self.slots.get(url).map(|s| &s.entry) {
            Some(Entry::Loaded(resource)) => Some(Arc::clone(resource)),
            _ => None,
        }
    }

    pub fn get_typed<T: Any + Send + Sync>(&self, url: &ResourceUrl) -> Option<Arc<T>> {
        self.get(url).and_then(|r| r.downcast::<T>().ok())
    }

    pub fn is_loaded(&self, url: &ResourceUrl) -> bool {
        matches!(self.slots.get(url).map(|s| &s.entry), Some(Entry::Loaded(_)))
    }

    pub fn failure(&self, url: &ResourceUrl) -> Option<&LoadError> {
        match self.slots.get(url).map(|s| &s.entry) {
            Some(Entry::Failed(e)) => Some(e),
            _ => None,
        }
    }

    /// References `owner` holds on `url`.
    pub fn ref_count(&self, url: &ResourceUrl, owner: &str) -> usize {
        self.slots
            .get(url)
            .and_then(|s| s.owners.get(owner))
            .copied()
            .unwrap_or(0)
    }

    /// Number of cached entries, loaded or not.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Drop every reference held by `owner`. Resources left without owners
    /// are unloaded and evicted. Returns the number of evicted entries.
    pub fn release(&mut self, owner: &str) -> usize {
        let mut evicted = Vec::new();
        for (url, slot) in &mut self.slots {
            slot.owners.remove(owner);
            if slot.owners.is_empty() {
                evicted.push(url.clone());
            }
        }
        for url in &evicted {
            if let Some(slot) = self.slots.remove(url) {
                if let Entry::Loaded(resource) = &slot.entry {
                    tracing::debug!(url = %url, "unloading resource");
                    self.ctx.unload(url, resource);
                }
            }
        }
        if !evicted.is_empty() {
            tracing::debug!(owner, evicted = evicted.len(), "released resources");
        }
        evicted.len()
    }

    /// Move every reference held by `from` to `to`.
    pub fn reparent(&mut self, from: &str, to: &str) {
        for slot in self.slots.values_mut() {
            if let Some(count) = slot.owners.remove(from) {
                *slot.owners.entry(to.to_owned()).or_insert(0) += count;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
