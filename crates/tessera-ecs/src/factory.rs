//! Turning definition names into entities ready to initialise.
//!
//! [`EntityFactory::preload`] runs a batch of [`EntityInstance`]s through five
//! stages. Each stage drops the instances it rejects, records a
//! [`FactoryError`] for them, and passes the rest on:
//!
//! 1. resolve the definition (must exist, be an entity, and list components);
//! 2. resolve every component name in the [`ComponentManager`];
//! 3. check that required sibling components are listed too;
//! 4. merge and parse properties (instance overrides definition, then
//!    declared defaults; undeclared keys follow [`UnknownPropertyPolicy`]);
//! 5. collect resource URLs and child definitions.
//!
//! The survivors' resources are requested as one batch. The returned
//! [`PreloadJob`] is polled each frame; once the batch settles, instances
//! whose resources failed are dropped and child definitions are preloaded
//! the same way, one level deeper, up to [`FactoryConfig::max_child_depth`].
//! A failing instance never holds back the rest of its batch.

use std::collections::HashMap;
use std::sync::Arc;
use std::task::Poll;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tessera_edf::definition::{DefinitionKind, LinkedEdf, LinkedEntityDefinition, RawProperties};

use crate::component::ComponentEntry;
use crate::manager::ComponentManager;
use crate::parsers::PropertyParsers;
use crate::property::{PropertyMap, PropertyValue};
use crate::resource::{RequestId, ResourceManager, ResourceUrl};
use crate::FactoryError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What happens to instance or definition properties no component declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownPropertyPolicy {
    /// Keep them, converted straight from JSON.
    #[default]
    PassThrough,
    /// Reject the instance.
    Reject,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FactoryConfig {
    /// Levels of child preloading below the spawned entity.
    pub max_child_depth: usize,
    pub unknown_properties: UnknownPropertyPolicy,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            max_child_depth: 20,
            unknown_properties: UnknownPropertyPolicy::PassThrough,
        }
    }
}

// ---------------------------------------------------------------------------
// Instances
// ---------------------------------------------------------------------------

/// A request to instantiate a definition, with per-instance overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityInstance {
    pub name: String,
    pub definition: String,
    #[serde(default)]
    pub properties: RawProperties,
}

impl EntityInstance {
    /// An instance named after its definition.
    pub fn new(definition: &str) -> Self {
        Self {
            name: definition.to_owned(),
            definition: definition.to_owned(),
            properties: RawProperties::new(),
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_owned();
        self
    }

    /// Override one property.
    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.properties.insert(key.to_owned(), value);
        self
    }
}

/// An instance that passed every stage and whose resources are loaded.
#[derive(Debug, Clone)]
pub struct PreparedEntity {
    pub name: String,
    pub definition: String,
    pub is_static: bool,
    pub props: PropertyMap,
    pub components: Vec<Arc<ComponentEntry>>,
    pub resources: Vec<ResourceUrl>,
}

/// Result of a settled [`PreloadJob`].
#[derive(Debug, Default)]
pub struct PreloadOutcome {
    /// Top-level instances that survived, in input order.
    pub ready: Vec<PreparedEntity>,
    /// Failures at this level and every child level.
    pub errors: Vec<FactoryError>,
    /// Child definitions preloaded successfully, all levels.
    pub children: usize,
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

struct Candidate<'d> {
    instance: EntityInstance,
    def: &'d LinkedEntityDefinition,
    components: Vec<Arc<ComponentEntry>>,
}

struct Gathered {
    prepared: PreparedEntity,
    children: Vec<String>,
}

/// Run `f` over `batch`, keeping the `Ok`s and recording the `Err`s.
fn stage<T, U>(
    batch: Vec<T>,
    errors: &mut Vec<FactoryError>,
    mut f: impl FnMut(T) -> Result<U, FactoryError>,
) -> Vec<U> {
    let mut kept = Vec::with_capacity(batch.len());
    for item in batch {
        match f(item) {
            Ok(next) => kept.push(next),
            Err(error) => {
                tracing::warn!(%error, "entity dropped from batch");
                errors.push(error);
            }
        }
    }
    kept
}

/// Builds [`PreparedEntity`]s for one world's definitions.
#[derive(Debug, Clone)]
pub struct EntityFactory {
    components: Arc<ComponentManager>,
    parsers: Arc<PropertyParsers>,
    config: FactoryConfig,
}

impl EntityFactory {
    pub fn new(components: Arc<ComponentManager>, parsers: Arc<PropertyParsers>, config: FactoryConfig) -> Self {
        Self {
            components,
            parsers,
            config,
        }
    }

    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    /// Start preloading `instances` with resources held by `owner`.
    pub fn preload(
        &self,
        instances: Vec<EntityInstance>,
        defs: &LinkedEdf,
        resources: &mut ResourceManager,
        owner: &str,
    ) -> PreloadJob {
        self.preload_at(instances, defs, resources, owner, 0)
    }

    fn preload_at(
        &self,
        instances: Vec<EntityInstance>,
        defs: &LinkedEdf,
        resources: &mut ResourceManager,
        owner: &str,
        depth: usize,
    ) -> PreloadJob {
        let mut errors = Vec::new();
        let batch = self.prepare(instances, defs, &mut errors);
        let urls: Vec<ResourceUrl> = batch
            .iter()
            .flat_map(|g| g.prepared.resources.iter().cloned())
            .collect();
        tracing::debug!(
            owner,
            depth,
            entities = batch.len(),
            resources = urls.len(),
            "preloading entities"
        );
        let request = resources.request(urls, owner);
        PreloadJob {
            owner: owner.to_owned(),
            depth,
            batch,
            ready: Vec::new(),
            errors,
            children: 0,
            stage: JobStage::Resources(request),
        }
    }

    /// Stages 1 to 5, without loading anything.
    fn prepare(&self, instances: Vec<EntityInstance>, defs: &LinkedEdf, errors: &mut Vec<FactoryError>) -> Vec<Gathered> {
        let batch = stage(instances, errors, |instance| resolve_definition(instance, defs));
        let batch = stage(batch, errors, |candidate| self.resolve_components(candidate));
        let batch = stage(batch, errors, check_siblings);
        let batch = stage(batch, errors, |candidate| {
            let props = self.parse_properties(&candidate)?;
            Ok((candidate, props))
        });
        stage(batch, errors, |(candidate, props)| gather(candidate, props))
    }

    fn resolve_components<'d>(&self, mut candidate: Candidate<'d>) -> Result<Candidate<'d>, FactoryError> {
        for name in &candidate.def.components {
            let entry = self
                .components
                .get(name)
                .ok_or_else(|| FactoryError::UnknownComponent {
                    entity: candidate.instance.name.clone(),
                    component: name.clone(),
                })?;
            candidate.components.push(Arc::clone(entry));
        }
        Ok(candidate)
    }

    fn parse_properties(&self, candidate: &Candidate<'_>) -> Result<PropertyMap, FactoryError> {
        let entity = &candidate.instance.name;
        let mut raw = candidate.def.properties.clone();
        raw.extend(
            candidate
                .instance
                .properties
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );

        let mut props = PropertyMap::new();
        let mut declared: HashMap<&str, (&str, &str)> = HashMap::new();
        for entry in &candidate.components {
            for info in &entry.requirements().props {
                if let Some((owner, type_id)) = declared.get(info.name.as_str()) {
                    if *type_id != info.type_id {
                        return Err(FactoryError::PropertyTypeConflict {
                            entity: entity.clone(),
                            property: info.name.clone(),
                            first: format!("{owner}:{type_id}"),
                            second: format!("{}:{}", entry.name(), info.type_id),
                        });
                    }
                    continue;
                }
                declared.insert(&info.name, (entry.name(), &info.type_id));

                let parser = self
                    .parsers
                    .get(&info.type_id)
                    .ok_or_else(|| FactoryError::UnknownPropertyType {
                        entity: entity.clone(),
                        property: info.name.clone(),
                        type_id: info.type_id.clone(),
                    })?;
                if let Some(value) = raw.get(&info.name).or(info.default.as_ref()) {
                    let parsed = parser
                        .parse(info, value)
                        .map_err(|reason| FactoryError::InvalidProperty {
                            entity: entity.clone(),
                            property: info.name.clone(),
                            reason,
                        })?;
                    props.insert(info.name.clone(), parsed);
                }
            }
        }

        for (key, value) in &raw {
            if declared.contains_key(key.as_str()) {
                continue;
            }
            match self.config.unknown_properties {
                UnknownPropertyPolicy::PassThrough => {
                    props.insert(key.clone(), PropertyValue::from_json(value));
                }
                UnknownPropertyPolicy::Reject => {
                    return Err(FactoryError::UnknownProperty {
                        entity: entity.clone(),
                        property: key.clone(),
                    })
                }
            }
        }
        Ok(props)
    }
}

fn resolve_definition(instance: EntityInstance, defs: &LinkedEdf) -> Result<Candidate<'_>, FactoryError> {
    let def = defs
        .get(&instance.definition)
        .ok_or_else(|| FactoryError::UnknownDefinition {
            entity: instance.name.clone(),
            definition: instance.definition.clone(),
        })?;
    if def.kind != DefinitionKind::Entity {
        return Err(FactoryError::NotAnEntity {
            definition: def.name.clone(),
        });
    }
    if def.components.is_empty() {
        return Err(FactoryError::NoComponents {
            definition: def.name.clone(),
        });
    }
    Ok(Candidate {
        instance,
        def,
        components: Vec::with_capacity(def.components.len()),
    })
}

fn check_siblings(candidate: Candidate<'_>) -> Result<Candidate<'_>, FactoryError> {
    for entry in &candidate.components {
        for required in &entry.requirements().cmps {
            if !candidate.def.components.iter().any(|c| c == required) {
                return Err(FactoryError::MissingSibling {
                    entity: candidate.instance.name.clone(),
                    component: entry.name().to_owned(),
                    required: required.clone(),
                });
            }
        }
    }
    Ok(candidate)
}

fn gather(candidate: Candidate<'_>, props: PropertyMap) -> Result<Gathered, FactoryError> {
    let mut resources = Vec::new();
    let mut children = Vec::new();
    for entry in &candidate.components {
        let requirements = entry.requirements();
        for raw in requirements.resources_for(&props) {
            let url = ResourceUrl::from_json(&raw).map_err(|reason| FactoryError::BadResourceUrl {
                entity: candidate.instance.name.clone(),
                reason,
            })?;
            if !resources.contains(&url) {
                resources.push(url);
            }
        }
        children.extend(requirements.children_for(&props));
    }
    Ok(Gathered {
        prepared: PreparedEntity {
            name: candidate.instance.name,
            definition: candidate.def.name.clone(),
            is_static: candidate.def.is_static,
            props,
            components: candidate.components,
            resources,
        },
        children,
    })
}

// ---------------------------------------------------------------------------
// PreloadJob
// ---------------------------------------------------------------------------

enum JobStage {
    Resources(RequestId),
    Children(Box<PreloadJob>),
    Done,
}

/// A batch waiting on its resources and children.
pub struct PreloadJob {
    owner: String,
    depth: usize,
    batch: Vec<Gathered>,
    ready: Vec<PreparedEntity>,
    errors: Vec<FactoryError>,
    children: usize,
    stage: JobStage,
}

impl std::fmt::Debug for PreloadJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreloadJob")
            .field("owner", &self.owner)
            .field("depth", &self.depth)
            .field("waiting", &self.batch.len())
            .field("ready", &self.ready.len())
            .field("errors", &self.errors.len())
            .finish()
    }
}

impl PreloadJob {
    /// Nesting level; 0 for the instances passed to `preload`.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Advance without blocking. `defs` must be the definitions the job was
    /// started with.
    pub fn poll(
        &mut self,
        factory: &EntityFactory,
        defs: &LinkedEdf,
        resources: &mut ResourceManager,
    ) -> Poll<PreloadOutcome> {
        resources.poll();
        loop {
            match &mut self.stage {
                JobStage::Resources(request) => {
                    let request = *request;
                    let Some(outcome) = resources.take_outcome(request) else {
                        return Poll::Pending;
                    };
                    let mut children: Vec<String> = Vec::new();
                    for gathered in std::mem::take(&mut self.batch) {
                        let failed = gathered
                            .prepared
                            .resources
                            .iter()
                            .find_map(|url| outcome.failure(url).map(|e| (url, e)));
                        if let Some((url, reason)) = failed {
                            let error = FactoryError::ResourceFailed {
                                entity: gathered.prepared.name.clone(),
                                url: url.path().to_owned(),
                                loader: url.loader().to_owned(),
                                reason: reason.clone(),
                            };
                            tracing::warn!(%error, "entity dropped from batch");
                            self.errors.push(error);
                            continue;
                        }
                        for child in gathered.children {
                            if !children.iter().any(|c| c.eq_ignore_ascii_case(&child)) {
                                children.push(child);
                            }
                        }
                        self.ready.push(gathered.prepared);
                    }
                    self.stage = self.next_level(children, factory, defs, resources);
                }
                JobStage::Children(job) => match job.poll(factory, defs, resources) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(outcome) => {
                        self.children += outcome.ready.len() + outcome.children;
                        self.errors.extend(outcome.errors);
                        self.stage = JobStage::Done;
                    }
                },
                JobStage::Done => {
                    return Poll::Ready(PreloadOutcome {
                        ready: std::mem::take(&mut self.ready),
                        errors: std::mem::take(&mut self.errors),
                        children: self.children,
                    })
                }
            }
        }
    }

    fn next_level(
        &mut self,
        children: Vec<String>,
        factory: &EntityFactory,
        defs: &LinkedEdf,
        resources: &mut ResourceManager,
    ) -> JobStage {
        if children.is_empty() {
            return JobStage::Done;
        }
        let depth = self.depth + 1;
        let max = factory.config.max_child_depth;
        if depth > max {
            let error = FactoryError::ChildDepthExceeded { depth, max };
            tracing::warn!(%error, "child preloading stopped");
            self.errors.push(error);
            return JobStage::Done;
        }
        let instances = children.iter().map(|name| EntityInstance::new(name)).collect();
        JobStage::Children(Box::new(factory.preload_at(instances, defs, resources, &self.owner, depth)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
