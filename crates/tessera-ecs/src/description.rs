//! Declarative component requirements with field injection.
//!
//! A [`ComponentDescription`] lists what a component needs, one declaration
//! per field, and compiles into [`ComponentRequirements`] whose `before_init`
//! hook fills the fields in declaration order:
//!
//! | declaration     | field type                  | filled from                     |
//! |-----------------|-----------------------------|---------------------------------|
//! | `prop`          | `Injected<T>`               | parsed entity property          |
//! | `prop_optional` | `Injected<T>`               | property, left unset if absent  |
//! | `res`/`res_from`| `Injected<Arc<T>>`          | loaded resource                 |
//! | `cmp`           | `Injected<CmpRef<T>>`       | initialised sibling             |
//! | `cmp_optional`  | `Option<CmpRef<T>>`         | sibling, `None` if absent       |
//! | `link`          | `Injected<StaticRef<T>>`    | world statics (`$Name`)         |
//! | `link_global`   | `Injected<T>`               | global property                 |
//!
//! Every injected field must be unset on `C::default()`; compiling a
//! description whose default already carries a value fails with
//! [`RegistrationError::DefaultOnInjectedField`].
//!
//! # Example
//!
//! ```
//! use tessera_ecs::prelude::*;
//!
//! #[derive(Default)]
//! struct Position;
//! impl Component for Position {}
//! impl ComponentType for Position {
//!     const NAME: &'static str = "Position";
//! }
//!
//! #[derive(Default)]
//! struct Mover {
//!     speed: Injected<f64>,
//!     position: Injected<CmpRef<Position>>,
//! }
//! impl Component for Mover {}
//! impl ComponentType for Mover {
//!     const NAME: &'static str = "Mover";
//!
//!     fn description() -> Option<ComponentDescription<Self>> {
//!         Some(
//!             ComponentDescription::new()
//!                 .prop("speed", "number", |c: &mut Mover| &mut c.speed)
//!                 .cmp(|c: &mut Mover| &mut c.position),
//!         )
//!     }
//! }
//!
//! let mut manager = ComponentManager::new();
//! manager.register::<Position>().unwrap();
//! manager.register::<Mover>().unwrap();
//! let requirements = manager.requirements("Mover").unwrap();
//! assert_eq!(requirements.cmps, vec!["Position"]);
//! ```

use std::any::Any;
use std::sync::Arc;

use serde_json::Value;

use crate::component::{
    CmpRef, Component, ComponentRequirements, ComponentType, InitError, Injected, StaticRef,
};
use crate::context::EntityCtx;
use crate::parsers::PropertyInfo;
use crate::property::{FromProperty, PropertyMap, PropertyValue};
use crate::resource::ResourceUrl;
use crate::RegistrationError;

type Injector<C> = Box<dyn Fn(&mut C, &mut EntityCtx<'_>) -> Result<(), InitError> + Send + Sync>;
type Probe<C> = Box<dyn Fn(&mut C) -> bool + Send + Sync>;
type UrlOf = Arc<dyn Fn(&PropertyMap) -> Option<Value> + Send + Sync>;
type ChildrenOf = Box<dyn Fn(&PropertyMap) -> Vec<String> + Send + Sync>;

/// Builder for a component's requirements and injection steps.
pub struct ComponentDescription<C> {
    props: Vec<PropertyInfo>,
    cmps: Vec<String>,
    cmps_optional: Vec<String>,
    resources: Vec<UrlOf>,
    children: Vec<ChildrenOf>,
    injectors: Vec<Injector<C>>,
    /// Field label and a check that the field is unset.
    probes: Vec<(String, Probe<C>)>,
}

impl<C> Default for ComponentDescription<C> {
    fn default() -> Self {
        Self {
            props: Vec::new(),
            cmps: Vec::new(),
            cmps_optional: Vec::new(),
            resources: Vec::new(),
            children: Vec::new(),
            injectors: Vec::new(),
            probes: Vec::new(),
        }
    }
}

impl<C> std::fmt::Debug for ComponentDescription<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentDescription")
            .field("props", &self.props)
            .field("cmps", &self.cmps)
            .field("cmps_optional", &self.cmps_optional)
            .field("resources", &self.resources.len())
            .field("injections", &self.injectors.len())
            .finish()
    }
}

fn convert<T: FromProperty>(key: &str, value: &PropertyValue) -> Result<T, InitError> {
    T::from_property(value).ok_or_else(|| {
        InitError::new(format!(
            "property '{key}' cannot be read as {}",
            std::any::type_name::<T>()
        ))
    })
}

impl<C: ComponentType> ComponentDescription<C> {
    pub fn new() -> Self {
        Self::default()
    }

    fn probe(mut self, label: String, probe: Probe<C>) -> Self {
        self.probes.push((label, probe));
        self
    }

    /// A required property parsed with `type_id`.
    pub fn prop<T>(mut self, name: &str, type_id: &str, field: fn(&mut C) -> &mut Injected<T>) -> Self
    where
        T: FromProperty + 'static,
    {
        self.props.push(PropertyInfo::required(name, type_id));
        let key = name.to_owned();
        self.injectors.push(Box::new(move |c, ctx| {
            let value = ctx
                .props()
                .get(&key)
                .ok_or_else(|| InitError::new(format!("missing required property '{key}'")))?;
            field(c).set(convert(&key, value)?);
            Ok(())
        }));
        self.probe(name.to_owned(), Box::new(move |c| field(c).is_set()))
    }

    /// An optional property with a raw default.
    pub fn prop_optional<T>(
        mut self,
        name: &str,
        type_id: &str,
        default: Value,
        field: fn(&mut C) -> &mut Injected<T>,
    ) -> Self
    where
        T: FromProperty + 'static,
    {
        self.props
            .push(PropertyInfo::optional(name, type_id, Some(default)));
        let key = name.to_owned();
        self.injectors.push(Box::new(move |c, ctx| {
            if let Some(value) = ctx.props().get(&key) {
                field(c).set(convert(&key, value)?);
            }
            Ok(())
        }));
        self.probe(name.to_owned(), Box::new(move |c| field(c).is_set()))
    }

    fn res_with<T>(mut self, label: String, url_of: UrlOf, field: fn(&mut C) -> &mut Injected<Arc<T>>) -> Self
    where
        T: Any + Send + Sync,
    {
        self.resources.push(Arc::clone(&url_of));
        self.injectors.push(Box::new(move |c, ctx| {
            let raw = url_of(ctx.props())
                .ok_or_else(|| InitError::new("resource url property is missing"))?;
            let url = ResourceUrl::from_json(&raw).map_err(|e| InitError::new(e.to_string()))?;
            let resource = ctx.resource_typed::<T>(&url).ok_or_else(|| {
                InitError::new(format!("required resource '{url}' is not loaded"))
            })?;
            field(c).set(resource);
            Ok(())
        }));
        self.probe(label, Box::new(move |c| field(c).is_set()))
    }

    /// A resource at a fixed URL.
    pub fn res<T>(self, url: &str, field: fn(&mut C) -> &mut Injected<Arc<T>>) -> Self
    where
        T: Any + Send + Sync,
    {
        let raw = Value::String(url.to_owned());
        self.res_with(url.to_owned(), Arc::new(move |_| Some(raw.clone())), field)
    }

    /// A resource whose path is the string property `prop`.
    pub fn res_from<T>(self, loader: &str, prop: &str, field: fn(&mut C) -> &mut Injected<Arc<T>>) -> Self
    where
        T: Any + Send + Sync,
    {
        let loader = loader.to_owned();
        let key = prop.to_owned();
        let url_of: UrlOf = Arc::new(move |props| {
            props
                .get_str(&key)
                .map(|path| Value::String(format!("{loader}:{path}")))
        });
        self.res_with(format!("{prop} resource"), url_of, field)
    }

    /// A required sibling, which must come earlier in the component list.
    pub fn cmp<T: ComponentType>(mut self, field: fn(&mut C) -> &mut Injected<CmpRef<T>>) -> Self {
        self.cmps.push(T::NAME.to_owned());
        self.injectors.push(Box::new(move |c, ctx| {
            let found = ctx.cmp_ref::<T>().ok_or_else(|| {
                InitError::new(format!(
                    "required component '{}' is missing or not initialised",
                    T::NAME
                ))
            })?;
            field(c).set(found);
            Ok(())
        }));
        self.probe(T::NAME.to_owned(), Box::new(move |c| field(c).is_set()))
    }

    /// An optional sibling.
    pub fn cmp_optional<T: ComponentType>(
        mut self,
        field: fn(&mut C) -> &mut Option<CmpRef<T>>,
    ) -> Self {
        self.cmps_optional.push(T::NAME.to_owned());
        self.injectors.push(Box::new(move |c, ctx| {
            *field(c) = ctx.cmp_ref::<T>();
            Ok(())
        }));
        self.probe(T::NAME.to_owned(), Box::new(move |c| field(c).is_some()))
    }

    /// Preload definition `name` along with the entity.
    pub fn child(mut self, name: &str) -> Self {
        let name = name.to_owned();
        self.children.push(Box::new(move |_| vec![name.clone()]));
        self
    }

    /// Preload the definitions named by list or string property `prop`.
    pub fn children_from(mut self, prop: &str) -> Self {
        let key = prop.to_owned();
        self.children.push(Box::new(move |props| match props.get(&key) {
            Some(PropertyValue::List(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_owned))
                .collect(),
            Some(PropertyValue::String(s)) => vec![s.clone()],
            _ => Vec::new(),
        }));
        self
    }

    /// A component published by a static entity of the same world.
    pub fn link<T: ComponentType>(mut self, field: fn(&mut C) -> &mut Injected<StaticRef<T>>) -> Self {
        self.injectors.push(Box::new(move |c, ctx| {
            let found = ctx
                .static_ref::<T>()
                .ok_or_else(|| InitError::new(format!("static '${}' not found", T::NAME)))?;
            field(c).set(found);
            Ok(())
        }));
        self.probe(format!("${}", T::NAME), Box::new(move |c| field(c).is_set()))
    }

    /// A global property.
    pub fn link_global<T>(mut self, key: &str, field: fn(&mut C) -> &mut Injected<T>) -> Self
    where
        T: FromProperty + 'static,
    {
        let key = key.to_owned();
        let label = format!("global {key}");
        self.injectors.push(Box::new(move |c, ctx| {
            let value = ctx
                .global(&key)
                .ok_or_else(|| InitError::new(format!("global '{key}' not found")))?;
            field(c).set(convert(&key, &value)?);
            Ok(())
        }));
        self.probe(label, Box::new(move |c| field(c).is_set()))
    }

    /// Validate against `C::default()` and produce the requirements.
    pub fn compile(self) -> Result<ComponentRequirements, RegistrationError> {
        let mut fresh = C::default();
        for (label, is_set) in &self.probes {
            if is_set(&mut fresh) {
                return Err(RegistrationError::DefaultOnInjectedField {
                    component: C::NAME.to_owned(),
                    field: label.clone(),
                });
            }
        }

        let mut requirements = ComponentRequirements {
            props: self.props,
            cmps: self.cmps,
            cmps_optional: self.cmps_optional,
            ..ComponentRequirements::default()
        };

        if !self.resources.is_empty() {
            let resources = self.resources;
            requirements.res = Some(Arc::new(move |props: &PropertyMap| {
                resources.iter().filter_map(|f| f(props)).collect()
            }));
        }
        if !self.children.is_empty() {
            let children = self.children;
            requirements.children = Some(Arc::new(move |props: &PropertyMap| {
                children.iter().flat_map(|f| f(props)).collect()
            }));
        }
        if !self.injectors.is_empty() {
            let injectors = self.injectors;
            requirements.before_init = Some(Arc::new(
                move |component: &mut dyn Component, ctx: &mut EntityCtx<'_>| {
                    let c = component.as_any_mut().downcast_mut::<C>().ok_or_else(|| {
                        InitError::new(format!("component is not a {}", C::NAME))
                    })?;
                    for inject in &injectors {
                        inject(c, ctx)?;
                    }
                    Ok(())
                },
            ));
        }
        Ok(requirements)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct Target;
    impl Component for Target {}
    impl ComponentType for Target {
        const NAME: &'static str = "Target";
    }

    #[derive(Default)]
    struct Shooter {
        rate: Injected<f64>,
        sprite: Injected<Arc<String>>,
        target: Injected<CmpRef<Target>>,
        sound: Option<CmpRef<Target>>,
        score: Injected<StaticRef<Target>>,
        gravity: Injected<f64>,
    }
    impl Component for Shooter {}
    impl ComponentType for Shooter {
        const NAME: &'static str = "Shooter";
        fn description() -> Option<ComponentDescription<Self>> {
            Some(
                ComponentDescription::new()
                    .prop("rate", "number", |c: &mut Shooter| &mut c.rate)
                    .res_from("image", "sprite", |c: &mut Shooter| &mut c.sprite)
                    .cmp(|c: &mut Shooter| &mut c.target)
                    .cmp_optional(|c: &mut Shooter| &mut c.sound)
                    .link(|c: &mut Shooter| &mut c.score)
                    .link_global("gravity", |c: &mut Shooter| &mut c.gravity)
                    .child("Bullet")
                    .children_from("extras"),
            )
        }
    }

    struct Preset {
        rate: Injected<f64>,
    }
    impl Default for Preset {
        fn default() -> Self {
            Self {
                rate: Injected::new(3.0),
            }
        }
    }
    impl Component for Preset {}
    impl ComponentType for Preset {
        const NAME: &'static str = "Preset";
    }

    #[test]
    fn compile_collects_every_declaration() {
        let req = Shooter::description().unwrap().compile().unwrap();
        assert_eq!(req.props.len(), 1);
        assert_eq!(req.props[0].name, "rate");
        assert_eq!(req.cmps, vec!["Target"]);
        assert_eq!(req.cmps_optional, vec!["Target"]);
        assert!(req.before_init.is_some());

        let mut props = PropertyMap::new();
        props.insert("sprite", PropertyValue::from("ship.png"));
        props.insert(
            "extras",
            PropertyValue::List(vec!["Smoke".into(), "Spark".into()]),
        );
        assert_eq!(req.resources_for(&props), vec![json!("image:ship.png")]);
        assert_eq!(req.children_for(&props), vec!["Bullet", "Smoke", "Spark"]);
    }

    #[test]
    fn default_on_injected_field_is_rejected() {
        let err = ComponentDescription::<Preset>::new()
            .prop("rate", "number", |c: &mut Preset| &mut c.rate)
            .compile()
            .unwrap_err();
        assert_eq!(
            err,
            RegistrationError::DefaultOnInjectedField {
                component: "Preset".into(),
                field: "rate".into(),
            }
        );
    }

    #[test]
    fn empty_description_has_no_hooks() {
        let req = ComponentDescription::<Target>::new().compile().unwrap();
        assert!(req.before_init.is_none());
        assert!(req.res.is_none());
        assert!(req.children.is_none());
    }
}
