//! Registry of component types by name.

use std::collections::HashMap;
use std::sync::Arc;

use crate::component::{ComponentEntry, ComponentRequirements, ComponentType};
use crate::RegistrationError;

/// Maps the names used after `@` in definition files to component types.
///
/// Built once at startup, then frozen behind an `Arc` and shared by every
/// world's factory.
#[derive(Debug, Default)]
pub struct ComponentManager {
    entries: HashMap<String, Arc<ComponentEntry>>,
    order: Vec<String>,
}

impl ComponentManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` under [`ComponentType::NAME`].
    ///
    /// A second registration under the same name is ignored with a warning.
    pub fn register<T: ComponentType>(&mut self) -> Result<(), RegistrationError> {
        if self.entries.contains_key(T::NAME) {
            tracing::warn!(component = T::NAME, "component already registered; keeping the first");
            return Ok(());
        }
        let requirements = match (T::requirements(), T::description()) {
            (Some(_), Some(_)) => {
                return Err(RegistrationError::MixedRequirementStyles {
                    component: T::NAME.to_owned(),
                })
            }
            (Some(requirements), None) => requirements,
            (None, Some(description)) => description.compile()?,
            (None, None) => ComponentRequirements::default(),
        };
        tracing::debug!(
            component = T::NAME,
            props = requirements.props.len(),
            siblings = requirements.cmps.len(),
            "registered component"
        );
        self.entries.insert(
            T::NAME.to_owned(),
            Arc::new(ComponentEntry::of::<T>(requirements)),
        );
        self.order.push(T::NAME.to_owned());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<ComponentEntry>> {
        self.entries.get(name)
    }

    pub fn requirements(&self, name: &str) -> Option<&ComponentRequirements> {
        self.entries.get(name).map(|e| e.requirements())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Names in registration order.
    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn freeze(self) -> Arc<Self> {
        Arc::new(self)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
