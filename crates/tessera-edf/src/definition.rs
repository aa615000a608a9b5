//! Linked entity definitions.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::chain::DependencyChain;
use crate::EdfError;

/// Unparsed property values keyed by property name.
pub type RawProperties = BTreeMap<String, serde_json::Value>;

/// What a linked definition can be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefinitionKind {
    /// Instantiable entity template.
    Entity,
    /// Property family; only usable as a mixin.
    Property,
}

/// A definition with inheritance, families and links fully resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedEntityDefinition {
    pub name: String,
    pub kind: DefinitionKind,
    pub is_static: bool,
    /// Component type names in declaration order, inherited ones included.
    pub components: Vec<String>,
    /// Parent, family and own properties merged; links resolved.
    pub properties: RawProperties,
    /// Static entities that must be started before this one.
    pub static_deps: Vec<String>,
    pub file: String,
}

/// The linked contents of a file set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkedEdf {
    /// Definitions keyed by lowercase name.
    pub definitions: HashMap<String, LinkedEntityDefinition>,
    /// Merged `[*]` blocks.
    pub globals: RawProperties,
    /// Lowercase names in the order they were linked.
    pub link_order: Vec<String>,
    /// Files that contributed entries, dependencies first.
    pub files: Vec<String>,
}

impl LinkedEdf {
    /// Case-insensitive lookup.
    pub fn get(&self, name: &str) -> Option<&LinkedEntityDefinition> {
        self.definitions.get(&name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Static definitions in link order.
    pub fn statics(&self) -> impl Iterator<Item = &LinkedEntityDefinition> {
        self.link_order
            .iter()
            .filter_map(|n| self.definitions.get(n))
            .filter(|d| d.is_static)
    }

    /// Lowercase names of static definitions ordered so that every `->dep`
    /// is started before its dependents.
    pub fn static_start_order(&self) -> Result<Vec<String>, EdfError> {
        let mut chain = DependencyChain::new();
        for def in self.statics() {
            let key = def.name.to_lowercase();
            chain.add_node(key.clone());
            for dep in &def.static_deps {
                let dep_key = dep.to_lowercase();
                match self.definitions.get(&dep_key) {
                    Some(d) if d.is_static => chain.connect_ab(key.clone(), dep_key),
                    _ => {
                        return Err(EdfError::UnknownStaticDependency {
                            entity: def.name.clone(),
                            dependency: dep.clone(),
                        })
                    }
                }
            }
        }
        chain
            .resolve_chain_to_list()
            .ok_or_else(|| EdfError::CyclicDefinition {
                names: chain.resolve().unresolved,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn static_def(name: &str, deps: &[&str]) -> LinkedEntityDefinition {
        LinkedEntityDefinition {
            name: name.to_owned(),
            kind: DefinitionKind::Entity,
            is_static: true,
            components: vec!["C".to_owned()],
            properties: RawProperties::new(),
            static_deps: deps.iter().map(|d| d.to_string()).collect(),
            file: "t".to_owned(),
        }
    }

    fn edf(defs: Vec<LinkedEntityDefinition>) -> LinkedEdf {
        let mut out = LinkedEdf::default();
        for d in defs {
            let key = d.name.to_lowercase();
            out.link_order.push(key.clone());
            out.definitions.insert(key, d);
        }
        out
    }

    #[test]
    fn static_order_respects_dependencies() {
        let linked = edf(vec![static_def("Hud", &["Camera"]), static_def("Camera", &[])]);
        assert_eq!(linked.static_start_order().unwrap(), vec!["camera", "hud"]);
    }

    #[test]
    fn static_cycle_is_an_error() {
        let linked = edf(vec![static_def("A", &["B"]), static_def("B", &["A"])]);
        assert!(matches!(
            linked.static_start_order(),
            Err(EdfError::CyclicDefinition { .. })
        ));
    }

    #[test]
    fn unknown_static_dependency_is_an_error() {
        let linked = edf(vec![static_def("A", &["Missing"])]);
        assert!(matches!(
            linked.static_start_order(),
            Err(EdfError::UnknownStaticDependency { .. })
        ));
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let linked = edf(vec![static_def("Camera", &[])]);
        assert!(linked.get("CAMERA").is_some());
    }
}
