//! Links parsed entries into [`LinkedEntityDefinition`]s.
//!
//! Definitions are linked in dependency order (parents, families and link
//! targets first). A definition that cannot be linked is reported to the sink
//! and excluded; every other definition still links. Anything depending on an
//! excluded definition fails in turn with the corresponding error.

use std::collections::HashMap;

use crate::chain::DependencyChain;
use crate::definition::{DefinitionKind, LinkedEdf, LinkedEntityDefinition, RawProperties};
use crate::parser::{EntryKind, PropertyLink, UnlinkedEntry};
use crate::sink::EdfErrorSink;
use crate::EdfError;

fn definition_kind(kind: EntryKind) -> DefinitionKind {
    match kind {
        EntryKind::PropertyGroup => DefinitionKind::Property,
        _ => DefinitionKind::Entity,
    }
}

fn resolve_link(
    owner: &str,
    link: &PropertyLink,
    linked: &HashMap<String, LinkedEntityDefinition>,
) -> Result<serde_json::Value, EdfError> {
    linked
        .get(&link.target.to_lowercase())
        .and_then(|d| d.properties.get(&link.property))
        .cloned()
        .ok_or_else(|| EdfError::UnresolvedLink {
            entity: owner.to_owned(),
            key: link.key.clone(),
            target: format!("{}.{}", link.target, link.property),
        })
}

fn link_one(
    entry: &UnlinkedEntry,
    known: &HashMap<String, &UnlinkedEntry>,
    linked: &HashMap<String, LinkedEntityDefinition>,
) -> Result<LinkedEntityDefinition, EdfError> {
    let kind = definition_kind(entry.kind);
    let mut components = entry.components.clone();
    let mut properties = RawProperties::new();

    if let Some(parent_name) = &entry.parent {
        let parent = linked.get(&parent_name.to_lowercase()).ok_or_else(|| {
            EdfError::UnknownParent {
                entity: entry.name.clone(),
                parent: parent_name.clone(),
            }
        })?;
        if parent.kind != kind {
            return Err(EdfError::TypeMismatch {
                entity: entry.name.clone(),
                reference: parent_name.clone(),
                reason: format!("parent is a {:?} definition", parent.kind).to_lowercase(),
            });
        }
        if !components.is_empty() {
            return Err(EdfError::ParentWithComponents {
                entity: entry.name.clone(),
            });
        }
        components = parent.components.clone();
        properties = parent.properties.clone();
    }

    for family in &entry.families {
        let key = family.to_lowercase();
        let Some(def) = linked.get(&key) else {
            return Err(match known.get(&key) {
                Some(e) if e.kind != EntryKind::PropertyGroup => EdfError::TypeMismatch {
                    entity: entry.name.clone(),
                    reference: family.clone(),
                    reason: "family is not a property family".to_owned(),
                },
                _ => EdfError::UnknownFamily {
                    entity: entry.name.clone(),
                    family: family.clone(),
                },
            });
        };
        if def.kind != DefinitionKind::Property {
            return Err(EdfError::TypeMismatch {
                entity: entry.name.clone(),
                reference: family.clone(),
                reason: "family is not a property family".to_owned(),
            });
        }
        properties.extend(def.properties.clone());
    }

    properties.extend(entry.properties.clone());
    for link in &entry.links {
        let value = resolve_link(&entry.name, link, linked)?;
        properties.insert(link.key.clone(), value);
    }

    Ok(LinkedEntityDefinition {
        name: entry.name.clone(),
        kind,
        is_static: entry.kind == EntryKind::InstanceEntity,
        components,
        properties,
        static_deps: entry.static_deps.clone(),
        file: entry.file.clone(),
    })
}

/// Link `entries` (already concatenated in file dependency order).
pub fn link(entries: &[UnlinkedEntry], sink: &mut dyn EdfErrorSink) -> LinkedEdf {
    let mut out = LinkedEdf::default();
    let mut known: HashMap<String, &UnlinkedEntry> = HashMap::new();
    let mut chain = DependencyChain::new();
    let mut global_entries = Vec::new();

    for entry in entries {
        match entry.kind {
            EntryKind::GlobalProps => global_entries.push(entry),
            EntryKind::Require => {}
            _ => {
                let key = entry.name.to_lowercase();
                if known.contains_key(&key) {
                    sink.report(EdfError::DuplicateDefinition {
                        name: entry.name.clone(),
                        file: entry.file.clone(),
                    });
                    continue;
                }
                known.insert(key.clone(), entry);
                chain.add_node(key);
            }
        }
    }

    for (key, entry) in &known {
        let refs = entry
            .parent
            .iter()
            .chain(entry.families.iter())
            .chain(entry.links.iter().map(|l| &l.target));
        for r in refs {
            let r = r.to_lowercase();
            if known.contains_key(&r) {
                chain.connect_ab(key.clone(), r);
            }
        }
    }

    let resolution = chain.resolve();
    if !resolution.is_complete() {
        sink.report(EdfError::CyclicDefinition {
            names: resolution
                .unresolved
                .iter()
                .map(|k| known[k].name.clone())
                .collect(),
        });
    }

    for key in resolution.ordered {
        let entry = known[&key];
        match link_one(entry, &known, &out.definitions) {
            Ok(def) => {
                out.link_order.push(key.clone());
                out.definitions.insert(key, def);
            }
            Err(error) => sink.report(error),
        }
    }

    for entry in global_entries {
        out.globals.extend(entry.properties.clone());
        for link in &entry.links {
            match resolve_link("*", link, &out.definitions) {
                Ok(value) => {
                    out.globals.insert(link.key.clone(), value);
                }
                Err(error) => sink.report(error),
            }
        }
    }

    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
