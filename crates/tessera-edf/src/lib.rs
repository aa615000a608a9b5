//! Tessera EDF -- the entity definition format and its asynchronous loader.
//!
//! Definition files describe entities as a named set of components plus a
//! property map. Definitions may inherit from a parent, mix in property
//! families, link single properties from other definitions and name static
//! dependencies. This crate parses the text, links every definition into a
//! flat [`LinkedEntityDefinition`](definition::LinkedEntityDefinition) and
//! follows `[$require]` lists across files.
//!
//! # Quick Start
//!
//! ```
//! use tessera_edf::prelude::*;
//!
//! let source = MemoryTextSource::new()
//!     .with_file("main.edf", "[Enemy]\n@Transform\n@Sprite\nhp = 3\n\n[Boss(Enemy)]\nhp = 30\n");
//! let mut sink = CollectingSink::new();
//! let linked = load_blocking("main.edf", &source, &mut sink).unwrap();
//!
//! let boss = linked.get("Boss").unwrap();
//! assert_eq!(boss.components, vec!["Transform", "Sprite"]);
//! assert_eq!(boss.properties["hp"], 30);
//! ```

#![deny(unsafe_code)]

pub mod chain;
pub mod definition;
pub mod linker;
pub mod loader;
pub mod markup;
pub mod parser;
pub mod sink;
pub mod source;
pub mod task;

use task::LoadError;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced while parsing, linking or loading definitions.
///
/// Most of these are reported to an [`EdfErrorSink`](sink::EdfErrorSink) and
/// exclude a single entry or definition; only a missing start file and a
/// require cycle fail a whole load.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EdfError {
    /// A `[...]` header line that does not follow the header grammar.
    #[error("{file}:{line}: malformed header '{header}': {reason}")]
    MalformedHeader {
        file: String,
        line: usize,
        header: String,
        reason: String,
    },

    /// A second `[$require]` block in the same file.
    #[error("{file}:{line}: only one [$require] block is allowed per file")]
    DuplicateRequire { file: String, line: usize },

    /// A `@Component` line after the first property of an entry.
    #[error("{file}:{line}: component '{component}' of '{entry}' listed after a property")]
    ComponentAfterProperty {
        file: String,
        line: usize,
        entry: String,
        component: String,
    },

    /// Components listed in a property family or the globals block.
    #[error("{file}:{line}: '{entry}' may not list components")]
    ComponentNotAllowed {
        file: String,
        line: usize,
        entry: String,
    },

    /// A multi-line value that reaches end of file before its terminator.
    #[error("{file}:{line}: value of '{key}' is never terminated")]
    UnterminatedBlock {
        file: String,
        line: usize,
        key: String,
    },

    /// A `$key = Target.property` line that does not parse.
    #[error("{file}:{line}: malformed property link '{text}'")]
    BadPropertyLink {
        file: String,
        line: usize,
        text: String,
    },

    /// A line that is neither header, component, property nor link.
    #[error("{file}:{line}: cannot parse '{text}'")]
    MalformedLine {
        file: String,
        line: usize,
        text: String,
    },

    /// A multi-line JSON value that does not parse.
    #[error("{file}:{line}: invalid value for '{key}': {reason}")]
    InvalidValue {
        file: String,
        line: usize,
        key: String,
        reason: String,
    },

    /// A file could not be fetched.
    #[error("cannot load '{file}': {reason}")]
    MissingFile { file: String, reason: LoadError },

    /// Files that require each other.
    #[error("files require each other: [{}]", files.join(", "))]
    CyclicRequire { files: Vec<String> },

    /// The parent named in a header is not defined.
    #[error("'{entity}' inherits from unknown definition '{parent}'")]
    UnknownParent { entity: String, parent: String },

    /// A family named in a header is not defined.
    #[error("'{entity}' uses unknown property family '{family}'")]
    UnknownFamily { entity: String, family: String },

    /// A parent or family of the wrong definition kind.
    #[error("'{entity}' cannot use '{reference}': {reason}")]
    TypeMismatch {
        entity: String,
        reference: String,
        reason: String,
    },

    /// An entity with a parent that also lists its own components.
    #[error("'{entity}' has a parent and may not list its own components")]
    ParentWithComponents { entity: String },

    /// A property link whose target or property does not exist.
    #[error("'{entity}' links '{key}' to missing '{target}'")]
    UnresolvedLink {
        entity: String,
        key: String,
        target: String,
    },

    /// Definitions that inherit, mix in or link each other in a loop.
    #[error("definitions depend on each other: [{}]", names.join(", "))]
    CyclicDefinition { names: Vec<String> },

    /// A definition name used twice. The first definition wins.
    #[error("'{name}' is already defined (second definition in '{file}')")]
    DuplicateDefinition { name: String, file: String },

    /// A static dependency naming a definition that is not a static entity.
    #[error("static '{entity}' depends on '{dependency}', which is not a static entity")]
    UnknownStaticDependency { entity: String, dependency: String },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::chain::{ChainResolution, DependencyChain};
    pub use crate::definition::{DefinitionKind, LinkedEdf, LinkedEntityDefinition, RawProperties};
    pub use crate::linker::link;
    pub use crate::loader::{load_blocking, resolve_path, EdfLoadJob};
    pub use crate::parser::{parse_edf, EdfParser, EntryKind, ParsedEdf, UnlinkedEntry};
    pub use crate::sink::{CollectingSink, EdfErrorSink, TracingSink};
    pub use crate::source::{MemoryTextSource, TextSource};
    pub use crate::task::{Completer, LoadError, Pending, DEFAULT_TIMEOUT};
    pub use crate::EdfError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    #[test]
    fn errors_render_with_location() {
        let err = EdfError::MalformedLine {
            file: "a.edf".into(),
            line: 7,
            text: "???".into(),
        };
        assert_eq!(err.to_string(), "a.edf:7: cannot parse '???'");

        let err = EdfError::CyclicRequire {
            files: vec!["a.edf".into(), "b.edf".into()],
        };
        assert_eq!(err.to_string(), "files require each other: [a.edf, b.edf]");
    }

    #[test]
    fn full_pipeline_with_families_links_and_statics() {
        let source = MemoryTextSource::new()
            .with_file(
                "game.edf",
                "[$require]\nshared.edf\n\n[!Score]\n@Counter\nvalue = 0\n\n[Coin:Pickup]\n@Sprite\n$worth = Score.value\n",
            )
            .with_file("shared.edf", "[*Pickup]\nradius = 4\nsound = \"ding\"\n");
        let mut sink = CollectingSink::new();
        let linked = load_blocking("game.edf", &source, &mut sink).unwrap();
        assert!(sink.is_empty(), "{:?}", sink.errors);

        let coin = linked.get("coin").unwrap();
        assert_eq!(coin.properties["radius"], 4);
        assert_eq!(coin.properties["sound"], "ding");
        assert_eq!(coin.properties["worth"], 0);

        let statics: Vec<_> = linked.statics().map(|d| d.name.as_str()).collect();
        assert_eq!(statics, vec!["Score"]);
    }

    #[test]
    fn partial_failure_keeps_the_rest() {
        let text = "[Good]\n@A\n\n[Bad(Missing)]\n\n[AlsoGood]\n@B\n";
        let source = MemoryTextSource::new().with_file("m.edf", text);
        let mut sink = CollectingSink::new();
        let linked = load_blocking("m.edf", &source, &mut sink).unwrap();
        assert!(linked.get("good").is_some());
        assert!(linked.get("alsogood").is_some());
        assert!(linked.get("bad").is_none());
        assert_eq!(sink.errors.len(), 1);
    }
}
