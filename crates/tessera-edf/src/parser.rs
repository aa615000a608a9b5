//! Line-oriented parser for entity definition files.
//!
//! A file is a sequence of blocks, each opened by a header line:
//!
//! | header                 | entry kind                                 |
//! |------------------------|--------------------------------------------|
//! | `[name]`               | entity definition                          |
//! | `[!name]`              | static entity, instantiated on world start |
//! | `[*name]`              | property family                            |
//! | `[name(parent)]`       | inherits components and properties         |
//! | `[name:fam1,fam2]`     | mixes in property families                 |
//! | `[!name->dep1,dep2]`   | static entity started after `dep1`, `dep2` |
//! | `[*]`                  | anonymous global-properties block          |
//! | `[$require]`           | list of files to load first                |
//!
//! Body lines are `@Component` references (only before the first property),
//! `key = value` properties, `$key = other.prop` property links, or the start
//! of a multi-line value. A value of `"` starts a string closed by a `"` line,
//! `"[` starts a JSON array closed by `]"` and `"{` a JSON object closed by
//! `}"`. Single-line values are read as JSON when they parse as JSON and as
//! plain strings otherwise. Lines starting with `#` or `//` are comments.
//!
//! Errors go to an [`EdfErrorSink`] and parsing continues with the next block,
//! unless the parser was built with [`EdfParser::throws`], in which case the
//! first error is returned.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::definition::RawProperties;
use crate::sink::{EdfErrorSink, TracingSink};
use crate::EdfError;

// ---------------------------------------------------------------------------
// Entry types
// ---------------------------------------------------------------------------

/// Classification of a parsed block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    GlobalProps,
    PropertyGroup,
    Entity,
    InstanceEntity,
    Require,
}

/// `$key = target.property`, resolved by the linker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyLink {
    pub key: String,
    pub target: String,
    pub property: String,
}

/// One block of a definition file, before cross-file linking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnlinkedEntry {
    pub kind: EntryKind,
    /// Name as written; lookups are case-insensitive.
    pub name: String,
    pub parent: Option<String>,
    pub families: Vec<String>,
    pub static_deps: Vec<String>,
    pub components: Vec<String>,
    pub properties: RawProperties,
    pub links: Vec<PropertyLink>,
    /// Listed files, for [`EntryKind::Require`] only.
    pub files: Vec<String>,
    /// File the block came from.
    pub file: String,
    /// 1-based line of the header.
    pub line: usize,
}

impl UnlinkedEntry {
    fn new(header: Header, file: &str, line: usize) -> Self {
        Self {
            kind: header.kind,
            name: header.name,
            parent: header.parent,
            families: header.families,
            static_deps: header.static_deps,
            components: Vec::new(),
            properties: RawProperties::new(),
            links: Vec::new(),
            files: Vec::new(),
            file: file.to_owned(),
            line,
        }
    }

    fn has_properties(&self) -> bool {
        !self.properties.is_empty() || !self.links.is_empty()
    }
}

/// Parser output for a single file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedEdf {
    pub file: String,
    /// Blocks in file order, excluding the `[$require]` block.
    pub entries: Vec<UnlinkedEntry>,
    /// The `[$require]` block, if present.
    pub required: Option<UnlinkedEntry>,
}

impl ParsedEdf {
    /// Files listed in `[$require]`, as written.
    pub fn required_files(&self) -> &[String] {
        self.required
            .as_ref()
            .map(|r| r.files.as_slice())
            .unwrap_or(&[])
    }
}

// ---------------------------------------------------------------------------
// Header grammar
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Header {
    kind: EntryKind,
    name: String,
    parent: Option<String>,
    families: Vec<String>,
    static_deps: Vec<String>,
}

pub(crate) fn is_valid_name(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn is_valid_key(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
}

fn split_list(list: &str, what: &str) -> Result<Vec<String>, String> {
    list.split(',')
        .map(str::trim)
        .map(|item| {
            if is_valid_name(item) {
                Ok(item.to_owned())
            } else {
                Err(format!("invalid {what} name '{item}'"))
            }
        })
        .collect()
}

fn parse_header(line: &str) -> Result<Header, String> {
    let inner = line
        .strip_prefix('[')
        .and_then(|l| l.strip_suffix(']'))
        .ok_or_else(|| "header must be enclosed in '[' and ']'".to_owned())?
        .trim();

    let bare = |kind: EntryKind| Header {
        kind,
        name: inner.to_owned(),
        parent: None,
        families: Vec::new(),
        static_deps: Vec::new(),
    };
    match inner {
        "*" => return Ok(bare(EntryKind::GlobalProps)),
        "$require" => return Ok(bare(EntryKind::Require)),
        _ => {}
    }

    let (kind, rest) = if let Some(rest) = inner.strip_prefix('!') {
        (EntryKind::InstanceEntity, rest)
    } else if let Some(rest) = inner.strip_prefix('*') {
        (EntryKind::PropertyGroup, rest)
    } else {
        (EntryKind::Entity, inner)
    };

    let (rest, static_deps) = match rest.split_once("->") {
        Some((head, deps)) => (head, split_list(deps, "dependency")?),
        None => (rest, Vec::new()),
    };
    if kind == EntryKind::PropertyGroup && !static_deps.is_empty() {
        return Err("property families cannot declare dependencies".to_owned());
    }

    let (rest, families) = match rest.split_once(':') {
        Some((head, fams)) => (head, split_list(fams, "family")?),
        None => (rest, Vec::new()),
    };

    let (name, parent) = match rest.find('(') {
        Some(open) => {
            let parent = rest[open + 1..]
                .strip_suffix(')')
                .ok_or_else(|| "unterminated parent reference".to_owned())?
                .trim();
            if !is_valid_name(parent) {
                return Err(format!("invalid parent name '{parent}'"));
            }
            (rest[..open].trim(), Some(parent.to_owned()))
        }
        None => (rest.trim(), None),
    };
    if !is_valid_name(name) {
        return Err(format!("invalid entry name '{name}'"));
    }

    Ok(Header {
        kind,
        name: name.to_owned(),
        parent,
        families,
        static_deps,
    })
}

/// Read a single-line value: JSON when it parses, a plain string otherwise.
fn scalar_value(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_owned()))
}

/// Multi-line block sentinels: opening value, closing line, JSON wrapper.
fn block_terminator(value: &str) -> Option<(&'static str, Option<(&'static str, &'static str)>)> {
    match value {
        "\"" => Some(("\"", None)),
        "\"[" => Some(("]\"", Some(("[", "]")))),
        "\"{" => Some(("}\"", Some(("{", "}")))),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// EdfParser
// ---------------------------------------------------------------------------

/// Parses the text of one definition file.
pub struct EdfParser<'s> {
    sink: &'s mut dyn EdfErrorSink,
    throws: bool,
}

impl<'s> EdfParser<'s> {
    pub fn new(sink: &'s mut dyn EdfErrorSink) -> Self {
        Self {
            sink,
            throws: false,
        }
    }

    /// Abort on the first error instead of reporting and continuing.
    pub fn throws(mut self, throws: bool) -> Self {
        self.throws = throws;
        self
    }

    fn fail(&mut self, error: EdfError) -> Result<(), EdfError> {
        if self.throws {
            Err(error)
        } else {
            self.sink.report(error);
            Ok(())
        }
    }

    fn finish(out: &mut ParsedEdf, entry: Option<UnlinkedEntry>) {
        if let Some(entry) = entry {
            if entry.kind == EntryKind::Require {
                out.required = Some(entry);
            } else {
                out.entries.push(entry);
            }
        }
    }

    /// Parse `text`, attributing errors to `file`.
    pub fn parse(&mut self, file: &str, text: &str) -> Result<ParsedEdf, EdfError> {
        let mut out = ParsedEdf {
            file: file.to_owned(),
            entries: Vec::new(),
            required: None,
        };
        let lines: Vec<&str> = text.lines().collect();
        let mut current: Option<UnlinkedEntry> = None;
        let mut skipping = false;
        let mut i = 0;

        while i < lines.len() {
            let line_no = i + 1;
            let line = lines[i].trim();
            i += 1;

            if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
                continue;
            }

            if line.starts_with('[') {
                Self::finish(&mut out, current.take());
                skipping = false;
                match parse_header(line) {
                    Ok(header) => {
                        let seen_require = out.required.is_some();
                        if header.kind == EntryKind::Require && seen_require {
                            self.fail(EdfError::DuplicateRequire {
                                file: file.to_owned(),
                                line: line_no,
                            })?;
                            skipping = true;
                        } else {
                            current = Some(UnlinkedEntry::new(header, file, line_no));
                        }
                    }
                    Err(reason) => {
                        self.fail(EdfError::MalformedHeader {
                            file: file.to_owned(),
                            line: line_no,
                            header: line.to_owned(),
                            reason,
                        })?;
                        skipping = true;
                    }
                }
                continue;
            }

            if skipping {
                continue;
            }
            let Some(entry) = current.as_mut() else {
                self.fail(EdfError::MalformedLine {
                    file: file.to_owned(),
                    line: line_no,
                    text: line.to_owned(),
                })?;
                continue;
            };

            if entry.kind == EntryKind::Require {
                entry.files.push(line.trim_matches('"').to_owned());
                continue;
            }

            if let Some(component) = line.strip_prefix('@') {
                let component = component.trim();
                if matches!(entry.kind, EntryKind::GlobalProps | EntryKind::PropertyGroup) {
                    self.fail(EdfError::ComponentNotAllowed {
                        file: file.to_owned(),
                        line: line_no,
                        entry: entry.name.clone(),
                    })?;
                } else if entry.has_properties() {
                    self.fail(EdfError::ComponentAfterProperty {
                        file: file.to_owned(),
                        line: line_no,
                        entry: entry.name.clone(),
                        component: component.to_owned(),
                    })?;
                } else if !is_valid_name(component) {
                    self.fail(EdfError::MalformedLine {
                        file: file.to_owned(),
                        line: line_no,
                        text: line.to_owned(),
                    })?;
                } else {
                    entry.components.push(component.to_owned());
                }
                continue;
            }

            if let Some(rest) = line.strip_prefix('$') {
                match parse_link(rest) {
                    Some(link) => entry.links.push(link),
                    None => self.fail(EdfError::BadPropertyLink {
                        file: file.to_owned(),
                        line: line_no,
                        text: line.to_owned(),
                    })?,
                }
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                self.fail(EdfError::MalformedLine {
                    file: file.to_owned(),
                    line: line_no,
                    text: line.to_owned(),
                })?;
                continue;
            };
            let key = key.trim();
            let value = value.trim();
            if !is_valid_key(key) {
                self.fail(EdfError::MalformedLine {
                    file: file.to_owned(),
                    line: line_no,
                    text: line.to_owned(),
                })?;
                continue;
            }

            let Some((terminator, wrap)) = block_terminator(value) else {
                entry.properties.insert(key.to_owned(), scalar_value(value));
                continue;
            };

            let mut body = Vec::new();
            let mut closed = false;
            while i < lines.len() {
                let raw = lines[i];
                i += 1;
                if raw.trim() == terminator {
                    closed = true;
                    break;
                }
                body.push(raw);
            }
            if !closed {
                self.fail(EdfError::UnterminatedBlock {
                    file: file.to_owned(),
                    line: line_no,
                    key: key.to_owned(),
                })?;
                continue;
            }

            let body = body.join("\n");
            match wrap {
                None => {
                    entry.properties.insert(key.to_owned(), Value::String(body));
                }
                Some((open, close)) => {
                    match serde_json::from_str::<Value>(&format!("{open}{body}{close}")) {
                        Ok(v) => {
                            entry.properties.insert(key.to_owned(), v);
                        }
                        Err(e) => self.fail(EdfError::InvalidValue {
                            file: file.to_owned(),
                            line: line_no,
                            key: key.to_owned(),
                            reason: e.to_string(),
                        })?,
                    }
                }
            }
        }

        Self::finish(&mut out, current.take());
        Ok(out)
    }
}

fn parse_link(rest: &str) -> Option<PropertyLink> {
    let (key, value) = rest.split_once('=')?;
    let key = key.trim();
    let (target, property) = value.trim().split_once('.')?;
    let (target, property) = (target.trim(), property.trim());
    if !is_valid_key(key) || !is_valid_name(target) || !is_valid_key(property) {
        return None;
    }
    Some(PropertyLink {
        key: key.to_owned(),
        target: target.to_owned(),
        property: property.to_owned(),
    })
}

/// Parse `text` strictly: the first error is returned.
pub fn parse_edf(file: &str, text: &str) -> Result<ParsedEdf, EdfError> {
    let mut sink = TracingSink;
    EdfParser::new(&mut sink).throws(true).parse(file, text)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
