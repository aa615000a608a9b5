//! Pluggable property parsers.
//!
//! A [`PropertyParser`] turns the raw JSON value of one property into a
//! [`PropertyValue`]. Parsers are looked up by id (`"number"`, `"color"`, ...)
//! in a [`PropertyParsers`] registry. The world runtime never inspects the
//! types itself, so new ones plug in without core changes.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tessera_edf::markup;

use crate::property::{Color, Ease, PropertyValue};

/// Declaration of one property in a component's requirements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyInfo {
    pub name: String,
    /// Parser id.
    pub type_id: String,
    /// Raw default, run through the parser like any other value.
    pub default: Option<Value>,
    pub required: bool,
}

impl PropertyInfo {
    pub fn required(name: &str, type_id: &str) -> Self {
        Self {
            name: name.to_owned(),
            type_id: type_id.to_owned(),
            default: None,
            required: true,
        }
    }

    pub fn optional(name: &str, type_id: &str, default: Option<Value>) -> Self {
        Self {
            name: name.to_owned(),
            type_id: type_id.to_owned(),
            default,
            required: false,
        }
    }
}

/// Converts one raw value. `Err` carries a human-readable reason.
pub trait PropertyParser: Send + Sync {
    fn id(&self) -> &str;
    fn parse(&self, info: &PropertyInfo, raw: &Value) -> Result<PropertyValue, String>;
}

fn expected(info: &PropertyInfo, what: &str, raw: &Value) -> String {
    format!("property '{}' expects {what}, got {raw}", info.name)
}

// ---------------------------------------------------------------------------
// Built-in parsers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct NumberParser;

impl PropertyParser for NumberParser {
    fn id(&self) -> &str {
        "number"
    }

    fn parse(&self, info: &PropertyInfo, raw: &Value) -> Result<PropertyValue, String> {
        match raw {
            Value::Number(n) => n.as_f64().map(PropertyValue::Number),
            Value::String(s) => s.trim().parse::<f64>().ok().map(PropertyValue::Number),
            _ => None,
        }
        .ok_or_else(|| expected(info, "a number", raw))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IntParser;

impl PropertyParser for IntParser {
    fn id(&self) -> &str {
        "int"
    }

    fn parse(&self, info: &PropertyInfo, raw: &Value) -> Result<PropertyValue, String> {
        match raw {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
        .map(PropertyValue::Int)
        .ok_or_else(|| expected(info, "an integer", raw))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StringParser;

impl PropertyParser for StringParser {
    fn id(&self) -> &str {
        "string"
    }

    fn parse(&self, info: &PropertyInfo, raw: &Value) -> Result<PropertyValue, String> {
        match raw {
            Value::String(s) => Ok(PropertyValue::String(s.clone())),
            Value::Number(_) | Value::Bool(_) => Ok(PropertyValue::String(raw.to_string())),
            _ => Err(expected(info, "a string", raw)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BoolParser;

impl PropertyParser for BoolParser {
    fn id(&self) -> &str {
        "bool"
    }

    fn parse(&self, info: &PropertyInfo, raw: &Value) -> Result<PropertyValue, String> {
        match raw {
            Value::Bool(b) => Ok(PropertyValue::Bool(*b)),
            Value::Number(n) if n.as_i64() == Some(0) => Ok(PropertyValue::Bool(false)),
            Value::Number(n) if n.as_i64() == Some(1) => Ok(PropertyValue::Bool(true)),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" => Ok(PropertyValue::Bool(true)),
                "false" | "no" | "off" => Ok(PropertyValue::Bool(false)),
                _ => Err(expected(info, "a boolean", raw)),
            },
            _ => Err(expected(info, "a boolean", raw)),
        }
    }
}

/// `#rgb`, `#rrggbb`, `#rrggbbaa` or `[r, g, b(, a)]` with channels in `0..=1`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorParser;

impl PropertyParser for ColorParser {
    fn id(&self) -> &str {
        "color"
    }

    fn parse(&self, info: &PropertyInfo, raw: &Value) -> Result<PropertyValue, String> {
        let color = match raw {
            Value::String(s) => Color::from_hex(s.trim()),
            Value::Array(items) if items.len() == 3 || items.len() == 4 => {
                let channels: Option<Vec<f32>> =
                    items.iter().map(|v| v.as_f64().map(|f| f as f32)).collect();
                channels.map(|c| Color::rgba(c[0], c[1], c[2], c.get(3).copied().unwrap_or(1.0)))
            }
            _ => None,
        };
        color
            .map(PropertyValue::Color)
            .ok_or_else(|| expected(info, "a color", raw))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EaseParser;

impl PropertyParser for EaseParser {
    fn id(&self) -> &str {
        "ease"
    }

    fn parse(&self, info: &PropertyInfo, raw: &Value) -> Result<PropertyValue, String> {
        raw.as_str()
            .and_then(Ease::from_name)
            .map(PropertyValue::Ease)
            .ok_or_else(|| expected(info, "an easing name", raw))
    }
}

/// A JSON array, or a comma separated string.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListParser;

impl PropertyParser for ListParser {
    fn id(&self) -> &str {
        "list"
    }

    fn parse(&self, info: &PropertyInfo, raw: &Value) -> Result<PropertyValue, String> {
        match raw {
            Value::Array(items) => Ok(PropertyValue::List(
                items.iter().map(PropertyValue::from_json).collect(),
            )),
            Value::String(s) if s.trim().is_empty() => Ok(PropertyValue::List(Vec::new())),
            Value::String(s) => Ok(PropertyValue::List(
                s.split(',')
                    .map(|item| PropertyValue::String(item.trim().to_owned()))
                    .collect(),
            )),
            _ => Err(expected(info, "a list", raw)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AnyParser;

impl PropertyParser for AnyParser {
    fn id(&self) -> &str {
        "any"
    }

    fn parse(&self, _info: &PropertyInfo, raw: &Value) -> Result<PropertyValue, String> {
        Ok(PropertyValue::Json(raw.clone()))
    }
}

/// Rich text with `name{...}` blocks. The text is kept as written once the
/// markup scanner accepts it.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkupParser;

impl PropertyParser for MarkupParser {
    fn id(&self) -> &str {
        "markup"
    }

    fn parse(&self, info: &PropertyInfo, raw: &Value) -> Result<PropertyValue, String> {
        let text = raw
            .as_str()
            .ok_or_else(|| expected(info, "markup text", raw))?;
        markup::events(text)
            .map(|_| PropertyValue::String(text.to_owned()))
            .map_err(|e| format!("property '{}': {e}", info.name))
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Property parsers keyed by id.
#[derive(Clone, Default)]
pub struct PropertyParsers {
    parsers: HashMap<String, Arc<dyn PropertyParser>>,
}

impl std::fmt::Debug for PropertyParsers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<_> = self.parsers.keys().collect();
        ids.sort();
        f.debug_struct("PropertyParsers").field("ids", &ids).finish()
    }
}

impl PropertyParsers {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in parser.
    pub fn with_builtins() -> Self {
        let mut parsers = Self::new();
        parsers.register(Arc::new(NumberParser));
        parsers.register(Arc::new(IntParser));
        parsers.register(Arc::new(StringParser));
        parsers.register(Arc::new(BoolParser));
        parsers.register(Arc::new(ColorParser));
        parsers.register(Arc::new(EaseParser));
        parsers.register(Arc::new(ListParser));
        parsers.register(Arc::new(AnyParser));
        parsers.register(Arc::new(MarkupParser));
        parsers
    }

    /// Add a parser. A parser with the same id is replaced.
    pub fn register(&mut self, parser: Arc<dyn PropertyParser>) {
        let id = parser.id().to_owned();
        if self.parsers.insert(id.clone(), parser).is_some() {
            tracing::debug!(parser = %id, "replaced property parser");
        }
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn PropertyParser>> {
        self.parsers.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.parsers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(id: &str, raw: Value) -> Result<PropertyValue, String> {
        let parsers = PropertyParsers::with_builtins();
        let info = PropertyInfo::required("p", id);
        parsers.get(id).unwrap().parse(&info, &raw)
    }

    #[test]
    fn numbers_accept_numeric_strings() {
        assert_eq!(parse("number", json!(1.5)), Ok(PropertyValue::Number(1.5)));
        assert_eq!(parse("number", json!("2")), Ok(PropertyValue::Number(2.0)));
        assert!(parse("number", json!("fast")).is_err());
        assert_eq!(parse("int", json!(4)), Ok(PropertyValue::Int(4)));
        assert!(parse("int", json!(4.5)).is_err());
    }

    #[test]
    fn bools_accept_words() {
        assert_eq!(parse("bool", json!("yes")), Ok(PropertyValue::Bool(true)));
        assert_eq!(parse("bool", json!(0)), Ok(PropertyValue::Bool(false)));
        assert!(parse("bool", json!("maybe")).is_err());
    }

    #[test]
    fn colors_accept_hex_and_arrays() {
        assert_eq!(parse("color", json!("#fff")), Ok(PropertyValue::Color(Color::WHITE)));
        assert_eq!(
            parse("color", json!([0, 0, 0])),
            Ok(PropertyValue::Color(Color::BLACK))
        );
        let err = parse("color", json!(12)).unwrap_err();
        assert!(err.contains("'p'"), "{err}");
    }

    #[test]
    fn lists_split_strings() {
        assert_eq!(
            parse("list", json!("a, b")),
            Ok(PropertyValue::List(vec!["a".into(), "b".into()]))
        );
        assert_eq!(parse("list", json!("")), Ok(PropertyValue::List(Vec::new())));
    }

    #[test]
    fn markup_is_validated() {
        assert!(parse("markup", json!("hello b{world}")).is_ok());
        assert!(parse("markup", json!("broken b{world")).is_err());
    }

    #[test]
    fn ease_and_any() {
        assert_eq!(parse("ease", json!("sineOut")), Ok(PropertyValue::Ease(Ease::SineOut)));
        assert_eq!(
            parse("any", json!({"x": 1})),
            Ok(PropertyValue::Json(json!({"x": 1})))
        );
    }

    #[test]
    fn registry_replaces_by_id() {
        struct Shout;
        impl PropertyParser for Shout {
            fn id(&self) -> &str {
                "string"
            }
            fn parse(&self, _: &PropertyInfo, raw: &Value) -> Result<PropertyValue, String> {
                Ok(PropertyValue::String(raw.as_str().unwrap_or("").to_uppercase()))
            }
        }
        let mut parsers = PropertyParsers::with_builtins();
        let count = parsers.len();
        parsers.register(Arc::new(Shout));
        assert_eq!(parsers.len(), count);
        let info = PropertyInfo::required("p", "string");
        assert_eq!(
            parsers.get("string").unwrap().parse(&info, &json!("hi")),
            Ok(PropertyValue::String("HI".into()))
        );
    }
}
