//! Typed property values.
//!
//! Definitions carry raw JSON values. The [`EntityFactory`](crate::factory)
//! runs every declared property through a
//! [`PropertyParser`](crate::parsers::PropertyParser) and stores the result as
//! a [`PropertyValue`] in the entity's [`PropertyMap`].
//!
//! # Example
//!
//! ```
//! use tessera_ecs::property::{PropertyMap, PropertyValue};
//!
//! let mut props = PropertyMap::new();
//! props.insert("speed", PropertyValue::Number(2.5));
//! props.insert("name", PropertyValue::String("ship".into()));
//!
//! assert_eq!(props.get_f64("speed"), Some(2.5));
//! assert_eq!(props.get_str("name"), Some("ship"));
//! assert!(!props.get_bool("alwaysActive").unwrap_or(false));
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Color
// ---------------------------------------------------------------------------

/// An RGBA color with channels in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::rgba(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgba(0.0, 0.0, 0.0, 1.0);

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa`.
    pub fn from_hex(text: &str) -> Option<Self> {
        let hex = text.strip_prefix('#')?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok().map(|v| v as f32 / 255.0);
        match hex.len() {
            3 => {
                let expand = |i: usize| channel(&hex[i..i + 1].repeat(2));
                Some(Self::rgba(expand(0)?, expand(1)?, expand(2)?, 1.0))
            }
            6 | 8 => {
                let a = if hex.len() == 8 { channel(&hex[6..8])? } else { 1.0 };
                Some(Self::rgba(
                    channel(&hex[0..2])?,
                    channel(&hex[2..4])?,
                    channel(&hex[4..6])?,
                    a,
                ))
            }
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Ease
// ---------------------------------------------------------------------------

/// Named easing curves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Ease {
    Linear,
    QuadIn,
    QuadOut,
    QuadInOut,
    CubicIn,
    CubicOut,
    CubicInOut,
    SineIn,
    SineOut,
    SineInOut,
}

impl Ease {
    pub const ALL: [Ease; 10] = [
        Ease::Linear,
        Ease::QuadIn,
        Ease::QuadOut,
        Ease::QuadInOut,
        Ease::CubicIn,
        Ease::CubicOut,
        Ease::CubicInOut,
        Ease::SineIn,
        Ease::SineOut,
        Ease::SineInOut,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Ease::Linear => "linear",
            Ease::QuadIn => "quadIn",
            Ease::QuadOut => "quadOut",
            Ease::QuadInOut => "quadInOut",
            Ease::CubicIn => "cubicIn",
            Ease::CubicOut => "cubicOut",
            Ease::CubicInOut => "cubicInOut",
            Ease::SineIn => "sineIn",
            Ease::SineOut => "sineOut",
            Ease::SineInOut => "sineInOut",
        }
    }

    /// Case-insensitive lookup by name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|e| e.name().eq_ignore_ascii_case(name))
    }

    /// Map `t` in `0.0..=1.0` through the curve. Input is clamped.
    pub fn apply(self, t: f64) -> f64 {
        use std::f64::consts::PI;
        let t = t.clamp(0.0, 1.0);
        match self {
            Ease::Linear => t,
            Ease::QuadIn => t * t,
            Ease::QuadOut => t * (2.0 - t),
            Ease::QuadInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
            Ease::CubicIn => t * t * t,
            Ease::CubicOut => {
                let u = t - 1.0;
                u * u * u + 1.0
            }
            Ease::CubicInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    let u = 2.0 * t - 2.0;
                    0.5 * u * u * u + 1.0
                }
            }
            Ease::SineIn => 1.0 - (t * PI / 2.0).cos(),
            Ease::SineOut => (t * PI / 2.0).sin(),
            Ease::SineInOut => -0.5 * ((PI * t).cos() - 1.0),
        }
    }
}

// ---------------------------------------------------------------------------
// PropertyValue
// ---------------------------------------------------------------------------

/// A parsed property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Number(f64),
    Int(i64),
    String(String),
    Color(Color),
    Ease(Ease),
    List(Vec<PropertyValue>),
    /// Untyped JSON, used for pass-through properties and `any`.
    Json(Value),
}

impl PropertyValue {
    /// Loose conversion used for undeclared properties and list items.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => PropertyValue::Null,
            Value::Bool(b) => PropertyValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => PropertyValue::Int(i),
                None => PropertyValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => PropertyValue::String(s.clone()),
            Value::Array(items) => PropertyValue::List(items.iter().map(Self::from_json).collect()),
            Value::Object(_) => PropertyValue::Json(value.clone()),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            PropertyValue::Null => Value::Null,
            PropertyValue::Bool(b) => Value::Bool(*b),
            PropertyValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            PropertyValue::Int(i) => Value::from(*i),
            PropertyValue::String(s) => Value::String(s.clone()),
            PropertyValue::Color(c) => Value::from(vec![c.r, c.g, c.b, c.a]),
            PropertyValue::Ease(e) => Value::String(e.name().to_owned()),
            PropertyValue::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            PropertyValue::Json(v) => v.clone(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Number(n) => Some(*n),
            PropertyValue::Int(i) => Some(*i as f64),
            PropertyValue::Json(v) => v.as_f64(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(i) => Some(*i),
            PropertyValue::Number(n) if n.fract() == 0.0 => Some(*n as i64),
            PropertyValue::Json(v) => v.as_i64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            PropertyValue::Json(v) => v.as_bool(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            PropertyValue::Json(v) => v.as_str(),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<Color> {
        match self {
            PropertyValue::Color(c) => Some(*c),
            _ => None,
        }
    }

    pub fn as_ease(&self) -> Option<Ease> {
        match self {
            PropertyValue::Ease(e) => Some(*e),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[PropertyValue]> {
        match self {
            PropertyValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::String(s) => f.write_str(s),
            PropertyValue::Ease(e) => f.write_str(e.name()),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Number(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Int(v)
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::String(v.to_owned())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::String(v)
    }
}

impl From<Color> for PropertyValue {
    fn from(v: Color) -> Self {
        PropertyValue::Color(v)
    }
}

// ---------------------------------------------------------------------------
// FromProperty
// ---------------------------------------------------------------------------

/// Conversion from a parsed property into a component field type.
pub trait FromProperty: Sized {
    fn from_property(value: &PropertyValue) -> Option<Self>;
}

impl FromProperty for PropertyValue {
    fn from_property(value: &PropertyValue) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromProperty for f64 {
    fn from_property(value: &PropertyValue) -> Option<Self> {
        value.as_f64()
    }
}

impl FromProperty for f32 {
    fn from_property(value: &PropertyValue) -> Option<Self> {
        value.as_f64().map(|v| v as f32)
    }
}

impl FromProperty for i64 {
    fn from_property(value: &PropertyValue) -> Option<Self> {
        value.as_i64()
    }
}

impl FromProperty for i32 {
    fn from_property(value: &PropertyValue) -> Option<Self> {
        value.as_i64().and_then(|v| i32::try_from(v).ok())
    }
}

impl FromProperty for u32 {
    fn from_property(value: &PropertyValue) -> Option<Self> {
        value.as_i64().and_then(|v| u32::try_from(v).ok())
    }
}

impl FromProperty for usize {
    fn from_property(value: &PropertyValue) -> Option<Self> {
        value.as_i64().and_then(|v| usize::try_from(v).ok())
    }
}

impl FromProperty for bool {
    fn from_property(value: &PropertyValue) -> Option<Self> {
        value.as_bool()
    }
}

impl FromProperty for String {
    fn from_property(value: &PropertyValue) -> Option<Self> {
        value.as_str().map(str::to_owned)
    }
}

impl FromProperty for Color {
    fn from_property(value: &PropertyValue) -> Option<Self> {
        value.as_color()
    }
}

impl FromProperty for Ease {
    fn from_property(value: &PropertyValue) -> Option<Self> {
        value.as_ease()
    }
}

impl FromProperty for Value {
    fn from_property(value: &PropertyValue) -> Option<Self> {
        Some(value.to_json())
    }
}

impl<T: FromProperty> FromProperty for Vec<T> {
    fn from_property(value: &PropertyValue) -> Option<Self> {
        value.as_list()?.iter().map(T::from_property).collect()
    }
}

// ---------------------------------------------------------------------------
// PropertyMap
// ---------------------------------------------------------------------------

/// An entity's parsed properties, keyed by property name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyMap {
    values: BTreeMap<String, PropertyValue>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: PropertyValue) -> Option<PropertyValue> {
        self.values.insert(key.into(), value)
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.values.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut PropertyValue> {
        self.values.get_mut(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<PropertyValue> {
        self.values.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Typed read through [`FromProperty`].
    pub fn get_as<T: FromProperty>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(T::from_property)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(PropertyValue::as_f64)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(PropertyValue::as_i64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(PropertyValue::as_bool)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(PropertyValue::as_str)
    }

    pub fn get_color(&self, key: &str) -> Option<Color> {
        self.get(key).and_then(PropertyValue::as_color)
    }

    pub fn get_ease(&self, key: &str) -> Option<Ease> {
        self.get(key).and_then(PropertyValue::as_ease)
    }

    /// Copy every entry of `other` over this map.
    pub fn extend_from(&mut self, other: &PropertyMap) {
        for (k, v) in &other.values {
            self.values.insert(k.clone(), v.clone());
        }
    }
}

impl FromIterator<(String, PropertyValue)> for PropertyMap {
    fn from_iter<I: IntoIterator<Item = (String, PropertyValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hex_colors_parse_in_all_lengths() {
        assert_eq!(Color::from_hex("#fff"), Some(Color::WHITE));
        assert_eq!(Color::from_hex("#000000"), Some(Color::BLACK));
        let c = Color::from_hex("#ff000080").unwrap();
        assert_eq!(c.r, 1.0);
        assert!((c.a - 128.0 / 255.0).abs() < 1e-6);
        assert_eq!(Color::from_hex("fff"), None);
        assert_eq!(Color::from_hex("#ggg"), None);
        assert_eq!(Color::from_hex("#ffff"), None);
    }

    #[test]
    fn ease_endpoints_are_fixed() {
        for ease in Ease::ALL {
            assert!(ease.apply(0.0).abs() < 1e-9, "{ease:?} at 0");
            assert!((ease.apply(1.0) - 1.0).abs() < 1e-9, "{ease:?} at 1");
        }
        assert_eq!(Ease::from_name("QUADINOUT"), Some(Ease::QuadInOut));
        assert_eq!(Ease::from_name("bounce"), None);
    }

    #[test]
    fn json_conversion_prefers_integers() {
        assert_eq!(PropertyValue::from_json(&json!(3)), PropertyValue::Int(3));
        assert_eq!(PropertyValue::from_json(&json!(3.5)), PropertyValue::Number(3.5));
        assert_eq!(
            PropertyValue::from_json(&json!([1, "a"])),
            PropertyValue::List(vec![PropertyValue::Int(1), PropertyValue::String("a".into())])
        );
        assert!(matches!(
            PropertyValue::from_json(&json!({"k": 1})),
            PropertyValue::Json(_)
        ));
    }

    #[test]
    fn typed_reads_through_from_property() {
        let mut props = PropertyMap::new();
        props.insert("n", PropertyValue::Int(7));
        props.insert(
            "list",
            PropertyValue::List(vec![PropertyValue::Int(1), PropertyValue::Int(2)]),
        );
        assert_eq!(props.get_as::<f64>("n"), Some(7.0));
        assert_eq!(props.get_as::<u32>("n"), Some(7));
        assert_eq!(props.get_as::<Vec<i64>>("list"), Some(vec![1, 2]));
        assert_eq!(props.get_as::<String>("n"), None);
        assert_eq!(props.get_as::<bool>("missing"), None);
    }
}
