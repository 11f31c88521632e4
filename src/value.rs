//! The dynamic value produced by parsing and consumed by stringifying.
//!
//! A parsed document is a [`Value::Object`] whose keys follow a small naming
//! convention:
//!
//! - `@name` holds an attribute value;
//! - `#text` holds the (derived) text content of a node;
//! - `#comments` holds the comments found directly under a node;
//! - `#doctype` and `#instructions` appear on the document object only;
//! - any other key is a child element, with repeated siblings collected into
//!   a [`Value::Array`].
//!
//! Structurally trivial nodes are flattened: a text-only element becomes a
//! string, an empty element becomes [`Value::Null`].

use std::fmt;
use std::ops::Index;

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

/// An ordered string-keyed map of values.
///
/// Insertion order is kept (it drives output order when stringifying) but
/// equality ignores it.
pub type Map = IndexMap<String, Value>;

/// Largest integer an `f64` represents exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

static NULL: Value = Value::Null;

/// A parsed XML value or a document-like input for stringify.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// An empty element.
    #[default]
    Null,
    /// A revived boolean.
    Bool(bool),
    /// A revived number.
    Number(f64),
    /// Plain text.
    String(String),
    /// Repeated siblings (or a list of comments).
    Array(Vec<Value>),
    /// A node with attributes, text or children.
    Object(Map),
    /// Text to be written as a `<![CDATA[...]]>` section.
    CData(String),
    /// Text to be written as a `<!--...-->` comment.
    Comment(String),
}

impl Value {
    /// Looks up `key` in an object. Returns `None` for any other variant.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|map| map.get(key))
    }

    /// Returns the text of a `String`, `CData` or `Comment`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::CData(s) | Self::Comment(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&Map> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Mutable access to an object's entries.
    pub fn as_object_mut(&mut self) -> Option<&mut Map> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Renders a scalar as XML character data.
    ///
    /// Integral numbers print without a fraction, `Null` and objects print as
    /// the empty string, arrays are joined with commas.
    ///
    /// ```
    /// use xmlshape::Value;
    ///
    /// assert_eq!(Value::Number(42.0).to_text(), "42");
    /// assert_eq!(Value::Number(0.5).to_text(), "0.5");
    /// assert_eq!(Value::Bool(true).to_text(), "true");
    /// assert_eq!(Value::Null.to_text(), "");
    /// ```
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::Null | Self::Object(_) => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => format_number(*n),
            Self::String(s) | Self::CData(s) | Self::Comment(s) => s.clone(),
            Self::Array(items) => items
                .iter()
                .map(Value::to_text)
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    /// Converts into a `serde_json::Value`.
    ///
    /// Integral numbers become JSON integers, `CData` and `Comment` become
    /// strings, and non-finite numbers become `null`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Self::Null => Json::Null,
            Self::Bool(b) => Json::Bool(*b),
            Self::Number(n) => match as_integer(*n) {
                Some(i) => Json::from(i),
                None => serde_json::Number::from_f64(*n).map_or(Json::Null, Json::Number),
            },
            Self::String(s) | Self::CData(s) | Self::Comment(s) => Json::String(s.clone()),
            Self::Array(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Self::Object(map) => Json::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn as_integer(n: f64) -> Option<i64> {
    (n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER).then_some(n as i64)
}

fn format_number(n: f64) -> String {
    match as_integer(n) {
        Some(i) => i.to_string(),
        None => n.to_string(),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl Index<&str> for Value {
    type Output = Value;

    /// Returns `Value::Null` for missing keys and non-objects.
    fn index(&self, key: &str) -> &Value {
        self.get(key).unwrap_or(&NULL)
    }
}

impl Index<usize> for Value {
    type Output = Value;

    fn index(&self, index: usize) -> &Value {
        self.as_array()
            .and_then(|items| items.get(index))
            .unwrap_or(&NULL)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Self::Object(map)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Self::Null,
            Json::Bool(b) => Self::Bool(b),
            Json::Number(n) => n.as_f64().map_or(Self::Null, Self::Number),
            Json::String(s) => Self::String(s),
            Json::Array(items) => Self::Array(items.into_iter().map(Value::from).collect()),
            Json::Object(map) => Self::Object(
                map.into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

impl PartialEq<serde_json::Value> for Value {
    fn eq(&self, other: &serde_json::Value) -> bool {
        self.to_json() == *other
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => match as_integer(*n) {
                Some(i) => serializer.serialize_i64(i),
                None => serializer.serialize_f64(*n),
            },
            Self::String(s) | Self::CData(s) | Self::Comment(s) => serializer.serialize_str(s),
            Self::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Object(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_index_missing_is_null() {
        let value = Value::from(json!({ "root": { "a": "1" } }));
        assert_eq!(value["root"]["a"], Value::from("1"));
        assert!(value["root"]["missing"].is_null());
        assert!(value["root"]["a"]["deeper"].is_null());
    }

    #[test]
    fn test_object_equality_ignores_order() {
        let a = Value::from(json!({ "x": 1, "y": 2 }));
        let b = Value::from(json!({ "y": 2, "x": 1 }));
        assert_eq!(a, b);
    }

    #[test]
    fn test_to_text() {
        assert_eq!(Value::Number(-3.0).to_text(), "-3");
        assert_eq!(Value::Number(1.25).to_text(), "1.25");
        assert_eq!(Value::from(vec!["a", "b"]).to_text(), "a,b");
        assert_eq!(Value::CData("<x>".into()).to_text(), "<x>");
    }

    #[test]
    fn test_to_json_integral_numbers() {
        let value = Value::from(vec![Value::Number(42.0), Value::Number(0.5)]);
        assert_eq!(value.to_json(), json!([42, 0.5]));
        assert_eq!(Value::Number(f64::NAN).to_json(), json!(null));
    }

    #[test]
    fn test_serialize_matches_to_json() {
        let mut map = Map::new();
        map.insert("@id".into(), Value::Number(7.0));
        map.insert("#text".into(), Value::CData("a < b".into()));
        let value = Value::Object(map);
        let text = serde_json::to_string(&value).unwrap();
        assert_eq!(text, r##"{"@id":7,"#text":"a < b"}"##);
        assert_eq!(value, json!({ "@id": 7, "#text": "a < b" }));
    }
}
