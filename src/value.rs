//! Tagged argument values.
//!
//! Tool arguments arrive as JSON from two directions (model function calls and
//! MCP `tools/call` requests). They are decoded once into [`ArgValue`] and every
//! tool builds its typed argument bundle through [`FromArguments`].

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// A single argument value
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(Vec<ArgValue>),
    Map(BTreeMap<String, ArgValue>),
}

impl ArgValue {
    /// Short type name used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            ArgValue::Null => "null",
            ArgValue::Bool(_) => "boolean",
            ArgValue::Number(_) => "number",
            ArgValue::String(_) => "string",
            ArgValue::List(_) => "array",
            ArgValue::Map(_) => "object",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ArgValue::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ArgValue::Null => serde_json::Value::Null,
            ArgValue::Bool(b) => serde_json::Value::Bool(*b),
            ArgValue::Number(n) => serde_json::Value::Number(n.clone()),
            ArgValue::String(s) => serde_json::Value::String(s.clone()),
            ArgValue::List(items) => {
                serde_json::Value::Array(items.iter().map(ArgValue::to_json).collect())
            }
            ArgValue::Map(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for ArgValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => ArgValue::Null,
            serde_json::Value::Bool(b) => ArgValue::Bool(b),
            serde_json::Value::Number(n) => ArgValue::Number(n),
            serde_json::Value::String(s) => ArgValue::String(s),
            serde_json::Value::Array(items) => {
                ArgValue::List(items.into_iter().map(ArgValue::from).collect())
            }
            serde_json::Value::Object(entries) => ArgValue::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, ArgValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for ArgValue {
    fn from(s: &str) -> Self {
        ArgValue::String(s.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(s: String) -> Self {
        ArgValue::String(s)
    }
}

impl From<bool> for ArgValue {
    fn from(b: bool) -> Self {
        ArgValue::Bool(b)
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl Serialize for ArgValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ArgValue::Null => serializer.serialize_unit(),
            ArgValue::Bool(b) => serializer.serialize_bool(*b),
            ArgValue::Number(n) => n.serialize(serializer),
            ArgValue::String(s) => serializer.serialize_str(s),
            ArgValue::List(items) => items.serialize(serializer),
            ArgValue::Map(entries) => entries.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ArgValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(ArgValue::from)
    }
}

/// Errors raised while decoding arguments into a typed bundle
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgumentError {
    #[error("arguments must be a JSON object, got {0}")]
    NotAnObject(&'static str),
    #[error("missing required argument: {0}")]
    Missing(String),
    #[error("argument '{key}' must be {expected}, got {found}")]
    WrongType {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// Named argument map passed to a tool or prompt
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments(BTreeMap<String, ArgValue>);

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a JSON value; `null` is treated as an empty map.
    pub fn from_json(value: serde_json::Value) -> Result<Self, ArgumentError> {
        match ArgValue::from(value) {
            ArgValue::Map(entries) => Ok(Self(entries)),
            ArgValue::Null => Ok(Self::default()),
            other => Err(ArgumentError::NotAnObject(other.kind())),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ArgValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ArgValue> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ArgValue)> {
        self.0.iter()
    }

    /// String argument that must be present
    pub fn required_str(&self, key: &str) -> Result<&str, ArgumentError> {
        self.optional_str(key)?
            .ok_or_else(|| ArgumentError::Missing(key.to_string()))
    }

    /// String argument that may be absent or null
    pub fn optional_str(&self, key: &str) -> Result<Option<&str>, ArgumentError> {
        match self.0.get(key) {
            None | Some(ArgValue::Null) => Ok(None),
            Some(ArgValue::String(s)) => Ok(Some(s)),
            Some(other) => Err(ArgumentError::WrongType {
                key: key.to_string(),
                expected: "a string",
                found: other.kind(),
            }),
        }
    }
}

impl FromIterator<(String, ArgValue)> for Arguments {
    fn from_iter<I: IntoIterator<Item = (String, ArgValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Serialize for Arguments {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Arguments {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Arguments::from_json(value).map_err(D::Error::custom)
    }
}

/// Conversion from the decoded argument map into a tool's typed bundle
pub trait FromArguments: Sized {
    fn from_arguments(args: &Arguments) -> Result<Self, ArgumentError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_nested_object() {
        let args = Arguments::from_json(json!({
            "name": "World!",
            "count": 3,
            "tags": ["a", "b"],
            "nested": {"flag": true}
        }))
        .unwrap();

        assert_eq!(args.len(), 4);
        assert_eq!(args.get("name").and_then(ArgValue::as_str), Some("World!"));
        assert_eq!(args.get("count").and_then(ArgValue::as_f64), Some(3.0));
        assert!(matches!(args.get("tags"), Some(ArgValue::List(items)) if items.len() == 2));
        assert!(matches!(args.get("nested"), Some(ArgValue::Map(_))));
    }

    #[test]
    fn test_json_identity_preserves_integers() {
        let raw = json!({"n": 42, "x": 1.5, "s": "hi", "z": null});
        let args = Arguments::from_json(raw.clone()).unwrap();
        assert_eq!(args.to_json(), raw);
        assert_eq!(serde_json::to_value(&args).unwrap(), raw);
    }

    #[test]
    fn test_null_is_empty() {
        let args = Arguments::from_json(serde_json::Value::Null).unwrap();
        assert!(args.is_empty());
    }

    #[test]
    fn test_non_object_rejected() {
        let err = Arguments::from_json(json!(["a"])).unwrap_err();
        assert_eq!(err, ArgumentError::NotAnObject("array"));

        let err = serde_json::from_value::<Arguments>(json!("text")).unwrap_err();
        assert!(err.to_string().contains("must be a JSON object"));
    }

    #[test]
    fn test_string_accessors() {
        let args = Arguments::new().with("name", "Ada").with("flag", true);

        assert_eq!(args.required_str("name").unwrap(), "Ada");
        assert_eq!(args.optional_str("missing").unwrap(), None);
        assert_eq!(
            args.required_str("missing").unwrap_err(),
            ArgumentError::Missing("missing".to_string())
        );
        assert_eq!(
            args.required_str("flag").unwrap_err(),
            ArgumentError::WrongType {
                key: "flag".to_string(),
                expected: "a string",
                found: "boolean",
            }
        );
    }
}
