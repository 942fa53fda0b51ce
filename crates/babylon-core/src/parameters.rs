//! Action parameters.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// String-keyed parameter mapping passed to an action.
///
/// Displays as `{key=value, ...}` with string values unquoted, which is the
/// rendering capabilities use when echoing parameters back in a message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters(Map<String, Value>);

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Get a parameter as a string slice, if it is a JSON string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl From<Map<String, Value>> for Parameters {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

fn write_value(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::String(s) => f.write_str(s),
        Value::Array(items) => {
            f.write_str("[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_value(f, item)?;
            }
            f.write_str("]")
        }
        Value::Object(map) => write_map(f, map),
        other => write!(f, "{}", other),
    }
}

fn write_map(f: &mut fmt::Formatter<'_>, map: &Map<String, Value>) -> fmt::Result {
    f.write_str("{")?;
    for (i, (key, value)) in map.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}=", key)?;
        write_value(f, value)?;
    }
    f.write_str("}")
}

impl fmt::Display for Parameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_map(f, &self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_display_single_entry() {
        let params: Parameters = [("foo", "bar")].into_iter().collect();
        assert_eq!(params.to_string(), "{foo=bar}");
    }

    #[test]
    fn test_display_nested_values() {
        let mut params = Parameters::new();
        params.insert("count", 2);
        params.insert("tags", json!(["a", "b"]));
        params.insert("inner", json!({"x": true}));

        assert_eq!(params.to_string(), "{count=2, inner={x=true}, tags=[a, b]}");
    }

    #[test]
    fn test_empty_parameters() {
        let params = Parameters::new();
        assert!(params.is_empty());
        assert_eq!(params.to_string(), "{}");
        assert_eq!(serde_json::to_value(&params).unwrap(), json!({}));
    }
}
