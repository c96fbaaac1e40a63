//! The store model: an insertion-ordered map of keys to values.

use indexmap::map::{IntoIter, Iter};
use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};

use super::value::Value;
use crate::error::{Result, StoreError};

/// A plain nested aggregate of values.
///
/// Keys keep the order they were inserted in, so the cell tree built from a
/// model iterates the way the model was written.
///
/// # Example
///
/// ```rust,ignore
/// let model = Model::new()
///     .with("counter", 0)
///     .with("user", Model::new().with("name", "").with("age", 30))
///     .with("greet", Value::detached(Value::function(|_| "hi".into())));
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Model {
    entries: IndexMap<String, Value>,
}

impl Model {
    /// Create an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a value, returning the one it replaced.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> Iter<'_, String, Value> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a Model {
    type Item = (&'a String, &'a Value);
    type IntoIter = Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl IntoIterator for Model {
    type Item = (String, Value);
    type IntoIter = IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Model {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl Serialize for Model {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl TryFrom<serde_json::Value> for Model {
    type Error = StoreError;

    /// Only a JSON object can be a model; `null` and scalars are rejected.
    fn try_from(json: serde_json::Value) -> Result<Self> {
        match Value::from(json) {
            Value::Map(model) => Ok(model),
            Value::Null => Err(StoreError::invalid_props("the model is null")),
            other => Err(StoreError::invalid_props(format!(
                "the model must be an object, got {}",
                other.kind()
            ))),
        }
    }
}
