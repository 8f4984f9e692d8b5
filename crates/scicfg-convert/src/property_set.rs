//! Flat property sets
//!
//! A [`PropertySet`] maps fully dotted names (`detection.threshold`) to one
//! or more values. Arrays in the flattened config become multi-valued
//! entries; `Null` fields and empty lists are skipped.

use indexmap::IndexMap;
use scicfg_schema::{Config, Value};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::error::{ConvertError, ConvertResult};

/// Dotted name → values
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PropertySet {
    entries: IndexMap<String, Vec<Value>>,
}

impl PropertySet {
    /// Create an empty property set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Property set equivalent to `config`
    ///
    /// # Errors
    /// Returns error if a flattened entry cannot be represented
    pub fn from_config(config: &Config) -> ConvertResult<Self> {
        Self::from_map(&config.flatten())
    }

    /// Property set equivalent to a flattened mapping
    ///
    /// # Errors
    /// Returns error if an array holds a mapping
    pub fn from_map(map: &Map<String, JsonValue>) -> ConvertResult<Self> {
        let mut set = Self::new();
        set.collect(None, map)?;
        Ok(set)
    }

    fn collect(&mut self, prefix: Option<&str>, map: &Map<String, JsonValue>) -> ConvertResult<()> {
        for (key, value) in map {
            let name = match prefix {
                Some(prefix) => format!("{prefix}.{key}"),
                None => key.clone(),
            };
            match value {
                JsonValue::Null => {}
                JsonValue::Array(items) if items.is_empty() => {}
                JsonValue::Object(nested) => self.collect(Some(&name), nested)?,
                other => {
                    let value = Value::from_json(other)
                        .filter(|value| !value.contains_map())
                        .ok_or_else(|| ConvertError::Unsupported {
                            name: name.clone(),
                            reason: "arrays of mappings have no property form".to_string(),
                        })?;
                    self.set(name, value);
                }
            }
        }
        Ok(())
    }

    /// Replace the values of `name`; a list becomes one value per item
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        let values = match value {
            Value::List(items) => items,
            scalar => vec![scalar],
        };
        self.entries.insert(name.into(), values);
    }

    /// Append one value to `name`
    pub fn add(&mut self, name: impl Into<String>, value: Value) {
        self.entries.entry(name.into()).or_default().push(value);
    }

    /// All values of `name`
    #[must_use]
    pub fn get_all(&self, name: &str) -> Option<&[Value]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    /// Last value of `name`
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name).and_then(|values| values.last())
    }

    /// Check whether `name` is present
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Check whether `name` holds more than one value
    #[must_use]
    pub fn is_array(&self, name: &str) -> bool {
        self.entries.get(name).is_some_and(|values| values.len() > 1)
    }

    /// Dotted names, in insertion order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of names
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render as pretty-printed JSON
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_json(&self) -> ConvertResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| ConvertError::Serialization(e.to_string()))
    }

    /// Render as YAML
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_yaml(&self) -> ConvertResult<String> {
        serde_yaml::to_string(self).map_err(|e| ConvertError::Serialization(e.to_string()))
    }
}
