//! Hierarchical policies
//!
//! # Core Concepts
//!
//! - [`Policy`]: ordered map from a key to one or more [`PolicyValue`]s
//! - Nested configs (and choice `values`) become sub-policies
//! - A list becomes a repeated key, one value per item
//!
//! Lookups take dotted names and walk through sub-policies, always following
//! the last value stored under an intermediate key.

use indexmap::IndexMap;
use scicfg_schema::{Config, Value};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::error::{ConvertError, ConvertResult};

/// One entry stored under a policy key
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PolicyValue {
    /// Leaf value
    Value(Value),
    /// Sub-policy
    Group(Policy),
}

impl PolicyValue {
    /// Leaf value, if this is one
    #[inline]
    #[must_use]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::Group(_) => None,
        }
    }

    /// Sub-policy, if this is one
    #[inline]
    #[must_use]
    pub fn as_group(&self) -> Option<&Policy> {
        match self {
            Self::Group(policy) => Some(policy),
            Self::Value(_) => None,
        }
    }
}

/// Hierarchical key → values store
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Policy {
    entries: IndexMap<String, Vec<PolicyValue>>,
}

impl Policy {
    /// Create an empty policy
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy equivalent to `config`
    ///
    /// # Errors
    /// Returns error if a flattened entry cannot be represented
    pub fn from_config(config: &Config) -> ConvertResult<Self> {
        Self::from_map(&config.flatten())
    }

    /// Policy equivalent to a flattened mapping
    ///
    /// # Errors
    /// Returns error if an array holds a mapping
    pub fn from_map(map: &Map<String, JsonValue>) -> ConvertResult<Self> {
        let mut policy = Self::new();
        for (key, value) in map {
            match value {
                JsonValue::Null => {}
                JsonValue::Object(nested) => policy.set(key.clone(), PolicyValue::Group(Self::from_map(nested)?)),
                JsonValue::Array(items) => {
                    for item in items.iter().filter(|item| !item.is_null()) {
                        policy.add(key.clone(), PolicyValue::Value(leaf(key, item)?));
                    }
                }
                other => policy.set(key.clone(), PolicyValue::Value(leaf(key, other)?)),
            }
        }
        Ok(policy)
    }

    /// Replace every value stored under `key`
    pub fn set(&mut self, key: impl Into<String>, value: PolicyValue) {
        self.entries.insert(key.into(), vec![value]);
    }

    /// Append a value under `key`
    pub fn add(&mut self, key: impl Into<String>, value: PolicyValue) {
        self.entries.entry(key.into()).or_default().push(value);
    }

    /// All values under a dotted name
    #[must_use]
    pub fn get_all(&self, name: &str) -> Option<&[PolicyValue]> {
        let (owner, key) = match name.rsplit_once('.') {
            Some((parent, key)) => (self.group(parent)?, key),
            None => (self, name),
        };
        owner.entries.get(key).map(Vec::as_slice)
    }

    /// Last leaf value under a dotted name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.get_all(name)?.last()?.as_value()
    }

    /// Sub-policy under a dotted name
    #[must_use]
    pub fn group(&self, name: &str) -> Option<&Policy> {
        name.split('.')
            .try_fold(self, |policy, key| policy.entries.get(key)?.last()?.as_group())
    }

    /// Check whether a dotted name resolves
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get_all(name).is_some()
    }

    /// Number of values under a dotted name
    #[must_use]
    pub fn value_count(&self, name: &str) -> usize {
        self.get_all(name).map_or(0, <[PolicyValue]>::len)
    }

    /// Top-level keys, in insertion order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Every leaf, as a dotted name, depth first
    #[must_use]
    pub fn leaf_names(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_leaves("", &mut out);
        out
    }

    fn collect_leaves(&self, prefix: &str, out: &mut Vec<String>) {
        for (key, values) in &self.entries {
            let name = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };
            match values.last() {
                Some(PolicyValue::Group(group)) => group.collect_leaves(&name, out),
                Some(PolicyValue::Value(_)) => out.push(name),
                None => {}
            }
        }
    }

    /// Number of top-level keys
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

fn leaf(key: &str, json: &JsonValue) -> ConvertResult<Value> {
    Value::from_json(json)
        .filter(|value| !value.contains_map())
        .ok_or_else(|| ConvertError::Unsupported {
            name: key.to_string(),
            reason: "mappings inside arrays have no policy form".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: JsonValue) -> Map<String, JsonValue> {
        match value {
            JsonValue::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn groups_and_repeated_keys() {
        let policy = Policy::from_map(&map(json!({
            "a": 2,
            "none": null,
            "inner": {"l": [1, null, 3], "deep": {"s": "x"}},
        })))
        .unwrap();
        assert_eq!(policy.names().collect::<Vec<_>>(), vec!["a", "inner"]);
        assert_eq!(policy.value_count("inner.l"), 2);
        assert_eq!(policy.get("inner.l"), Some(&Value::Int(3)));
        assert_eq!(policy.get("inner.deep.s"), Some(&Value::Str("x".into())));
        assert!(policy.group("inner.deep").is_some());
        assert!(policy.get("inner").is_none());
        assert!(!policy.contains("none"));
        assert_eq!(policy.leaf_names(), vec!["a", "inner.l", "inner.deep.s"]);
    }

    #[test]
    fn nested_list_items_stay_lists() {
        let policy = Policy::from_map(&map(json!({"grid": [[1], [2, 3]]}))).unwrap();
        assert_eq!(
            policy.get("grid"),
            Some(&Value::List(vec![Value::Int(2), Value::Int(3)]))
        );
    }

    #[test]
    fn serializes_as_nested_arrays() {
        let policy = Policy::from_map(&map(json!({"k": [1, 2], "g": {"x": true}}))).unwrap();
        let json: JsonValue = serde_json::from_str(&policy.to_json().unwrap()).unwrap();
        assert_eq!(json, json!({"k": [1, 2], "g": [{"x": [true]}]}));
    }

    #[test]
    fn arrays_of_mappings_are_rejected() {
        let err = Policy::from_map(&map(json!({"bad": [1, {"x": 2}]}))).unwrap_err();
        assert!(matches!(err, ConvertError::Unsupported { name, .. } if name == "bad"));
        let err = Policy::from_map(&map(json!({"nested": [[{"x": 2}]]}))).unwrap_err();
        assert!(matches!(err, ConvertError::Unsupported { name, .. } if name == "nested"));
    }
}
