//! Export to nested mappings
//!
//! [`Config::flatten`] turns a config into a JSON object keyed by field
//! name. Nested and configurable configs become nested objects, lists
//! become arrays, dicts become objects, config dicts become objects of
//! nested objects, and choice fields become
//! `{"name" | "names": ..., "values": {...}}`. Fields holding `Null` are
//! left out.

use serde_json::{Map, Value as JsonValue};

use crate::config::{Config, Slot};
use crate::error::{ConfigError, ConfigResult};

impl Config {
    /// Nested name → value mapping of this config
    #[must_use]
    pub fn flatten(&self) -> Map<String, JsonValue> {
        let mut out = Map::new();
        for (field, slot) in self.slots() {
            let value = match slot {
                Slot::Scalar(value) if value.is_null() => continue,
                Slot::Scalar(value) => value.to_json(),
                Slot::List(None) => continue,
                Slot::List(Some(list)) => list.to_value().to_json(),
                Slot::Config(sub) => JsonValue::Object(sub.flatten()),
                Slot::Choice(dict) => {
                    let mut choice = Map::new();
                    let selection = dict.selection();
                    if !selection.is_none() {
                        let key = if dict.is_multi() { "names" } else { "name" };
                        choice.insert(key.to_string(), selection.to_value().to_json());
                    }
                    let values = dict
                        .iter()
                        .map(|(name, sub)| (name.to_string(), JsonValue::Object(sub.flatten())))
                        .collect();
                    choice.insert("values".to_string(), JsonValue::Object(values));
                    JsonValue::Object(choice)
                }
                Slot::Dict(None) | Slot::ConfigDict(None) => continue,
                Slot::Dict(Some(dict)) => dict.to_value().to_json(),
                Slot::ConfigDict(Some(dict)) => JsonValue::Object(
                    dict.iter()
                        .map(|(key, sub)| (key.to_string(), JsonValue::Object(sub.flatten())))
                        .collect(),
                ),
                Slot::Configurable(instance) => JsonValue::Object(instance.value().flatten()),
            };
            out.insert(field.name().to_string(), value);
        }
        out
    }

    /// Flattened form as pretty-printed JSON
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_json(&self) -> ConfigResult<String> {
        serde_json::to_string_pretty(&self.flatten())
            .map_err(|e| ConfigError::Serialization(e.to_string()))
    }

    /// Flattened form as YAML
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_yaml(&self) -> ConfigResult<String> {
        serde_yaml::to_string(&self.flatten())
            .map_err(|e| ConfigError::Serialization(e.to_string()))
    }
}
