//! Dict fields
//!
//! [`Dict`] holds the string-keyed scalars of a dict field; [`DictMut`]
//! checks and records every item change the same way [`ListMut`] does for
//! lists. [`ConfigDict`] holds the sub-configs of a config dict field, one
//! per key, named `field[key]`.
//!
//! History labels: `"setitem"` and `"delitem"`. Dict fields snapshot the
//! whole mapping; config dict fields record what happened to which key.
//!
//! [`ListMut`]: crate::ListMut

use std::panic::Location;
use std::sync::Arc;

use indexmap::map::Entry;
use indexmap::IndexMap;

use crate::config::{Config, Owner};
use crate::error::{ConfigError, ConfigResult, Failure, FieldValidationError};
use crate::field::Field;
use crate::history::{CallSite, History};
use crate::value::Value;

/// Items of a dict field
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dict {
    items: IndexMap<String, Value>,
}

impl Dict {
    /// Item under `key`
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.items.get(key)
    }

    /// Check whether `key` is present
    #[inline]
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.items.contains_key(key)
    }

    /// Keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }

    /// Items in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.items.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of items
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Underlying mapping
    #[inline]
    #[must_use]
    pub fn items(&self) -> &IndexMap<String, Value> {
        &self.items
    }

    /// Snapshot as a `Value::Map`
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Map(self.items.clone())
    }
}

impl Owner<'_> {
    /// Turn an assigned value into the content of a dict field
    pub(crate) fn make_dict(&self, field: &Field, value: Value) -> Result<Option<Dict>, FieldValidationError> {
        let Some(spec) = field.dict_spec() else {
            return Err(self.fail(field, Failure::WrongFieldKind { expected: "DictField" }));
        };
        match value {
            Value::Null => Ok(None),
            Value::Map(values) => {
                let mut items = IndexMap::with_capacity(values.len());
                for (key, value) in values {
                    let value = spec.accept(&key, value).map_err(|failure| self.fail(field, failure))?;
                    items.insert(key, value);
                }
                Ok(Some(Dict { items }))
            }
            other => Err(self.fail(
                field,
                Failure::NotAMapping {
                    actual: other.type_name(),
                    value: other,
                },
            )),
        }
    }
}

/// Mutable view of a dict field
///
/// Every change rejects a frozen owner, checks the item against the item
/// type and `item_check`, then records a snapshot of the whole dict.
pub struct DictMut<'a> {
    owner: Owner<'a>,
    field: Arc<Field>,
    dict: &'a mut Dict,
    history: &'a mut History,
}

impl<'a> DictMut<'a> {
    pub(crate) fn new(owner: Owner<'a>, field: Arc<Field>, dict: &'a mut Dict, history: &'a mut History) -> Self {
        Self {
            owner,
            field,
            dict,
            history,
        }
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn as_dict(&self) -> &Dict {
        self.dict
    }

    /// Insert or replace the item under `key` (label `"setitem"`)
    ///
    /// # Errors
    /// Returns error on a frozen owner or a rejected item
    #[track_caller]
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> ConfigResult<()> {
        self.set_with(key.into(), value.into(), Location::caller())
    }

    pub(crate) fn set_with(&mut self, key: String, value: Value, at: CallSite) -> ConfigResult<()> {
        self.owner.guard(&self.field)?;
        let spec = self.field.dict_spec().ok_or_else(|| self.wrong_kind())?;
        let value = spec
            .accept(&key, value)
            .map_err(|failure| self.owner.fail(&self.field, failure))?;
        self.dict.items.insert(key, value);
        self.history.record(self.dict.to_value(), at, "setitem");
        Ok(())
    }

    /// Remove and return the item under `key` (label `"delitem"`)
    ///
    /// # Errors
    /// Returns error on a frozen owner or a missing key
    #[track_caller]
    pub fn remove(&mut self, key: &str) -> ConfigResult<Value> {
        let at = Location::caller();
        self.owner.guard(&self.field)?;
        let value = self.dict.items.shift_remove(key).ok_or_else(|| {
            self.owner.fail(&self.field, Failure::UnknownKey { key: key.to_string() })
        })?;
        self.history.record(self.dict.to_value(), at, "delitem");
        Ok(value)
    }

    /// Remove every item, one `"delitem"` entry per key
    ///
    /// # Errors
    /// Returns error on a frozen owner
    #[track_caller]
    pub fn clear(&mut self) -> ConfigResult<()> {
        let at = Location::caller();
        self.owner.guard(&self.field)?;
        while self.dict.items.shift_remove_index(0).is_some() {
            self.history.record(self.dict.to_value(), at, "delitem");
        }
        Ok(())
    }

    fn wrong_kind(&self) -> FieldValidationError {
        self.owner
            .fail(&self.field, Failure::WrongFieldKind { expected: "DictField" })
    }
}

/// Sub-configs of a config dict field
#[derive(Debug, Clone)]
pub struct ConfigDict {
    full_name: String,
    items: IndexMap<String, Config>,
}

impl ConfigDict {
    pub(crate) fn new(full_name: String) -> Self {
        Self {
            full_name,
            items: IndexMap::new(),
        }
    }

    /// Dotted name of the field within its root config
    #[inline]
    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Sub-config under `key`
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Config> {
        self.items.get(key)
    }

    /// Check whether `key` is present
    #[inline]
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.items.contains_key(key)
    }

    /// Keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }

    /// Sub-configs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Config)> {
        self.items.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of items
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Flattened form: key → nested mapping of the sub-config
    #[must_use]
    pub fn to_value(&self) -> Value {
        self.items
            .iter()
            .map(|(key, config)| {
                let flat = serde_json::Value::Object(config.flatten());
                (key.clone(), Value::from_json(&flat).unwrap_or_default())
            })
            .collect()
    }

    pub(crate) fn freeze_all(&mut self) {
        for config in self.items.values_mut() {
            config.freeze();
        }
    }

    fn item_name(&self, key: &str) -> String {
        format!("{}[{key}]", self.full_name)
    }
}

impl PartialEq for ConfigDict {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

/// Build the content of a config dict field from an assigned value
///
/// `Null` clears the field; a mapping of mappings creates one default
/// sub-config per key and applies the inner mapping to it. Nothing is
/// recorded unless the whole value is accepted.
pub(crate) fn make_config_dict(
    owner: Owner<'_>,
    field: &Field,
    value: Value,
    at: CallSite,
    label: &str,
) -> ConfigResult<(Option<ConfigDict>, Vec<String>)> {
    let Some(spec) = field.config_dict_spec() else {
        return Err(owner
            .fail(field, Failure::WrongFieldKind { expected: "ConfigDictField" })
            .into());
    };
    let values = match value {
        Value::Null => return Ok((None, vec!["set to None".to_string()])),
        Value::Map(values) => values,
        other => {
            return Err(owner
                .fail(
                    field,
                    Failure::NotAMapping {
                        actual: other.type_name(),
                        value: other,
                    },
                )
                .into())
        }
    };
    let mut dict = ConfigDict::new(owner.full_name(field));
    let mut notes = vec!["Dict initialized".to_string()];
    for (key, value) in values {
        let inner = match value {
            Value::Map(inner) => inner,
            other => {
                return Err(owner
                    .fail(
                        field,
                        Failure::DictItemTypeMismatch {
                            key,
                            actual: other.type_name(),
                            expected: spec.schema().name().to_string(),
                            value: other,
                        },
                    )
                    .into())
            }
        };
        let mut item = Config::construct(spec.schema(), Some(dict.item_name(&key)), at)?;
        item.apply_map(&inner, at, label)?;
        notes.push(format!("Added item at key {key}"));
        dict.items.insert(key, item);
    }
    Ok((Some(dict), notes))
}

/// Mutable view of a config dict field
///
/// Items must be instances of exactly the field's schema. Changes reject a
/// frozen owner and record `"Added item at key k"`, `"Modified item at key
/// k"` or `"Removed item at key k"`.
pub struct ConfigDictMut<'a> {
    owner: Owner<'a>,
    field: Arc<Field>,
    dict: &'a mut ConfigDict,
    history: &'a mut History,
    label: Option<String>,
}

impl<'a> ConfigDictMut<'a> {
    pub(crate) fn new(
        owner: Owner<'a>,
        field: Arc<Field>,
        dict: &'a mut ConfigDict,
        history: &'a mut History,
    ) -> Self {
        Self {
            owner,
            field,
            dict,
            history,
            label: None,
        }
    }

    /// Record subsequent changes under `label`
    #[must_use]
    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn as_dict(&self) -> &ConfigDict {
        self.dict
    }

    fn label(&self, default: &'static str) -> String {
        self.label.clone().unwrap_or_else(|| default.to_string())
    }

    /// Copy `value` into the item under `key`, creating it if needed
    ///
    /// An existing item keeps its history and records each copied value.
    ///
    /// # Errors
    /// Returns error on a frozen owner or a schema mismatch
    #[track_caller]
    pub fn insert(&mut self, key: impl Into<String>, value: &Config) -> ConfigResult<()> {
        self.insert_at(key.into(), value, Location::caller())
    }

    pub(crate) fn insert_at(&mut self, key: String, value: &Config, at: CallSite) -> ConfigResult<()> {
        self.owner.guard(&self.field)?;
        let spec = self.field.config_dict_spec().ok_or_else(|| self.wrong_kind())?;
        if !Arc::ptr_eq(spec.schema(), value.schema()) {
            return Err(self
                .owner
                .fail(
                    &self.field,
                    Failure::WrongSchema {
                        actual: value.schema().name().to_string(),
                        expected: spec.schema().name().to_string(),
                    },
                )
                .into());
        }
        let label = self.label("setitem");
        let note = if self.dict.items.contains_key(&key) {
            format!("Modified item at key {key}")
        } else {
            format!("Added item at key {key}")
        };
        self.item_at(&key, at)?.absorb(value, at, &label)?;
        self.history.record(Value::from(note), at, label);
        Ok(())
    }

    /// Sub-config under `key`, created from defaults on first access
    ///
    /// # Errors
    /// Returns error if the item is missing and the owner is frozen
    #[track_caller]
    pub fn get_or_insert(&mut self, key: &str) -> ConfigResult<&mut Config> {
        let at = Location::caller();
        if !self.dict.items.contains_key(key) {
            self.owner.guard(&self.field)?;
            let label = self.label("setitem");
            self.history
                .record(Value::from(format!("Added item at key {key}")), at, label);
        }
        self.item_at(key, at)
    }

    fn item_at(&mut self, key: &str, at: CallSite) -> ConfigResult<&mut Config> {
        let spec = self.field.config_dict_spec().ok_or_else(|| self.wrong_kind())?;
        let name = self.dict.item_name(key);
        match self.dict.items.entry(key.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let config = Config::construct(spec.schema(), Some(name), at)?;
                Ok(entry.insert(config))
            }
        }
    }

    /// Existing sub-config under `key`, keeping the borrow of the owner
    ///
    /// # Errors
    /// Returns error if `key` is missing
    pub fn into_config(self, key: &str) -> ConfigResult<&'a mut Config> {
        let Self { owner, field, dict, .. } = self;
        dict.items.get_mut(key).ok_or_else(|| {
            owner
                .fail(&field, Failure::UnknownKey { key: key.to_string() })
                .into()
        })
    }

    /// Replace the item under `key` with defaults updated by `values`
    ///
    /// Used for `field[key]={...}` statements.
    pub(crate) fn set_map_at(&mut self, key: String, values: Value, at: CallSite) -> ConfigResult<()> {
        let spec = self.field.config_dict_spec().ok_or_else(|| self.wrong_kind())?;
        let values = match values {
            Value::Map(values) => values,
            other => {
                return Err(self
                    .owner
                    .fail(
                        &self.field,
                        Failure::DictItemTypeMismatch {
                            key,
                            actual: other.type_name(),
                            expected: spec.schema().name().to_string(),
                            value: other,
                        },
                    )
                    .into())
            }
        };
        let label = self.label("setitem");
        let mut fresh = Config::construct(spec.schema(), Some(self.dict.item_name(&key)), at)?;
        fresh.apply_map(&values, at, &label)?;
        self.insert_at(key, &fresh, at)
    }

    /// Remove the item under `key`
    ///
    /// # Errors
    /// Returns error on a frozen owner or a missing key
    #[track_caller]
    pub fn remove(&mut self, key: &str) -> ConfigResult<Config> {
        let at = Location::caller();
        self.owner.guard(&self.field)?;
        let removed = self.dict.items.shift_remove(key).ok_or_else(|| -> ConfigError {
            self.owner
                .fail(&self.field, Failure::UnknownKey { key: key.to_string() })
                .into()
        })?;
        let label = self.label("delitem");
        self.history
            .record(Value::from(format!("Removed item at key {key}")), at, label);
        Ok(removed)
    }

    fn wrong_kind(&self) -> FieldValidationError {
        self.owner
            .fail(&self.field, Failure::WrongFieldKind { expected: "ConfigDictField" })
    }
}
