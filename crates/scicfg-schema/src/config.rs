//! Config instances
//!
//! A [`Config`] is one instance of a [`Schema`]: per-field storage, a
//! per-field [`History`], and a two-state [`State`]. Every mutation follows
//! the same protocol:
//!
//! 1. reject if the config is frozen
//! 2. coerce toward the declared type (`int` → `float`)
//! 3. check the type, then the field's predicate and constraints
//! 4. append a history entry (value snapshot, call-site, label)
//! 5. store the value
//!
//! Whole-object checks (required fields, list lengths, list and dict
//! predicates, nested configs, active choices, schema validators) run only
//! in [`Config::validate`].

use std::fmt::{self, Debug, Formatter};
use std::panic::Location;
use std::str::FromStr;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::choice::{ChoiceMut, InstanceDict};
use crate::configurable::ConfigurableInstance;
use crate::dict::{make_config_dict, ConfigDict, ConfigDictMut, Dict, DictMut};
use crate::error::{ConfigError, ConfigResult, Failure, FieldValidationError};
use crate::field::{Field, FieldKind};
use crate::history::{CallSite, History};
use crate::list::{self, List, ListMut};
use crate::path::{FieldPath, Key};
use crate::schema::Schema;
use crate::value::Value;

/// Mutability of a config
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    /// Values may change
    #[default]
    Mutable,
    /// Values are fixed for good
    Frozen,
}

impl State {
    /// Check if frozen
    #[inline]
    #[must_use]
    pub fn is_frozen(self) -> bool {
        matches!(self, Self::Frozen)
    }

    /// The one check every mutating entry point goes through
    ///
    /// # Errors
    /// Returns [`Failure::Frozen`] once the state is `Frozen`
    #[inline]
    pub fn guard(self) -> Result<(), Failure> {
        match self {
            Self::Mutable => Ok(()),
            Self::Frozen => Err(Failure::Frozen),
        }
    }
}

/// Identity of the config that owns a field, for error reporting
#[derive(Clone, Copy)]
pub(crate) struct Owner<'a> {
    pub(crate) schema: &'a Schema,
    pub(crate) name: Option<&'a str>,
    pub(crate) state: State,
}

impl Owner<'_> {
    /// Dotted name of `field` within this owner
    pub(crate) fn full_name(&self, field: &Field) -> String {
        match self.name {
            Some(prefix) => format!("{prefix}.{}", field.name()),
            None => field.name().to_string(),
        }
    }

    pub(crate) fn fail(&self, field: &Field, failure: Failure) -> FieldValidationError {
        FieldValidationError {
            field_type: field.field_type(),
            field_name: field.name().to_string(),
            full_name: self.full_name(field),
            dtype: field.dtype_name(),
            doc: field.doc().to_string(),
            config_type: self.schema.name().to_string(),
            field_source: field.source(),
            config_source: self.schema.source(),
            failure,
        }
    }

    pub(crate) fn guard(&self, field: &Field) -> Result<(), FieldValidationError> {
        self.state.guard().map_err(|failure| self.fail(field, failure))
    }
}

/// Stored value of one field
#[derive(Debug, Clone)]
pub(crate) enum Slot {
    Scalar(Value),
    List(Option<List>),
    Config(Box<Config>),
    Choice(InstanceDict),
    Dict(Option<Dict>),
    ConfigDict(Option<ConfigDict>),
    Configurable(ConfigurableInstance),
}

impl PartialEq for Slot {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Scalar(a), Self::Scalar(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Config(a), Self::Config(b)) => a == b,
            (Self::Choice(a), Self::Choice(b)) => a == b,
            (Self::Dict(a), Self::Dict(b)) => a == b,
            (Self::ConfigDict(a), Self::ConfigDict(b)) => a == b,
            (Self::Configurable(a), Self::Configurable(b)) => a == b,
            _ => false,
        }
    }
}

/// An instance of a [`Schema`]
#[derive(Clone)]
pub struct Config {
    schema: Arc<Schema>,
    name: Option<String>,
    state: State,
    storage: IndexMap<String, Slot>,
    history: IndexMap<String, History>,
}

impl Config {
    /// Create an instance with every field at its default
    ///
    /// Defaults are recorded with the label `"default"`; the schema's
    /// defaults hooks run afterwards, ancestors first.
    ///
    /// # Errors
    /// Returns error if a default is rejected by its field or a hook fails
    #[track_caller]
    pub fn new(schema: &Arc<Schema>) -> ConfigResult<Self> {
        Self::construct(schema, None, Location::caller())
    }

    /// Create an instance whose field names are prefixed with `name`
    ///
    /// # Errors
    /// Returns error if a default is rejected by its field or a hook fails
    #[track_caller]
    pub fn named(schema: &Arc<Schema>, name: impl Into<String>) -> ConfigResult<Self> {
        Self::construct(schema, Some(name.into()), Location::caller())
    }

    pub(crate) fn construct(
        schema: &Arc<Schema>,
        name: Option<String>,
        at: CallSite,
    ) -> ConfigResult<Self> {
        let mut config = Self {
            schema: Arc::clone(schema),
            name,
            state: State::Mutable,
            storage: IndexMap::with_capacity(schema.len()),
            history: IndexMap::with_capacity(schema.len()),
        };

        for field in schema.fields() {
            let field = Arc::clone(field);
            let owner = config.owner();
            let mut history = History::new();
            let slot = match field.kind() {
                FieldKind::Scalar(spec) => {
                    let value = spec
                        .accept(field.default_value())
                        .map_err(|failure| owner.fail(&field, failure))?;
                    history.record(value.clone(), at, "default");
                    Slot::Scalar(value)
                }
                FieldKind::List(_) => {
                    let list = owner.make_list(&field, field.default_value(), at)?;
                    history.record(list.as_ref().map_or(Value::Null, List::to_value), at, "default");
                    Slot::List(list)
                }
                FieldKind::Config(spec) => {
                    let sub = Self::construct(spec.schema(), Some(owner.full_name(&field)), at)?;
                    history.record(Value::from("config value set"), at, "default");
                    Slot::Config(Box::new(sub))
                }
                FieldKind::Choice(spec) => {
                    let mut dict = InstanceDict::new(
                        Arc::clone(&field),
                        owner.full_name(&field),
                        Arc::clone(spec.types()),
                        spec.is_multi(),
                    );
                    let selection = spec.default_selection().clone();
                    if selection.is_none() {
                        history.record(Value::Null, at, "default");
                    } else {
                        ChoiceMut::new(owner, Arc::clone(&field), &mut dict, &mut history)
                            .labeled("default")
                            .apply_selection(selection, at)?;
                    }
                    Slot::Choice(dict)
                }
                FieldKind::Dict(_) => {
                    let dict = owner.make_dict(&field, field.default_value())?;
                    history.record(dict.as_ref().map_or(Value::Null, Dict::to_value), at, "default");
                    Slot::Dict(dict)
                }
                FieldKind::ConfigDict(_) => {
                    history.record(Value::from("Dict initialized"), at, "default");
                    Slot::ConfigDict(Some(ConfigDict::new(owner.full_name(&field))))
                }
                FieldKind::Configurable(spec) => {
                    let target = Arc::clone(spec.target());
                    let schema = target.config_class();
                    let sub = Self::construct(&schema, Some(owner.full_name(&field)), at)?;
                    history.record(Value::from("Targeted and initialized from defaults"), at, "default");
                    Slot::Configurable(ConfigurableInstance::new(target, sub))
                }
            };
            config.storage.insert(field.name().to_string(), slot);
            config.history.insert(field.name().to_string(), history);
        }

        for hook in config.schema.defaults_hooks() {
            hook(&mut config)?;
        }

        tracing::trace!(
            "Constructed {} config {}",
            config.schema.name(),
            config.name.as_deref().unwrap_or("<root>")
        );
        Ok(config)
    }

    /// Schema of this instance
    #[inline]
    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Dotted name of this instance within its root, if any
    #[inline]
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> State {
        self.state
    }

    /// Check if frozen
    #[inline]
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.state.is_frozen()
    }

    /// Field names in declaration order
    #[must_use]
    pub fn field_names(&self) -> Vec<&str> {
        self.schema.field_names()
    }

    pub(crate) fn owner(&self) -> Owner<'_> {
        Owner {
            schema: &self.schema,
            name: self.name.as_deref(),
            state: self.state,
        }
    }

    pub(crate) fn slots(&self) -> impl Iterator<Item = (&Arc<Field>, &Slot)> {
        self.schema
            .fields()
            .filter_map(|field| self.storage.get(field.name()).map(|slot| (field, slot)))
    }

    fn unknown(&self, name: &str) -> ConfigError {
        ConfigError::UnknownField {
            field: name.to_string(),
            schema: self.schema.name().to_string(),
        }
    }

    fn lookup(&self, name: &str) -> ConfigResult<(Arc<Field>, &Slot)> {
        let field = self.schema.field(name).ok_or_else(|| self.unknown(name))?;
        let slot = self.storage.get(name).ok_or_else(|| self.unknown(name))?;
        Ok((Arc::clone(field), slot))
    }

    /// Split borrows: owner identity plus the slot and history of one field
    pub(crate) fn parts(&mut self, name: &str) -> ConfigResult<(Owner<'_>, Arc<Field>, &mut Slot, &mut History)> {
        let field = match self.schema.field(name) {
            Some(field) => Arc::clone(field),
            None => return Err(self.unknown(name)),
        };
        if !self.storage.contains_key(name) {
            return Err(self.unknown(name));
        }
        let Self {
            schema,
            name: config_name,
            state,
            storage,
            history,
        } = self;
        let owner = Owner {
            schema: &**schema,
            name: config_name.as_deref(),
            state: *state,
        };
        let slot = storage
            .get_mut(name)
            .ok_or_else(|| ConfigError::UnknownField {
                field: name.to_string(),
                schema: owner.schema.name().to_string(),
            })?;
        let history = history.entry(name.to_string()).or_default();
        Ok((owner, field, slot, history))
    }

    /// Assign a value (label `"assignment"`)
    ///
    /// List fields take a `Value::List` (or `Null`); choice fields take a
    /// name, a list of names in multi mode, or `Null` to clear the selection.
    /// Dict fields take a `Value::Map`; config dict fields take a mapping
    /// from key to a mapping of field values.
    ///
    /// # Errors
    /// Returns error on an unknown field, a frozen config, or a rejected value
    #[track_caller]
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> ConfigResult<()> {
        self.assign(name, value.into(), Location::caller(), "assignment")
    }

    /// Assign a value recorded under a custom label
    ///
    /// # Errors
    /// Same as [`Config::set`]
    #[track_caller]
    pub fn set_labeled(&mut self, name: &str, value: impl Into<Value>, label: &str) -> ConfigResult<()> {
        self.assign(name, value.into(), Location::caller(), label)
    }

    /// Reset a field to `Null` (label `"deletion"`)
    ///
    /// # Errors
    /// Returns error on an unknown field, a frozen config, or a config field
    #[track_caller]
    pub fn unset(&mut self, name: &str) -> ConfigResult<()> {
        self.assign(name, Value::Null, Location::caller(), "deletion")
    }

    /// Assign several fields in order (label `"update"`)
    ///
    /// Stops at the first rejected value; earlier assignments stay applied.
    ///
    /// # Errors
    /// Returns the first error encountered
    #[track_caller]
    pub fn update<I, K, V>(&mut self, values: I) -> ConfigResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let at = Location::caller();
        for (name, value) in values {
            self.assign(name.as_ref(), value.into(), at, "update")?;
        }
        Ok(())
    }

    pub(crate) fn assign(&mut self, name: &str, value: Value, at: CallSite, label: &str) -> ConfigResult<()> {
        let (owner, field, slot, history) = self.parts(name)?;
        owner.guard(&field)?;
        match (field.kind(), slot) {
            (FieldKind::Scalar(spec), Slot::Scalar(current)) => {
                let value = spec
                    .accept(value)
                    .map_err(|failure| owner.fail(&field, failure))?;
                history.record(value.clone(), at, label);
                *current = value;
            }
            (FieldKind::List(_), Slot::List(current)) => {
                let list = owner.make_list(&field, value, at)?;
                history.record(list.as_ref().map_or(Value::Null, List::to_value), at, label);
                *current = list;
            }
            (FieldKind::Choice(_), Slot::Choice(dict)) => {
                ChoiceMut::new(owner, Arc::clone(&field), dict, history)
                    .labeled(label)
                    .set_value(value, at)?;
            }
            (FieldKind::Dict(_), Slot::Dict(current)) => {
                let dict = owner.make_dict(&field, value)?;
                history.record(dict.as_ref().map_or(Value::Null, Dict::to_value), at, label);
                *current = dict;
            }
            (FieldKind::ConfigDict(_), Slot::ConfigDict(current)) => {
                let (dict, notes) = make_config_dict(owner, &field, value, at, label)?;
                for note in notes {
                    history.record(Value::from(note), at, label);
                }
                *current = dict;
            }
            _ => {
                return Err(owner
                    .fail(&field, Failure::WrongFieldKind { expected: "value field" })
                    .into())
            }
        }
        Ok(())
    }

    /// Copy the values of another instance of a config field's schema
    ///
    /// The nested config records each copied value under `"assignment"`;
    /// the owner records `"config value set"`. On a configurable field,
    /// `value` must be an instance of the current target's config class.
    ///
    /// # Errors
    /// Returns error if `name` is not a config or configurable field, the
    /// schemas differ, or either config is frozen
    #[track_caller]
    pub fn set_config(&mut self, name: &str, value: &Config) -> ConfigResult<()> {
        let at = Location::caller();
        let (owner, field, slot, history) = self.parts(name)?;
        owner.guard(&field)?;
        let (current, note) = match (field.kind(), slot) {
            (FieldKind::Config(_), Slot::Config(current)) => (&mut **current, Some("config value set")),
            (FieldKind::Configurable(_), Slot::Configurable(instance)) => (instance.value_mut(), None),
            _ => {
                return Err(owner
                    .fail(&field, Failure::WrongFieldKind { expected: "ConfigField" })
                    .into())
            }
        };
        if !Arc::ptr_eq(current.schema(), &value.schema) {
            return Err(owner
                .fail(
                    &field,
                    Failure::WrongSchema {
                        actual: value.schema.name().to_string(),
                        expected: current.schema().name().to_string(),
                    },
                )
                .into());
        }
        current.absorb(value, at, "assignment")?;
        if let Some(note) = note {
            history.record(Value::from(note), at, "assignment");
        }
        Ok(())
    }

    /// Copy every value of `other` (same schema) into this instance
    pub(crate) fn absorb(&mut self, other: &Config, at: CallSite, label: &str) -> ConfigResult<()> {
        for (field, slot) in other.slots() {
            let name = field.name();
            match slot {
                Slot::Scalar(value) => self.assign(name, value.clone(), at, label)?,
                Slot::List(list) => {
                    let value = list.as_ref().map_or(Value::Null, List::to_value);
                    self.assign(name, value, at, label)?;
                }
                Slot::Config(sub) => {
                    let (owner, field, slot, history) = self.parts(name)?;
                    owner.guard(&field)?;
                    if let Slot::Config(current) = slot {
                        current.absorb(sub, at, label)?;
                        history.record(Value::from("config value set"), at, label);
                    }
                }
                Slot::Choice(dict) => {
                    let mut choice = self.choice_mut(name)?.labeled(label);
                    for (key, sub) in dict.iter() {
                        choice.get_or_create_at(key, at)?.absorb(sub, at, label)?;
                    }
                    choice.apply_selection(dict.selection().clone(), at)?;
                }
                Slot::Dict(dict) => {
                    let value = dict.as_ref().map_or(Value::Null, Dict::to_value);
                    self.assign(name, value, at, label)?;
                }
                Slot::ConfigDict(None) => self.assign(name, Value::Null, at, label)?,
                Slot::ConfigDict(Some(dict)) => {
                    self.assign(name, Value::Map(IndexMap::new()), at, label)?;
                    let mut view = self.config_dict_mut(name)?.labeled(label);
                    for (key, sub) in dict.iter() {
                        view.insert_at(key.to_string(), sub, at)?;
                    }
                }
                Slot::Configurable(instance) => {
                    self.retarget_at(name, Arc::clone(instance.target()), at, label, "ConfigurableField retargeted")?;
                    self.sub_mut(name)?.absorb(instance.value(), at, label)?;
                }
            }
        }
        Ok(())
    }

    /// Apply a nested mapping of field values
    ///
    /// Mappings under config and configurable fields recurse into the
    /// sub-config; everything else is an ordinary assignment.
    pub(crate) fn apply_map(&mut self, values: &IndexMap<String, Value>, at: CallSite, label: &str) -> ConfigResult<()> {
        for (name, value) in values {
            let (field, _) = self.lookup(name)?;
            match (field.kind(), value) {
                (FieldKind::Config(_) | FieldKind::Configurable(_), Value::Map(inner)) => {
                    self.sub_mut(name)?.apply_map(inner, at, label)?;
                }
                _ => self.assign(name, value.clone(), at, label)?,
            }
        }
        Ok(())
    }

    /// Current value of a scalar, list or dict field, or a choice selection
    ///
    /// # Errors
    /// Returns error on an unknown field or a config field
    pub fn value(&self, name: &str) -> ConfigResult<Value> {
        let (field, slot) = self.lookup(name)?;
        match slot {
            Slot::Scalar(value) => Ok(value.clone()),
            Slot::List(list) => Ok(list.as_ref().map_or(Value::Null, List::to_value)),
            Slot::Choice(dict) => Ok(dict.selection().to_value()),
            Slot::Dict(dict) => Ok(dict.as_ref().map_or(Value::Null, Dict::to_value)),
            Slot::Config(_) | Slot::ConfigDict(_) | Slot::Configurable(_) => Err(self
                .owner()
                .fail(&field, Failure::WrongFieldKind { expected: "value field" })
                .into()),
        }
    }

    /// List held by a list field (`None` when the field is `Null`)
    ///
    /// # Errors
    /// Returns error on an unknown field or a non-list field
    pub fn list(&self, name: &str) -> ConfigResult<Option<&List>> {
        let (field, slot) = self.lookup(name)?;
        match slot {
            Slot::List(list) => Ok(list.as_ref()),
            _ => Err(self
                .owner()
                .fail(&field, Failure::WrongFieldKind { expected: "ListField" })
                .into()),
        }
    }

    /// Mutable view of a list field
    ///
    /// # Errors
    /// Returns error on an unknown or non-list field, or a `Null` list
    pub fn list_mut(&mut self, name: &str) -> ConfigResult<ListMut<'_>> {
        let (owner, field, slot, history) = self.parts(name)?;
        match slot {
            Slot::List(Some(list)) => Ok(ListMut::new(owner, field, list, history)),
            Slot::List(None) => Err(owner.fail(&field, Failure::NullList).into()),
            _ => Err(owner
                .fail(&field, Failure::WrongFieldKind { expected: "ListField" })
                .into()),
        }
    }

    /// Nested config held by a config or configurable field
    ///
    /// # Errors
    /// Returns error on an unknown or non-config field
    pub fn sub(&self, name: &str) -> ConfigResult<&Config> {
        let (field, slot) = self.lookup(name)?;
        match slot {
            Slot::Config(sub) => Ok(sub),
            Slot::Configurable(instance) => Ok(instance.value()),
            _ => Err(self
                .owner()
                .fail(&field, Failure::WrongFieldKind { expected: "ConfigField" })
                .into()),
        }
    }

    /// Mutable nested config held by a config or configurable field
    ///
    /// # Errors
    /// Returns error on an unknown or non-config field
    pub fn sub_mut(&mut self, name: &str) -> ConfigResult<&mut Config> {
        let (owner, field, slot, _) = self.parts(name)?;
        match slot {
            Slot::Config(sub) => Ok(sub),
            Slot::Configurable(instance) => Ok(instance.value_mut()),
            _ => Err(owner
                .fail(&field, Failure::WrongFieldKind { expected: "ConfigField" })
                .into()),
        }
    }

    /// Selection state of a choice field
    ///
    /// # Errors
    /// Returns error on an unknown or non-choice field
    pub fn choice(&self, name: &str) -> ConfigResult<&InstanceDict> {
        let (field, slot) = self.lookup(name)?;
        match slot {
            Slot::Choice(dict) => Ok(dict),
            _ => Err(self
                .owner()
                .fail(&field, Failure::WrongFieldKind { expected: "ConfigChoiceField" })
                .into()),
        }
    }

    /// Mutable selection state of a choice field
    ///
    /// # Errors
    /// Returns error on an unknown or non-choice field
    pub fn choice_mut(&mut self, name: &str) -> ConfigResult<ChoiceMut<'_>> {
        let (owner, field, slot, history) = self.parts(name)?;
        match slot {
            Slot::Choice(dict) => Ok(ChoiceMut::new(owner, field, dict, history)),
            _ => Err(owner
                .fail(&field, Failure::WrongFieldKind { expected: "ConfigChoiceField" })
                .into()),
        }
    }

    /// Items of a dict field (`None` when the field is `Null`)
    ///
    /// # Errors
    /// Returns error on an unknown or non-dict field
    pub fn dict(&self, name: &str) -> ConfigResult<Option<&Dict>> {
        let (field, slot) = self.lookup(name)?;
        match slot {
            Slot::Dict(dict) => Ok(dict.as_ref()),
            _ => Err(self
                .owner()
                .fail(&field, Failure::WrongFieldKind { expected: "DictField" })
                .into()),
        }
    }

    /// Mutable view of a dict field
    ///
    /// # Errors
    /// Returns error on an unknown or non-dict field, or a `Null` dict
    pub fn dict_mut(&mut self, name: &str) -> ConfigResult<DictMut<'_>> {
        let (owner, field, slot, history) = self.parts(name)?;
        match slot {
            Slot::Dict(Some(dict)) => Ok(DictMut::new(owner, field, dict, history)),
            Slot::Dict(None) => Err(owner.fail(&field, Failure::NullDict).into()),
            _ => Err(owner
                .fail(&field, Failure::WrongFieldKind { expected: "DictField" })
                .into()),
        }
    }

    /// Sub-configs of a config dict field (`None` when the field is `Null`)
    ///
    /// # Errors
    /// Returns error on an unknown or non-config-dict field
    pub fn config_dict(&self, name: &str) -> ConfigResult<Option<&ConfigDict>> {
        let (field, slot) = self.lookup(name)?;
        match slot {
            Slot::ConfigDict(dict) => Ok(dict.as_ref()),
            _ => Err(self
                .owner()
                .fail(&field, Failure::WrongFieldKind { expected: "ConfigDictField" })
                .into()),
        }
    }

    /// Mutable view of a config dict field
    ///
    /// # Errors
    /// Returns error on an unknown or non-config-dict field, or a `Null` dict
    pub fn config_dict_mut(&mut self, name: &str) -> ConfigResult<ConfigDictMut<'_>> {
        let (owner, field, slot, history) = self.parts(name)?;
        match slot {
            Slot::ConfigDict(Some(dict)) => Ok(ConfigDictMut::new(owner, field, dict, history)),
            Slot::ConfigDict(None) => Err(owner.fail(&field, Failure::NullDict).into()),
            _ => Err(owner
                .fail(&field, Failure::WrongFieldKind { expected: "ConfigDictField" })
                .into()),
        }
    }

    /// Target and sub-config of a configurable field
    ///
    /// # Errors
    /// Returns error on an unknown or non-configurable field
    pub fn configurable(&self, name: &str) -> ConfigResult<&ConfigurableInstance> {
        let (field, slot) = self.lookup(name)?;
        match slot {
            Slot::Configurable(instance) => Ok(instance),
            _ => Err(self
                .owner()
                .fail(&field, Failure::WrongFieldKind { expected: "ConfigurableField" })
                .into()),
        }
    }

    /// History of one field
    ///
    /// # Errors
    /// Returns error on an unknown field
    pub fn history(&self, name: &str) -> ConfigResult<&History> {
        self.history.get(name).ok_or_else(|| self.unknown(name))
    }

    /// History of one field rendered as a table
    ///
    /// # Errors
    /// Returns error on an unknown field
    pub fn format_history(&self, name: &str) -> ConfigResult<String> {
        let history = self.history(name)?;
        let title = match &self.name {
            Some(prefix) => format!("{prefix}.{name}"),
            None => name.to_string(),
        };
        Ok(history.format(&title))
    }

    /// Check required fields, structural rules and schema validators
    ///
    /// Does not modify anything, so repeated calls give the same answer.
    ///
    /// # Errors
    /// Returns the first failure found, in field declaration order
    pub fn validate(&self) -> ConfigResult<()> {
        let owner = self.owner();
        for (field, slot) in self.slots() {
            match slot {
                Slot::Scalar(value) => {
                    if value.is_null() && !field.is_optional() {
                        return Err(owner.fail(field, Failure::Required).into());
                    }
                }
                Slot::List(None) => {
                    if !field.is_optional() {
                        return Err(owner.fail(field, Failure::Required).into());
                    }
                }
                Slot::List(Some(list)) => validate_list(owner, field, list)?,
                Slot::Config(sub) => sub.validate()?,
                Slot::Choice(dict) => {
                    if dict.selection().is_none() {
                        if !field.is_optional() {
                            return Err(owner.fail(field, Failure::Required).into());
                        }
                        continue;
                    }
                    for (_, active) in dict.active() {
                        active.validate()?;
                    }
                }
                Slot::Dict(None) | Slot::ConfigDict(None) => {
                    if !field.is_optional() {
                        return Err(owner.fail(field, Failure::Required).into());
                    }
                }
                Slot::Dict(Some(dict)) => {
                    if let Some(spec) = field.dict_spec() {
                        spec.check_dict(dict.items())
                            .map_err(|failure| owner.fail(field, failure))?;
                    }
                }
                Slot::ConfigDict(Some(dict)) => validate_config_dict(owner, field, dict)?,
                Slot::Configurable(instance) => {
                    instance.value().validate()?;
                    if let FieldKind::Configurable(spec) = field.kind() {
                        if spec.check().is_some_and(|check| !check(instance.value())) {
                            let schema = instance.config_class().name().to_string();
                            return Err(owner.fail(field, Failure::ConfigCheckFailed { schema }).into());
                        }
                    }
                }
            }
        }

        for validator in self.schema.validators() {
            validator(self).map_err(|message| ConfigError::Invalid {
                schema: self.schema.name().to_string(),
                message,
            })?;
        }
        Ok(())
    }

    /// Make this config and everything it owns permanently immutable
    pub fn freeze(&mut self) {
        if self.is_frozen() {
            return;
        }
        self.state = State::Frozen;
        for slot in self.storage.values_mut() {
            match slot {
                Slot::Config(sub) => sub.freeze(),
                Slot::Choice(dict) => dict.freeze_all(),
                Slot::ConfigDict(Some(dict)) => dict.freeze_all(),
                Slot::Configurable(instance) => instance.value_mut().freeze(),
                Slot::Scalar(_) | Slot::List(_) | Slot::Dict(_) | Slot::ConfigDict(None) => {}
            }
        }
        tracing::debug!(
            "Froze {} config {}",
            self.schema.name(),
            self.name.as_deref().unwrap_or("<root>")
        );
    }

    /// Numeric subscripts on choice and dict fields are names (`algo[1]`)
    fn subscript(&self, name: &str, key: Option<&Key>) -> Option<Key> {
        match key {
            Some(Key::Index(index))
                if self.schema.field(name).is_some_and(|field| {
                    matches!(
                        field.kind(),
                        FieldKind::Choice(_) | FieldKind::Dict(_) | FieldKind::ConfigDict(_)
                    )
                }) =>
            {
                Some(Key::Name(index.to_string()))
            }
            other => other.cloned(),
        }
    }

    fn is_kind(&self, name: &str, test: impl Fn(&FieldKind) -> bool) -> bool {
        self.schema.field(name).is_some_and(|field| test(field.kind()))
    }

    /// Read a value by dotted path
    ///
    /// Supports `a.b`, `l[2]`, `d[key]`, `choice[name].x`, `dict[key].x`,
    /// `choice.name` and `choice.names`. Choice sub-configs not yet created
    /// read as defaults.
    ///
    /// # Errors
    /// Returns error if the path is malformed or does not resolve
    pub fn get_path(&self, path: &str) -> ConfigResult<Value> {
        let parsed = FieldPath::from_str(path)?;
        self.get_at(&parsed, path)
    }

    fn get_at(&self, path: &FieldPath, full: &str) -> ConfigResult<Value> {
        let Some((first, rest)) = path.split_first() else {
            return Err(invalid_path(full, "empty path"));
        };
        let name = first.name();
        let key = self.subscript(name, first.key());
        match (key.as_ref(), rest.is_empty()) {
            (None, true) => self.value(name),
            (Some(Key::Index(index)), true) => {
                let list = self.list(name)?.ok_or_else(|| invalid_path(full, "list is null"))?;
                list.get(*index)
                    .map(list::Item::to_value)
                    .ok_or_else(|| invalid_path(full, "index out of range"))
            }
            (None, false) => {
                let (field, _) = self.lookup(name)?;
                match field.kind() {
                    FieldKind::Config(_) | FieldKind::Configurable(_) => self.sub(name)?.get_at(&rest, full),
                    FieldKind::Choice(_) => {
                        let dict = self.choice(name)?;
                        let selection = selection_attribute(&rest, full)?;
                        let owner = self.owner();
                        check_selection_mode(owner, &field, dict.is_multi(), selection)?;
                        Ok(dict.selection().to_value())
                    }
                    _ => Err(invalid_path(full, "field has no sub-fields")),
                }
            }
            (Some(Key::Name(key)), true) if self.is_kind(name, |kind| matches!(kind, FieldKind::Dict(_))) => {
                let dict = self.dict(name)?.ok_or_else(|| invalid_path(full, "dict is null"))?;
                dict.get(key)
                    .cloned()
                    .ok_or_else(|| invalid_path(full, "no such key"))
            }
            (Some(Key::Name(key)), false) if self.is_kind(name, |kind| matches!(kind, FieldKind::ConfigDict(_))) => {
                let dict = self.config_dict(name)?.ok_or_else(|| invalid_path(full, "dict is null"))?;
                dict.get(key)
                    .ok_or_else(|| invalid_path(full, "no such key"))?
                    .get_at(&rest, full)
            }
            (Some(Key::Name(key)), false) => {
                let dict = self.choice(name)?;
                match dict.get(key) {
                    Some(sub) => sub.get_at(&rest, full),
                    None => {
                        let schema = dict.types().config_class(key).ok_or_else(|| {
                            dict.unknown_choice(self.owner(), key)
                        })?;
                        Self::new(&schema)?.get_at(&rest, full)
                    }
                }
            }
            (Some(Key::Name(_)), true) => Err(invalid_path(full, "cannot read a whole sub-config")),
            (Some(Key::Index(_)), false) => Err(invalid_path(full, "list elements have no sub-fields")),
        }
    }

    /// Assign a value by dotted path
    ///
    /// Goes through the same checks, errors and history as direct
    /// assignment. `l[2]` and `d[key]` record `"setitem"`; everything else
    /// records `"assignment"`. `dict[key]={...}` on a config dict field
    /// resets the item to defaults and applies the mapping.
    ///
    /// # Errors
    /// Returns error if the path is malformed, does not resolve, or the
    /// value is rejected
    #[track_caller]
    pub fn set_path(&mut self, path: &str, value: impl Into<Value>) -> ConfigResult<()> {
        self.set_path_at(path, value.into(), Location::caller())
    }

    pub(crate) fn set_path_at(&mut self, path: &str, value: Value, at: CallSite) -> ConfigResult<()> {
        let parsed = FieldPath::from_str(path)?;
        self.set_at(&parsed, path, value, at)
    }

    fn set_at(&mut self, path: &FieldPath, full: &str, value: Value, at: CallSite) -> ConfigResult<()> {
        let Some((first, rest)) = path.split_first() else {
            return Err(invalid_path(full, "empty path"));
        };
        let name = first.name();
        let key = self.subscript(name, first.key());
        match (key.as_ref(), rest.is_empty()) {
            (None, true) => self.assign(name, value, at, "assignment"),
            (Some(Key::Index(index)), true) => self.list_mut(name)?.set_with(*index, value, at),
            (None, false) => {
                let (field, _) = self.lookup(name)?;
                match field.kind() {
                    FieldKind::Config(_) | FieldKind::Configurable(_) => {
                        self.sub_mut(name)?.set_at(&rest, full, value, at)
                    }
                    FieldKind::Choice(spec) => {
                        let selection = selection_attribute(&rest, full)?;
                        check_selection_mode(self.owner(), &field, spec.is_multi(), selection)?;
                        self.choice_mut(name)?.set_value(value, at)
                    }
                    _ => Err(invalid_path(full, "field has no sub-fields")),
                }
            }
            (Some(Key::Name(key)), true) if self.is_kind(name, |kind| matches!(kind, FieldKind::Dict(_))) => {
                self.dict_mut(name)?.set_with(key.clone(), value, at)
            }
            (Some(Key::Name(key)), true) if self.is_kind(name, |kind| matches!(kind, FieldKind::ConfigDict(_))) => {
                self.config_dict_mut(name)?.set_map_at(key.clone(), value, at)
            }
            (Some(Key::Name(key)), false) if self.is_kind(name, |kind| matches!(kind, FieldKind::ConfigDict(_))) => {
                self.config_dict_mut(name)?
                    .into_config(key)?
                    .set_at(&rest, full, value, at)
            }
            (Some(Key::Name(key)), false) => self
                .choice_mut(name)?
                .into_config_at(key, at)?
                .set_at(&rest, full, value, at),
            (Some(Key::Name(_)), true) => Err(invalid_path(full, "cannot assign a whole sub-config")),
            (Some(Key::Index(_)), false) => Err(invalid_path(full, "list elements have no sub-fields")),
        }
    }
}

impl Owner<'_> {
    /// Turn an assigned value into the content of a list field
    pub(crate) fn make_list(
        &self,
        field: &Field,
        value: Value,
        at: CallSite,
    ) -> Result<Option<List>, FieldValidationError> {
        match value {
            Value::Null => Ok(None),
            Value::List(values) => list::build(*self, field, values, at).map(Some),
            other => Err(self.fail(
                field,
                Failure::NotASequence {
                    actual: other.type_name(),
                    value: other,
                },
            )),
        }
    }
}

fn validate_list(owner: Owner<'_>, field: &Field, list: &List) -> ConfigResult<()> {
    let Some(spec) = field.list_spec() else {
        return Ok(());
    };
    spec.rules()
        .check_list(&list.values())
        .map_err(|failure| owner.fail(field, failure))?;
    for nested in list.iter().filter_map(list::Item::as_nested) {
        validate_list(owner, nested.field(), nested.list())?;
    }
    Ok(())
}

fn validate_config_dict(owner: Owner<'_>, field: &Field, dict: &ConfigDict) -> ConfigResult<()> {
    let Some(spec) = field.config_dict_spec() else {
        return Ok(());
    };
    if spec.dict_check().is_some_and(|check| !check(dict)) {
        return Err(owner
            .fail(field, Failure::DictCheckFailed { value: dict.to_value() })
            .into());
    }
    for (key, item) in dict.iter() {
        item.validate()?;
        if spec.item_check().is_some_and(|check| !check(item)) {
            return Err(owner
                .fail(
                    field,
                    Failure::ConfigItemCheckFailed {
                        key: key.to_string(),
                        schema: item.schema().name().to_string(),
                    },
                )
                .into());
        }
    }
    Ok(())
}

fn invalid_path(path: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

/// `name` or `names` after a choice field
fn selection_attribute<'p>(rest: &'p FieldPath, full: &str) -> ConfigResult<&'p str> {
    match rest.segments() {
        [segment] if segment.key().is_none() && matches!(segment.name(), "name" | "names") => {
            Ok(segment.name())
        }
        _ => Err(invalid_path(full, "expected 'name' or 'names' after a choice field")),
    }
}

fn check_selection_mode(owner: Owner<'_>, field: &Field, multi: bool, attribute: &str) -> ConfigResult<()> {
    if multi == (attribute == "names") {
        Ok(())
    } else {
        Err(owner.fail(field, Failure::WrongSelectionMode { multi }).into())
    }
}

impl PartialEq for Config {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.schema, &other.schema) && self.storage == other.storage
    }
}

impl Debug for Config {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("schema", &self.schema.name())
            .field("name", &self.name)
            .field("state", &self.state)
            .field("storage", &self.storage)
            .finish_non_exhaustive()
    }
}
