//! Choice fields
//!
//! A choice field holds one lazily created sub-config per name of its
//! [`TypeMap`], plus a [`Selection`] of the active name(s). Sub-configs are
//! created on first access and kept for the life of the owner, so values
//! set on an inactive choice survive switching back to it.

use std::any::Any;
use std::fmt::Debug;
use std::panic::Location;
use std::sync::Arc;

use indexmap::map::Entry;
use indexmap::IndexMap;

use crate::config::{Config, Owner};
use crate::error::{ConfigError, ConfigResult, Failure};
use crate::field::Field;
use crate::history::{CallSite, History};
use crate::schema::Schema;
use crate::value::Value;

/// Name → schema lookup backing a choice field
pub trait TypeMap: Send + Sync + Debug {
    /// Schema registered under `name`
    fn config_class(&self, name: &str) -> Option<Arc<Schema>>;

    /// All names, in registration order
    fn names(&self) -> Vec<String>;

    /// Concrete type access for specialised dispatch
    fn as_any(&self) -> &dyn Any;
}

/// Plain name → schema map
#[derive(Debug, Default)]
pub struct ChoiceTypes {
    types: IndexMap<String, Arc<Schema>>,
}

impl ChoiceTypes {
    /// Create an empty map
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a name
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, schema: &Arc<Schema>) -> Self {
        self.types.insert(name.into(), Arc::clone(schema));
        self
    }
}

impl TypeMap for ChoiceTypes {
    fn config_class(&self, name: &str) -> Option<Arc<Schema>> {
        self.types.get(name).cloned()
    }

    fn names(&self) -> Vec<String> {
        self.types.keys().cloned().collect()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Active name(s) of a choice field
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    /// Nothing selected
    #[default]
    None,
    /// One name (single mode)
    Single(String),
    /// Names in selection order (multi mode)
    Multi(Vec<String>),
}

impl Selection {
    /// Check for an empty selection
    #[inline]
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Selected names in order
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        match self {
            Self::None => Vec::new(),
            Self::Single(name) => vec![name.as_str()],
            Self::Multi(names) => names.iter().map(String::as_str).collect(),
        }
    }

    /// As a value: `Null`, a name, or a list of names
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::None => Value::Null,
            Self::Single(name) => Value::from(name.as_str()),
            Self::Multi(names) => Value::List(names.iter().map(|n| Value::from(n.as_str())).collect()),
        }
    }

    pub(crate) fn from_value(value: Value) -> Result<Self, Failure> {
        let name = |value: Value| match value {
            Value::Str(name) => Ok(name),
            other => Err(Failure::TypeMismatch {
                actual: other.type_name(),
                expected: "str".to_string(),
                value: other,
            }),
        };
        match value {
            Value::Null => Ok(Self::None),
            Value::List(items) => items
                .into_iter()
                .map(name)
                .collect::<Result<_, _>>()
                .map(Self::Multi),
            other => name(other).map(Self::Single),
        }
    }
}

impl From<&str> for Selection {
    fn from(name: &str) -> Self {
        Self::Single(name.to_string())
    }
}

impl From<Vec<&str>> for Selection {
    fn from(names: Vec<&str>) -> Self {
        Self::Multi(names.into_iter().map(str::to_string).collect())
    }
}

/// Selection state of a choice field on one config
#[derive(Debug, Clone)]
pub struct InstanceDict {
    field: Arc<Field>,
    full_name: String,
    types: Arc<dyn TypeMap>,
    multi: bool,
    dict: IndexMap<String, Config>,
    selection: Selection,
}

impl InstanceDict {
    pub(crate) fn new(field: Arc<Field>, full_name: String, types: Arc<dyn TypeMap>, multi: bool) -> Self {
        Self {
            field,
            full_name,
            types,
            multi,
            dict: IndexMap::new(),
            selection: Selection::None,
        }
    }

    /// The choice field
    #[inline]
    #[must_use]
    pub fn field(&self) -> &Arc<Field> {
        &self.field
    }

    /// Dotted name of the field within its root config
    #[inline]
    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Name → schema lookup
    #[inline]
    #[must_use]
    pub fn types(&self) -> &Arc<dyn TypeMap> {
        &self.types
    }

    /// Whether several names may be selected
    #[inline]
    #[must_use]
    pub fn is_multi(&self) -> bool {
        self.multi
    }

    /// Current selection
    #[inline]
    #[must_use]
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Sub-config for `name`, if already created
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Config> {
        self.dict.get(name)
    }

    /// Check whether the sub-config for `name` has been created
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.dict.contains_key(name)
    }

    /// Number of created sub-configs
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.dict.len()
    }

    /// Check if no sub-config has been created
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dict.is_empty()
    }

    /// Names of created sub-configs, in creation order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.dict.keys().map(String::as_str)
    }

    /// Created sub-configs, in creation order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Config)> {
        self.dict.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Selected sub-configs, in selection order
    #[must_use]
    pub fn active(&self) -> Vec<(&str, &Config)> {
        self.selection
            .names()
            .into_iter()
            .filter_map(|name| self.dict.get_key_value(name))
            .map(|(k, v)| (k.as_str(), v))
            .collect()
    }

    pub(crate) fn unknown_choice(&self, owner: Owner<'_>, name: &str) -> ConfigError {
        ConfigError::UnknownChoice {
            field: owner.full_name(&self.field),
            name: name.to_string(),
            available: self.types.names(),
        }
    }

    pub(crate) fn freeze_all(&mut self) {
        for config in self.dict.values_mut() {
            config.freeze();
        }
    }

    /// Get or lazily create the sub-config for `name`
    fn instantiate(&mut self, owner: Owner<'_>, name: &str, at: CallSite) -> ConfigResult<&mut Config> {
        let Self { types, dict, field, .. } = self;
        match dict.entry(name.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let schema = types.config_class(name).ok_or_else(|| ConfigError::UnknownChoice {
                    field: owner.full_name(field),
                    name: name.to_string(),
                    available: types.names(),
                })?;
                let full_name = format!("{}[{name}]", owner.full_name(field));
                let mut config = Config::construct(&schema, Some(full_name), at)?;
                if owner.state.is_frozen() {
                    config.freeze();
                }
                Ok(entry.insert(config))
            }
        }
    }
}

impl PartialEq for InstanceDict {
    fn eq(&self, other: &Self) -> bool {
        self.selection == other.selection && self.dict == other.dict
    }
}

/// Mutable view of a choice field
///
/// Selection changes reject a frozen owner and record the new selection
/// (a name, a list of names, or `Null`) under `"assignment"` unless
/// [`ChoiceMut::labeled`] overrides it.
pub struct ChoiceMut<'a> {
    owner: Owner<'a>,
    field: Arc<Field>,
    dict: &'a mut InstanceDict,
    history: &'a mut History,
    label: Option<String>,
}

impl<'a> ChoiceMut<'a> {
    pub(crate) fn new(
        owner: Owner<'a>,
        field: Arc<Field>,
        dict: &'a mut InstanceDict,
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

    /// Record subsequent selection changes under `label`
    #[must_use]
    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn as_dict(&self) -> &InstanceDict {
        self.dict
    }

    /// Sub-config for `name`, created on first access
    ///
    /// A sub-config created under a frozen owner is frozen as well.
    ///
    /// # Errors
    /// Returns a lookup error if `name` is unknown
    #[track_caller]
    pub fn get_or_create(&mut self, name: &str) -> ConfigResult<&mut Config> {
        self.get_or_create_at(name, Location::caller())
    }

    pub(crate) fn get_or_create_at(&mut self, name: &str, at: CallSite) -> ConfigResult<&mut Config> {
        self.dict.instantiate(self.owner, name, at)
    }

    /// Like [`ChoiceMut::get_or_create`], keeping the borrow of the owner
    ///
    /// # Errors
    /// Returns a lookup error if `name` is unknown
    #[track_caller]
    pub fn into_config(self, name: &str) -> ConfigResult<&'a mut Config> {
        self.into_config_at(name, Location::caller())
    }

    pub(crate) fn into_config_at(self, name: &str, at: CallSite) -> ConfigResult<&'a mut Config> {
        let Self { owner, dict, .. } = self;
        dict.instantiate(owner, name, at)
    }

    /// Select one name (single mode)
    ///
    /// # Errors
    /// Returns error on a frozen owner, in multi mode, or on an unknown name
    #[track_caller]
    pub fn select(&mut self, name: &str) -> ConfigResult<()> {
        self.apply_selection(Selection::from(name), Location::caller())
    }

    /// Select several names, keeping their order (multi mode)
    ///
    /// # Errors
    /// Returns error on a frozen owner, in single mode, or on an unknown name
    #[track_caller]
    pub fn select_many<I, S>(&mut self, names: I) -> ConfigResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names = names.into_iter().map(Into::into).collect();
        self.apply_selection(Selection::Multi(names), Location::caller())
    }

    /// Clear the selection
    ///
    /// # Errors
    /// Returns error on a frozen owner
    #[track_caller]
    pub fn clear(&mut self) -> ConfigResult<()> {
        self.apply_selection(Selection::None, Location::caller())
    }

    /// Copy `value` into the sub-config for `name`
    ///
    /// `value` must be an instance of exactly the schema registered under
    /// `name`. Each copied value is recorded in the sub-config's history.
    ///
    /// # Errors
    /// Returns error on a frozen owner, an unknown name, or a schema mismatch
    #[track_caller]
    pub fn assign(&mut self, name: &str, value: &Config) -> ConfigResult<()> {
        let at = Location::caller();
        self.owner.guard(&self.field)?;
        let schema = self
            .dict
            .types
            .config_class(name)
            .ok_or_else(|| self.dict.unknown_choice(self.owner, name))?;
        if !Arc::ptr_eq(&schema, value.schema()) {
            return Err(self
                .owner
                .fail(
                    &self.field,
                    Failure::WrongSchema {
                        actual: value.schema().name().to_string(),
                        expected: schema.name().to_string(),
                    },
                )
                .into());
        }
        let label = self.label.clone().unwrap_or_else(|| "assignment".to_string());
        self.get_or_create_at(name, at)?.absorb(value, at, &label)
    }

    /// Set the selection from a value: a name, a list of names, or `Null`
    pub(crate) fn set_value(&mut self, value: Value, at: CallSite) -> ConfigResult<()> {
        let selection =
            Selection::from_value(value).map_err(|failure| self.owner.fail(&self.field, failure))?;
        self.apply_selection(selection, at)
    }

    pub(crate) fn apply_selection(&mut self, selection: Selection, at: CallSite) -> ConfigResult<()> {
        self.owner.guard(&self.field)?;
        let selection = match selection {
            Selection::Single(_) if self.dict.multi => {
                return Err(self.wrong_mode());
            }
            Selection::Multi(_) if !self.dict.multi => {
                return Err(self.wrong_mode());
            }
            Selection::Multi(names) => {
                let mut unique: Vec<String> = Vec::with_capacity(names.len());
                for name in names {
                    if !unique.contains(&name) {
                        unique.push(name);
                    }
                }
                Selection::Multi(unique)
            }
            other => other,
        };

        for name in selection.names() {
            self.dict.instantiate(self.owner, name, at)?;
        }

        let label = self.label.as_deref().unwrap_or("assignment");
        self.history.record(selection.to_value(), at, label);
        tracing::debug!(
            "Selected {} for {}",
            selection.to_value(),
            self.owner.full_name(&self.field)
        );
        self.dict.selection = selection;
        Ok(())
    }

    fn wrong_mode(&self) -> ConfigError {
        self.owner
            .fail(&self.field, Failure::WrongSelectionMode { multi: self.dict.multi })
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_values() {
        assert_eq!(Selection::None.to_value(), Value::Null);
        assert_eq!(Selection::from("a").to_value(), Value::from("a"));
        assert_eq!(
            Selection::from(vec!["b", "a"]).to_value(),
            Value::from(vec!["b", "a"])
        );
        assert_eq!(Selection::from(vec!["b", "a"]).names(), vec!["b", "a"]);
    }

    #[test]
    fn selection_from_value() {
        assert_eq!(Selection::from_value(Value::from("x")), Ok(Selection::from("x")));
        assert_eq!(Selection::from_value(Value::Null), Ok(Selection::None));
        assert!(matches!(
            Selection::from_value(Value::Int(1)),
            Err(Failure::TypeMismatch { actual: "int", .. })
        ));
    }

    #[test]
    fn choice_types_keep_order() {
        let a = Schema::builder("A").build().unwrap();
        let b = Schema::builder("B").build().unwrap();
        let types = ChoiceTypes::new().with("b", &b).with("a", &a);
        assert_eq!(types.names(), vec!["b", "a"]);
        assert!(Arc::ptr_eq(&types.config_class("a").unwrap(), &a));
        assert!(types.config_class("c").is_none());
    }
}
