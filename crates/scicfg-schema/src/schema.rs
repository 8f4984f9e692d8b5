//! Config schemas
//!
//! A [`Schema`] is one config class: an ordered table of named [`Field`]s,
//! optionally extending a parent schema. Schemas are assembled with
//! [`SchemaBuilder`] and shared as `Arc<Schema>`.

use std::fmt::{self, Debug, Formatter};
use std::panic::Location;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::config::Config;
use crate::error::{ConfigResult, DefinitionError};
use crate::field::Field;
use crate::history::CallSite;
use crate::path::is_valid_name;

/// Hook run after field defaults are populated
pub type DefaultsHook = Arc<dyn Fn(&mut Config) -> ConfigResult<()> + Send + Sync>;

/// Inter-field check run at the end of `Config::validate`
pub type Validator = Arc<dyn Fn(&Config) -> Result<(), String> + Send + Sync>;

/// A config class
pub struct Schema {
    name: String,
    doc: String,
    parent: Option<Arc<Schema>>,
    fields: IndexMap<String, Arc<Field>>,
    source: CallSite,
    defaults: Vec<DefaultsHook>,
    validators: Vec<Validator>,
}

impl Schema {
    /// Start a schema declaration
    #[track_caller]
    #[must_use]
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            name: name.into(),
            doc: String::new(),
            parent: None,
            fields: Vec::new(),
            source: Location::caller(),
            defaults: Vec::new(),
            validators: Vec::new(),
        }
    }

    /// Schema name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Documentation
    #[inline]
    #[must_use]
    pub fn doc(&self) -> &str {
        &self.doc
    }

    /// Declaration call-site
    #[inline]
    #[must_use]
    pub fn source(&self) -> CallSite {
        self.source
    }

    /// Parent schema, if this one extends another
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<&Arc<Schema>> {
        self.parent.as_ref()
    }

    /// Look up a field (inherited fields included)
    #[inline]
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Arc<Field>> {
        self.fields.get(name)
    }

    /// All fields in declaration order, inherited fields first
    pub fn fields(&self) -> impl Iterator<Item = &Arc<Field>> {
        self.fields.values()
    }

    /// Field names in declaration order
    #[must_use]
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    /// Number of fields
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the schema has no fields
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Check whether this schema is `other` or extends it
    #[must_use]
    pub fn is_subclass_of(&self, other: &Schema) -> bool {
        let mut current = Some(self);
        while let Some(schema) = current {
            if std::ptr::eq(schema, other) {
                return true;
            }
            current = schema.parent.as_deref();
        }
        false
    }

    /// Ancestors from the root down to this schema
    fn lineage(&self) -> Vec<&Schema> {
        let mut chain = Vec::new();
        let mut current = Some(self);
        while let Some(schema) = current {
            chain.push(schema);
            current = schema.parent.as_deref();
        }
        chain.reverse();
        chain
    }

    /// Defaults hooks, root ancestor first
    pub(crate) fn defaults_hooks(&self) -> Vec<DefaultsHook> {
        self.lineage()
            .into_iter()
            .flat_map(|s| s.defaults.iter().cloned())
            .collect()
    }

    /// Inter-field validators, root ancestor first
    pub(crate) fn validators(&self) -> Vec<Validator> {
        self.lineage()
            .into_iter()
            .flat_map(|s| s.validators.iter().cloned())
            .collect()
    }
}

impl Debug for Schema {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(|p| p.name()))
            .field("fields", &self.field_names())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Schema`]
pub struct SchemaBuilder {
    name: String,
    doc: String,
    parent: Option<Arc<Schema>>,
    fields: Vec<(String, Field)>,
    source: CallSite,
    defaults: Vec<DefaultsHook>,
    validators: Vec<Validator>,
}

impl SchemaBuilder {
    /// Set documentation
    #[must_use]
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    /// Inherit every field, hook and validator of `parent`
    #[must_use]
    pub fn extends(mut self, parent: &Arc<Schema>) -> Self {
        self.parent = Some(Arc::clone(parent));
        self
    }

    /// Declare a field
    ///
    /// A field with the same name as an inherited one replaces it in place.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, field: impl Into<Field>) -> Self {
        self.fields.push((name.into(), field.into()));
        self
    }

    /// Add a hook that adjusts defaults after construction
    #[must_use]
    pub fn on_defaults(
        mut self,
        hook: impl Fn(&mut Config) -> ConfigResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.defaults.push(Arc::new(hook));
        self
    }

    /// Add an inter-field validator
    #[must_use]
    pub fn validator(
        mut self,
        check: impl Fn(&Config) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.validators.push(Arc::new(check));
        self
    }

    /// Bind field names and finish the schema
    ///
    /// # Errors
    /// Returns error on an invalid or duplicate field name
    pub fn build(self) -> Result<Arc<Schema>, DefinitionError> {
        let mut fields: IndexMap<String, Arc<Field>> = self
            .parent
            .as_ref()
            .map(|p| p.fields.clone())
            .unwrap_or_default();

        let mut declared = Vec::with_capacity(self.fields.len());
        for (name, mut field) in self.fields {
            if !is_valid_name(&name) {
                return Err(DefinitionError::InvalidFieldName(name));
            }
            if declared.contains(&name) {
                return Err(DefinitionError::DuplicateField {
                    field: name,
                    schema: self.name,
                });
            }
            field.bind(&name);
            fields.insert(name.clone(), Arc::new(field));
            declared.push(name);
        }

        tracing::debug!(
            "Built schema {} with {} fields ({} inherited)",
            self.name,
            fields.len(),
            fields.len() - declared.len()
        );

        Ok(Arc::new(Schema {
            name: self.name,
            doc: self.doc,
            parent: self.parent,
            fields,
            source: self.source,
            defaults: self.defaults,
            validators: self.validators,
        }))
    }
}
