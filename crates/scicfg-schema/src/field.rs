//! Field descriptors
//!
//! A [`Field`] is a typed, named slot declared on a [`Schema`]. Fields are
//! built with small builders and become immutable once the schema is built:
//!
//! - [`Field::new`]: scalar field with an optional `check`
//! - [`RangeField`]: numeric field restricted to a range
//! - [`ChoiceField`]: scalar restricted to an enumerated set
//! - [`ListField`]: list of scalars, or list of lists via [`ListField::nested`]
//! - [`ConfigField`]: nested config
//! - [`ConfigChoiceField`]: choice among named sub-config schemas
//! - [`DictField`]: string-keyed mapping of scalars
//! - [`ConfigDictField`]: string-keyed mapping of sub-configs
//! - [`ConfigurableField`]: sub-config paired with a retargetable [`Target`]
//!
//! [`Schema`]: crate::Schema
//! [`Target`]: crate::Target

use std::collections::BTreeMap;
use std::fmt::{self, Debug, Display, Formatter};
use std::panic::Location;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::choice::{Selection, TypeMap};
use crate::config::Config;
use crate::configurable::Target;
use crate::dict::ConfigDict;
use crate::error::{DefinitionError, Failure};
use crate::history::CallSite;
use crate::schema::Schema;
use crate::value::{Dtype, Value};

/// Predicate over a single value
pub type Check = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Predicate over a whole list
pub type ListCheck = Arc<dyn Fn(&[Value]) -> bool + Send + Sync>;

/// Predicate over a whole dict
pub type DictCheck = Arc<dyn Fn(&IndexMap<String, Value>) -> bool + Send + Sync>;

/// Predicate over a sub-config
pub type ConfigCheck = Arc<dyn Fn(&Config) -> bool + Send + Sync>;

/// Predicate over a whole dict of sub-configs
pub type ConfigDictCheck = Arc<dyn Fn(&ConfigDict) -> bool + Send + Sync>;

/// A typed slot on a schema
pub struct Field {
    name: String,
    doc: String,
    optional: bool,
    source: CallSite,
    kind: FieldKind,
}

/// What a field holds
pub enum FieldKind {
    /// Single scalar value
    Scalar(ScalarSpec),
    /// List (plain or nested)
    List(ListSpec),
    /// Nested config
    Config(ConfigSpec),
    /// Choice among named sub-configs
    Choice(ChoiceSpec),
    /// String-keyed mapping of scalars
    Dict(DictSpec),
    /// String-keyed mapping of sub-configs
    ConfigDict(ConfigDictSpec),
    /// Sub-config of a retargetable target
    Configurable(ConfigurableSpec),
}

impl Field {
    /// Start a scalar field declaration
    #[track_caller]
    #[must_use]
    #[allow(clippy::new_ret_no_self)]
    pub fn new(doc: impl Into<String>, dtype: Dtype) -> ScalarField {
        ScalarField {
            doc: doc.into(),
            spec: ScalarSpec {
                dtype,
                default: Value::Null,
                check: None,
                constraint: Constraint::None,
            },
            optional: false,
            source: Location::caller(),
        }
    }

    fn from_parts(doc: String, optional: bool, source: CallSite, kind: FieldKind) -> Self {
        Self {
            name: String::new(),
            doc,
            optional,
            source,
            kind,
        }
    }

    pub(crate) fn bind(&mut self, name: &str) {
        self.name = name.to_string();
    }

    /// Field name within its schema (empty until the schema is built)
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

    /// Whether `Null` passes `Config::validate`
    #[inline]
    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Declaration call-site
    #[inline]
    #[must_use]
    pub fn source(&self) -> CallSite {
        self.source
    }

    /// Field kind
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// Kind name used in error messages
    #[must_use]
    pub fn field_type(&self) -> &'static str {
        match &self.kind {
            FieldKind::Scalar(spec) => match spec.constraint {
                Constraint::None => "Field",
                Constraint::Range(_) => "RangeField",
                Constraint::Allowed(_) => "ChoiceField",
            },
            FieldKind::List(spec) if spec.is_nested() => "NestedListField",
            FieldKind::List(_) => "ListField",
            FieldKind::Config(_) => "ConfigField",
            FieldKind::Choice(spec) => spec.field_type,
            FieldKind::Dict(_) => "DictField",
            FieldKind::ConfigDict(_) => "ConfigDictField",
            FieldKind::Configurable(_) => "ConfigurableField",
        }
    }

    /// Declared type, as shown in error messages
    #[must_use]
    pub fn dtype_name(&self) -> String {
        match &self.kind {
            FieldKind::Scalar(spec) => spec.dtype.to_string(),
            FieldKind::List(spec) if spec.is_nested() => format!("list[list[{}]]", spec.dtype),
            FieldKind::List(spec) => format!("list[{}]", spec.dtype),
            FieldKind::Config(spec) => spec.schema.name().to_string(),
            FieldKind::Choice(_) => "choice".to_string(),
            FieldKind::Dict(spec) => format!("dict[str, {}]", spec.dtype),
            FieldKind::ConfigDict(spec) => format!("dict[str, {}]", spec.schema.name()),
            FieldKind::Configurable(spec) => spec.target.config_class().name().to_string(),
        }
    }

    pub(crate) fn list_spec(&self) -> Option<&ListSpec> {
        match &self.kind {
            FieldKind::List(spec) => Some(spec),
            _ => None,
        }
    }

    pub(crate) fn dict_spec(&self) -> Option<&DictSpec> {
        match &self.kind {
            FieldKind::Dict(spec) => Some(spec),
            _ => None,
        }
    }

    pub(crate) fn config_dict_spec(&self) -> Option<&ConfigDictSpec> {
        match &self.kind {
            FieldKind::ConfigDict(spec) => Some(spec),
            _ => None,
        }
    }

    /// Per-index sub-field of a nested list field
    ///
    /// Created on first request and cached, so repeated calls with the same
    /// index return the same `Arc`. Returns `None` for other field kinds.
    ///
    /// Sub-fields are optional (an element list may be `Null`) and report
    /// the parent field's declaration site.
    #[must_use]
    pub fn subfield(&self, index: usize) -> Option<Arc<Field>> {
        let FieldKind::List(spec) = &self.kind else {
            return None;
        };
        let ItemPolicy::Nested(nested) = &spec.policy else {
            return None;
        };
        let mut cache = nested.subfields.lock();
        let field = cache.entry(index).or_insert_with(|| {
            let sub = ListSpec {
                dtype: spec.dtype,
                policy: ItemPolicy::Plain,
                rules: nested.rules.clone(),
                default: Value::Null,
            };
            let mut field = Field::from_parts(
                format!("subfield[{index}] of {}", self.name),
                true,
                self.source,
                FieldKind::List(sub),
            );
            field.bind(&format!("{}[{index}]", self.name));
            Arc::new(field)
        });
        Some(Arc::clone(field))
    }

    /// Default value (`Null` for fields holding sub-configs)
    #[must_use]
    pub fn default_value(&self) -> Value {
        match &self.kind {
            FieldKind::Scalar(spec) => spec.default.clone(),
            FieldKind::List(spec) => spec.default.clone(),
            FieldKind::Dict(spec) => spec.default.clone(),
            FieldKind::Choice(spec) => spec.default.to_value(),
            FieldKind::Config(_) | FieldKind::ConfigDict(_) | FieldKind::Configurable(_) => Value::Null,
        }
    }
}

impl Debug for Field {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("type", &self.field_type())
            .field("dtype", &self.dtype_name())
            .field("optional", &self.optional)
            .finish_non_exhaustive()
    }
}

/// Extra restriction on a scalar field
#[derive(Clone)]
pub enum Constraint {
    /// None beyond type and check
    None,
    /// Numeric range
    Range(Range),
    /// Enumerated values with their docs
    Allowed(Vec<(Value, String)>),
}

/// Scalar field parameters
#[derive(Clone)]
pub struct ScalarSpec {
    dtype: Dtype,
    default: Value,
    check: Option<Check>,
    constraint: Constraint,
}

impl ScalarSpec {
    /// Declared type
    #[inline]
    #[must_use]
    pub fn dtype(&self) -> Dtype {
        self.dtype
    }

    /// Extra restriction
    #[inline]
    #[must_use]
    pub fn constraint(&self) -> &Constraint {
        &self.constraint
    }

    /// Coerce and validate a value for assignment
    pub(crate) fn accept(&self, value: Value) -> Result<Value, Failure> {
        if value.is_null() {
            return Ok(value);
        }
        let value = self.dtype.coerce(value);
        if !self.dtype.accepts(&value) {
            return Err(Failure::TypeMismatch {
                actual: value.type_name(),
                expected: self.dtype.to_string(),
                value,
            });
        }
        if let Some(check) = &self.check {
            if !check(&value) {
                return Err(Failure::CheckFailed { value });
            }
        }
        match &self.constraint {
            Constraint::None => {}
            Constraint::Range(range) => {
                if !range.contains(&value) {
                    return Err(Failure::OutOfRange {
                        range: range.to_string(),
                        value,
                    });
                }
            }
            Constraint::Allowed(allowed) => {
                if !allowed.iter().any(|(choice, _)| *choice == value) {
                    return Err(Failure::NotAllowed { value });
                }
            }
        }
        Ok(value)
    }
}

/// Builder for scalar fields
pub struct ScalarField {
    doc: String,
    spec: ScalarSpec,
    optional: bool,
    source: CallSite,
}

impl ScalarField {
    /// Set the default value
    #[must_use]
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.spec.default = value.into();
        self
    }

    /// Allow `Null` at validation time
    #[must_use]
    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    /// Add a custom predicate checked on every non-null assignment
    #[must_use]
    pub fn with_check(mut self, check: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        self.spec.check = Some(Arc::new(check));
        self
    }
}

impl From<ScalarField> for Field {
    fn from(builder: ScalarField) -> Self {
        Field::from_parts(
            builder.doc,
            builder.optional,
            builder.source,
            FieldKind::Scalar(builder.spec),
        )
    }
}

/// Numeric bounds of a range field
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    min: Option<f64>,
    max: Option<f64>,
    inclusive_min: bool,
    inclusive_max: bool,
}

impl Range {
    /// Check a numeric value against the bounds
    #[must_use]
    pub fn contains(&self, value: &Value) -> bool {
        let Some(x) = value.as_float() else {
            return false;
        };
        let above = match self.min {
            None => true,
            Some(min) if self.inclusive_min => x >= min,
            Some(min) => x > min,
        };
        let below = match self.max {
            None => true,
            Some(max) if self.inclusive_max => x <= max,
            Some(max) => x < max,
        };
        above && below
    }
}

impl Display for Range {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let open = if self.inclusive_min { '[' } else { '(' };
        let close = if self.inclusive_max { ']' } else { ')' };
        let min = self.min.map_or_else(|| "-inf".to_string(), |v| format!("{v:?}"));
        let max = self.max.map_or_else(|| "inf".to_string(), |v| format!("{v:?}"));
        write!(f, "{open}{min},{max}{close}")
    }
}

/// Builder for range-restricted numeric fields
pub struct RangeField {
    doc: String,
    dtype: Dtype,
    default: Value,
    optional: bool,
    range: Range,
    source: CallSite,
}

impl RangeField {
    /// Start a range field declaration
    #[track_caller]
    #[must_use]
    pub fn new(doc: impl Into<String>, dtype: Dtype) -> Self {
        Self {
            doc: doc.into(),
            dtype,
            default: Value::Null,
            optional: false,
            range: Range {
                min: None,
                max: None,
                inclusive_min: true,
                inclusive_max: false,
            },
            source: Location::caller(),
        }
    }

    /// Lower bound
    #[must_use]
    pub fn min(mut self, min: f64) -> Self {
        self.range.min = Some(min);
        self
    }

    /// Upper bound
    #[must_use]
    pub fn max(mut self, max: f64) -> Self {
        self.range.max = Some(max);
        self
    }

    /// Whether the lower bound is included (default `true`)
    #[must_use]
    pub fn inclusive_min(mut self, inclusive: bool) -> Self {
        self.range.inclusive_min = inclusive;
        self
    }

    /// Whether the upper bound is included (default `false`)
    #[must_use]
    pub fn inclusive_max(mut self, inclusive: bool) -> Self {
        self.range.inclusive_max = inclusive;
        self
    }

    /// Set the default value
    #[must_use]
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = value.into();
        self
    }

    /// Allow `Null` at validation time
    #[must_use]
    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    /// Finish the declaration
    ///
    /// # Errors
    /// Returns error if the dtype is not numeric or both bounds are missing
    pub fn build(mut self) -> Result<Field, DefinitionError> {
        if !self.dtype.is_numeric() {
            return Err(DefinitionError::NonNumericRange(self.dtype.to_string()));
        }
        let range = &mut self.range;
        match (range.min, range.max) {
            (None, None) => return Err(DefinitionError::EmptyRange),
            (Some(min), Some(max)) if min > max => {
                range.min = Some(max);
                range.max = Some(min);
            }
            _ => {}
        }
        let spec = ScalarSpec {
            dtype: self.dtype,
            default: self.default,
            check: None,
            constraint: Constraint::Range(self.range),
        };
        Ok(Field::from_parts(
            format!("{}\n\tValid Range = {}", self.doc, self.range),
            self.optional,
            self.source,
            FieldKind::Scalar(spec),
        ))
    }
}

/// Builder for fields restricted to an enumerated set of values
pub struct ChoiceField {
    doc: String,
    dtype: Dtype,
    allowed: Vec<(Value, String)>,
    default: Value,
    optional: bool,
    source: CallSite,
}

impl ChoiceField {
    /// Start a choice field declaration (optional by default)
    #[track_caller]
    #[must_use]
    pub fn new(doc: impl Into<String>, dtype: Dtype) -> Self {
        Self {
            doc: doc.into(),
            dtype,
            allowed: Vec::new(),
            default: Value::Null,
            optional: true,
            source: Location::caller(),
        }
    }

    /// Add an allowed value with its documentation
    #[must_use]
    pub fn allow(mut self, value: impl Into<Value>, doc: impl Into<String>) -> Self {
        self.allowed.push((value.into(), doc.into()));
        self
    }

    /// Set the default value
    #[must_use]
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = value.into();
        self
    }

    /// Allow `Null` (default `true`)
    #[must_use]
    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    /// Finish the declaration
    ///
    /// # Errors
    /// Returns error if no choices are given or a choice has the wrong type
    pub fn build(self) -> Result<Field, DefinitionError> {
        if self.allowed.is_empty() {
            return Err(DefinitionError::EmptyChoices);
        }
        let mut doc = format!("{}\nAllowed values:\n", self.doc);
        for (choice, choice_doc) in &self.allowed {
            if !self.dtype.accepts(choice) {
                return Err(DefinitionError::ChoiceTypeMismatch {
                    choice: choice.to_string(),
                    actual: choice.type_name(),
                    expected: self.dtype.to_string(),
                });
            }
            doc.push_str(&format!("\t{choice}\t{choice_doc}\n"));
        }
        let spec = ScalarSpec {
            dtype: self.dtype,
            default: self.default,
            check: None,
            constraint: Constraint::Allowed(self.allowed),
        };
        Ok(Field::from_parts(
            doc,
            self.optional,
            self.source,
            FieldKind::Scalar(spec),
        ))
    }
}

/// Whole-list and per-item rules of a list field
#[derive(Clone, Default)]
pub struct ListRules {
    item_check: Option<Check>,
    list_check: Option<ListCheck>,
    length: Option<usize>,
    min_length: Option<usize>,
    max_length: Option<usize>,
}

impl ListRules {
    /// Exact required length
    #[inline]
    #[must_use]
    pub fn length(&self) -> Option<usize> {
        self.length
    }

    /// Minimum length (never set together with `length`)
    #[inline]
    #[must_use]
    pub fn min_length(&self) -> Option<usize> {
        self.min_length
    }

    /// Maximum length (never set together with `length`)
    #[inline]
    #[must_use]
    pub fn max_length(&self) -> Option<usize> {
        self.max_length
    }

    pub(crate) fn item_check(&self) -> Option<&Check> {
        self.item_check.as_ref()
    }

    fn normalize(mut self) -> Result<Self, DefinitionError> {
        if let Some(length) = self.length {
            if length == 0 {
                return Err(DefinitionError::NonPositiveLength { param: "length", value: 0 });
            }
            self.min_length = None;
            self.max_length = None;
        } else {
            if self.max_length == Some(0) {
                return Err(DefinitionError::NonPositiveLength { param: "maxLength", value: 0 });
            }
            if let (Some(min), Some(max)) = (self.min_length, self.max_length) {
                if min > max {
                    return Err(DefinitionError::MinExceedsMax { min, max });
                }
            }
        }
        Ok(self)
    }

    /// Whole-list checks, run by `Config::validate`
    pub(crate) fn check_list(&self, items: &[Value]) -> Result<(), Failure> {
        let len = items.len();
        if let Some(required) = self.length {
            if len != required {
                return Err(Failure::LengthMismatch { required, actual: len });
            }
        }
        if let Some(min) = self.min_length {
            if len < min {
                return Err(Failure::TooShort { min, actual: len });
            }
        }
        if let Some(max) = self.max_length {
            if len > max {
                return Err(Failure::TooLong { max, actual: len });
            }
        }
        if let Some(check) = &self.list_check {
            if !check(items) {
                return Err(Failure::ListCheckFailed {
                    value: Value::List(items.to_vec()),
                });
            }
        }
        Ok(())
    }
}

/// How list elements are transformed on insertion
pub enum ItemPolicy {
    /// Elements are stored as given
    Plain,
    /// Sequence elements become nested lists bound to per-index sub-fields
    Nested(NestedItems),
}

/// Sub-field template and per-index cache of a nested list field
pub struct NestedItems {
    rules: ListRules,
    subfields: Mutex<BTreeMap<usize, Arc<Field>>>,
}

impl NestedItems {
    /// Rules every nested sub-list follows
    #[inline]
    #[must_use]
    pub fn rules(&self) -> &ListRules {
        &self.rules
    }
}

/// List field parameters
pub struct ListSpec {
    dtype: Dtype,
    policy: ItemPolicy,
    rules: ListRules,
    default: Value,
}

impl ListSpec {
    /// Scalar type of the (innermost) items
    #[inline]
    #[must_use]
    pub fn dtype(&self) -> Dtype {
        self.dtype
    }

    /// Item transform policy
    #[inline]
    #[must_use]
    pub fn policy(&self) -> &ItemPolicy {
        &self.policy
    }

    /// Whole-list and per-item rules
    #[inline]
    #[must_use]
    pub fn rules(&self) -> &ListRules {
        &self.rules
    }

    /// Whether elements are nested lists
    #[inline]
    #[must_use]
    pub fn is_nested(&self) -> bool {
        matches!(self.policy, ItemPolicy::Nested(_))
    }
}

/// Builder for list fields
pub struct ListField {
    doc: String,
    dtype: Dtype,
    nested: Option<ListRules>,
    rules: ListRules,
    default: Value,
    optional: bool,
    source: CallSite,
}

impl ListField {
    /// Start a list-of-scalars declaration
    #[track_caller]
    #[must_use]
    pub fn new(doc: impl Into<String>, dtype: Dtype) -> Self {
        Self {
            doc: doc.into(),
            dtype,
            nested: None,
            rules: ListRules::default(),
            default: Value::Null,
            optional: false,
            source: Location::caller(),
        }
    }

    /// Start a list-of-lists declaration
    ///
    /// Elements are lists of `dtype`; the rules given to [`ListField::sublist`]
    /// apply to every element list.
    #[track_caller]
    #[must_use]
    pub fn nested(doc: impl Into<String>, dtype: Dtype) -> Self {
        let mut builder = Self::new(doc, dtype);
        builder.source = Location::caller();
        builder.nested = Some(ListRules::default());
        builder
    }

    /// Configure the rules of each element list of a nested field
    ///
    /// Has no effect on plain list fields.
    #[must_use]
    pub fn sublist(mut self, configure: impl FnOnce(SubList) -> SubList) -> Self {
        if let Some(rules) = self.nested.take() {
            self.nested = Some(configure(SubList(rules)).0);
        }
        self
    }

    /// Set the default list
    #[must_use]
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = value.into();
        self
    }

    /// Allow `Null` at validation time
    #[must_use]
    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    /// Require an exact length (overrides min/max)
    #[must_use]
    pub fn length(mut self, length: usize) -> Self {
        self.rules.length = Some(length);
        self
    }

    /// Require a minimum length
    #[must_use]
    pub fn min_length(mut self, min: usize) -> Self {
        self.rules.min_length = Some(min);
        self
    }

    /// Require a maximum length
    #[must_use]
    pub fn max_length(mut self, max: usize) -> Self {
        self.rules.max_length = Some(max);
        self
    }

    /// Predicate checked on each non-null element at insertion
    #[must_use]
    pub fn item_check(mut self, check: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        self.rules.item_check = Some(Arc::new(check));
        self
    }

    /// Predicate checked on the whole list by `Config::validate`
    #[must_use]
    pub fn list_check(mut self, check: impl Fn(&[Value]) -> bool + Send + Sync + 'static) -> Self {
        self.rules.list_check = Some(Arc::new(check));
        self
    }

    /// Finish the declaration
    ///
    /// # Errors
    /// Returns error if a length parameter is zero or `min_length > max_length`
    pub fn build(self) -> Result<Field, DefinitionError> {
        let rules = self.rules.normalize()?;
        let policy = match self.nested {
            None => ItemPolicy::Plain,
            Some(sub) => ItemPolicy::Nested(NestedItems {
                rules: sub.normalize()?,
                subfields: Mutex::new(BTreeMap::new()),
            }),
        };
        let spec = ListSpec {
            dtype: self.dtype,
            policy,
            rules,
            default: self.default,
        };
        Ok(Field::from_parts(
            self.doc,
            self.optional,
            self.source,
            FieldKind::List(spec),
        ))
    }
}

/// Rules for the element lists of a nested list field
pub struct SubList(ListRules);

impl SubList {
    /// Require an exact length of every element list
    #[must_use]
    pub fn length(mut self, length: usize) -> Self {
        self.0.length = Some(length);
        self
    }

    /// Require a minimum length of every element list
    #[must_use]
    pub fn min_length(mut self, min: usize) -> Self {
        self.0.min_length = Some(min);
        self
    }

    /// Require a maximum length of every element list
    #[must_use]
    pub fn max_length(mut self, max: usize) -> Self {
        self.0.max_length = Some(max);
        self
    }

    /// Predicate checked on each non-null scalar of an element list
    #[must_use]
    pub fn item_check(mut self, check: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        self.0.item_check = Some(Arc::new(check));
        self
    }

    /// Predicate checked on each whole element list by `Config::validate`
    #[must_use]
    pub fn list_check(mut self, check: impl Fn(&[Value]) -> bool + Send + Sync + 'static) -> Self {
        self.0.list_check = Some(Arc::new(check));
        self
    }
}

/// Nested config field parameters
pub struct ConfigSpec {
    schema: Arc<Schema>,
}

impl ConfigSpec {
    /// Schema of the nested config
    #[inline]
    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}

/// Constructor for nested config fields
pub struct ConfigField;

impl ConfigField {
    /// Declare a field holding a config of `schema`
    ///
    /// The default is a default-constructed instance of `schema`.
    #[track_caller]
    #[must_use]
    #[allow(clippy::new_ret_no_self)]
    pub fn new(doc: impl Into<String>, schema: &Arc<Schema>) -> Field {
        Field::from_parts(
            doc.into(),
            false,
            Location::caller(),
            FieldKind::Config(ConfigSpec {
                schema: Arc::clone(schema),
            }),
        )
    }
}

/// Choice field parameters
pub struct ChoiceSpec {
    types: Arc<dyn TypeMap>,
    multi: bool,
    default: Selection,
    field_type: &'static str,
}

impl ChoiceSpec {
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

    /// Default selection
    #[inline]
    #[must_use]
    pub fn default_selection(&self) -> &Selection {
        &self.default
    }
}

/// Builder for fields choosing among named sub-config schemas
pub struct ConfigChoiceField {
    doc: String,
    spec: ChoiceSpec,
    optional: bool,
    source: CallSite,
}

impl ConfigChoiceField {
    /// Start a choice declaration over `types`
    #[track_caller]
    #[must_use]
    pub fn new(doc: impl Into<String>, types: Arc<dyn TypeMap>) -> Self {
        Self {
            doc: doc.into(),
            spec: ChoiceSpec {
                types,
                multi: false,
                default: Selection::None,
                field_type: "ConfigChoiceField",
            },
            optional: false,
            source: Location::caller(),
        }
    }

    /// Allow several names to be selected at once
    #[must_use]
    pub fn multi(mut self, multi: bool) -> Self {
        self.spec.multi = multi;
        self
    }

    /// Allow an empty selection at validation time
    #[must_use]
    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    /// Selection made when a config is constructed
    #[must_use]
    pub fn with_default(mut self, selection: Selection) -> Self {
        self.spec.default = selection;
        self
    }

    /// Override the kind name shown in error messages
    #[must_use]
    pub fn field_type(mut self, field_type: &'static str) -> Self {
        self.spec.field_type = field_type;
        self
    }

    /// Override the declaration call-site
    #[must_use]
    pub fn declared_at(mut self, source: CallSite) -> Self {
        self.source = source;
        self
    }
}

impl From<ConfigChoiceField> for Field {
    fn from(builder: ConfigChoiceField) -> Self {
        Field::from_parts(
            builder.doc,
            builder.optional,
            builder.source,
            FieldKind::Choice(builder.spec),
        )
    }
}

/// Dict field parameters
pub struct DictSpec {
    dtype: Dtype,
    item_check: Option<Check>,
    dict_check: Option<DictCheck>,
    default: Value,
}

impl DictSpec {
    /// Scalar type of the items
    #[inline]
    #[must_use]
    pub fn dtype(&self) -> Dtype {
        self.dtype
    }

    /// Coerce and validate one item for insertion under `key`
    pub(crate) fn accept(&self, key: &str, value: Value) -> Result<Value, Failure> {
        if value.is_null() {
            return Ok(value);
        }
        let value = self.dtype.coerce(value);
        if !self.dtype.accepts(&value) {
            return Err(Failure::DictItemTypeMismatch {
                key: key.to_string(),
                actual: value.type_name(),
                expected: self.dtype.to_string(),
                value,
            });
        }
        if let Some(check) = &self.item_check {
            if !check(&value) {
                return Err(Failure::DictItemCheckFailed {
                    key: key.to_string(),
                    value,
                });
            }
        }
        Ok(value)
    }

    /// Whole-dict check, run by `Config::validate`
    pub(crate) fn check_dict(&self, items: &IndexMap<String, Value>) -> Result<(), Failure> {
        match &self.dict_check {
            Some(check) if !check(items) => Err(Failure::DictCheckFailed {
                value: Value::Map(items.clone()),
            }),
            _ => Ok(()),
        }
    }
}

/// Builder for dict fields
///
/// Keys are strings; items are scalars of one type, or `Null`.
pub struct DictField {
    doc: String,
    spec: DictSpec,
    optional: bool,
    source: CallSite,
}

impl DictField {
    /// Start a dict declaration with items of `dtype`
    #[track_caller]
    #[must_use]
    pub fn new(doc: impl Into<String>, dtype: Dtype) -> Self {
        Self {
            doc: doc.into(),
            spec: DictSpec {
                dtype,
                item_check: None,
                dict_check: None,
                default: Value::Null,
            },
            optional: false,
            source: Location::caller(),
        }
    }

    /// Set the default mapping
    #[must_use]
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.spec.default = value.into();
        self
    }

    /// Allow `Null` at validation time
    #[must_use]
    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    /// Predicate checked on each non-null item at insertion
    #[must_use]
    pub fn item_check(mut self, check: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        self.spec.item_check = Some(Arc::new(check));
        self
    }

    /// Predicate checked on the whole dict by `Config::validate`
    #[must_use]
    pub fn dict_check(
        mut self,
        check: impl Fn(&IndexMap<String, Value>) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.spec.dict_check = Some(Arc::new(check));
        self
    }
}

impl From<DictField> for Field {
    fn from(builder: DictField) -> Self {
        Field::from_parts(
            builder.doc,
            builder.optional,
            builder.source,
            FieldKind::Dict(builder.spec),
        )
    }
}

/// Config dict field parameters
pub struct ConfigDictSpec {
    schema: Arc<Schema>,
    item_check: Option<ConfigCheck>,
    dict_check: Option<ConfigDictCheck>,
}

impl ConfigDictSpec {
    /// Schema every item is an instance of
    #[inline]
    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub(crate) fn item_check(&self) -> Option<&ConfigCheck> {
        self.item_check.as_ref()
    }

    pub(crate) fn dict_check(&self) -> Option<&ConfigDictCheck> {
        self.dict_check.as_ref()
    }
}

/// Builder for fields mapping string keys to sub-configs of one schema
///
/// A new config starts with an empty dict.
pub struct ConfigDictField {
    doc: String,
    spec: ConfigDictSpec,
    optional: bool,
    source: CallSite,
}

impl ConfigDictField {
    /// Start a declaration whose items are instances of `schema`
    #[track_caller]
    #[must_use]
    pub fn new(doc: impl Into<String>, schema: &Arc<Schema>) -> Self {
        Self {
            doc: doc.into(),
            spec: ConfigDictSpec {
                schema: Arc::clone(schema),
                item_check: None,
                dict_check: None,
            },
            optional: false,
            source: Location::caller(),
        }
    }

    /// Allow `Null` at validation time
    #[must_use]
    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    /// Predicate checked on each item by `Config::validate`
    #[must_use]
    pub fn item_check(mut self, check: impl Fn(&Config) -> bool + Send + Sync + 'static) -> Self {
        self.spec.item_check = Some(Arc::new(check));
        self
    }

    /// Predicate checked on the whole dict by `Config::validate`
    #[must_use]
    pub fn dict_check(mut self, check: impl Fn(&ConfigDict) -> bool + Send + Sync + 'static) -> Self {
        self.spec.dict_check = Some(Arc::new(check));
        self
    }
}

impl From<ConfigDictField> for Field {
    fn from(builder: ConfigDictField) -> Self {
        Field::from_parts(
            builder.doc,
            builder.optional,
            builder.source,
            FieldKind::ConfigDict(builder.spec),
        )
    }
}

/// Configurable field parameters
pub struct ConfigurableSpec {
    target: Arc<dyn Target>,
    check: Option<ConfigCheck>,
}

impl ConfigurableSpec {
    /// Target a new config starts with
    #[inline]
    #[must_use]
    pub fn target(&self) -> &Arc<dyn Target> {
        &self.target
    }

    pub(crate) fn check(&self) -> Option<&ConfigCheck> {
        self.check.as_ref()
    }
}

/// Builder for fields holding the config of a retargetable [`Target`]
///
/// Behaves like a [`ConfigField`] over the target's config class, except
/// that `Config::retarget` may swap in another target (and class) later.
pub struct ConfigurableField {
    doc: String,
    spec: ConfigurableSpec,
    source: CallSite,
}

impl ConfigurableField {
    /// Start a declaration targeting `target` by default
    #[track_caller]
    #[must_use]
    pub fn new(doc: impl Into<String>, target: Arc<dyn Target>) -> Self {
        Self {
            doc: doc.into(),
            spec: ConfigurableSpec { target, check: None },
            source: Location::caller(),
        }
    }

    /// Predicate checked on the sub-config by `Config::validate`
    #[must_use]
    pub fn with_check(mut self, check: impl Fn(&Config) -> bool + Send + Sync + 'static) -> Self {
        self.spec.check = Some(Arc::new(check));
        self
    }
}

impl From<ConfigurableField> for Field {
    fn from(builder: ConfigurableField) -> Self {
        Field::from_parts(
            builder.doc,
            false,
            builder.source,
            FieldKind::Configurable(builder.spec),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_accepts_and_coerces() {
        let Field { kind: FieldKind::Scalar(spec), .. } = Field::from(Field::new("f", Dtype::Float)) else {
            panic!("expected scalar");
        };
        assert_eq!(spec.accept(Value::Int(2)), Ok(Value::Float(2.0)));
        assert!(matches!(
            spec.accept(Value::from("x")),
            Err(Failure::TypeMismatch { actual: "str", .. })
        ));
        assert_eq!(spec.accept(Value::Null), Ok(Value::Null));
    }

    #[test]
    fn check_rejects() {
        let field: Field = Field::new("positive", Dtype::Int)
            .with_check(|v| v.as_int().is_some_and(|i| i > 0))
            .into();
        let FieldKind::Scalar(spec) = field.kind() else {
            panic!("expected scalar");
        };
        assert!(matches!(spec.accept(Value::Int(0)), Err(Failure::CheckFailed { .. })));
        assert!(spec.accept(Value::Int(1)).is_ok());
    }

    #[test]
    fn list_length_overrides_min_max() {
        let field = ListField::new("l", Dtype::Int)
            .length(3)
            .min_length(1)
            .max_length(10)
            .build()
            .unwrap();
        let FieldKind::List(spec) = field.kind() else {
            panic!("expected list");
        };
        assert_eq!(spec.rules().length(), Some(3));
        assert_eq!(spec.rules().min_length(), None);
        assert_eq!(spec.rules().max_length(), None);
    }

    #[test]
    fn list_rejects_bad_parameters() {
        assert!(matches!(
            ListField::new("l", Dtype::Int).length(0).build(),
            Err(DefinitionError::NonPositiveLength { param: "length", .. })
        ));
        assert!(matches!(
            ListField::new("l", Dtype::Int).max_length(0).build(),
            Err(DefinitionError::NonPositiveLength { param: "maxLength", .. })
        ));
        assert!(matches!(
            ListField::new("l", Dtype::Int).min_length(4).max_length(2).build(),
            Err(DefinitionError::MinExceedsMax { min: 4, max: 2 })
        ));
        assert!(matches!(
            ListField::nested("l", Dtype::Int)
                .sublist(|s| s.min_length(3).max_length(1))
                .build(),
            Err(DefinitionError::MinExceedsMax { .. })
        ));
    }

    #[test]
    fn range_bounds() {
        let field = RangeField::new("r", Dtype::Float).min(3.0).build().unwrap();
        let FieldKind::Scalar(spec) = field.kind() else {
            panic!("expected scalar");
        };
        assert!(spec.accept(Value::Float(3.0)).is_ok());
        assert!(matches!(
            spec.accept(Value::Float(2.9)),
            Err(Failure::OutOfRange { .. })
        ));
        assert!(field.doc().ends_with("[3.0,inf)"));
        assert_eq!(field.field_type(), "RangeField");
    }

    #[test]
    fn range_requires_a_bound_and_numbers() {
        assert_eq!(
            RangeField::new("r", Dtype::Int).build().unwrap_err(),
            DefinitionError::EmptyRange
        );
        assert!(matches!(
            RangeField::new("r", Dtype::Str).min(1.0).build(),
            Err(DefinitionError::NonNumericRange(_))
        ));
    }

    #[test]
    fn choice_field_validates_choices() {
        assert_eq!(
            ChoiceField::new("c", Dtype::Str).build().unwrap_err(),
            DefinitionError::EmptyChoices
        );
        assert!(matches!(
            ChoiceField::new("c", Dtype::Str).allow(1, "one").build(),
            Err(DefinitionError::ChoiceTypeMismatch { .. })
        ));

        let field = ChoiceField::new("c", Dtype::Str)
            .allow("Hello", "first")
            .allow("World", "second")
            .build()
            .unwrap();
        let FieldKind::Scalar(spec) = field.kind() else {
            panic!("expected scalar");
        };
        assert!(spec.accept(Value::from("World")).is_ok());
        assert!(matches!(
            spec.accept(Value::from("Moon")),
            Err(Failure::NotAllowed { .. })
        ));
    }

    #[test]
    fn subfields_are_cached_per_index() {
        let mut field = ListField::nested("n", Dtype::Int).build().unwrap();
        field.bind("nlist");

        let a = field.subfield(2).unwrap();
        let b = field.subfield(2).unwrap();
        let c = field.subfield(0).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(a.name(), "nlist[2]");
    }

    #[test]
    fn dict_items_are_coerced_and_checked() {
        let field: Field = DictField::new("gains", Dtype::Float)
            .item_check(|v| v.as_float().is_some_and(|x| x > 0.0))
            .into();
        let spec = field.dict_spec().unwrap();
        assert_eq!(spec.accept("g", Value::Int(2)), Ok(Value::Float(2.0)));
        assert_eq!(spec.accept("g", Value::Null), Ok(Value::Null));
        assert!(matches!(
            spec.accept("g", Value::from("x")),
            Err(Failure::DictItemTypeMismatch { key, .. }) if key == "g"
        ));
        assert!(matches!(
            spec.accept("g", Value::Float(-1.0)),
            Err(Failure::DictItemCheckFailed { .. })
        ));
        assert_eq!(field.field_type(), "DictField");
        assert_eq!(field.dtype_name(), "dict[str, float]");
    }

    #[test]
    fn plain_list_has_no_subfields() {
        let field = ListField::new("l", Dtype::Int).build().unwrap();
        assert!(field.subfield(0).is_none());
    }
}
