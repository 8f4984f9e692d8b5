//! Error types for the schema layer
//!
//! Provides error handling for:
//! - Field/schema definition problems (raised while building a schema)
//! - Field validation failures (raised on mutation or in `validate`)
//! - Lookups, dotted paths and script loading

use std::fmt::{self, Display, Formatter};

use crate::history::CallSite;
use crate::path::PathError;
use crate::value::Value;

/// Why a field rejected a value or an operation
#[derive(Debug, Clone, PartialEq)]
pub enum Failure {
    /// Value is not an instance of the declared type
    TypeMismatch {
        value: Value,
        actual: &'static str,
        expected: String,
    },
    /// The field's `check` predicate returned false
    CheckFailed { value: Value },
    /// Value lies outside a range field's bounds
    OutOfRange { value: Value, range: String },
    /// Value is not one of a choice field's allowed values
    NotAllowed { value: Value },
    /// Assigned value of a list field is not a sequence
    NotASequence { value: Value, actual: &'static str },
    /// List element is not an instance of the item type
    ItemTypeMismatch {
        index: usize,
        value: Value,
        actual: &'static str,
        expected: String,
    },
    /// The field's `item_check` predicate returned false
    ItemCheckFailed { index: usize, value: Value },
    /// The field's `list_check` predicate returned false
    ListCheckFailed { value: Value },
    /// List length differs from the exact required length
    LengthMismatch { required: usize, actual: usize },
    /// List is shorter than the minimum length
    TooShort { min: usize, actual: usize },
    /// List is longer than the maximum length
    TooLong { max: usize, actual: usize },
    /// Index is past the end of the list
    IndexOutOfRange { index: usize, len: usize },
    /// Stepped slice assignment with the wrong number of values
    SliceSizeMismatch { expected: usize, actual: usize },
    /// Required field holds `Null`
    Required,
    /// Mutation attempted on a frozen config
    Frozen,
    /// Operation does not apply to this kind of field
    WrongFieldKind { expected: &'static str },
    /// Selection operation used in the wrong selection mode
    WrongSelectionMode { multi: bool },
    /// List element is not a nested list
    NotNested { index: usize },
    /// Sub-config is not an instance of the expected schema
    WrongSchema { actual: String, expected: String },
    /// List field holds `Null`, so it cannot be mutated in place
    NullList,
    /// Assigned value of a dict field is not a mapping
    NotAMapping { value: Value, actual: &'static str },
    /// Dict item is not an instance of the item type
    DictItemTypeMismatch {
        key: String,
        value: Value,
        actual: &'static str,
        expected: String,
    },
    /// The field's `item_check` predicate returned false for a dict item
    DictItemCheckFailed { key: String, value: Value },
    /// The field's `dict_check` predicate returned false
    DictCheckFailed { value: Value },
    /// Dict field has no item under this key
    UnknownKey { key: String },
    /// Dict field holds `Null`, so it cannot be mutated in place
    NullDict,
    /// The field's `check` predicate rejected a sub-config
    ConfigCheckFailed { schema: String },
    /// The field's `item_check` predicate rejected the sub-config at a key
    ConfigItemCheckFailed { key: String, schema: String },
}

impl Display for Failure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypeMismatch { value, actual, expected } => write!(
                f,
                "Value {value} is of incorrect type {actual}. Expected type {expected}"
            ),
            Self::CheckFailed { value } => write!(f, "Value {value} is not a valid value"),
            Self::OutOfRange { value, range } => {
                write!(f, "{value} is outside of valid range {range}")
            }
            Self::NotAllowed { value } => {
                write!(f, "Value {value} is not in the set of allowed values")
            }
            Self::NotASequence { value, actual } => write!(
                f,
                "Value {value} is of incorrect type {actual}. Sequence type expected"
            ),
            Self::ItemTypeMismatch { index, value, actual, expected } => write!(
                f,
                "Item at position {index} with value {value} is of incorrect type {actual}. Expected {expected}"
            ),
            Self::ItemCheckFailed { index, value } => {
                write!(f, "Item at position {index} is not a valid value: {value}")
            }
            Self::ListCheckFailed { value } => write!(f, "{value} is not a valid value"),
            Self::LengthMismatch { required, actual } => {
                write!(f, "Required list length={required}, got length={actual}")
            }
            Self::TooShort { min, actual } => {
                write!(f, "Minimum allowed list length={min}, got length={actual}")
            }
            Self::TooLong { max, actual } => {
                write!(f, "Maximum allowed list length={max}, got length={actual}")
            }
            Self::IndexOutOfRange { index, len } => {
                write!(f, "Index {index} is out of range for list of length {len}")
            }
            Self::SliceSizeMismatch { expected, actual } => write!(
                f,
                "Attempt to assign sequence of size {actual} to extended slice of size {expected}"
            ),
            Self::Required => write!(f, "Required value cannot be null"),
            Self::Frozen => write!(f, "Cannot modify a frozen Config"),
            Self::WrongFieldKind { expected } => write!(f, "Field is not a {expected}"),
            Self::WrongSelectionMode { multi: true } => {
                write!(f, "Multi-selection field has no single selection")
            }
            Self::WrongSelectionMode { multi: false } => {
                write!(f, "Single-selection field has no multiple selection")
            }
            Self::NotNested { index } => write!(f, "Item at position {index} is not a nested list"),
            Self::WrongSchema { actual, expected } => write!(
                f,
                "Config of type {actual} is of incorrect type. Expected {expected}"
            ),
            Self::NullList => write!(f, "List value is null"),
            Self::NotAMapping { value, actual } => write!(
                f,
                "Value {value} is of incorrect type {actual}. Mapping type expected"
            ),
            Self::DictItemTypeMismatch { key, value, actual, expected } => write!(
                f,
                "Value {value} at key {key:?} is of incorrect type {actual}. Expected type {expected}"
            ),
            Self::DictItemCheckFailed { key, value } => {
                write!(f, "Item at key {key:?} is not a valid value: {value}")
            }
            Self::DictCheckFailed { value } => write!(f, "{value} is not a valid value"),
            Self::UnknownKey { key } => write!(f, "Unknown key {key:?}"),
            Self::NullDict => write!(f, "Dict value is null"),
            Self::ConfigCheckFailed { schema } => {
                write!(f, "{schema} instance is not a valid value")
            }
            Self::ConfigItemCheckFailed { key, schema } => {
                write!(f, "Item at key {key:?} ({schema}) is not a valid value")
            }
        }
    }
}

/// A field rejected a value or an operation
///
/// Carries the offending field (type, name, dtype, doc), the owning config
/// (type, full name) and the declaration sites of both.
#[derive(Debug, Clone, thiserror::Error)]
#[error(
    "{field_type} '{full_name}' failed validation: {failure}\n\
     For more information read the Field definition at:\n  {field_source}\n\
     And the Config definition at:\n  {config_source}"
)]
pub struct FieldValidationError {
    /// Kind of field (`Field`, `ListField`, `ConfigChoiceField`, ...)
    pub field_type: &'static str,
    /// Field name within its schema
    pub field_name: String,
    /// Dotted name including the owning config's name
    pub full_name: String,
    /// Declared type of the field
    pub dtype: String,
    /// Field documentation
    pub doc: String,
    /// Name of the owning schema
    pub config_type: String,
    /// Where the field was declared
    pub field_source: CallSite,
    /// Where the owning schema was declared
    pub config_source: CallSite,
    /// What went wrong
    pub failure: Failure,
}

impl FieldValidationError {
    /// Check if this is a frozen-mutation error
    #[inline]
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        matches!(self.failure, Failure::Frozen)
    }
}

/// Errors detected while defining fields and schemas
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DefinitionError {
    /// Type is not one the schema layer supports
    #[error("Unsupported dtype {0}")]
    UnsupportedDtype(String),

    /// A length parameter is zero
    #[error("'{param}' ({value}) must be positive")]
    NonPositiveLength { param: &'static str, value: usize },

    /// `min_length` exceeds `max_length`
    #[error("'maxLength' ({max}) must be at least as large as 'minLength' ({min})")]
    MinExceedsMax { min: usize, max: usize },

    /// Range field without bounds
    #[error("min and max cannot both be unbounded")]
    EmptyRange,

    /// Range field over a non-numeric type
    #[error("Unsupported RangeField dtype {0}")]
    NonNumericRange(String),

    /// Choice field without choices
    #[error("ChoiceFields must allow at least one choice")]
    EmptyChoices,

    /// Allowed choice of the wrong type
    #[error("ChoiceField's allowed choice {choice} is of incorrect type {actual}. Expected {expected}")]
    ChoiceTypeMismatch {
        choice: String,
        actual: &'static str,
        expected: String,
    },

    /// Same field declared twice in one schema
    #[error("field '{field}' declared twice in {schema}")]
    DuplicateField { field: String, schema: String },

    /// Field name that cannot be addressed by dotted paths
    #[error("invalid field name '{0}'")]
    InvalidFieldName(String),
}

/// Top-level error for config operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// A field rejected a value or an operation
    #[error(transparent)]
    Validation(Box<FieldValidationError>),

    /// Field or schema definition problem
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    /// No field with this name
    #[error("No field of name {field} exists in config type {schema}")]
    UnknownField { field: String, schema: String },

    /// Choice field lookup of an unknown name
    #[error("Unknown key '{name}' for {field}. Options: {}", available.join(" "))]
    UnknownChoice {
        field: String,
        name: String,
        available: Vec<String>,
    },

    /// Dotted path does not resolve
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// Malformed dotted path
    #[error("path error: {0}")]
    Path(#[from] PathError),

    /// Malformed script statement
    #[error("script line {line}: {message}")]
    Script { line: usize, message: String },

    /// Inter-field validator rejected the config
    #[error("{schema} failed validation: {message}")]
    Invalid { schema: String, message: String },

    /// JSON or YAML rendering failed
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl ConfigError {
    /// Underlying field validation error, if any
    #[inline]
    #[must_use]
    pub fn validation(&self) -> Option<&FieldValidationError> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }

    /// Underlying field failure, if any
    #[inline]
    #[must_use]
    pub fn failure(&self) -> Option<&Failure> {
        self.validation().map(|err| &err.failure)
    }

    /// Check if this is a frozen-mutation error
    #[inline]
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.validation().is_some_and(FieldValidationError::is_frozen)
    }

    /// Check if this is a lookup error (unknown field or choice name)
    #[inline]
    #[must_use]
    pub fn is_lookup(&self) -> bool {
        matches!(self, Self::UnknownField { .. } | Self::UnknownChoice { .. })
    }
}

impl From<FieldValidationError> for ConfigError {
    fn from(err: FieldValidationError) -> Self {
        Self::Validation(Box::new(err))
    }
}

/// Result type alias for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;
