//! scicfg schema layer
//!
//! Typed, validated, provenance-tracking configuration schemas.
//!
//! # Core Concepts
//!
//! - [`Schema`]: a config class, an ordered table of typed [`Field`]s
//! - [`Config`]: an instance of a schema; every assignment is checked and
//!   recorded in a per-field [`History`]
//! - [`List`] / [`ListMut`]: list field values, validated per item on every
//!   mutation, with nested lists carrying their own history
//! - [`InstanceDict`] / [`ChoiceMut`]: choice fields selecting among named
//!   sub-config schemas from a [`TypeMap`]
//! - [`Dict`] / [`DictMut`] and [`ConfigDict`] / [`ConfigDictMut`]:
//!   string-keyed scalars and string-keyed sub-configs
//! - [`ConfigurableInstance`]: a sub-config bound to a retargetable
//!   [`Target`]
//! - [`State`]: `Mutable` until [`Config::freeze`], then `Frozen` for good
//!
//! # Example
//!
//! ```rust,ignore
//! use scicfg_schema::prelude::*;
//!
//! let schema = Schema::builder("Detection")
//!     .field("threshold", RangeField::new("S/N cut", Dtype::Float).min(0.0).build()?)
//!     .field("radii", ListField::new("aperture radii", Dtype::Float).min_length(1).build()?)
//!     .build()?;
//!
//! let mut config = Config::new(&schema)?;
//! config.set("threshold", 5)?;
//! config.set("radii", vec![1.0, 2.5])?;
//! config.list_mut("radii")?.push(4.0)?;
//! config.validate()?;
//! config.freeze();
//!
//! println!("{}", config.format_history("radii")?);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod choice;
mod config;
mod configurable;
mod dict;
mod error;
mod export;
mod field;
mod history;
mod list;
mod path;
mod schema;
mod script;
mod value;

pub use choice::{ChoiceMut, ChoiceTypes, InstanceDict, Selection, TypeMap};
pub use config::{Config, State};
pub use configurable::{ConfigurableInstance, Target};
pub use dict::{ConfigDict, ConfigDictMut, Dict, DictMut};
pub use error::{ConfigError, ConfigResult, DefinitionError, Failure, FieldValidationError};
pub use field::{
    Check, ChoiceField, ChoiceSpec, ConfigCheck, ConfigChoiceField, ConfigDictCheck,
    ConfigDictField, ConfigDictSpec, ConfigField, ConfigSpec, ConfigurableField, ConfigurableSpec,
    Constraint, DictCheck, DictField, DictSpec, Field, FieldKind, ItemPolicy, ListCheck, ListField,
    ListRules, ListSpec, NestedItems, Range, RangeField, ScalarField, ScalarSpec, SubList,
};
pub use history::{CallSite, History, HistoryEntry};
pub use list::{Item, List, ListMut, NestedList, Slice};
pub use path::{is_valid_name, FieldPath, Key, PathError, Segment};
pub use schema::{DefaultsHook, Schema, SchemaBuilder, Validator};
pub use value::{Dtype, Value};

/// Commonly used items
pub mod prelude {
    pub use crate::{
        ChoiceField, ConfigChoiceField, ConfigDictField, ConfigError, ConfigField, ConfigResult,
        ConfigurableField, Config, DictField, Dtype, Field, ListField, RangeField, Schema,
        Selection, Slice, Value,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
