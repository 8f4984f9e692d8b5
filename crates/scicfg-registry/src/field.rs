//! Dispatch through registry-backed choice fields
//!
//! [`RegistryDispatch`] extends [`InstanceDict`] with the operations that
//! only make sense when the field's type map is a [`Registry`]: calling the
//! selected configurable(s) with their sub-configs.

use std::sync::Arc;

use scicfg_schema::{Config, InstanceDict, Selection};

use crate::error::{RegistryError, RegistryResult};
use crate::registry::{Configurable, Registry};

/// Result of [`RegistryDispatch::apply`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied<O> {
    /// Result of the single selected configurable
    Single(O),
    /// Results of every selected configurable, in selection order
    Multi(Vec<O>),
}

impl<O> Applied<O> {
    /// The single result, if this came from a single-selection field
    #[must_use]
    pub fn into_single(self) -> Option<O> {
        match self {
            Self::Single(out) => Some(out),
            Self::Multi(_) => None,
        }
    }

    /// All results in selection order
    #[must_use]
    pub fn into_vec(self) -> Vec<O> {
        match self {
            Self::Single(out) => vec![out],
            Self::Multi(outs) => outs,
        }
    }
}

/// Registry operations on the selection state of a `RegistryField`
///
/// `A` and `O` must match the signature of the registry backing the field;
/// otherwise every operation fails with [`RegistryError::NotARegistry`].
pub trait RegistryDispatch {
    /// Registry backing this field
    ///
    /// # Errors
    /// Returns error if the field is not backed by a `Registry<A, O>`
    fn registry<A: 'static, O: 'static>(&self) -> RegistryResult<&Registry<A, O>>;

    /// Call the selected configurable(s) with their sub-configs and `args`
    ///
    /// # Errors
    /// Returns error if nothing is selected or the field is not
    /// registry-backed
    fn apply<A: Clone + 'static, O: 'static>(&self, args: A) -> RegistryResult<Applied<O>>;

    /// Configurable of the single selected name
    ///
    /// # Errors
    /// Returns error on a multi field, an empty selection, or a field that
    /// is not registry-backed
    fn target<A: 'static, O: 'static>(&self) -> RegistryResult<Arc<dyn Configurable<A, O>>>;

    /// Configurables of every selected name, in selection order
    ///
    /// # Errors
    /// Returns error on a single field or a field that is not registry-backed
    fn targets<A: 'static, O: 'static>(&self) -> RegistryResult<Vec<Arc<dyn Configurable<A, O>>>>;
}

impl RegistryDispatch for InstanceDict {
    fn registry<A: 'static, O: 'static>(&self) -> RegistryResult<&Registry<A, O>> {
        self.types()
            .as_any()
            .downcast_ref::<Registry<A, O>>()
            .ok_or_else(|| RegistryError::NotARegistry(self.full_name().to_string()))
    }

    fn apply<A: Clone + 'static, O: 'static>(&self, args: A) -> RegistryResult<Applied<O>> {
        let registry = self.registry::<A, O>()?;
        let call = |name: &str| -> RegistryResult<O> {
            let config = selected_config(self, name)?;
            Ok(registry.get(name)?.call(config, args.clone()))
        };
        match self.selection() {
            Selection::None => Err(RegistryError::NoSelection {
                field: self.full_name().to_string(),
                available: registry.names(),
            }),
            Selection::Single(name) => call(name.as_str()).map(Applied::Single),
            Selection::Multi(names) => names
                .iter()
                .map(|name| call(name.as_str()))
                .collect::<RegistryResult<Vec<_>>>()
                .map(Applied::Multi),
        }
    }

    fn target<A: 'static, O: 'static>(&self) -> RegistryResult<Arc<dyn Configurable<A, O>>> {
        let registry = self.registry::<A, O>()?;
        match self.selection() {
            Selection::Single(name) => registry.get(name),
            Selection::None if !self.is_multi() => Err(RegistryError::NoSelection {
                field: self.full_name().to_string(),
                available: registry.names(),
            }),
            _ => Err(wrong_mode(self, "target")),
        }
    }

    fn targets<A: 'static, O: 'static>(&self) -> RegistryResult<Vec<Arc<dyn Configurable<A, O>>>> {
        let registry = self.registry::<A, O>()?;
        if !self.is_multi() {
            return Err(wrong_mode(self, "targets"));
        }
        self.selection()
            .names()
            .into_iter()
            .map(|name| registry.get(name))
            .collect()
    }
}

/// Sub-config of a selected name; selecting a name always instantiates it
fn selected_config<'d>(dict: &'d InstanceDict, name: &str) -> RegistryResult<&'d Config> {
    dict.get(name).ok_or_else(|| RegistryError::UnknownName {
        name: name.to_string(),
        available: dict.keys().map(str::to_string).collect(),
    })
}

fn wrong_mode(dict: &InstanceDict, attribute: &'static str) -> RegistryError {
    RegistryError::WrongSelectionMode {
        field: dict.full_name().to_string(),
        mode: if dict.is_multi() { "Multi-selection" } else { "Single-selection" },
        attribute,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applied_conversions() {
        assert_eq!(Applied::Single(3).into_single(), Some(3));
        assert_eq!(Applied::Single(3).into_vec(), vec![3]);
        assert_eq!(Applied::Multi(vec![1, 2]).into_single(), None);
        assert_eq!(Applied::Multi(vec![1, 2]).into_vec(), vec![1, 2]);
    }
}
