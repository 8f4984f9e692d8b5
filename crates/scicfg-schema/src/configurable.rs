//! Configurable fields
//!
//! A configurable field holds one sub-config together with the [`Target`]
//! that consumes it. Retargeting swaps the target; when the new target
//! takes a different config class the sub-config is rebuilt from that
//! class's defaults, otherwise its values are kept.

use std::any::Any;
use std::fmt::Debug;
use std::panic::Location;
use std::sync::Arc;

use crate::config::{Config, Slot};
use crate::error::{ConfigResult, Failure};
use crate::field::FieldKind;
use crate::history::CallSite;
use crate::schema::Schema;
use crate::value::Value;

/// Type-erased consumer of a config
///
/// Typed targets live in the registry layer; the schema layer only needs
/// the config class and a way back to the concrete type.
pub trait Target: Send + Sync + Debug {
    /// Schema of the config this target takes
    fn config_class(&self) -> Arc<Schema>;

    /// Concrete type access for specialised dispatch
    fn as_any(&self) -> &dyn Any;
}

/// Current target and sub-config of a configurable field
#[derive(Debug, Clone)]
pub struct ConfigurableInstance {
    target: Arc<dyn Target>,
    value: Box<Config>,
}

impl ConfigurableInstance {
    pub(crate) fn new(target: Arc<dyn Target>, value: Config) -> Self {
        Self {
            target,
            value: Box::new(value),
        }
    }

    /// Current target
    #[inline]
    #[must_use]
    pub fn target(&self) -> &Arc<dyn Target> {
        &self.target
    }

    /// Sub-config handed to the target
    #[inline]
    #[must_use]
    pub fn value(&self) -> &Config {
        &self.value
    }

    pub(crate) fn value_mut(&mut self) -> &mut Config {
        &mut self.value
    }

    /// Schema of the sub-config
    #[inline]
    #[must_use]
    pub fn config_class(&self) -> &Arc<Schema> {
        self.value.schema()
    }
}

impl PartialEq for ConfigurableInstance {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Config {
    /// Point a configurable field at another target
    ///
    /// Records `"Retargeted"` under the label `"retarget"`. A change of
    /// config class replaces the sub-config with a fresh default instance.
    ///
    /// # Errors
    /// Returns error on an unknown or non-configurable field or a frozen
    /// config
    #[track_caller]
    pub fn retarget(&mut self, name: &str, target: Arc<dyn Target>) -> ConfigResult<()> {
        self.retarget_at(name, target, Location::caller(), "retarget", "Retargeted")
    }

    pub(crate) fn retarget_at(
        &mut self,
        name: &str,
        target: Arc<dyn Target>,
        at: CallSite,
        label: &str,
        note: &str,
    ) -> ConfigResult<()> {
        let (owner, field, slot, history) = self.parts(name)?;
        owner.guard(&field)?;
        let (FieldKind::Configurable(_), Slot::Configurable(instance)) = (field.kind(), slot) else {
            return Err(owner
                .fail(&field, Failure::WrongFieldKind { expected: "ConfigurableField" })
                .into());
        };
        let schema = target.config_class();
        if !Arc::ptr_eq(&schema, instance.config_class()) {
            let value = Config::construct(&schema, Some(owner.full_name(&field)), at)?;
            instance.value = Box::new(value);
        }
        instance.target = target;
        history.record(Value::from(note), at, label);
        tracing::debug!("Retargeted {} to {}", owner.full_name(&field), schema.name());
        Ok(())
    }
}
