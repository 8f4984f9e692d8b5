//! Typed targets for configurable fields
//!
//! [`Targeted`] pairs a [`Configurable`] with its config class so it can sit
//! behind a `ConfigurableField`. [`ConfigurableDispatch`] recovers the typed
//! target from a field and runs it; [`Retarget`] swaps it for another one.

use std::any::Any;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use scicfg_schema::{Config, ConfigurableInstance, Schema, Target};

use crate::error::{RegistryError, RegistryResult};
use crate::registry::Configurable;

/// A configurable bound to the schema of the config it takes
pub struct Targeted<A, O> {
    target: Arc<dyn Configurable<A, O>>,
    schema: Arc<Schema>,
}

impl<A: 'static, O: 'static> Targeted<A, O> {
    /// Bind a configurable that reports its own config class
    ///
    /// # Errors
    /// Returns [`RegistryError::MissingConfigClass`] if it reports none
    pub fn new<T: Configurable<A, O> + 'static>(target: T) -> RegistryResult<Arc<Self>> {
        let schema = target
            .config_class()
            .ok_or_else(|| RegistryError::MissingConfigClass(std::any::type_name::<T>().to_string()))?;
        Ok(Arc::new(Self {
            target: Arc::new(target),
            schema,
        }))
    }

    /// Bind a configurable to an explicit config class
    #[must_use]
    pub fn with_class(target: impl Configurable<A, O> + 'static, schema: &Arc<Schema>) -> Arc<Self> {
        Arc::new(Self {
            target: Arc::new(target),
            schema: Arc::clone(schema),
        })
    }

    /// The configurable
    #[inline]
    #[must_use]
    pub fn target(&self) -> &Arc<dyn Configurable<A, O>> {
        &self.target
    }
}

impl<A: 'static, O: 'static> Target for Targeted<A, O> {
    fn config_class(&self) -> Arc<Schema> {
        Arc::clone(&self.schema)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<A, O> Debug for Targeted<A, O> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Targeted")
            .field("schema", &self.schema.name())
            .finish_non_exhaustive()
    }
}

/// Typed access to the target of a configurable field
///
/// `A` and `O` must match the signature the field was declared with;
/// otherwise every operation fails with [`RegistryError::WrongSignature`].
pub trait ConfigurableDispatch {
    /// Current typed target
    ///
    /// # Errors
    /// Returns error if the target has another signature
    fn target<A: 'static, O: 'static>(&self) -> RegistryResult<Arc<dyn Configurable<A, O>>>;

    /// Call the current target with the sub-config and `args`
    ///
    /// # Errors
    /// Returns error if the target has another signature
    fn apply<A: 'static, O: 'static>(&self, args: A) -> RegistryResult<O>;
}

impl ConfigurableDispatch for ConfigurableInstance {
    fn target<A: 'static, O: 'static>(&self) -> RegistryResult<Arc<dyn Configurable<A, O>>> {
        Target::as_any(&**ConfigurableInstance::target(self))
            .downcast_ref::<Targeted<A, O>>()
            .map(|targeted| Arc::clone(&targeted.target))
            .ok_or_else(|| {
                RegistryError::WrongSignature(self.value().name().unwrap_or("<root>").to_string())
            })
    }

    fn apply<A: 'static, O: 'static>(&self, args: A) -> RegistryResult<O> {
        let target = ConfigurableDispatch::target::<A, O>(self)?;
        tracing::debug!("Applying {}", self.config_class().name());
        Ok(target.call(self.value(), args))
    }
}

/// Retargeting of configurable fields with typed configurables
pub trait Retarget {
    /// Point `field` at a configurable that reports its own config class
    ///
    /// # Errors
    /// Returns error if the configurable has no config class, the field is
    /// not configurable, or the config is frozen
    fn retarget_to<A: 'static, O: 'static>(
        &mut self,
        field: &str,
        target: impl Configurable<A, O> + 'static,
    ) -> RegistryResult<()>;

    /// Point `field` at a configurable taking configs of `schema`
    ///
    /// # Errors
    /// Returns error if the field is not configurable or the config is frozen
    fn retarget_with<A: 'static, O: 'static>(
        &mut self,
        field: &str,
        target: impl Configurable<A, O> + 'static,
        schema: &Arc<Schema>,
    ) -> RegistryResult<()>;
}

impl Retarget for Config {
    #[track_caller]
    fn retarget_to<A: 'static, O: 'static>(
        &mut self,
        field: &str,
        target: impl Configurable<A, O> + 'static,
    ) -> RegistryResult<()> {
        let targeted: Arc<dyn Target> = Targeted::<A, O>::new(target)?;
        Ok(self.retarget(field, targeted)?)
    }

    #[track_caller]
    fn retarget_with<A: 'static, O: 'static>(
        &mut self,
        field: &str,
        target: impl Configurable<A, O> + 'static,
        schema: &Arc<Schema>,
    ) -> RegistryResult<()> {
        let targeted: Arc<dyn Target> = Targeted::<A, O>::with_class(target, schema);
        Ok(self.retarget(field, targeted)?)
    }
}
