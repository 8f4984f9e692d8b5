//! scicfg registries
//!
//! Named collections of configurables and the registry-backed choice field.
//!
//! # Core Concepts
//!
//! - [`Registry`]: insertion-ordered name → configurable map with a declared
//!   base schema
//! - [`Configurable`]: a callable parameterised by a config; closures
//!   implement it directly
//! - [`RegistryDispatch`]: `apply`, `target` and `targets` on the selection
//!   state of a field made by [`Registry::make_field`]
//! - [`Targeted`]: a configurable bound to its config class, the target of
//!   a `ConfigurableField`; [`ConfigurableDispatch`] runs it and
//!   [`Retarget`] swaps it
//!
//! # Example
//!
//! ```rust,ignore
//! use scicfg_registry::{Registry, RegistryDispatch};
//!
//! let registry: Arc<Registry<f64, f64>> = Arc::new(Registry::with_base("smoothers", &base));
//! registry.register_with("gauss", |config: &Config, x: f64| x * 2.0, &gauss_schema)?;
//!
//! let schema = Schema::builder("TaskConfig")
//!     .field("smoother", registry.make_field("smoothing algorithm"))
//!     .build()?;
//!
//! let mut config = Config::new(&schema)?;
//! config.set("smoother", "gauss")?;
//! let out = config.choice("smoother")?.apply::<f64, f64>(1.5)?.into_single();
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod configurable;
mod error;
mod field;
mod registry;

pub use configurable::{ConfigurableDispatch, Retarget, Targeted};
pub use error::{RegistryError, RegistryResult};
pub use field::{Applied, RegistryDispatch};
pub use registry::{Configurable, ConfigurableWrapper, Registry};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
