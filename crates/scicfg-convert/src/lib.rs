//! scicfg conversion adapters
//!
//! Turns a [`Config`](scicfg_schema::Config) into the two legacy
//! parameter containers downstream tools consume.
//!
//! # Core Concepts
//!
//! - [`PropertySet`]: flat, dotted names; lists become multi-valued names
//! - [`Policy`]: nested groups; lists become repeated keys
//!
//! Both read the flattened form and skip fields holding `Null`.
//!
//! # Example
//!
//! ```rust,ignore
//! use scicfg_convert::{Policy, PropertySet};
//!
//! let props = PropertySet::from_config(&config)?;
//! assert_eq!(props.get("detection.threshold"), Some(&Value::Float(5.0)));
//!
//! let policy = Policy::from_config(&config)?;
//! let detection = policy.group("detection").unwrap();
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod error;
mod policy;
mod property_set;

pub use error::{ConvertError, ConvertResult};
pub use policy::{Policy, PolicyValue};
pub use property_set::PropertySet;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
