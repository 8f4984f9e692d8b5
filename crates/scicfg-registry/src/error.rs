//! Error types for registries and registry-backed fields

use scicfg_schema::ConfigError;

/// Errors from registering configurables or dispatching through a field
#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    /// Name already registered
    #[error("An item with name '{0}' already exists")]
    DuplicateName(String),

    /// Target exposes no config schema and none was given
    #[error("Configurable '{0}' has no config class")]
    MissingConfigClass(String),

    /// Schema does not extend the registry's base schema
    #[error("Config class {schema} of '{name}' is not a subclass of {base}")]
    WrongBase {
        name: String,
        schema: String,
        base: String,
    },

    /// Lookup of a name that is not registered
    #[error("Unknown registry name '{name}'. Options: {}", available.join(" "))]
    UnknownName { name: String, available: Vec<String> },

    /// `apply` on a field with nothing selected
    #[error("No selection has been made for {field}. Options: {}", available.join(" "))]
    NoSelection { field: String, available: Vec<String> },

    /// `target` on a multi field or `targets` on a single one
    #[error("{mode} field {field} has no attribute '{attribute}'")]
    WrongSelectionMode {
        field: String,
        mode: &'static str,
        attribute: &'static str,
    },

    /// Field is not backed by a registry of the requested signature
    #[error("Field {0} is not backed by a registry of this signature")]
    NotARegistry(String),

    /// Configurable field target has another signature
    #[error("Field {0} does not target a configurable of this signature")]
    WrongSignature(String),

    /// Error from the configuration layer
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl RegistryError {
    /// Check if this is a lookup error
    #[inline]
    #[must_use]
    pub fn is_lookup(&self) -> bool {
        match self {
            Self::UnknownName { .. } => true,
            Self::Config(err) => err.is_lookup(),
            _ => false,
        }
    }
}

/// Result type alias for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;
