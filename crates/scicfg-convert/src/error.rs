//! Error types for the conversion adapters

use scicfg_schema::ConfigError;

/// Errors while converting a config into a property set or policy
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConvertError {
    /// Flattened entry has no property counterpart
    #[error("cannot convert '{name}': {reason}")]
    Unsupported { name: String, reason: String },

    /// JSON or YAML rendering failed
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Error from the configuration layer
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type alias for conversions
pub type ConvertResult<T> = Result<T, ConvertError>;
