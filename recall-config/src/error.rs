use std::path::PathBuf;

use recall_memory::MemoryError;
use thiserror::Error;

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        /// File that was requested.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for the schema.
    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        /// File that was parsed.
        path: PathBuf,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// An environment override could not be parsed.
    #[error("invalid value `{value}` for {key}")]
    InvalidOverride {
        /// Environment variable name.
        key: String,
        /// Raw value supplied.
        value: String,
    },

    /// A setting is out of range or inconsistent with another.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// The memory crate rejected a derived policy or resolver.
    #[error(transparent)]
    Memory(#[from] MemoryError),
}

impl ConfigError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid(reason.into())
    }
}
