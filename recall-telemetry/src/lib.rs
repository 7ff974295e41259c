//! Structured logging setup shared by recall binaries.
//!
//! Libraries only emit `tracing` events; binaries call [`init_tracing`] once
//! at start-up to route them to stderr.

#![warn(missing_docs, clippy::pedantic)]

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::ParseError;

/// Default filter directive when neither `RUST_LOG` nor the configuration
/// provides one.
pub const DEFAULT_FILTER: &str = "info";

/// Logging configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// `EnvFilter` directive, e.g. `info,recall_memory=debug`.
    pub filter: String,
    /// Whether to print the event target (module path).
    pub with_target: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_owned(),
            with_target: false,
        }
    }
}

/// Errors raised while installing the subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The configured directive could not be parsed.
    #[error("invalid log filter `{directive}`: {source}")]
    InvalidFilter {
        /// Directive as configured.
        directive: String,
        /// Parser error.
        #[source]
        source: ParseError,
    },

    /// A global subscriber was already installed.
    #[error("tracing subscriber already initialised: {reason}")]
    AlreadyInitialised {
        /// Error reported by `tracing-subscriber`.
        reason: String,
    },
}

/// Builds the filter for `config`. `RUST_LOG` takes precedence when set.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidFilter`] if the configured directive is
/// malformed.
pub fn build_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.filter).map_err(|source| TelemetryError::InvalidFilter {
        directive: config.filter.clone(),
        source,
    })
}

/// Installs a global `fmt` subscriber writing to stderr.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidFilter`] for a malformed directive and
/// [`TelemetryError::AlreadyInitialised`] if another subscriber is set.
pub fn init_tracing(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = build_filter(config)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| TelemetryError::AlreadyInitialised {
            reason: err.to_string(),
        })
}
