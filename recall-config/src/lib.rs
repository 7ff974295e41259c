//! Configuration for recall services and tools.
//!
//! [`RecallConfig`] is read from an optional JSON file, then patched from
//! `RECALL_*` environment variables and validated before use.

#![warn(missing_docs, clippy::pedantic)]

mod error;
pub mod loader;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ENV_PREFIX, apply_env_overrides, load};
pub use schema::{
    DedupConfig, EmbeddingProviderKind, EmbeddingsConfig, RecallConfig, SearchConfig,
    StorageBackendKind, StorageConfig,
};
pub use recall_telemetry::TelemetryConfig;
