//! Per-user long-term semantic memory for conversational agents.
//!
//! This crate bundles the recall member crates behind feature flags so
//! downstream users can pull in only the layers they need: the store on its
//! own, the HTTP embedding providers, the agent-facing tools, configuration or
//! logging setup.

#![warn(missing_docs, clippy::pedantic)]

/// Re-export shared primitives for convenience.
pub use recall_primitives as primitives;

/// Memory store, similarity index and deduplication (enabled by `memory` feature).
#[cfg(feature = "memory")]
pub use recall_memory as memory;

/// HTTP embedding providers (enabled by `adapters` feature).
#[cfg(feature = "adapters")]
pub use recall_adapters as adapters;

/// Tool registry and memory tools (enabled by `tools` feature).
#[cfg(feature = "tools")]
pub use recall_tools as tools;

/// Configuration loading (enabled by `config` feature).
#[cfg(feature = "config")]
pub use recall_config as config;

/// Logging setup (enabled by `telemetry` feature).
#[cfg(feature = "telemetry")]
pub use recall_telemetry as telemetry;
