//! Strongly typed configuration schema.

use std::fmt;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::Duration;
use recall_memory::dedup::DedupPolicy;
use recall_memory::path::{DEFAULT_NAMESPACE, NamespacedPathResolver};
use recall_telemetry::TelemetryConfig;
use serde::{Deserialize, Serialize};

use crate::{ConfigError, ConfigResult};

/// Top-level configuration document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecallConfig {
    /// Where collections are persisted.
    pub storage: StorageConfig,
    /// Deduplication trigger and threshold.
    pub dedup: DedupConfig,
    /// Search tool limits.
    pub search: SearchConfig,
    /// Embedding provider.
    pub embeddings: EmbeddingsConfig,
    /// Logging.
    pub telemetry: TelemetryConfig,
}

/// Blob backend selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    /// Process-local map; contents vanish on exit.
    Memory,
    /// Directory tree on the local file system.
    #[default]
    File,
}

impl FromStr for StorageBackendKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> ConfigResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "file" => Ok(Self::File),
            _ => Err(ConfigError::invalid(format!("unknown storage backend `{value}`"))),
        }
    }
}

/// Storage settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend kind.
    pub backend: StorageBackendKind,
    /// Root directory for the file backend.
    pub root: PathBuf,
    /// First path segment of every collection.
    pub namespace: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::File,
            root: PathBuf::from(".recall"),
            namespace: DEFAULT_NAMESPACE.to_owned(),
        }
    }
}

/// Deduplication settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Cosine similarity that must be strictly exceeded to merge two records.
    pub similarity_threshold: f32,
    /// Neighbours examined per record.
    pub neighbor_cap: usize,
    /// Collections at or below this size are never deduplicated automatically.
    pub min_records: usize,
    /// Minimum hours between automatic runs.
    pub interval_hours: i64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DedupPolicy::DEFAULT_SIMILARITY_THRESHOLD,
            neighbor_cap: DedupPolicy::DEFAULT_NEIGHBOR_CAP,
            min_records: DedupPolicy::DEFAULT_MIN_RECORDS,
            interval_hours: DedupPolicy::DEFAULT_INTERVAL_HOURS,
        }
    }
}

/// Search limits applied by the `search_memory` tool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Results returned when the caller omits `top_k`.
    pub default_top_k: usize,
    /// Largest `top_k` accepted.
    pub max_top_k: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top_k: 5,
            max_top_k: 20,
        }
    }
}

/// Embedding provider selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    /// Local Ollama daemon.
    #[default]
    Ollama,
    /// `OpenAI` or a compatible `/v1/embeddings` service.
    OpenAi,
}

impl fmt::Display for EmbeddingProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
        })
    }
}

impl FromStr for EmbeddingProviderKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> ConfigResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAi),
            _ => Err(ConfigError::invalid(format!("unknown embedding provider `{value}`"))),
        }
    }
}

/// Embedding provider settings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingsConfig {
    /// Provider kind.
    pub provider: EmbeddingProviderKind,
    /// Overrides the provider's default endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Model identifier.
    pub model: String,
    /// API key; `OpenAI` falls back to `OPENAI_API_KEY` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Expected output dimension, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
    /// HTTP timeout per request.
    pub timeout_secs: u64,
}

impl fmt::Debug for EmbeddingsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddingsConfig")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("dimensions", &self.dimensions)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::Ollama,
            base_url: None,
            model: "all-minilm".to_owned(),
            api_key: None,
            dimensions: None,
            timeout_secs: 30,
        }
    }
}

impl RecallConfig {
    /// Checks ranges and cross-field consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first offending field.
    pub fn validate(&self) -> ConfigResult<()> {
        let threshold = self.dedup.similarity_threshold;
        if !(-1.0..=1.0).contains(&threshold) {
            return Err(ConfigError::invalid(format!(
                "dedup.similarity_threshold must be within [-1, 1], got {threshold}"
            )));
        }
        if self.dedup.neighbor_cap == 0 {
            return Err(ConfigError::invalid("dedup.neighbor_cap must be at least 1"));
        }
        if self.dedup.interval_hours < 0 {
            return Err(ConfigError::invalid("dedup.interval_hours must not be negative"));
        }
        if self.search.default_top_k == 0 {
            return Err(ConfigError::invalid("search.default_top_k must be at least 1"));
        }
        if self.search.default_top_k > self.search.max_top_k {
            return Err(ConfigError::invalid(format!(
                "search.default_top_k ({}) exceeds search.max_top_k ({})",
                self.search.default_top_k, self.search.max_top_k
            )));
        }
        if self.embeddings.model.trim().is_empty() {
            return Err(ConfigError::invalid("embeddings.model must not be empty"));
        }
        if self.embeddings.timeout_secs == 0 {
            return Err(ConfigError::invalid("embeddings.timeout_secs must be at least 1"));
        }
        if self.embeddings.dimensions == Some(0) {
            return Err(ConfigError::invalid("embeddings.dimensions must be at least 1"));
        }
        self.path_resolver()?;
        Ok(())
    }

    /// Builds the deduplication policy for the memory store.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] or [`ConfigError::Memory`] if the
    /// values are out of range.
    pub fn dedup_policy(&self) -> ConfigResult<DedupPolicy> {
        let cap = NonZeroUsize::new(self.dedup.neighbor_cap)
            .ok_or_else(|| ConfigError::invalid("dedup.neighbor_cap must be at least 1"))?;
        let interval = Duration::try_hours(self.dedup.interval_hours)
            .ok_or_else(|| ConfigError::invalid("dedup.interval_hours is out of range"))?;
        Ok(DedupPolicy::new(
            self.dedup.similarity_threshold,
            cap,
            self.dedup.min_records,
            interval,
        )?)
    }

    /// Builds the storage path resolver for the configured namespace.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Memory`] if the namespace is not a single path
    /// segment.
    pub fn path_resolver(&self) -> ConfigResult<NamespacedPathResolver> {
        Ok(NamespacedPathResolver::new(self.storage.namespace.clone())?)
    }
}
