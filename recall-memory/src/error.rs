//! Error types for the memory subsystem.

use serde_json::Error as SerdeError;
use thiserror::Error;

/// Errors emitted by memory components.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// The provided configuration was invalid.
    #[error("invalid memory configuration: {0}")]
    InvalidConfig(&'static str),
    /// Memory record input failed validation.
    #[error("invalid memory record: {0}")]
    InvalidRecord(&'static str),
    /// Search input failed validation.
    #[error("invalid memory query: {0}")]
    InvalidQuery(&'static str),
    /// Store was built without a blob backend.
    #[error("blob backend not configured")]
    MissingBackend,
    /// Store was built without an embedding provider.
    #[error("embedding provider not configured")]
    MissingEmbedder,
    /// Underlying I/O failure while reading or writing blobs.
    #[error("i/o error: {source}")]
    Io {
        /// Source [`std::io::Error`].
        #[from]
        source: std::io::Error,
    },
    /// Serialization error while encoding a collection.
    #[error("serialization error: {source}")]
    Serialization {
        /// Source [`serde_json::Error`].
        #[from]
        source: SerdeError,
    },
    /// Blob backend reported a failure. Callers may retry.
    #[error("blob backend error: {reason}")]
    Backend {
        /// Human-readable reason describing the failure.
        reason: String,
    },
    /// A persisted collection exists but cannot be decoded.
    #[error("memory collection at `{path}` is corrupted: {reason}")]
    Corrupted {
        /// Storage path of the offending object.
        path: String,
        /// Why decoding failed.
        reason: String,
    },
    /// An embedding did not match the dimensionality of the collection.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension of the stored embeddings.
        expected: usize,
        /// Dimension of the offending embedding.
        actual: usize,
    },
    /// The embedding provider failed to encode text.
    #[error("embedding provider error: {reason}")]
    Embedding {
        /// Human-readable reason describing the failure.
        reason: String,
    },
    /// The embedding provider refused the request or returned an unusable
    /// answer. Retrying unchanged will fail again.
    #[error("embedding rejected: {reason}")]
    EmbeddingRejected {
        /// Human-readable reason describing the failure.
        reason: String,
    },
    /// The caller identity was rejected.
    #[error(transparent)]
    Identity(#[from] recall_primitives::Error),
}

impl MemoryError {
    /// Helper to construct backend errors from string-like values.
    #[must_use]
    pub fn backend(reason: impl Into<String>) -> Self {
        Self::Backend {
            reason: reason.into(),
        }
    }

    /// Helper to construct embedding provider errors.
    #[must_use]
    pub fn embedding(reason: impl Into<String>) -> Self {
        Self::Embedding {
            reason: reason.into(),
        }
    }

    /// Helper to construct non-retryable embedding provider errors.
    #[must_use]
    pub fn embedding_rejected(reason: impl Into<String>) -> Self {
        Self::EmbeddingRejected {
            reason: reason.into(),
        }
    }

    /// Helper to construct corruption errors.
    #[must_use]
    pub fn corrupted(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Corrupted {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` when the failure is transient and the operation may be
    /// retried unchanged.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Backend { .. } | Self::Io { .. } | Self::Embedding { .. }
        )
    }
}

/// Result type alias for memory operations.
pub type MemoryResult<T> = Result<T, MemoryError>;
