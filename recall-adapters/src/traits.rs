//! Error and metadata types shared by embedding adapters.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use recall_memory::{EmbeddingVector, MemoryError};
use thiserror::Error;
use tracing::warn;

/// Result alias used by embedding adapters.
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Error type shared by adapter implementations.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Adapter is misconfigured or missing credentials.
    #[error("adapter not configured: {reason}")]
    Configuration {
        /// Additional context for the failure.
        reason: String,
    },

    /// The supplied text could not be turned into a request.
    #[error("invalid embedding request: {reason}")]
    InvalidRequest {
        /// Reason describing why the request could not be processed.
        reason: String,
    },

    /// Transport-level failures (network, protocol, etc.).
    #[error("adapter transport error: {reason}")]
    Transport {
        /// Additional context about the error.
        reason: String,
    },

    /// The provider rejected the request due to rate limiting.
    #[error("adapter rate limited (retry after {retry_after:?})")]
    RateLimited {
        /// Suggested delay before retrying.
        retry_after: Option<Duration>,
    },

    /// The provider returned a malformed response.
    #[error("adapter response error: {reason}")]
    Response {
        /// Additional context about the response failure.
        reason: String,
    },

    /// The model answered with a different dimension than earlier calls.
    #[error("embedding dimension changed: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension latched from configuration or the first response.
        expected: usize,
        /// Dimension of the offending response.
        actual: usize,
    },
}

impl AdapterError {
    /// Convenience constructor for invalid requests.
    #[must_use]
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for configuration issues.
    #[must_use]
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for transport failures.
    #[must_use]
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for malformed responses.
    #[must_use]
    pub fn response(reason: impl Into<String>) -> Self {
        Self::Response {
            reason: reason.into(),
        }
    }
}

impl From<AdapterError> for MemoryError {
    fn from(value: AdapterError) -> Self {
        match value {
            AdapterError::Transport { .. } | AdapterError::RateLimited { .. } => {
                MemoryError::embedding(value.to_string())
            }
            AdapterError::DimensionMismatch { expected, actual } => {
                MemoryError::DimensionMismatch { expected, actual }
            }
            AdapterError::Configuration { .. }
            | AdapterError::InvalidRequest { .. }
            | AdapterError::Response { .. } => MemoryError::embedding_rejected(value.to_string()),
        }
    }
}

/// Minimal metadata describing an embedding adapter instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdapterMetadata {
    provider: &'static str,
    model: String,
}

impl AdapterMetadata {
    /// Creates metadata for the supplied provider and model identifier.
    #[must_use]
    pub fn new(provider: &'static str, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Returns the provider identifier (e.g., "ollama").
    #[must_use]
    pub const fn provider(&self) -> &'static str {
        self.provider
    }

    /// Returns the configured model name.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

/// Remembers the first dimension a model returned and rejects any other.
#[derive(Debug, Default)]
pub(crate) struct DimensionLatch {
    dimension: AtomicUsize,
}

impl DimensionLatch {
    pub(crate) fn new(expected: Option<usize>) -> Self {
        Self {
            dimension: AtomicUsize::new(expected.unwrap_or(0)),
        }
    }

    pub(crate) fn get(&self) -> Option<usize> {
        match self.dimension.load(Ordering::Acquire) {
            0 => None,
            dimension => Some(dimension),
        }
    }

    /// Validates `values` and pins the latch to their dimension on first use.
    ///
    /// A later vector of another dimension yields
    /// [`AdapterError::DimensionMismatch`].
    pub(crate) fn check(&self, provider: &str, values: Vec<f32>) -> AdapterResult<EmbeddingVector> {
        let embedding = EmbeddingVector::new(values)
            .map_err(|err| AdapterError::response(format!("{provider} embedding rejected: {err}")))?;
        let actual = embedding.len();
        match self
            .dimension
            .compare_exchange(0, actual, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {}
            Err(expected) if expected == actual => {}
            Err(expected) => {
                warn!(provider, expected, actual, "embedding dimension changed");
                return Err(AdapterError::DimensionMismatch { expected, actual });
            }
        }
        Ok(embedding)
    }
}
