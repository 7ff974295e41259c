//! Embedding vectors and the provider interface that produces them.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{MemoryError, MemoryResult};

/// Wrapper type around an immutable floating-point embedding.
#[derive(Clone, PartialEq)]
pub struct EmbeddingVector {
    values: Arc<[f32]>,
}

impl EmbeddingVector {
    /// Creates a new embedding from owned values.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidRecord`] when the supplied vector is empty
    /// or contains non-finite values.
    pub fn new(values: Vec<f32>) -> MemoryResult<Self> {
        if values.is_empty() {
            return Err(MemoryError::InvalidRecord(
                "embedding vector must not be empty",
            ));
        }
        if !values.iter().all(|value| value.is_finite()) {
            return Err(MemoryError::InvalidRecord(
                "embedding vector contains non-finite values",
            ));
        }
        Ok(Self {
            values: Arc::<[f32]>::from(values.into_boxed_slice()),
        })
    }

    /// Creates an embedding by copying the provided slice.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidRecord`] if the slice is empty or contains
    /// non-finite values.
    pub fn from_slice(values: &[f32]) -> MemoryResult<Self> {
        Self::new(values.to_vec())
    }

    /// Returns an immutable view of the embedding data.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// Returns the dimensionality of the embedding.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always `false` for a constructed embedding; provided for API symmetry
    /// with [`len`](Self::len).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Ensures the embedding has the expected dimensionality.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::DimensionMismatch`] when the lengths differ.
    pub fn ensure_dimension(&self, expected: usize) -> MemoryResult<()> {
        if self.len() == expected {
            Ok(())
        } else {
            Err(MemoryError::DimensionMismatch {
                expected,
                actual: self.len(),
            })
        }
    }

    /// Euclidean norm, accumulated in `f64` so that any finite `f32` input
    /// neither overflows nor underflows.
    pub(crate) fn magnitude(&self) -> f64 {
        self.values
            .iter()
            .map(|value| f64::from(*value) * f64::from(*value))
            .sum::<f64>()
            .sqrt()
    }

    /// Returns a unit-length copy of the values. A zero vector stays zero.
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn normalized(&self) -> Vec<f32> {
        let magnitude = self.magnitude();
        if magnitude == 0.0 {
            return vec![0.0; self.len()];
        }
        self.values
            .iter()
            .map(|value| (f64::from(*value) / magnitude) as f32)
            .collect()
    }
}

impl std::fmt::Debug for EmbeddingVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingVector")
            .field("dimensions", &self.len())
            .finish()
    }
}

impl Serialize for EmbeddingVector {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.values.as_ref().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for EmbeddingVector {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let values = Vec::<f32>::deserialize(deserializer)?;
        Self::new(values).map_err(serde::de::Error::custom)
    }
}

/// Capability that turns text into a fixed-dimension embedding.
///
/// Implementations must be deterministic for a given model: encoding the same
/// text twice yields identical vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Encodes a single piece of text.
    async fn encode(&self, text: &str) -> MemoryResult<EmbeddingVector>;

    /// Output dimensionality, when known ahead of the first call.
    fn dimensions(&self) -> Option<usize> {
        None
    }
}

#[async_trait]
impl<T> EmbeddingProvider for Arc<T>
where
    T: EmbeddingProvider + ?Sized,
{
    async fn encode(&self, text: &str) -> MemoryResult<EmbeddingVector> {
        (**self).encode(text).await
    }

    fn dimensions(&self) -> Option<usize> {
        (**self).dimensions()
    }
}
