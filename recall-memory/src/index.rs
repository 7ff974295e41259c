//! Exact cosine-similarity index over a small set of embeddings.
//!
//! Vectors are L2-normalised once at build time and stored in a flat
//! row-major buffer; a query is a brute-force inner-product scan. At the
//! record counts a single user accumulates this is both exact and fast
//! enough, so no approximate structure is used.

use std::cmp::Ordering;

use crate::embeddings::EmbeddingVector;
use crate::{MemoryError, MemoryResult};

/// One ranked result of a similarity query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Position of the matched vector in the input order.
    pub index: usize,
    /// Cosine similarity in `[-1.0, 1.0]`.
    pub similarity: f32,
}

/// Searchable, normalised copy of a set of embeddings.
#[derive(Debug, Clone)]
pub struct SimilarityIndex {
    dimension: usize,
    rows: Vec<f32>,
}

impl SimilarityIndex {
    /// Builds an index over the supplied embeddings.
    ///
    /// Zero-norm vectors are kept as zero rows and score `0.0` against any
    /// query.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidRecord`] for an empty input and
    /// [`MemoryError::DimensionMismatch`] when the embeddings disagree on
    /// dimension.
    pub fn build(embeddings: &[EmbeddingVector]) -> MemoryResult<Self> {
        let Some(first) = embeddings.first() else {
            return Err(MemoryError::InvalidRecord(
                "similarity index requires at least one embedding",
            ));
        };
        let dimension = first.len();
        let mut rows = Vec::with_capacity(dimension * embeddings.len());
        for embedding in embeddings {
            embedding.ensure_dimension(dimension)?;
            rows.extend(embedding.normalized());
        }
        Ok(Self { dimension, rows })
    }

    /// Number of indexed vectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len() / self.dimension
    }

    /// Always `false`; an index cannot be built from zero vectors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Dimension shared by all indexed vectors.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Returns the `k` most similar vectors, best first. Equal similarities
    /// keep input order, so the lower index wins a tie. `k` is clamped to the
    /// number of indexed vectors.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::DimensionMismatch`] when the query dimension
    /// differs from the index.
    pub fn search(&self, query: &EmbeddingVector, k: usize) -> MemoryResult<Vec<Neighbor>> {
        query.ensure_dimension(self.dimension)?;
        let query = query.normalized();
        Ok(self.rank(&query, k))
    }

    /// Searches with the stored vector at `position` as the query.
    pub(crate) fn search_row(&self, position: usize, k: usize) -> Vec<Neighbor> {
        let start = position * self.dimension;
        self.rank(&self.rows[start..start + self.dimension], k)
    }

    fn rank(&self, query: &[f32], k: usize) -> Vec<Neighbor> {
        let mut scored: Vec<Neighbor> = self
            .rows
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(index, row)| Neighbor {
                index,
                similarity: dot(row, query),
            })
            .collect();

        // Stable sort keeps input order among equal scores.
        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
        });
        scored.truncate(k);
        scored
    }
}

fn dot(lhs: &[f32], rhs: &[f32]) -> f32 {
    lhs.iter().zip(rhs).map(|(a, b)| a * b).sum()
}
