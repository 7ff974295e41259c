//! The persisted per-user aggregate and its codec.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::embeddings::EmbeddingVector;
use crate::record::MemoryRecord;
use crate::{MemoryError, MemoryResult};

/// Ordered list of a user's memories plus bookkeeping timestamps.
///
/// Every record in a collection shares one embedding dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryCollection {
    #[serde(default)]
    records: Vec<MemoryRecord>,
    #[serde(default)]
    last_deduplicated_at: Option<DateTime<Utc>>,
    #[serde(default = "Utc::now")]
    updated_at: DateTime<Utc>,
}

impl MemoryCollection {
    /// Creates an empty collection that has never been deduplicated.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            last_deduplicated_at: None,
            updated_at: Utc::now(),
        }
    }

    /// Decodes a persisted collection.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Corrupted`] when the bytes are not a valid
    /// collection or the decoded records violate the collection invariants.
    pub fn decode(path: &str, bytes: &[u8]) -> MemoryResult<Self> {
        let collection: Self = serde_json::from_slice(bytes)
            .map_err(|err| MemoryError::corrupted(path, err.to_string()))?;
        collection
            .check_invariants()
            .map_err(|err| MemoryError::corrupted(path, err.to_string()))?;
        Ok(collection)
    }

    /// Encodes the collection into its persisted form.
    ///
    /// # Errors
    ///
    /// Propagates serialization failures.
    pub fn encode(&self) -> MemoryResult<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    /// Returns the records in insertion order.
    #[must_use]
    pub fn records(&self) -> &[MemoryRecord] {
        &self.records
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` when the collection holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Embedding dimension shared by the records, if any exist.
    #[must_use]
    pub fn dimension(&self) -> Option<usize> {
        self.records.first().map(|record| record.embedding().len())
    }

    /// Embeddings of all records in insertion order.
    #[must_use]
    pub fn embeddings(&self) -> Vec<EmbeddingVector> {
        self.records
            .iter()
            .map(|record| record.embedding().clone())
            .collect()
    }

    /// Appends a record.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::DimensionMismatch`] when the record's embedding
    /// does not match the existing records.
    pub fn push(&mut self, record: MemoryRecord) -> MemoryResult<()> {
        if let Some(expected) = self.dimension() {
            record.embedding().ensure_dimension(expected)?;
        }
        self.records.push(record);
        Ok(())
    }

    /// Replaces the record list, e.g. with the output of deduplication.
    pub fn replace_records(&mut self, records: Vec<MemoryRecord>) {
        self.records = records;
    }

    /// When the collection was last deduplicated.
    #[must_use]
    pub fn last_deduplicated_at(&self) -> Option<DateTime<Utc>> {
        self.last_deduplicated_at
    }

    /// Records a completed deduplication run.
    pub fn mark_deduplicated(&mut self, at: DateTime<Utc>) {
        self.last_deduplicated_at = Some(at);
    }

    /// When the collection was last persisted.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Stamps the persist time.
    pub fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }

    fn check_invariants(&self) -> MemoryResult<()> {
        let Some(expected) = self.dimension() else {
            return Ok(());
        };
        for record in &self.records {
            record.check_invariants()?;
            record.embedding().ensure_dimension(expected)?;
        }
        Ok(())
    }
}

impl Default for MemoryCollection {
    fn default() -> Self {
        Self::new()
    }
}
