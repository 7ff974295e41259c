//! Memory record types.

use std::collections::BTreeSet;

use recall_primitives::MemoryId;
use serde::{Deserialize, Serialize};

use crate::embeddings::EmbeddingVector;
use crate::{MemoryError, MemoryResult};

/// Importance assigned when the caller does not supply one.
pub const DEFAULT_IMPORTANCE: f32 = 0.5;

/// Category assigned when the caller does not supply one.
pub const DEFAULT_CATEGORY: &str = "general";

/// A single remembered fact together with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    id: MemoryId,
    content: String,
    importance: f32,
    category: String,
    #[serde(default)]
    topics: BTreeSet<String>,
    embedding: EmbeddingVector,
}

impl MemoryRecord {
    /// Builds a record from validated input and its embedding.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidRecord`] when the input fails validation.
    pub fn new(id: MemoryId, input: NewMemory, embedding: EmbeddingVector) -> MemoryResult<Self> {
        input.validate()?;
        let NewMemory {
            content,
            importance,
            category,
            topics,
        } = input;
        Ok(Self {
            id,
            content,
            importance,
            category,
            topics,
            embedding,
        })
    }

    /// Returns the identifier.
    #[must_use]
    pub fn id(&self) -> MemoryId {
        self.id
    }

    /// Returns the remembered text.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Returns the importance in `[0.0, 1.0]`.
    #[must_use]
    pub fn importance(&self) -> f32 {
        self.importance
    }

    /// Returns the category label.
    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Returns the topic tags in sorted order.
    #[must_use]
    pub fn topics(&self) -> &BTreeSet<String> {
        &self.topics
    }

    /// Returns the embedding computed when the record was created.
    #[must_use]
    pub fn embedding(&self) -> &EmbeddingVector {
        &self.embedding
    }

    /// Returns the record without its embedding.
    #[must_use]
    pub fn to_fact(&self) -> MemoryFact {
        MemoryFact {
            id: self.id,
            content: self.content.clone(),
            importance: self.importance,
            category: self.category.clone(),
            topics: self.topics.iter().cloned().collect(),
        }
    }

    pub(crate) fn check_invariants(&self) -> MemoryResult<()> {
        validate_fields(&self.content, self.importance, &self.category, &self.topics)
    }
}

/// Caller-facing view of a record, with the embedding stripped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryFact {
    /// Record identifier.
    pub id: MemoryId,
    /// Remembered text.
    pub content: String,
    /// Importance in `[0.0, 1.0]`.
    pub importance: f32,
    /// Category label.
    pub category: String,
    /// Topic tags in sorted order.
    pub topics: Vec<String>,
}

/// Input for a memory that has not been embedded yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMemory {
    content: String,
    importance: f32,
    category: String,
    topics: BTreeSet<String>,
}

impl NewMemory {
    /// Starts a new memory with default importance and category.
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            importance: DEFAULT_IMPORTANCE,
            category: DEFAULT_CATEGORY.to_owned(),
            topics: BTreeSet::new(),
        }
    }

    /// Sets the importance.
    #[must_use]
    pub fn with_importance(mut self, importance: f32) -> Self {
        self.importance = importance;
        self
    }

    /// Sets the category label.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Adds topic tags. Duplicates collapse.
    #[must_use]
    pub fn with_topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.topics.extend(topics.into_iter().map(Into::into));
        self
    }

    /// Returns the text that will be embedded.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Validates the input without touching any external service.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidRecord`] when the content, category or a
    /// topic is blank, or the importance is outside `[0.0, 1.0]`.
    pub fn validate(&self) -> MemoryResult<()> {
        validate_fields(&self.content, self.importance, &self.category, &self.topics)
    }
}

fn validate_fields(
    content: &str,
    importance: f32,
    category: &str,
    topics: &BTreeSet<String>,
) -> MemoryResult<()> {
    if content.trim().is_empty() {
        return Err(MemoryError::InvalidRecord("memory content must not be empty"));
    }
    if !(0.0..=1.0).contains(&importance) {
        return Err(MemoryError::InvalidRecord(
            "memory importance must be within [0.0, 1.0]",
        ));
    }
    if category.trim().is_empty() {
        return Err(MemoryError::InvalidRecord("memory category must not be empty"));
    }
    if topics.iter().any(|topic| topic.trim().is_empty()) {
        return Err(MemoryError::InvalidRecord("memory topics must not be empty"));
    }
    Ok(())
}
