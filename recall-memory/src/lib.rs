//! Per-user long-term semantic memory.
//!
//! A [`MemoryStore`] keeps one [`MemoryCollection`] per caller identity in a
//! [`BlobBackend`], ranks memories against a query with an exact cosine
//! [`SimilarityIndex`], and periodically collapses near-duplicates according
//! to a [`DedupPolicy`].

#![warn(missing_docs, clippy::pedantic)]

pub mod backend;
pub mod cache;
pub mod collection;
pub mod dedup;
pub mod embeddings;
mod error;
pub mod index;
pub mod path;
pub mod record;
pub mod store;

#[cfg(test)]
mod testing;

pub use backend::{BlobBackend, FileBlobBackend, InMemoryBlobBackend};
pub use cache::{CacheStats, CollectionCache};
pub use collection::MemoryCollection;
pub use dedup::{DedupOutcome, DedupPolicy, deduplicate};
pub use embeddings::{EmbeddingProvider, EmbeddingVector};
pub use error::{MemoryError, MemoryResult};
pub use index::{Neighbor, SimilarityIndex};
pub use path::{NamespacedPathResolver, PathResolver};
pub use record::{MemoryFact, MemoryRecord, NewMemory};
pub use store::{DedupSummary, MemoryStore, MemoryStoreBuilder, SearchHit};

pub use recall_primitives::{MemoryId, UserIdentity};
