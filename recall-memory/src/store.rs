//! Per-user memory store: load, deduplicate, search, mutate, save.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use recall_primitives::{MemoryIdGenerator, UserIdentity};
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, instrument, warn};

use crate::backend::BlobBackend;
use crate::cache::{CacheStats, CollectionCache};
use crate::collection::MemoryCollection;
use crate::dedup::{DedupPolicy, deduplicate};
use crate::embeddings::EmbeddingProvider;
use crate::index::SimilarityIndex;
use crate::path::{NamespacedPathResolver, PathResolver};
use crate::record::{MemoryFact, MemoryRecord, NewMemory};
use crate::{MemoryError, MemoryResult};

/// Builder for [`MemoryStore`] instances.
pub struct MemoryStoreBuilder {
    backend: Option<Arc<dyn BlobBackend>>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    resolver: Arc<dyn PathResolver>,
    policy: DedupPolicy,
}

impl MemoryStoreBuilder {
    /// Starts a builder with the default path resolver and dedup policy.
    #[must_use]
    pub fn new() -> Self {
        Self {
            backend: None,
            embedder: None,
            resolver: Arc::new(NamespacedPathResolver::default()),
            policy: DedupPolicy::default(),
        }
    }

    /// Installs the blob backend. Required.
    #[must_use]
    pub fn with_backend(mut self, backend: Arc<dyn BlobBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Installs the embedding provider. Required.
    #[must_use]
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Overrides how identities map to storage paths.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn PathResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Overrides the deduplication policy.
    #[must_use]
    pub fn with_policy(mut self, policy: DedupPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Builds the [`MemoryStore`].
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::MissingBackend`] or
    /// [`MemoryError::MissingEmbedder`] when a required collaborator is absent.
    pub fn build(self) -> MemoryResult<MemoryStore> {
        let backend = self.backend.ok_or(MemoryError::MissingBackend)?;
        let embedder = self.embedder.ok_or(MemoryError::MissingEmbedder)?;
        Ok(MemoryStore {
            backend,
            embedder,
            resolver: self.resolver,
            policy: self.policy,
            cache: Arc::new(CollectionCache::new()),
            locks: Arc::new(IdentityLocks::default()),
            ids: Arc::new(MemoryIdGenerator::new()),
        })
    }
}

impl Default for MemoryStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    /// The matching memory, without its embedding.
    pub fact: MemoryFact,
    /// Cosine similarity between the query and the memory.
    pub similarity: f32,
}

/// Counts from a deduplication run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DedupSummary {
    /// Records remaining after the run.
    pub kept: usize,
    /// Records dropped as duplicates.
    pub removed: usize,
}

/// Long-term memory facade used by the tool layer.
///
/// Operations on the same identity are serialised within one store so a
/// load-modify-save cycle never loses a concurrent update. Separate processes
/// sharing a backend are not coordinated; the last write wins.
#[derive(Clone)]
pub struct MemoryStore {
    backend: Arc<dyn BlobBackend>,
    embedder: Arc<dyn EmbeddingProvider>,
    resolver: Arc<dyn PathResolver>,
    policy: DedupPolicy,
    cache: Arc<CollectionCache>,
    locks: Arc<IdentityLocks>,
    ids: Arc<MemoryIdGenerator>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl MemoryStore {
    /// Creates a builder for a memory store.
    #[must_use]
    pub fn builder() -> MemoryStoreBuilder {
        MemoryStoreBuilder::new()
    }

    /// Returns the active deduplication policy.
    #[must_use]
    pub fn policy(&self) -> &DedupPolicy {
        &self.policy
    }

    /// Embeds and stores one fact. Never triggers deduplication.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidRecord`] before any embedding or storage
    /// work when the input is invalid, [`MemoryError::DimensionMismatch`] when
    /// the embedding does not fit the existing collection, and propagates
    /// embedding and backend failures.
    #[instrument(skip_all, fields(user = %identity.short_fingerprint()))]
    pub async fn add(&self, identity: &UserIdentity, memory: NewMemory) -> MemoryResult<MemoryFact> {
        memory.validate()?;
        let path = self.resolver.resolve(identity).await?;
        let _guard = self.locks.acquire(&path).await;

        let mut collection = self.load(&path).await?;
        let embedding = self.embedder.encode(memory.content()).await?;
        let record = MemoryRecord::new(self.ids.next_id(), memory, embedding)?;
        let fact = record.to_fact();
        collection.push(record)?;
        self.save(&path, &mut collection).await?;

        info!(id = %fact.id, records = collection.len(), "stored memory");
        Ok(fact)
    }

    /// Returns up to `top_k` memories ranked by similarity to `query`.
    ///
    /// A stale collection is deduplicated and persisted first. An empty
    /// collection or `top_k == 0` yields an empty list, whatever the query.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidQuery`] for a blank query against a
    /// non-empty collection,
    /// [`MemoryError::Corrupted`] when the stored collection cannot be decoded,
    /// [`MemoryError::DimensionMismatch`] when the query embedding does not fit
    /// the collection, and propagates embedding and backend failures.
    #[instrument(skip_all, fields(user = %identity.short_fingerprint(), top_k = top_k))]
    pub async fn search(
        &self,
        identity: &UserIdentity,
        query: &str,
        top_k: usize,
    ) -> MemoryResult<Vec<SearchHit>> {
        let path = self.resolver.resolve(identity).await?;
        let _guard = self.locks.acquire(&path).await;

        let mut collection = self.load(&path).await?;
        if collection.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        if query.trim().is_empty() {
            return Err(MemoryError::InvalidQuery("search query must not be empty"));
        }

        let now = Utc::now();
        if self.policy.is_due(&collection, now) {
            self.deduplicate_and_save(&path, &mut collection, now).await?;
        }

        let query = self.embedder.encode(query).await?;
        let index = SimilarityIndex::build(&collection.embeddings())?;
        let neighbors = index.search(&query, top_k.min(collection.len()))?;

        let records = collection.records();
        let hits: Vec<_> = neighbors
            .into_iter()
            .map(|neighbor| SearchHit {
                fact: records[neighbor.index].to_fact(),
                similarity: neighbor.similarity,
            })
            .collect();
        debug!(hits = hits.len(), "search complete");
        Ok(hits)
    }

    /// Deduplicates the identity's collection now, regardless of the trigger.
    /// Nothing is written for an identity without memories.
    ///
    /// # Errors
    ///
    /// Propagates load, deduplication and backend failures.
    #[instrument(skip_all, fields(user = %identity.short_fingerprint()))]
    pub async fn deduplicate_now(&self, identity: &UserIdentity) -> MemoryResult<DedupSummary> {
        let path = self.resolver.resolve(identity).await?;
        let _guard = self.locks.acquire(&path).await;

        let mut collection = self.load(&path).await?;
        if collection.is_empty() {
            return Ok(DedupSummary {
                kept: 0,
                removed: 0,
            });
        }
        self.deduplicate_and_save(&path, &mut collection, Utc::now())
            .await
    }

    /// Removes every memory of the identity. Returns whether anything was
    /// stored; deleting an absent collection succeeds.
    ///
    /// # Errors
    ///
    /// Propagates backend failures other than "not found". The cache is left
    /// untouched in that case.
    #[instrument(skip_all, fields(user = %identity.short_fingerprint()))]
    pub async fn delete_all(&self, identity: &UserIdentity) -> MemoryResult<bool> {
        let path = self.resolver.resolve(identity).await?;
        let _guard = self.locks.acquire(&path).await;

        let existed = self.backend.delete(&path).await.inspect_err(|err| {
            warn!(error = %err, "failed to delete memory collection");
        })?;
        self.cache.invalidate(&path).await;
        info!(existed, "deleted all memories");
        Ok(existed)
    }

    /// Returns cache utilisation statistics.
    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    async fn deduplicate_and_save(
        &self,
        path: &str,
        collection: &mut MemoryCollection,
        now: DateTime<Utc>,
    ) -> MemoryResult<DedupSummary> {
        let outcome = deduplicate(collection.records().to_vec(), &self.policy)?;
        let summary = DedupSummary {
            kept: outcome.kept.len(),
            removed: outcome.removed,
        };
        let mut next = collection.clone();
        next.replace_records(outcome.kept);
        next.mark_deduplicated(now);
        self.save(path, &mut next).await?;
        *collection = next;

        info!(kept = summary.kept, removed = summary.removed, "deduplicated memories");
        Ok(summary)
    }

    async fn load(&self, path: &str) -> MemoryResult<MemoryCollection> {
        if let Some(collection) = self.cache.get(path).await {
            debug!("collection cache hit");
            return Ok(collection);
        }
        debug!("collection cache miss");

        let collection = match self.backend.read(path).await? {
            Some(bytes) => MemoryCollection::decode(path, &bytes).inspect_err(|err| {
                warn!(error = %err, "stored memory collection is unreadable");
            })?,
            None => MemoryCollection::new(),
        };
        self.cache.put(path, collection.clone()).await;
        Ok(collection)
    }

    async fn save(&self, path: &str, collection: &mut MemoryCollection) -> MemoryResult<()> {
        collection.touch(Utc::now());
        let bytes = collection.encode()?;
        self.backend.write(path, bytes).await.inspect_err(|err| {
            warn!(error = %err, "failed to persist memory collection");
        })?;
        self.cache.put(path, collection.clone()).await;
        Ok(())
    }
}

/// One async mutex per storage path.
#[derive(Debug, Default)]
struct IdentityLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl IdentityLocks {
    async fn acquire(&self, path: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(path.to_owned()).or_default())
        };
        lock.lock_owned().await
    }
}
