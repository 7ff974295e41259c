//! In-process cache of loaded collections.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::collection::MemoryCollection;

/// Collections keyed by resolved storage path.
///
/// Entries live for the lifetime of the cache: they are replaced on every
/// save and dropped only by [`invalidate`](Self::invalidate). The cache says
/// nothing about other processes writing the same backend.
#[derive(Debug, Default)]
pub struct CollectionCache {
    entries: RwLock<HashMap<String, MemoryCollection>>,
}

impl CollectionCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the cached collection for `path`.
    pub async fn get(&self, path: &str) -> Option<MemoryCollection> {
        self.entries.read().await.get(path).cloned()
    }

    /// Stores `collection` for `path`, replacing any previous entry.
    pub async fn put(&self, path: impl Into<String>, collection: MemoryCollection) {
        self.entries.write().await.insert(path.into(), collection);
    }

    /// Drops the entry for `path`. Returns whether one was present.
    pub async fn invalidate(&self, path: &str) -> bool {
        self.entries.write().await.remove(path).is_some()
    }

    /// Returns utilisation statistics.
    pub async fn stats(&self) -> CacheStats {
        let guard = self.entries.read().await;
        CacheStats {
            entries: guard.len(),
            records: guard.values().map(MemoryCollection::len).sum(),
        }
    }
}

/// Snapshot describing cache utilisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Cached collections.
    pub entries: usize,
    /// Records across all cached collections.
    pub records: usize,
}
