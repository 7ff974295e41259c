//! Deterministic collaborators shared by unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;

use crate::backend::{BlobBackend, InMemoryBlobBackend};
use crate::embeddings::{EmbeddingProvider, EmbeddingVector};
use crate::{MemoryError, MemoryResult};

/// Embedder answering from a lookup table, with a byte-derived fallback.
#[derive(Debug, Default)]
pub(crate) struct StaticEmbedder {
    table: HashMap<String, Vec<f32>>,
    calls: AtomicUsize,
}

impl StaticEmbedder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with(mut self, text: &str, values: &[f32]) -> Self {
        self.table.insert(text.to_owned(), values.to_vec());
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for StaticEmbedder {
    async fn encode(&self, text: &str) -> MemoryResult<EmbeddingVector> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(values) = self.table.get(text) {
            return EmbeddingVector::from_slice(values);
        }
        if text == "unreachable model" {
            return Err(MemoryError::embedding("model offline"));
        }
        let mut values = [0.0_f32; 3];
        for (position, byte) in text.bytes().enumerate() {
            values[position % 3] += f32::from(byte);
        }
        EmbeddingVector::new(values.to_vec())
    }
}

/// In-memory backend that counts traffic and can be told to fail.
#[derive(Debug, Default)]
pub(crate) struct InstrumentedBackend {
    inner: InMemoryBlobBackend,
    reads: AtomicUsize,
    writes: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_deletes: AtomicBool,
}

impl InstrumentedBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub(crate) fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub(crate) fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlobBackend for InstrumentedBackend {
    async fn read(&self, path: &str) -> MemoryResult<Option<Bytes>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(MemoryError::backend("read refused"));
        }
        self.inner.read(path).await
    }

    async fn write(&self, path: &str, bytes: Bytes) -> MemoryResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(MemoryError::backend("write refused"));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.write(path, bytes).await
    }

    async fn delete(&self, path: &str) -> MemoryResult<bool> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(MemoryError::backend("delete refused"));
        }
        self.inner.delete(path).await
    }
}
