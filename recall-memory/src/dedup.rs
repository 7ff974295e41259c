//! Batch collapsing of near-duplicate memories.

use std::num::NonZeroUsize;

use chrono::{DateTime, Duration, Utc};

use crate::collection::MemoryCollection;
use crate::index::SimilarityIndex;
use crate::record::MemoryRecord;
use crate::{MemoryError, MemoryResult};

/// Tunables for when and how aggressively deduplication runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DedupPolicy {
    similarity_threshold: f32,
    neighbor_cap: NonZeroUsize,
    min_records: usize,
    interval: Duration,
}

impl DedupPolicy {
    /// Cosine similarity above which two memories count as duplicates.
    pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.75;
    /// Neighbours inspected per memory, including the memory itself.
    pub const DEFAULT_NEIGHBOR_CAP: usize = 10;
    /// Collections at or below this size are never deduplicated.
    pub const DEFAULT_MIN_RECORDS: usize = 10;
    /// Minimum hours between runs.
    pub const DEFAULT_INTERVAL_HOURS: i64 = 24;

    /// Creates a policy from explicit values.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidConfig`] when the threshold is not a
    /// finite cosine value or the interval is negative.
    pub fn new(
        similarity_threshold: f32,
        neighbor_cap: NonZeroUsize,
        min_records: usize,
        interval: Duration,
    ) -> MemoryResult<Self> {
        if !(-1.0..=1.0).contains(&similarity_threshold) {
            return Err(MemoryError::InvalidConfig(
                "similarity threshold must be within [-1.0, 1.0]",
            ));
        }
        if interval < Duration::zero() {
            return Err(MemoryError::InvalidConfig(
                "deduplication interval must not be negative",
            ));
        }
        Ok(Self {
            similarity_threshold,
            neighbor_cap,
            min_records,
            interval,
        })
    }

    /// Returns the similarity threshold (strictly exceeded to merge).
    #[must_use]
    pub const fn similarity_threshold(&self) -> f32 {
        self.similarity_threshold
    }

    /// Returns the neighbour cap.
    #[must_use]
    pub const fn neighbor_cap(&self) -> NonZeroUsize {
        self.neighbor_cap
    }

    /// Returns the record count that must be exceeded before a run.
    #[must_use]
    pub const fn min_records(&self) -> usize {
        self.min_records
    }

    /// Returns the minimum time between runs.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether `collection` should be deduplicated at `now`.
    #[must_use]
    pub fn is_due(&self, collection: &MemoryCollection, now: DateTime<Utc>) -> bool {
        if collection.len() <= self.min_records {
            return false;
        }
        match collection.last_deduplicated_at() {
            None => true,
            Some(last) => now - last > self.interval,
        }
    }
}

impl Default for DedupPolicy {
    fn default() -> Self {
        Self {
            similarity_threshold: Self::DEFAULT_SIMILARITY_THRESHOLD,
            neighbor_cap: NonZeroUsize::new(Self::DEFAULT_NEIGHBOR_CAP).expect("non-zero"),
            min_records: Self::DEFAULT_MIN_RECORDS,
            interval: Duration::hours(Self::DEFAULT_INTERVAL_HOURS),
        }
    }
}

/// Result of a deduplication pass.
#[derive(Debug, Clone, PartialEq)]
pub struct DedupOutcome {
    /// Surviving records in their original relative order.
    pub kept: Vec<MemoryRecord>,
    /// Number of records dropped as duplicates.
    pub removed: usize,
}

/// Collapses near-duplicate records, keeping the more important one of each
/// similar pair. On equal importance the earlier record survives.
///
/// Each record is compared against its nearest neighbours only, so chains of
/// similar records longer than the neighbour cap may survive a single pass.
///
/// # Errors
///
/// Returns [`MemoryError::DimensionMismatch`] when the records disagree on
/// embedding dimension.
pub fn deduplicate(records: Vec<MemoryRecord>, policy: &DedupPolicy) -> MemoryResult<DedupOutcome> {
    if records.len() <= 1 {
        return Ok(DedupOutcome {
            kept: records,
            removed: 0,
        });
    }

    let embeddings: Vec<_> = records
        .iter()
        .map(|record| record.embedding().clone())
        .collect();
    let index = SimilarityIndex::build(&embeddings)?;
    let k = policy.neighbor_cap().get().min(records.len());
    let mut removed = vec![false; records.len()];

    for i in 0..records.len() {
        if removed[i] {
            continue;
        }
        for neighbor in index.search_row(i, k) {
            let j = neighbor.index;
            if j == i || removed[j] || neighbor.similarity <= policy.similarity_threshold() {
                continue;
            }
            if records[i].importance() >= records[j].importance() {
                removed[j] = true;
            } else {
                removed[i] = true;
                break;
            }
        }
    }

    let removed_count = removed.iter().filter(|flag| **flag).count();
    let kept = records
        .into_iter()
        .zip(removed)
        .filter_map(|(record, removed)| (!removed).then_some(record))
        .collect();

    Ok(DedupOutcome {
        kept,
        removed: removed_count,
    })
}

#[cfg(test)]
mod tests {
    use recall_primitives::MemoryId;

    use super::*;
    use crate::embeddings::EmbeddingVector;
    use crate::record::NewMemory;

    fn record(id: i64, importance: f32, values: &[f32]) -> MemoryRecord {
        MemoryRecord::new(
            MemoryId::new(id),
            NewMemory::new(format!("fact {id}")).with_importance(importance),
            EmbeddingVector::from_slice(values).unwrap(),
        )
        .unwrap()
    }

    fn ids(records: &[MemoryRecord]) -> Vec<i64> {
        records.iter().map(|record| record.id().get()).collect()
    }

    /// Unit vector whose cosine with `[1, 0]` is `cosine`.
    fn at_cosine(cosine: f32) -> Vec<f32> {
        vec![cosine, (1.0 - cosine * cosine).sqrt()]
    }

    #[test]
    fn keeps_degenerate_inputs_unchanged() {
        let policy = DedupPolicy::default();
        let outcome = deduplicate(Vec::new(), &policy).unwrap();
        assert!(outcome.kept.is_empty());

        let single = vec![record(1, 0.1, &[1.0, 0.0])];
        let outcome = deduplicate(single.clone(), &policy).unwrap();
        assert_eq!(outcome.kept, single);
        assert_eq!(outcome.removed, 0);
    }

    #[test]
    fn keeps_the_more_important_duplicate() {
        let records = vec![
            record(1, 0.5, &at_cosine(0.9)),
            record(2, 0.9, &[1.0, 0.0]),
        ];
        let outcome = deduplicate(records, &DedupPolicy::default()).unwrap();
        assert_eq!(ids(&outcome.kept), vec![2]);
        assert_eq!(outcome.removed, 1);

        let records = vec![
            record(1, 0.9, &[1.0, 0.0]),
            record(2, 0.5, &at_cosine(0.9)),
        ];
        let outcome = deduplicate(records, &DedupPolicy::default()).unwrap();
        assert_eq!(ids(&outcome.kept), vec![1]);
    }

    #[test]
    fn equal_importance_keeps_the_earlier_record() {
        let records = vec![
            record(1, 0.5, &[1.0, 0.0]),
            record(2, 0.5, &[1.0, 0.0]),
            record(3, 0.5, &[1.0, 0.0]),
        ];
        let outcome = deduplicate(records, &DedupPolicy::default()).unwrap();
        assert_eq!(ids(&outcome.kept), vec![1]);
        assert_eq!(outcome.removed, 2);
    }

    #[test]
    fn threshold_is_strict() {
        // Exact binary fractions: |b| == 1 and a·b == 0.75 without rounding.
        let a = [1.0, 0.0, 0.0, 0.0, 0.0];
        let b = [0.75, 0.5, 0.25, 0.25, 0.25];
        let records = vec![record(1, 0.9, &a), record(2, 0.1, &b)];
        let outcome = deduplicate(records, &DedupPolicy::default()).unwrap();
        assert_eq!(ids(&outcome.kept), vec![1, 2]);

        let records = vec![
            record(1, 0.9, &[1.0, 0.0]),
            record(2, 0.1, &at_cosine(0.751)),
        ];
        let outcome = deduplicate(records, &DedupPolicy::default()).unwrap();
        assert_eq!(ids(&outcome.kept), vec![1]);
    }

    #[test]
    fn dissimilar_records_survive_in_order() {
        let records = vec![
            record(1, 0.2, &[1.0, 0.0, 0.0]),
            record(2, 0.9, &[0.0, 1.0, 0.0]),
            record(3, 0.5, &[0.0, 0.0, 1.0]),
        ];
        let outcome = deduplicate(records, &DedupPolicy::default()).unwrap();
        assert_eq!(ids(&outcome.kept), vec![1, 2, 3]);
    }

    #[test]
    fn removed_records_do_not_remove_others() {
        // 2 is removed by 1; 3 is similar only to 2 and must survive.
        let angle = 35_f32.to_radians();
        let records = vec![
            record(1, 0.9, &[1.0, 0.0]),
            record(2, 0.5, &[angle.cos(), angle.sin()]),
            record(3, 0.1, &[(2.0 * angle).cos(), (2.0 * angle).sin()]),
        ];
        let outcome = deduplicate(records, &DedupPolicy::default()).unwrap();
        assert_eq!(ids(&outcome.kept), vec![1, 3]);
    }

    #[test]
    fn is_idempotent() {
        let records: Vec<_> = (0..12_i64)
            .map(|id| {
                #[allow(clippy::cast_precision_loss)]
                let angle = id as f32 * 0.3;
                let importance = [0.3, 0.8, 0.5][usize::try_from(id).unwrap() % 3];
                record(id, importance, &[angle.cos(), angle.sin()])
            })
            .collect();
        let policy = DedupPolicy::default();

        let once = deduplicate(records, &policy).unwrap();
        let twice = deduplicate(once.kept.clone(), &policy).unwrap();
        assert_eq!(twice.kept, once.kept);
        assert_eq!(twice.removed, 0);
    }

    #[test]
    fn custom_threshold_and_cap_apply() {
        let policy = DedupPolicy::new(
            0.95,
            NonZeroUsize::new(2).unwrap(),
            0,
            Duration::hours(1),
        )
        .unwrap();
        let records = vec![
            record(1, 0.9, &[1.0, 0.0]),
            record(2, 0.5, &at_cosine(0.9)),
        ];
        let outcome = deduplicate(records, &policy).unwrap();
        assert_eq!(outcome.kept.len(), 2);
    }

    #[test]
    fn rejects_invalid_policy_values() {
        let cap = NonZeroUsize::new(10).unwrap();
        assert!(DedupPolicy::new(1.5, cap, 10, Duration::hours(24)).is_err());
        assert!(DedupPolicy::new(f32::NAN, cap, 10, Duration::hours(24)).is_err());
        assert!(DedupPolicy::new(0.75, cap, 10, Duration::hours(-1)).is_err());
    }

    #[test]
    fn trigger_requires_size_and_staleness() {
        let policy = DedupPolicy::default();
        let now = Utc::now();
        let mut collection = MemoryCollection::new();
        for id in 0..10 {
            collection.push(record(id, 0.5, &[1.0, 0.0])).unwrap();
        }
        assert!(!policy.is_due(&collection, now));

        collection.push(record(10, 0.5, &[1.0, 0.0])).unwrap();
        assert!(policy.is_due(&collection, now));

        collection.mark_deduplicated(now - Duration::hours(23));
        assert!(!policy.is_due(&collection, now));

        collection.mark_deduplicated(now - Duration::hours(24));
        assert!(!policy.is_due(&collection, now));

        collection.mark_deduplicated(now - Duration::hours(25));
        assert!(policy.is_due(&collection, now));
    }
}
