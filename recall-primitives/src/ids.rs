//! Memory identifier types.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::Error;

/// Identifier of a stored memory, derived from its creation time in
/// milliseconds since the Unix epoch.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryId(i64);

impl MemoryId {
    /// Wraps a raw identifier value.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw identifier value.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl Display for MemoryId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl From<i64> for MemoryId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<MemoryId> for i64 {
    fn from(value: MemoryId) -> Self {
        value.0
    }
}

impl FromStr for MemoryId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().parse::<i64>()?;
        Ok(Self(value))
    }
}

/// Hands out time-derived identifiers that never repeat within one generator.
///
/// Uniqueness is best-effort across generators and processes: two processes
/// creating a memory in the same millisecond can still collide.
#[derive(Debug, Default)]
pub struct MemoryIdGenerator {
    last: AtomicI64,
}

impl MemoryIdGenerator {
    /// Creates a generator with no history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last: AtomicI64::new(0),
        }
    }

    /// Returns an identifier for the current wall-clock time.
    pub fn next_id(&self) -> MemoryId {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| {
                i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
            });
        self.next_at(millis)
    }

    /// Returns an identifier for the supplied timestamp, bumping past the last
    /// issued value when the clock has not advanced.
    pub fn next_at(&self, millis: i64) -> MemoryId {
        let mut current = self.last.load(Ordering::Acquire);
        loop {
            let candidate = millis.max(current.saturating_add(1));
            match self.last.compare_exchange_weak(
                current,
                candidate,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return MemoryId(candidate),
                Err(observed) => current = observed,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_memory_id() {
        let id = MemoryId::new(1_728_000_000_123);
        let parsed = id.to_string().parse::<MemoryId>().expect("parse");
        assert_eq!(id, parsed);
    }

    #[test]
    fn rejects_non_numeric_ids() {
        let err = "abc".parse::<MemoryId>().expect_err("should fail");
        assert!(matches!(err, Error::InvalidMemoryId { .. }));
    }

    #[test]
    fn generator_is_monotonic_when_clock_stalls() {
        let generator = MemoryIdGenerator::new();
        let first = generator.next_at(1_000);
        let second = generator.next_at(1_000);
        let third = generator.next_at(999);
        assert_eq!(first.get(), 1_000);
        assert_eq!(second.get(), 1_001);
        assert_eq!(third.get(), 1_002);

        let jump = generator.next_at(5_000);
        assert_eq!(jump.get(), 5_000);
    }

    #[test]
    fn serializes_as_plain_integer() {
        let json = serde_json::to_string(&MemoryId::new(42)).unwrap();
        assert_eq!(json, "42");
    }
}
