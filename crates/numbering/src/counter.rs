//! Partitioned counters

use crate::{NumberingError, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

/// Counter scope used for passport numbers
pub const DEFAULT_SCOPE: &str = "ved_passport";

/// Key of one counter sequence: a scope plus a calendar year
///
/// Sequences restart at 1 in every partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey {
    pub scope: String,
    pub year: i32,
}

impl PartitionKey {
    pub fn new(scope: impl Into<String>, year: i32) -> Self {
        Self {
            scope: scope.into(),
            year,
        }
    }

    /// Counter name as stored in the backing table (e.g. `ved_passport_2025`)
    pub fn counter_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.scope, self.year)
    }
}

/// Durable storage for partitioned counters
///
/// Implementations must make `increment` a single atomic read-increment-write:
/// two callers must never receive the same value for one partition.
pub trait CounterStore: Send + Sync {
    /// Increment the counter for `key`, creating it at zero first, and return the new value
    fn increment(&self, key: &PartitionKey) -> Result<u64>;

    /// Current value of the counter, `None` if the partition was never used
    fn current(&self, key: &PartitionKey) -> Result<Option<u64>>;
}

impl<S: CounterStore + ?Sized> CounterStore for &S {
    fn increment(&self, key: &PartitionKey) -> Result<u64> {
        (**self).increment(key)
    }

    fn current(&self, key: &PartitionKey) -> Result<Option<u64>> {
        (**self).current(key)
    }
}

impl<S: CounterStore + ?Sized> CounterStore for std::sync::Arc<S> {
    fn increment(&self, key: &PartitionKey) -> Result<u64> {
        (**self).increment(key)
    }

    fn current(&self, key: &PartitionKey) -> Result<Option<u64>> {
        (**self).current(key)
    }
}

/// In-memory counter store for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    counters: Mutex<HashMap<PartitionKey, u64>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a partition with a starting value (the next increment returns `value + 1`)
    pub fn with_value(self, key: PartitionKey, value: u64) -> Self {
        if let Ok(mut counters) = self.counters.lock() {
            counters.insert(key, value);
        }
        self
    }
}

impl CounterStore for MemoryCounterStore {
    fn increment(&self, key: &PartitionKey) -> Result<u64> {
        let mut counters = self
            .counters
            .lock()
            .map_err(|_| NumberingError::unavailable(key, "counter lock poisoned"))?;
        let value = counters.entry(key.clone()).or_insert(0);
        *value += 1;
        Ok(*value)
    }

    fn current(&self, key: &PartitionKey) -> Result<Option<u64>> {
        let counters = self
            .counters
            .lock()
            .map_err(|_| NumberingError::unavailable(key, "counter lock poisoned"))?;
        Ok(counters.get(key).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_key_display() {
        let key = PartitionKey::new(DEFAULT_SCOPE, 2025);
        assert_eq!(key.to_string(), "ved_passport_2025");
        assert_eq!(key.counter_name(), "ved_passport_2025");
    }

    #[test]
    fn test_memory_store_starts_at_one() {
        let store = MemoryCounterStore::new();
        let key = PartitionKey::new("test", 2025);

        assert_eq!(store.current(&key).unwrap(), None);
        assert_eq!(store.increment(&key).unwrap(), 1);
        assert_eq!(store.increment(&key).unwrap(), 2);
        assert_eq!(store.current(&key).unwrap(), Some(2));
    }

    #[test]
    fn test_memory_store_partitions_are_independent() {
        let store = MemoryCounterStore::new();
        let a = PartitionKey::new("test", 2024);
        let b = PartitionKey::new("test", 2025);

        store.increment(&a).unwrap();
        store.increment(&a).unwrap();

        assert_eq!(store.increment(&b).unwrap(), 1);
        assert_eq!(store.current(&a).unwrap(), Some(2));
    }

    #[test]
    fn test_memory_store_seeded() {
        let key = PartitionKey::new("test", 2025);
        let store = MemoryCounterStore::new().with_value(key.clone(), 124);
        assert_eq!(store.increment(&key).unwrap(), 125);
    }
}
