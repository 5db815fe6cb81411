//! Identifier generator

use crate::counter::{CounterStore, PartitionKey, DEFAULT_SCOPE};
use crate::number::{DocumentNumber, NumberFormat, ProductAttributes, ProductClass};
use crate::{NumberingError, Result};
use chrono::{Datelike, NaiveDate};
use log::{debug, error};

/// Issues document numbers for the rendering engine
///
/// Object-safe so callers can pass `&dyn NumberIssuer` without naming the store type.
pub trait NumberIssuer {
    /// Issue one number for a unit produced on `date`
    fn issue(
        &self,
        date: NaiveDate,
        class: &ProductClass,
        attrs: &ProductAttributes,
    ) -> Result<DocumentNumber>;
}

/// Document number generator backed by a partitioned counter store
pub struct IdentifierGenerator<S: CounterStore> {
    store: S,
    format: NumberFormat,
    scope: String,
}

impl<S: CounterStore> IdentifierGenerator<S> {
    /// Create a generator with the default `AGB` prefix and `ved_passport` scope
    pub fn new(store: S) -> Self {
        Self {
            store,
            format: NumberFormat::default(),
            scope: DEFAULT_SCOPE.to_string(),
        }
    }

    /// Override the number prefix
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.format.prefix = prefix.into();
        self
    }

    /// Override the matrix code used for products without one
    pub fn with_default_matrix(mut self, matrix: impl Into<String>) -> Self {
        self.format.default_matrix = matrix.into();
        self
    }

    /// Override the counter scope (the partition key prefix)
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Partition holding all numbers issued in `year`
    pub fn partition_for(&self, year: i32) -> PartitionKey {
        PartitionKey::new(self.scope.clone(), year)
    }

    /// Increment the partition counter and format the new value
    ///
    /// # Errors
    /// `CounterUnavailable` when the store cannot complete the increment. No number is
    /// produced in that case and no value is skipped.
    pub fn next(
        &self,
        partition: &PartitionKey,
        class: &ProductClass,
        attrs: &ProductAttributes,
    ) -> Result<DocumentNumber> {
        let serial = self.store.increment(partition).map_err(|err| {
            error!(
                "event=number_issue module=numbering status=error partition={} error={}",
                partition, err
            );
            match err {
                NumberingError::CounterUnavailable { .. } => err,
                other => NumberingError::unavailable(partition, other),
            }
        })?;

        let value = self.format.format(class, attrs, serial, partition.year);
        debug!(
            "event=number_issue module=numbering status=ok partition={} serial={} class={}",
            partition, serial, class
        );

        Ok(DocumentNumber::new(value, serial, partition.clone()))
    }

    /// Issue a number in the partition of `date`'s calendar year
    pub fn next_at(
        &self,
        date: NaiveDate,
        class: &ProductClass,
        attrs: &ProductAttributes,
    ) -> Result<DocumentNumber> {
        let partition = self.partition_for(date.year());
        self.next(&partition, class, attrs)
    }

    /// Issue `count` numbers for one request
    pub fn issue_batch(
        &self,
        date: NaiveDate,
        class: &ProductClass,
        attrs: &ProductAttributes,
        count: usize,
    ) -> Result<Vec<DocumentNumber>> {
        if count == 0 {
            return Err(NumberingError::InvalidBatch(count));
        }

        (0..count)
            .map(|_| self.next_at(date, class, attrs))
            .collect()
    }
}

impl<S: CounterStore> NumberIssuer for IdentifierGenerator<S> {
    fn issue(
        &self,
        date: NaiveDate,
        class: &ProductClass,
        attrs: &ProductAttributes,
    ) -> Result<DocumentNumber> {
        self.next_at(date, class, attrs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::MemoryCounterStore;
    use pretty_assertions::assert_eq;

    struct BrokenStore;

    impl CounterStore for BrokenStore {
        fn increment(&self, _key: &PartitionKey) -> Result<u64> {
            Err(NumberingError::Sqlite(rusqlite::Error::InvalidQuery))
        }

        fn current(&self, _key: &PartitionKey) -> Result<Option<u64>> {
            Ok(None)
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_next_formats_serial() {
        let generator = IdentifierGenerator::new(MemoryCounterStore::new());
        let attrs = ProductAttributes::new().matrix("NQ").drilling_depth("05-07");

        let first = generator
            .next_at(date(2025, 6, 1), &ProductClass::Crown, &attrs)
            .unwrap();
        let second = generator
            .next_at(date(2025, 6, 1), &ProductClass::Crown, &attrs)
            .unwrap();

        assert_eq!(first.as_str(), "AGB 05-07 NQ 000001 25");
        assert_eq!(second.as_str(), "AGB 05-07 NQ 000002 25");
        assert_eq!(second.serial(), 2);
        assert_eq!(second.partition().to_string(), "ved_passport_2025");
    }

    #[test]
    fn test_custom_prefix_and_scope() {
        let generator = IdentifierGenerator::new(MemoryCounterStore::new())
            .with_prefix("ALB")
            .with_scope("labels")
            .with_default_matrix("HQ");

        let number = generator
            .next_at(date(2026, 1, 2), &ProductClass::Shoe, &ProductAttributes::new())
            .unwrap();

        assert_eq!(number.as_str(), "ALB HQ 000001 26");
        assert_eq!(number.partition().counter_name(), "labels_2026");
    }

    #[test]
    fn test_store_failure_is_counter_unavailable() {
        let generator = IdentifierGenerator::new(BrokenStore);
        let err = generator
            .next_at(date(2025, 1, 1), &ProductClass::Crown, &ProductAttributes::new())
            .unwrap_err();

        assert!(matches!(err, NumberingError::CounterUnavailable { .. }));
    }

    #[test]
    fn test_issue_batch() {
        let generator = IdentifierGenerator::new(MemoryCounterStore::new());
        let numbers = generator
            .issue_batch(date(2025, 2, 2), &ProductClass::Reamer, &ProductAttributes::new(), 3)
            .unwrap();

        let serials: Vec<u64> = numbers.iter().map(|n| n.serial()).collect();
        assert_eq!(serials, vec![1, 2, 3]);
    }

    #[test]
    fn test_issue_batch_rejects_zero() {
        let generator = IdentifierGenerator::new(MemoryCounterStore::new());
        let result =
            generator.issue_batch(date(2025, 2, 2), &ProductClass::Crown, &ProductAttributes::new(), 0);
        assert!(matches!(result, Err(NumberingError::InvalidBatch(0))));
    }
}
