//! Numbering - passport document number issuance
//!
//! This crate provides:
//! - Yearly partitioned counters behind the [`CounterStore`] trait
//! - A durable SQLite counter store and an in-memory test double
//! - Document number formatting per product class
//! - Production date formatting used on labels and passports
//!
//! # Example
//!
//! ```ignore
//! use numbering::{IdentifierGenerator, ProductAttributes, ProductClass, SqliteCounterStore};
//!
//! let store = SqliteCounterStore::open("counters.db")?;
//! let generator = IdentifierGenerator::new(store);
//! let attrs = ProductAttributes::new().matrix("NQ").drilling_depth("05-07");
//! let number = generator.next_at(today, ProductClass::Crown, &attrs)?;
//! assert_eq!(number.as_str(), "AGB 05-07 NQ 000001 25");
//! ```

mod counter;
mod date;
mod generator;
mod number;
mod sqlite;

pub use counter::{CounterStore, MemoryCounterStore, PartitionKey, DEFAULT_SCOPE};
pub use date::{format_manufacture_date, format_production_date, two_digit_year, DateParts};
pub use generator::{IdentifierGenerator, NumberIssuer};
pub use number::{
    manual_series, DocumentNumber, NumberFormat, ProductAttributes, ProductClass, DEFAULT_MATRIX,
    DEFAULT_PREFIX,
};
pub use sqlite::SqliteCounterStore;

use thiserror::Error;

/// Errors that can occur while issuing document numbers
#[derive(Debug, Error)]
pub enum NumberingError {
    #[error("Counter unavailable for partition '{partition}': {reason}")]
    CounterUnavailable { partition: String, reason: String },

    #[error("Failed to open counter store: {0}")]
    StoreOpen(String),

    #[error("Invalid batch size: {0}")]
    InvalidBatch(usize),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl NumberingError {
    pub(crate) fn unavailable(partition: &PartitionKey, reason: impl ToString) -> Self {
        NumberingError::CounterUnavailable {
            partition: partition.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for numbering operations
pub type Result<T> = std::result::Result<T, NumberingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_message_names_partition() {
        let key = PartitionKey::new("ved_passport", 2025);
        let err = NumberingError::unavailable(&key, "disk I/O error");
        assert_eq!(
            err.to_string(),
            "Counter unavailable for partition 'ved_passport_2025': disk I/O error"
        );
    }
}
