//! Durable SQLite counter store
//!
//! # Invariants
//! - Every increment runs inside an `IMMEDIATE` transaction, so concurrent
//!   connections on the same file serialize on the write lock.
//! - Counter rows are created lazily at zero and never decremented.

use crate::counter::{CounterStore, PartitionKey};
use crate::{NumberingError, Result};
use log::{error, info, trace};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS passport_counters (
    counter_name  TEXT PRIMARY KEY NOT NULL,
    current_value INTEGER NOT NULL DEFAULT 0,
    created_at    TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at    TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
";

const INCREMENT_SQL: &str = "
INSERT INTO passport_counters (counter_name, current_value) VALUES (?1, 1)
ON CONFLICT(counter_name) DO UPDATE SET
    current_value = current_value + 1,
    updated_at = CURRENT_TIMESTAMP
RETURNING current_value
";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Counter store persisted in a SQLite database
pub struct SqliteCounterStore {
    conn: Mutex<Connection>,
}

impl SqliteCounterStore {
    /// Open (or create) a counter database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let started_at = Instant::now();
        let conn = Connection::open(path.as_ref())
            .and_then(|conn| bootstrap_connection(&conn).map(|_| conn))
            .map_err(|err| {
                error!(
                    "event=counter_open module=numbering status=error mode=file duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                NumberingError::StoreOpen(err.to_string())
            })?;

        info!(
            "event=counter_open module=numbering status=ok mode=file duration_ms={}",
            started_at.elapsed().as_millis()
        );
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open a private in-memory counter database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .and_then(|conn| bootstrap_connection(&conn).map(|_| conn))
            .map_err(|err| NumberingError::StoreOpen(err.to_string()))?;

        info!("event=counter_open module=numbering status=ok mode=memory");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn bootstrap_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

fn increment_locked(conn: &mut Connection, counter_name: &str) -> rusqlite::Result<i64> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let value: i64 = tx.query_row(INCREMENT_SQL, params![counter_name], |row| row.get(0))?;
    tx.commit()?;
    Ok(value)
}

impl CounterStore for SqliteCounterStore {
    fn increment(&self, key: &PartitionKey) -> Result<u64> {
        let started_at = Instant::now();
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| NumberingError::unavailable(key, "connection lock poisoned"))?;

        let value = increment_locked(&mut conn, &key.counter_name()).map_err(|err| {
            error!(
                "event=counter_increment module=numbering status=error partition={} duration_ms={} error={}",
                key,
                started_at.elapsed().as_millis(),
                err
            );
            NumberingError::unavailable(key, err)
        })?;

        trace!(
            "event=counter_increment module=numbering status=ok partition={} value={} duration_ms={}",
            key,
            value,
            started_at.elapsed().as_millis()
        );

        u64::try_from(value).map_err(|_| NumberingError::unavailable(key, "negative counter value"))
    }

    fn current(&self, key: &PartitionKey) -> Result<Option<u64>> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| NumberingError::unavailable(key, "connection lock poisoned"))?;

        let value: Option<i64> = conn
            .query_row(
                "SELECT current_value FROM passport_counters WHERE counter_name = ?1",
                params![key.counter_name()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| NumberingError::unavailable(key, err))?;

        Ok(value.and_then(|v| u64::try_from(v).ok()))
    }
}
