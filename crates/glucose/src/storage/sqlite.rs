//! SQLite-based reading storage

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{Connection, params};
use rusqlite_migration::{M, Migrations};

use super::traits::ReadingStore;
use crate::models::{Reading, ReadingSource};

/// Database migrations
///
/// Each migration is applied in order. The user_version pragma tracks which
/// migrations have been applied.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        // Migration 1: Initial schema
        M::up(
            r#"
            -- One row per sample; the timestamp is the identity
            CREATE TABLE readings (
                timestamp_ms INTEGER PRIMARY KEY,
                value REAL NOT NULL,
                source TEXT NOT NULL,
                synced_at TEXT NOT NULL
            );
            "#,
        ),
    ])
}

/// SQLite-based reading storage
pub struct SqliteReadingStore {
    conn: Mutex<Connection>,
}

impl SqliteReadingStore {
    /// Open (or create) the reading cache at `db_path`
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", db_path.as_ref()))?;
        Self::from_connection(conn)
    }

    /// Open a private in-memory database
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::from_connection(conn)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        // WAL lets the chart read the baseline while a refresh is writing.
        // NORMAL sync is safe under WAL and this is a cache, not a ledger.
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            "#,
        )?;

        migrations()
            .to_latest(&mut conn)
            .context("Failed to run database migrations")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn reading_from_row(timestamp_ms: i64, value: f64) -> Option<Reading> {
    let timestamp = Utc.timestamp_millis_opt(timestamp_ms).single()?;
    Some(Reading::new(timestamp, value, ReadingSource::Cached))
}

impl ReadingStore for SqliteReadingStore {
    fn fetch_readings(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Reading>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT timestamp_ms, value FROM readings
             WHERE timestamp_ms >= ? AND timestamp_ms <= ?
             ORDER BY timestamp_ms ASC",
        )?;

        let rows = stmt
            .query_map(
                params![start.timestamp_millis(), end.timestamp_millis()],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?)),
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows
            .into_iter()
            .filter_map(|(ts, value)| reading_from_row(ts, value))
            .collect())
    }

    fn upsert(&self, readings: &[Reading]) -> Result<usize> {
        if readings.is_empty() {
            return Ok(0);
        }

        let synced_at = Utc::now().to_rfc3339();
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO readings (timestamp_ms, value, source, synced_at)
                 VALUES (?, ?, ?, ?)
                 ON CONFLICT(timestamp_ms) DO UPDATE SET
                    value = excluded.value,
                    source = excluded.source,
                    synced_at = excluded.synced_at",
            )?;

            for reading in readings {
                stmt.execute(params![
                    reading.timestamp_ms(),
                    reading.value,
                    reading.source.as_str(),
                    synced_at,
                ])?;
            }
        }

        tx.commit().context("Failed to commit reading upsert")?;
        Ok(readings.len())
    }

    fn count(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM readings", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn latest_timestamp(&self) -> Result<Option<DateTime<Utc>>> {
        let conn = self.conn.lock().unwrap();
        let latest: Option<i64> =
            conn.query_row("SELECT MAX(timestamp_ms) FROM readings", [], |row| row.get(0))?;
        Ok(latest.and_then(|ms| Utc.timestamp_millis_opt(ms).single()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::tempdir;

    fn create_test_store() -> (SqliteReadingStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        // Use .test.sqlite extension to clearly distinguish from production databases
        let db_path = dir.path().join("readings.test.sqlite");
        let store = SqliteReadingStore::new(&db_path).unwrap();
        (store, dir)
    }

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 9, 0, 0).unwrap()
    }

    fn reading(minutes: i64, value: f64, source: ReadingSource) -> Reading {
        Reading::new(base() + Duration::minutes(minutes), value, source)
    }

    #[test]
    fn test_upsert_and_fetch() {
        let (store, _dir) = create_test_store();

        let written = store
            .upsert(&[
                reading(0, 101.0, ReadingSource::Official),
                reading(5, 104.0, ReadingSource::Official),
                reading(10, 109.0, ReadingSource::Share),
            ])
            .unwrap();
        assert_eq!(written, 3);

        let fetched = store
            .fetch_readings(base(), base() + Duration::minutes(10))
            .unwrap();
        assert_eq!(fetched.len(), 3);
        assert_eq!(fetched[0].timestamp, base());
        assert_eq!(fetched[2].value, 109.0);
        assert!(fetched.iter().all(|r| r.source == ReadingSource::Cached));
    }

    #[test]
    fn test_upsert_overwrites_same_timestamp() {
        let (store, _dir) = create_test_store();

        store
            .upsert(&[reading(0, 101.0, ReadingSource::Official)])
            .unwrap();
        store.upsert(&[reading(0, 99.0, ReadingSource::Share)]).unwrap();

        assert_eq!(store.count().unwrap(), 1);
        let fetched = store.fetch_readings(base(), base()).unwrap();
        assert_eq!(fetched[0].value, 99.0);
    }

    #[test]
    fn test_fetch_excludes_out_of_range() {
        let (store, _dir) = create_test_store();
        store
            .upsert(&[
                reading(-30, 90.0, ReadingSource::Share),
                reading(0, 100.0, ReadingSource::Share),
                reading(30, 110.0, ReadingSource::Share),
            ])
            .unwrap();

        let fetched = store
            .fetch_readings(base() - Duration::minutes(5), base() + Duration::minutes(5))
            .unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].value, 100.0);
    }

    #[test]
    fn test_latest_timestamp_and_reopen() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("readings.test.sqlite");

        {
            let store = SqliteReadingStore::new(&db_path).unwrap();
            assert!(store.latest_timestamp().unwrap().is_none());
            store
                .upsert(&[
                    reading(0, 100.0, ReadingSource::Share),
                    reading(20, 140.0, ReadingSource::Share),
                ])
                .unwrap();
        }

        // Data survives a cold start
        let store = SqliteReadingStore::new(&db_path).unwrap();
        assert_eq!(store.count().unwrap(), 2);
        assert_eq!(
            store.latest_timestamp().unwrap(),
            Some(base() + Duration::minutes(20))
        );
    }

    #[test]
    fn test_empty_upsert_is_noop() {
        let store = SqliteReadingStore::in_memory().unwrap();
        assert_eq!(store.upsert(&[]).unwrap(), 0);
        assert_eq!(store.count().unwrap(), 0);
    }
}
