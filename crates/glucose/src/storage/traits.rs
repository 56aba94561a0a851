//! Storage trait definitions

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::models::Reading;

/// Durable cache of previously synchronized readings
///
/// Implementations must work with zero connectivity and never touch the
/// network. Readings are keyed by timestamp: writing the same timestamp twice
/// overwrites, never duplicates. Nothing is ever deleted by the engine.
pub trait ReadingStore: Send + Sync {
    /// Readings with `start <= timestamp <= end`, ascending, labeled `Cached`
    fn fetch_readings(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Reading>>;

    /// Insert or overwrite readings by timestamp. Returns how many were written.
    fn upsert(&self, readings: &[Reading]) -> Result<usize>;

    /// Total number of stored readings
    fn count(&self) -> Result<usize>;

    /// Timestamp of the newest stored reading
    fn latest_timestamp(&self) -> Result<Option<DateTime<Utc>>>;
}
