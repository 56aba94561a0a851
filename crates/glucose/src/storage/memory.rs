//! In-memory storage implementation
//!
//! Used by tests and previews where a database file is not wanted.

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeMap;
use std::sync::RwLock;

use super::ReadingStore;
use crate::models::Reading;

/// In-memory implementation of ReadingStore
///
/// A BTreeMap keyed by millisecond timestamp gives ordered range scans and
/// upsert-by-timestamp for free.
pub struct InMemoryReadingStore {
    readings: RwLock<BTreeMap<i64, Reading>>,
}

impl InMemoryReadingStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self {
            readings: RwLock::new(BTreeMap::new()),
        }
    }

    /// Create a store pre-seeded with readings
    pub fn with_readings(readings: &[Reading]) -> Self {
        let store = Self::new();
        {
            let mut map = store.readings.write().unwrap();
            for reading in readings {
                map.insert(reading.timestamp_ms(), *reading);
            }
        }
        store
    }
}

impl Default for InMemoryReadingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadingStore for InMemoryReadingStore {
    fn fetch_readings(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Reading>> {
        if start > end {
            return Ok(Vec::new());
        }

        let readings = self.readings.read().unwrap();
        Ok(readings
            .range(start.timestamp_millis()..=end.timestamp_millis())
            .map(|(_, r)| r.as_cached())
            .collect())
    }

    fn upsert(&self, readings: &[Reading]) -> Result<usize> {
        let mut map = self.readings.write().unwrap();
        for reading in readings {
            map.insert(reading.timestamp_ms(), *reading);
        }
        Ok(readings.len())
    }

    fn count(&self) -> Result<usize> {
        Ok(self.readings.read().unwrap().len())
    }

    fn latest_timestamp(&self) -> Result<Option<DateTime<Utc>>> {
        let readings = self.readings.read().unwrap();
        Ok(readings
            .keys()
            .next_back()
            .and_then(|ms| Utc.timestamp_millis_opt(*ms).single()))
    }
}
