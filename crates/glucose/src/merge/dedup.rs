//! Time-proximity deduplication
//!
//! Two readings closer together than the tolerance are the same physical
//! sample. Whatever was accepted first wins: the baseline beats fresh data,
//! and among fresh data the earlier-listed reading wins.

use chrono::Duration;
use std::collections::BTreeMap;
use std::ops::Bound::Excluded;

use crate::models::Reading;

/// Result of overlaying fresh readings onto a baseline
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeResult {
    /// Ascending, no two readings within the tolerance
    pub readings: Vec<Reading>,
    /// Fresh readings that survived dedup (the ones worth persisting)
    pub added: Vec<Reading>,
    /// Fresh readings dropped as duplicates
    pub discarded: usize,
}

/// Ordered set of accepted readings keyed by millisecond timestamp
struct Accepted {
    by_ms: BTreeMap<i64, Reading>,
    tolerance_ms: i64,
}

impl Accepted {
    fn new(tolerance: Duration) -> Self {
        Self {
            by_ms: BTreeMap::new(),
            tolerance_ms: tolerance.num_milliseconds().max(0),
        }
    }

    fn has_neighbor(&self, ts: i64) -> bool {
        if self.tolerance_ms == 0 {
            return self.by_ms.contains_key(&ts);
        }
        self.by_ms
            .range((Excluded(ts - self.tolerance_ms), Excluded(ts + self.tolerance_ms)))
            .next()
            .is_some()
    }

    /// Accept `reading` unless an accepted reading is within the tolerance
    fn offer(&mut self, reading: Reading) -> bool {
        let ts = reading.timestamp_ms();
        if self.has_neighbor(ts) {
            return false;
        }
        self.by_ms.insert(ts, reading);
        true
    }

    fn into_sorted(self) -> Vec<Reading> {
        self.by_ms.into_values().collect()
    }
}

/// Stable ascending copy, so ties keep their input order
fn sorted(readings: &[Reading]) -> Vec<Reading> {
    let mut sorted = readings.to_vec();
    sorted.sort_by_key(|r| r.timestamp);
    sorted
}

/// Overlay `fresh` onto `baseline`
///
/// A fresh reading is discarded when an already accepted reading lies strictly
/// within `tolerance` of it. The baseline is collapsed by the same rule first,
/// so the output never holds two readings closer than the tolerance.
pub fn merge_into_baseline(
    baseline: &[Reading],
    fresh: &[Reading],
    tolerance: Duration,
) -> MergeResult {
    let mut accepted = Accepted::new(tolerance);

    for reading in sorted(baseline) {
        accepted.offer(reading);
    }

    let mut added = Vec::new();
    let mut discarded = 0;
    for reading in sorted(fresh) {
        if accepted.offer(reading) {
            added.push(reading);
        } else {
            discarded += 1;
        }
    }

    MergeResult {
        readings: accepted.into_sorted(),
        added,
        discarded,
    }
}

/// Collapse readings closer than `tolerance`, keeping the earliest of each cluster
pub fn dedupe(readings: &[Reading], tolerance: Duration) -> Vec<Reading> {
    merge_into_baseline(readings, &[], tolerance).readings
}
