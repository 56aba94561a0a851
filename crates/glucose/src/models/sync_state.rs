//! Process-local refresh state owned by the orchestrator

use chrono::{DateTime, Utc};

use super::{Reading, SeriesSnapshot};

/// Tracks refresh progress for the lifetime of one orchestrator
///
/// Not persisted: a cold start begins with no load time and generation 0.
#[derive(Debug, Clone, Default)]
pub struct SyncState {
    /// When the most recent refresh was started
    pub last_load_time: Option<DateTime<Utc>>,
    /// Incremented every time a refresh starts
    pub in_flight_generation: u64,
    /// Ordered, deduplicated readings behind the published series
    pub cached_series: Vec<Reading>,
    /// What the UI currently shows
    pub published: SeriesSnapshot,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new refresh cycle and return its generation.
    ///
    /// The load time is recorded before any I/O starts so the debounce gate
    /// stays closed while the fetch is in flight.
    pub fn begin_refresh(&mut self, now: DateTime<Utc>) -> u64 {
        self.in_flight_generation += 1;
        self.last_load_time = Some(now);
        self.in_flight_generation
    }

    /// Whether `generation` is still the most recently started refresh
    pub fn is_current(&self, generation: u64) -> bool {
        self.in_flight_generation == generation
    }

    /// Replace the published series and the readings behind it
    pub fn publish(&mut self, readings: Vec<Reading>, snapshot: SeriesSnapshot) {
        self.cached_series = readings;
        self.published = snapshot;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state() {
        let state = SyncState::new();
        assert!(state.last_load_time.is_none());
        assert_eq!(state.in_flight_generation, 0);
        assert!(state.cached_series.is_empty());
        assert!(state.published.is_empty());
    }

    #[test]
    fn test_begin_refresh_supersedes_previous() {
        let mut state = SyncState::new();
        let now = Utc::now();

        let first = state.begin_refresh(now);
        assert!(state.is_current(first));

        let second = state.begin_refresh(now);
        assert_eq!(second, first + 1);
        assert!(!state.is_current(first));
        assert!(state.is_current(second));
        assert_eq!(state.last_load_time, Some(now));
    }
}
