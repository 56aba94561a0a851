//! Glucose reading and time window models

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a reading came from
///
/// Informational only: it never affects ordering or dedup precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingSource {
    Official,
    Share,
    HealthStore,
    Cached,
}

impl ReadingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingSource::Official => "official",
            ReadingSource::Share => "share",
            ReadingSource::HealthStore => "health_store",
            ReadingSource::Cached => "cached",
        }
    }

    /// Parse the stored form produced by [`ReadingSource::as_str`]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "official" => Some(ReadingSource::Official),
            "share" => Some(ReadingSource::Share),
            "health_store" => Some(ReadingSource::HealthStore),
            "cached" => Some(ReadingSource::Cached),
            _ => None,
        }
    }
}

impl fmt::Display for ReadingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single glucose measurement in mg/dL
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub source: ReadingSource,
}

impl Reading {
    pub fn new(timestamp: DateTime<Utc>, value: f64, source: ReadingSource) -> Self {
        Self {
            timestamp,
            value,
            source,
        }
    }

    /// Millisecond key used for storage and dedup lookups
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }

    /// Same reading, relabeled as coming from the local cache
    pub fn as_cached(self) -> Self {
        Self {
            source: ReadingSource::Cached,
            ..self
        }
    }

    /// Whether the value is usable (finite and positive)
    pub fn has_plausible_value(&self) -> bool {
        self.value.is_finite() && self.value > 0.0
    }
}

/// Closed time range `[start, end]` requested for one refresh cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    /// Create a window, swapping the bounds if they are reversed
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// Rolling window of `span` ending at `now`
    ///
    /// A span reaching past the earliest representable time starts there.
    pub fn rolling(now: DateTime<Utc>, span: Duration) -> Self {
        let start = now
            .checked_sub_signed(span)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self::new(start, now)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at <= self.end
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} .. {}]", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_window_orders_bounds() {
        let a = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();

        let window = TimeWindow::new(b, a);
        assert_eq!(window.start(), a);
        assert_eq!(window.end(), b);
    }

    #[test]
    fn test_rolling_window() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let window = TimeWindow::rolling(now, Duration::hours(6));

        assert_eq!(window.end(), now);
        assert_eq!(window.start(), now - Duration::hours(6));
        assert!(window.contains(now - Duration::hours(6)));
        assert!(!window.contains(now + Duration::seconds(1)));
    }

    #[test]
    fn test_rolling_window_saturates_at_min_time() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let window = TimeWindow::rolling(now, Duration::MAX);

        assert_eq!(window.start(), DateTime::<Utc>::MIN_UTC);
        assert_eq!(window.end(), now);
    }

    #[test]
    fn test_source_round_trip() {
        for source in [
            ReadingSource::Official,
            ReadingSource::Share,
            ReadingSource::HealthStore,
            ReadingSource::Cached,
        ] {
            assert_eq!(ReadingSource::parse(source.as_str()), Some(source));
        }
        assert_eq!(ReadingSource::parse("bogus"), None);
    }

    #[test]
    fn test_plausible_value() {
        let at = Utc::now();
        assert!(Reading::new(at, 110.0, ReadingSource::Share).has_plausible_value());
        assert!(!Reading::new(at, 0.0, ReadingSource::Share).has_plausible_value());
        assert!(!Reading::new(at, -4.0, ReadingSource::Share).has_plausible_value());
        assert!(!Reading::new(at, f64::NAN, ReadingSource::Share).has_plausible_value());
    }
}
