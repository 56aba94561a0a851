//! Feed response normalization
//!
//! Converts provider payloads to `Reading`s. Malformed individual entries
//! (missing or non-positive value, unparseable time) are dropped here and
//! never reach the merger.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use log::debug;

use super::api::{OfficialRecord, ShareEntry};
use super::health::HealthSample;
use crate::models::{Reading, ReadingSource};

/// Normalize official records
pub fn normalize_official(records: Vec<OfficialRecord>) -> Vec<Reading> {
    let total = records.len();
    let readings = records
        .into_iter()
        .filter_map(|r| {
            let timestamp = parse_feed_time(r.system_time.as_deref()?)?;
            Some(Reading::new(timestamp, r.value?, ReadingSource::Official))
        })
        .collect();
    finish("official", total, readings)
}

/// Normalize share entries
pub fn normalize_share(entries: Vec<ShareEntry>) -> Vec<Reading> {
    let total = entries.len();
    let readings = entries
        .into_iter()
        .filter_map(|e| {
            let timestamp = parse_feed_time(e.display_time.as_deref()?)?;
            Some(Reading::new(timestamp, e.value?, ReadingSource::Share))
        })
        .collect();
    finish("share", total, readings)
}

/// Normalize health store samples
pub fn normalize_health(samples: Vec<HealthSample>) -> Vec<Reading> {
    let total = samples.len();
    let readings = samples
        .into_iter()
        .map(|s| Reading::new(s.timestamp, s.mg_dl, ReadingSource::HealthStore))
        .collect();
    finish("health store", total, readings)
}

/// Drop implausible values, then sort ascending and drop exact-timestamp repeats
fn finish(feed: &str, total: usize, readings: Vec<Reading>) -> Vec<Reading> {
    let mut readings: Vec<Reading> = readings
        .into_iter()
        .filter(Reading::has_plausible_value)
        .collect();
    readings.sort_by_key(|r| r.timestamp);
    readings.dedup_by_key(|r| r.timestamp);

    let dropped = total - readings.len();
    if dropped > 0 {
        debug!("Dropped {} malformed {} readings of {}", dropped, feed, total);
    }
    readings
}

/// Parse a provider timestamp
///
/// Accepts:
/// - `Date(1700000000000)`, `/Date(1700000000000-0500)/` (epoch millis, UTC)
/// - RFC 3339 (`2025-01-01T10:00:00Z`, `2025-01-01T10:00:00+01:00`)
/// - Naive ISO 8601 without offset, treated as UTC (`2025-01-01T10:00:00`)
pub fn parse_feed_time(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();

    if let Some(rest) = s.trim_matches('/').strip_prefix("Date(") {
        let digits: String = rest
            .chars()
            .enumerate()
            .take_while(|(i, c)| c.is_ascii_digit() || (*i == 0 && *c == '-'))
            .map(|(_, c)| c)
            .collect();
        let millis: i64 = digits.parse().ok()?;
        return Utc.timestamp_millis_opt(millis).single();
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_millis() {
        let expected = Utc.timestamp_millis_opt(1_700_000_000_000).single().unwrap();
        assert_eq!(parse_feed_time("Date(1700000000000)"), Some(expected));
        assert_eq!(parse_feed_time("/Date(1700000000000-0500)/"), Some(expected));
        assert_eq!(parse_feed_time("Date(notanumber)"), None);
    }

    #[test]
    fn test_parse_iso_variants() {
        let expected = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();
        assert_eq!(parse_feed_time("2025-01-01T10:00:00Z"), Some(expected));
        assert_eq!(parse_feed_time("2025-01-01T11:00:00+01:00"), Some(expected));
        assert_eq!(parse_feed_time("2025-01-01T10:00:00"), Some(expected));
        assert_eq!(parse_feed_time("2025-01-01 10:00:00"), Some(expected));
        assert_eq!(parse_feed_time("yesterday"), None);
    }

    #[test]
    fn test_normalize_official_drops_malformed() {
        let records = vec![
            OfficialRecord {
                system_time: Some("2025-01-01T10:05:00".into()),
                value: Some(130.0),
            },
            OfficialRecord {
                system_time: Some("2025-01-01T10:00:00".into()),
                value: Some(120.0),
            },
            OfficialRecord {
                system_time: Some("garbage".into()),
                value: Some(110.0),
            },
            OfficialRecord {
                system_time: Some("2025-01-01T10:10:00".into()),
                value: None,
            },
            OfficialRecord {
                system_time: Some("2025-01-01T10:15:00".into()),
                value: Some(0.0),
            },
        ];

        let readings = normalize_official(records);
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].value, 120.0);
        assert_eq!(readings[1].value, 130.0);
        assert!(readings.iter().all(|r| r.source == ReadingSource::Official));
    }

    #[test]
    fn test_normalize_share_sorts_ascending() {
        // The service returns newest first
        let entries = vec![
            ShareEntry {
                value: Some(140.0),
                display_time: Some("Date(1700000600000)".into()),
            },
            ShareEntry {
                value: Some(135.0),
                display_time: Some("Date(1700000300000)".into()),
            },
            ShareEntry {
                value: Some(-1.0),
                display_time: Some("Date(1700000000000)".into()),
            },
        ];

        let readings = normalize_share(entries);
        assert_eq!(readings.len(), 2);
        assert!(readings[0].timestamp < readings[1].timestamp);
        assert_eq!(readings[0].value, 135.0);
    }

    #[test]
    fn test_normalize_health_drops_exact_repeats() {
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();
        let samples = vec![
            HealthSample { timestamp: at, mg_dl: 101.0 },
            HealthSample { timestamp: at, mg_dl: 101.0 },
        ];
        let readings = normalize_health(samples);
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].source, ReadingSource::HealthStore);
    }
}
