//! Fakes shared by unit tests

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::feeds::{FeedError, GlucoseFeed};
use crate::models::{Reading, ReadingSource};
use crate::sync::Clock;

/// Fixed reference instant for deterministic tests
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 8, 20, 12, 0, 0).unwrap()
}

/// Readings every `step_mins` from `start` up to and including `end`
pub fn series(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    step_mins: i64,
    source: ReadingSource,
) -> Vec<Reading> {
    let mut readings = Vec::new();
    let mut at = start;
    let mut value = 100.0;
    while at <= end {
        readings.push(Reading::new(at, value, source));
        at += Duration::minutes(step_mins);
        value += 1.0;
    }
    readings
}

/// Scripted feed that serves fixed readings and records its calls
pub struct FakeFeed {
    source: ReadingSource,
    delay: Duration,
    readings: Vec<Reading>,
    failure: Mutex<Option<FeedError>>,
    available: AtomicBool,
    stall: Option<std::time::Duration>,
    calls: AtomicUsize,
    requests: Mutex<Vec<(DateTime<Utc>, DateTime<Utc>)>>,
}

impl FakeFeed {
    pub fn new(source: ReadingSource, readings: Vec<Reading>) -> Self {
        Self {
            source,
            delay: Duration::zero(),
            readings,
            failure: Mutex::new(None),
            available: AtomicBool::new(true),
            stall: None,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Block the calling thread this long before answering
    pub fn with_stall(mut self, stall: std::time::Duration) -> Self {
        self.stall = Some(stall);
        self
    }

    pub fn failing(self, error: FeedError) -> Self {
        *self.failure.lock().unwrap() = Some(error);
        self
    }

    pub fn unavailable(self) -> Self {
        self.available.store(false, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
        self.requests.lock().unwrap().clone()
    }
}

impl GlucoseFeed for FakeFeed {
    fn source(&self) -> ReadingSource {
        self.source
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn data_delay(&self) -> Duration {
        self.delay
    }

    fn fetch_readings(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Reading>, FeedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push((start, end));

        if let Some(stall) = self.stall {
            std::thread::sleep(stall);
        }
        if let Some(error) = self.failure.lock().unwrap().clone() {
            return Err(error);
        }

        Ok(self
            .readings
            .iter()
            .filter(|r| r.timestamp >= start && r.timestamp <= end)
            .copied()
            .collect())
    }
}

/// Clock that only moves when told to
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
