//! Refresh timing utilities for debounce management
//!
//! Pure functions plus an injectable clock so they can be tested without
//! waiting on wall time.

use chrono::{DateTime, Duration, Utc};

/// Source of "now" for the orchestrator
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Check if enough time has elapsed since the last load to allow a new one.
///
/// # Arguments
/// * `last_load_at` - When the last refresh started (None if never loaded)
/// * `cooldown` - Minimum time that must elapse between refreshes
/// * `now` - Current time
///
/// # Returns
/// `true` if enough time has passed (or never loaded), `false` if still in cooldown
pub fn cooldown_elapsed(
    last_load_at: Option<DateTime<Utc>>,
    cooldown: Duration,
    now: DateTime<Utc>,
) -> bool {
    match last_load_at {
        Some(last) => now - last >= cooldown,
        None => true, // Never loaded, so cooldown has "elapsed"
    }
}
