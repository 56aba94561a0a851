//! Gap detection for display series

use chrono::{DateTime, Duration, Utc};

use crate::models::{DisplayPoint, Reading};

/// Default break length above which a gap is flagged
pub const GAP_THRESHOLD: Duration = Duration::minutes(15);

/// Anything with a position on the time axis and a glucose value
pub trait Timestamped {
    fn time(&self) -> DateTime<Utc>;
    fn value(&self) -> f64;
}

impl Timestamped for Reading {
    fn time(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn value(&self) -> f64 {
        self.value
    }
}

impl Timestamped for DisplayPoint {
    fn time(&self) -> DateTime<Utc> {
        self.time
    }

    fn value(&self) -> f64 {
        self.value
    }
}

/// Convert ordered items to display points, flagging breaks longer than `threshold`
///
/// The first point is never flagged. Existing flags on the input are ignored,
/// so annotating an annotated series gives the same result.
pub fn annotate<T: Timestamped>(items: &[T], threshold: Duration) -> Vec<DisplayPoint> {
    let mut previous: Option<DateTime<Utc>> = None;
    items
        .iter()
        .map(|item| {
            let time = item.time();
            let has_gap_before = previous.is_some_and(|prev| time - prev > threshold);
            previous = Some(time);
            DisplayPoint {
                time,
                value: item.value(),
                has_gap_before,
            }
        })
        .collect()
}
