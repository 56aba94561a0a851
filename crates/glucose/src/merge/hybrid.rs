//! Hybrid fetch across the official and share feeds
//!
//! The official feed is authoritative but lags by its processing delay, the
//! share feed is live but short. A window is split at the official delay
//! boundary so each feed only serves the part it can actually answer.

use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use std::sync::Arc;

use crate::feeds::{FeedError, GlucoseFeed, fetch_with_timeout};
use crate::models::{DataSourceLabel, Reading, TimeWindow};

/// Inclusive request range for one leg
pub type LegRange = (DateTime<Utc>, DateTime<Utc>);

/// Which sub-ranges each feed is asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegPlan {
    pub official: Option<LegRange>,
    pub share: Option<LegRange>,
}

/// Split `window` at `boundary`
///
/// The official leg covers `[start, min(end, boundary)]` and the share leg
/// `(max(start, boundary), end]`. An empty side is `None`.
pub fn plan_legs(window: &TimeWindow, boundary: DateTime<Utc>) -> LegPlan {
    let (start, end) = (window.start(), window.end());

    let official_end = end.min(boundary);
    let official = (start < official_end).then_some((start, official_end));

    let share_start = if boundary < start {
        start
    } else {
        boundary + Duration::milliseconds(1)
    };
    let share = (share_start <= end).then_some((share_start, end));

    LegPlan { official, share }
}

/// What happened to one leg of a hybrid fetch
#[derive(Debug, Clone, PartialEq)]
pub enum LegOutcome {
    /// Nothing to ask this feed for
    Skipped,
    Fetched(Vec<Reading>),
    Failed(FeedError),
}

impl LegOutcome {
    /// Skipped legs count as succeeded with no data
    pub fn succeeded(&self) -> bool {
        !matches!(self, LegOutcome::Failed(_))
    }

    pub fn readings(&self) -> &[Reading] {
        match self {
            LegOutcome::Fetched(readings) => readings,
            _ => &[],
        }
    }

    pub fn error(&self) -> Option<&FeedError> {
        match self {
            LegOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Result of a hybrid fetch where at least one leg succeeded
#[derive(Debug, Clone, PartialEq)]
pub struct HybridFetch {
    pub plan: LegPlan,
    pub official: LegOutcome,
    pub share: LegOutcome,
}

impl HybridFetch {
    /// Fresh readings, official leg first so it wins seam duplicates
    pub fn readings(&self) -> Vec<Reading> {
        let mut readings = self.official.readings().to_vec();
        readings.extend_from_slice(self.share.readings());
        readings
    }

    /// Provenance of the fetched data
    pub fn label(&self) -> DataSourceLabel {
        match (self.official.succeeded(), self.share.succeeded()) {
            (true, false) => DataSourceLabel::OfficialOnly,
            (false, true) => DataSourceLabel::ShareOnly,
            _ => DataSourceLabel::CachedLiveHybrid,
        }
    }

    /// Errors from legs that failed (at most one)
    pub fn failures(&self) -> Vec<&FeedError> {
        [self.official.error(), self.share.error()]
            .into_iter()
            .flatten()
            .collect()
    }
}

/// Pick the error worth showing when both legs failed
fn preferred_error(official: FeedError, share: FeedError) -> FeedError {
    if !official.is_user_actionable() && share.is_user_actionable() {
        share
    } else {
        official
    }
}

/// Fetches a window from both live feeds
///
/// The caller overlays the result onto its baseline with
/// [`merge_into_baseline`](super::merge_into_baseline).
pub struct HybridMerger {
    official: Arc<dyn GlucoseFeed>,
    share: Arc<dyn GlucoseFeed>,
    timeout: std::time::Duration,
}

impl HybridMerger {
    pub fn new(
        official: Arc<dyn GlucoseFeed>,
        share: Arc<dyn GlucoseFeed>,
        timeout: std::time::Duration,
    ) -> Self {
        Self {
            official,
            share,
            timeout,
        }
    }

    /// Fetch both legs concurrently
    ///
    /// Returns `Err` only when both legs failed. A single failure is logged and
    /// recorded in the returned `HybridFetch`.
    pub async fn fetch(
        &self,
        window: &TimeWindow,
        now: DateTime<Utc>,
    ) -> Result<HybridFetch, FeedError> {
        let boundary = self.official.most_recent_available_date(now);
        let plan = plan_legs(window, boundary);
        debug!(
            "Hybrid fetch for {} split at {} (official: {:?}, share: {:?})",
            window, boundary, plan.official, plan.share
        );

        let (official, share) = tokio::join!(
            run_leg(self.official.clone(), plan.official, self.timeout),
            run_leg(self.share.clone(), plan.share, self.timeout),
        );

        match (official, share) {
            (LegOutcome::Failed(o), LegOutcome::Failed(s)) => Err(preferred_error(o, s)),
            (official, share) => Ok(HybridFetch {
                plan,
                official,
                share,
            }),
        }
    }
}

async fn run_leg(
    feed: Arc<dyn GlucoseFeed>,
    range: Option<LegRange>,
    timeout: std::time::Duration,
) -> LegOutcome {
    let Some((start, end)) = range else {
        return LegOutcome::Skipped;
    };

    let source = feed.source();
    match fetch_with_timeout(feed, start, end, timeout).await {
        Ok(readings) => {
            debug!("{} leg returned {} readings", source, readings.len());
            LegOutcome::Fetched(readings)
        }
        Err(e) => {
            warn!("{} leg failed: {}", source, e);
            LegOutcome::Failed(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::merge_into_baseline;
    use crate::models::ReadingSource;
    use crate::test_support::{FakeFeed, series, t0};

    const TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

    fn merger(official: Arc<FakeFeed>, share: Arc<FakeFeed>) -> HybridMerger {
        HybridMerger::new(official, share, TIMEOUT)
    }

    #[test]
    fn test_plan_splits_at_boundary() {
        let window = TimeWindow::new(t0() - Duration::hours(6), t0());
        let plan = plan_legs(&window, t0() - Duration::hours(3));

        assert_eq!(
            plan.official,
            Some((t0() - Duration::hours(6), t0() - Duration::hours(3)))
        );
        let (share_start, share_end) = plan.share.unwrap();
        assert!(share_start > t0() - Duration::hours(3));
        assert_eq!(share_end, t0());
    }

    #[test]
    fn test_plan_boundary_before_window_skips_official() {
        let window = TimeWindow::new(t0() - Duration::hours(1), t0());
        let plan = plan_legs(&window, t0() - Duration::hours(3));

        assert_eq!(plan.official, None);
        assert_eq!(plan.share, Some((window.start(), window.end())));
    }

    #[test]
    fn test_plan_boundary_after_window_skips_share() {
        let window = TimeWindow::new(t0() - Duration::hours(6), t0() - Duration::hours(4));
        let plan = plan_legs(&window, t0() - Duration::hours(3));

        assert_eq!(plan.official, Some((window.start(), window.end())));
        assert_eq!(plan.share, None);
    }

    #[tokio::test]
    async fn test_fetch_seam_has_no_gap() {
        let start = t0() - Duration::hours(6);
        let boundary = t0() - Duration::hours(3);
        let official = Arc::new(
            FakeFeed::new(
                ReadingSource::Official,
                series(start, boundary, 5, ReadingSource::Official),
            )
            .with_delay(Duration::hours(3)),
        );
        let share = Arc::new(FakeFeed::new(
            ReadingSource::Share,
            series(boundary + Duration::minutes(5), t0(), 5, ReadingSource::Share),
        ));

        let merger = merger(official.clone(), share.clone());
        let window = TimeWindow::new(start, t0());
        let fetched = merger.fetch(&window, t0()).await.unwrap();

        assert_eq!(fetched.label(), DataSourceLabel::CachedLiveHybrid);
        assert!(fetched.failures().is_empty());

        let merged = merge_into_baseline(&[], &fetched.readings(), Duration::seconds(60));
        let first = merged.readings.first().unwrap().timestamp;
        let last = merged.readings.last().unwrap().timestamp;
        assert_eq!(first, start);
        assert_eq!(last, t0());
        for pair in merged.readings.windows(2) {
            assert!(pair[1].timestamp - pair[0].timestamp <= Duration::minutes(5));
        }

        // The official leg never asks past its boundary
        for (_, end) in official.requests() {
            assert!(end <= boundary);
        }
    }

    #[tokio::test]
    async fn test_one_leg_failing_is_partial() {
        let official = Arc::new(
            FakeFeed::new(ReadingSource::Official, Vec::new())
                .with_delay(Duration::hours(3))
                .failing(FeedError::Network("connection reset".into())),
        );
        let share = Arc::new(FakeFeed::new(
            ReadingSource::Share,
            series(t0() - Duration::hours(2), t0(), 5, ReadingSource::Share),
        ));

        let merger = merger(official, share);
        let window = TimeWindow::new(t0() - Duration::hours(6), t0());
        let fetched = merger.fetch(&window, t0()).await.unwrap();

        assert_eq!(fetched.label(), DataSourceLabel::ShareOnly);
        assert_eq!(fetched.failures().len(), 1);
        assert!(!fetched.readings().is_empty());
    }

    #[tokio::test]
    async fn test_both_legs_failing_prefers_actionable_error() {
        let official = Arc::new(
            FakeFeed::new(ReadingSource::Official, Vec::new())
                .with_delay(Duration::hours(3))
                .failing(FeedError::Timeout("15s".into())),
        );
        let share = Arc::new(
            FakeFeed::new(ReadingSource::Share, Vec::new())
                .failing(FeedError::Authentication("bad password".into())),
        );

        let merger = merger(official, share);
        let window = TimeWindow::new(t0() - Duration::hours(6), t0());
        let err = merger.fetch(&window, t0()).await.unwrap_err();
        assert!(err.is_user_actionable());
    }

    #[tokio::test]
    async fn test_skipped_leg_is_not_called() {
        let official = Arc::new(
            FakeFeed::new(ReadingSource::Official, Vec::new()).with_delay(Duration::hours(3)),
        );
        let share = Arc::new(FakeFeed::new(
            ReadingSource::Share,
            series(t0() - Duration::hours(1), t0(), 5, ReadingSource::Share),
        ));

        let merger = merger(official.clone(), share.clone());
        let window = TimeWindow::new(t0() - Duration::hours(1), t0());
        let fetched = merger.fetch(&window, t0()).await.unwrap();

        assert_eq!(official.calls(), 0);
        assert_eq!(share.calls(), 1);
        assert_eq!(fetched.official, LegOutcome::Skipped);
        // A skipped leg still counts as success
        assert_eq!(fetched.label(), DataSourceLabel::CachedLiveHybrid);
    }

    #[tokio::test]
    async fn test_hung_leg_times_out() {
        let official = Arc::new(
            FakeFeed::new(ReadingSource::Official, Vec::new())
                .with_delay(Duration::hours(3))
                .with_stall(std::time::Duration::from_millis(500)),
        );
        let share = Arc::new(FakeFeed::new(
            ReadingSource::Share,
            series(t0() - Duration::hours(2), t0(), 5, ReadingSource::Share),
        ));

        let merger =
            HybridMerger::new(official, share, std::time::Duration::from_millis(50));
        let window = TimeWindow::new(t0() - Duration::hours(6), t0());
        let fetched = merger.fetch(&window, t0()).await.unwrap();

        assert!(matches!(fetched.official, LegOutcome::Failed(FeedError::Timeout(_))));
        assert_eq!(fetched.label(), DataSourceLabel::ShareOnly);
    }
}
