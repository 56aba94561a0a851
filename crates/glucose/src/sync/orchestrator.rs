//! Refresh orchestration
//!
//! One refresh walks the fallback order: cached baseline, live feeds (hybrid
//! when both are reachable, otherwise the single reachable one), then the
//! device health store. Every refresh republishes, even on partial failure.
//!
//! State lives behind a std `Mutex` that is never held across an `.await`.
//! Each refresh claims a generation up front and may only publish while that
//! generation is still the newest; it checks after every suspension point.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

use super::timing::{Clock, SystemClock, cooldown_elapsed};
use crate::annotate::annotate;
use crate::config::SyncOptions;
use crate::feeds::{FeedError, GlucoseFeed, fetch_with_timeout};
use crate::merge::{HybridMerger, LegRange, dedupe, merge_into_baseline, plan_legs};
use crate::models::{DataSourceLabel, Reading, SeriesSnapshot, SyncState, TimeWindow};
use crate::storage::ReadingStore;

/// Shown when every tier came back empty
pub const NO_DATA_MESSAGE: &str = "No glucose data in range";

/// Shown when the health store refused access and nothing else had data
pub const PERMISSION_MESSAGE: &str =
    "Glucose access is turned off. Allow reading blood glucose in Health settings.";

/// Shown when a cloud login failed and nothing else had data
pub const AUTHENTICATION_MESSAGE: &str =
    "Your CGM account needs you to sign in again before glucose data can load.";

/// Everything the orchestrator reads from, injected at construction
#[derive(Clone)]
pub struct SyncSources {
    pub store: Arc<dyn ReadingStore>,
    pub official: Option<Arc<dyn GlucoseFeed>>,
    pub share: Option<Arc<dyn GlucoseFeed>>,
    pub health: Option<Arc<dyn GlucoseFeed>>,
}

impl SyncSources {
    /// Store only; add feeds with the builder methods
    pub fn new(store: Arc<dyn ReadingStore>) -> Self {
        Self {
            store,
            official: None,
            share: None,
            health: None,
        }
    }

    pub fn with_official(mut self, feed: Arc<dyn GlucoseFeed>) -> Self {
        self.official = Some(feed);
        self
    }

    pub fn with_share(mut self, feed: Arc<dyn GlucoseFeed>) -> Self {
        self.share = Some(feed);
        self
    }

    pub fn with_health(mut self, feed: Arc<dyn GlucoseFeed>) -> Self {
        self.health = Some(feed);
        self
    }
}

/// Statistics from a refresh
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SyncStats {
    /// Readings loaded from the local cache
    pub baseline_readings: usize,
    /// Readings returned by live feeds or the health store
    pub fetched_readings: usize,
    /// Fetched readings that survived dedup
    pub added_readings: usize,
    /// Fetched readings dropped as duplicates
    pub discarded_readings: usize,
    /// Readings written back to the store
    pub persisted_readings: usize,
    /// Number of adapter calls that failed
    pub failed_sources: usize,
    /// Duration of the refresh
    pub duration_ms: u64,
}

/// What a call to [`SyncOrchestrator::refresh`] did
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// Skipped by the debounce gate; carries the current series
    Debounced(SeriesSnapshot),
    /// Finished and published
    Published {
        snapshot: SeriesSnapshot,
        stats: SyncStats,
    },
    /// A newer refresh started first; nothing was published at the end
    Superseded { generation: u64 },
}

impl RefreshOutcome {
    /// The series this call left on screen, if it decided one
    pub fn snapshot(&self) -> Option<&SeriesSnapshot> {
        match self {
            RefreshOutcome::Debounced(snapshot) => Some(snapshot),
            RefreshOutcome::Published { snapshot, .. } => Some(snapshot),
            RefreshOutcome::Superseded { .. } => None,
        }
    }
}

/// Fresh data from one tier
struct TierData {
    readings: Vec<Reading>,
    label: DataSourceLabel,
}

/// Owns refresh state and runs the fallback order
pub struct SyncOrchestrator {
    sources: SyncSources,
    options: SyncOptions,
    clock: Arc<dyn Clock>,
    state: Mutex<SyncState>,
    published: watch::Sender<SeriesSnapshot>,
}

impl SyncOrchestrator {
    pub fn new(sources: SyncSources, options: SyncOptions) -> Self {
        Self::with_clock(sources, options, Arc::new(SystemClock))
    }

    pub fn with_clock(sources: SyncSources, options: SyncOptions, clock: Arc<dyn Clock>) -> Self {
        let (published, _) = watch::channel(SeriesSnapshot::empty());
        Self {
            sources,
            options,
            clock,
            state: Mutex::new(SyncState::new()),
            published,
        }
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// The currently published series
    pub fn snapshot(&self) -> SeriesSnapshot {
        self.state.lock().unwrap().published.clone()
    }

    /// Receive every newly published series
    pub fn subscribe(&self) -> watch::Receiver<SeriesSnapshot> {
        self.published.subscribe()
    }

    /// Refresh the published series
    ///
    /// Without `force`, a call inside the minimum refresh interval is skipped
    /// as long as something is already on screen.
    pub async fn refresh(&self, force: bool) -> RefreshOutcome {
        let started = std::time::Instant::now();
        let now = self.clock.now();

        // 1. Debounce, then claim a generation before any I/O
        let generation = {
            let mut state = self.state.lock().unwrap();
            if !force
                && !state.published.is_empty()
                && !cooldown_elapsed(state.last_load_time, self.options.min_refresh_interval(), now)
            {
                debug!("Refresh skipped, last load at {:?}", state.last_load_time);
                return RefreshOutcome::Debounced(state.published.clone());
            }
            state.begin_refresh(now)
        };

        let window = TimeWindow::rolling(now, self.options.window_span());
        let tolerance = self.options.dedup_tolerance();
        let mut stats = SyncStats::default();
        let mut errors: Vec<FeedError> = Vec::new();
        info!("Refresh {} started for {} (force: {})", generation, window, force);

        // 2. Cached baseline, published right away
        let baseline = match self.load_baseline(&window).await {
            Ok(readings) => dedupe(&readings, tolerance),
            Err(e) => {
                warn!("Failed to read cached readings: {:#}", e);
                self.in_memory_baseline(&window)
            }
        };
        stats.baseline_readings = baseline.len();

        {
            let mut state = self.state.lock().unwrap();
            if !state.is_current(generation) {
                return superseded(generation);
            }
            if !baseline.is_empty() {
                let snapshot = self.build_snapshot(
                    &baseline,
                    DataSourceLabel::CachedOnly,
                    None,
                    window,
                    generation,
                    now,
                );
                self.publish(&mut state, baseline.clone(), snapshot);
            }
        }

        // 3. Live feeds
        let live = self.fetch_live(&window, now, &mut errors).await;
        if !self.is_current(generation) {
            return superseded(generation);
        }

        // 4. Health store when the live tier produced nothing
        let fresh = match live {
            Some(data) if !data.readings.is_empty() => Some(data),
            live => match self.fetch_health(&window, &mut errors).await {
                Some(health) if !health.readings.is_empty() => Some(health),
                _ => live,
            },
        };

        // 5. Overlay fresh data onto the baseline
        let (readings, label, added) = match fresh {
            Some(data) => {
                let merged = merge_into_baseline(&baseline, &data.readings, tolerance);
                stats.fetched_readings = data.readings.len();
                stats.added_readings = merged.added.len();
                stats.discarded_readings = merged.discarded;
                (merged.readings, data.label, merged.added)
            }
            None => (baseline, DataSourceLabel::CachedOnly, Vec::new()),
        };

        // 6. Persist new readings for the next cold start
        if !self.is_current(generation) {
            return superseded(generation);
        }
        if !added.is_empty() {
            match self.persist(added).await {
                Ok(count) => stats.persisted_readings = count,
                Err(e) => warn!("Failed to persist fetched readings: {:#}", e),
            }
        }

        // 7. Publish
        stats.failed_sources = errors.len();
        let error_message = readings.is_empty().then(|| error_message_for(&errors));

        let mut state = self.state.lock().unwrap();
        if !state.is_current(generation) {
            return superseded(generation);
        }
        let snapshot =
            self.build_snapshot(&readings, label, error_message, window, generation, now);
        self.publish(&mut state, readings, snapshot.clone());

        stats.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            "Refresh {} published {} points ({}) in {}ms",
            generation,
            snapshot.points.len(),
            snapshot.label,
            stats.duration_ms
        );

        RefreshOutcome::Published { snapshot, stats }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.state.lock().unwrap().is_current(generation)
    }

    fn publish(&self, state: &mut SyncState, readings: Vec<Reading>, snapshot: SeriesSnapshot) {
        state.publish(readings, snapshot.clone());
        self.published.send_replace(snapshot);
    }

    fn build_snapshot(
        &self,
        readings: &[Reading],
        label: DataSourceLabel,
        error_message: Option<String>,
        window: TimeWindow,
        generation: u64,
        now: DateTime<Utc>,
    ) -> SeriesSnapshot {
        SeriesSnapshot {
            points: annotate(readings, self.options.gap_threshold()),
            label,
            error_message,
            window: Some(window),
            generation,
            last_load_time: Some(now),
        }
    }

    async fn load_baseline(&self, window: &TimeWindow) -> Result<Vec<Reading>> {
        let store = self.sources.store.clone();
        let (start, end) = (window.start(), window.end());
        blocking_store(self.options.adapter_timeout(), move || {
            store.fetch_readings(start, end)
        })
        .await
    }

    /// Previously published readings still inside `window`
    fn in_memory_baseline(&self, window: &TimeWindow) -> Vec<Reading> {
        let state = self.state.lock().unwrap();
        state
            .cached_series
            .iter()
            .filter(|r| window.contains(r.timestamp))
            .map(|r| r.as_cached())
            .collect()
    }

    async fn persist(&self, readings: Vec<Reading>) -> Result<usize> {
        let store = self.sources.store.clone();
        blocking_store(self.options.adapter_timeout(), move || store.upsert(&readings)).await
    }

    async fn fetch_live(
        &self,
        window: &TimeWindow,
        now: DateTime<Utc>,
        errors: &mut Vec<FeedError>,
    ) -> Option<TierData> {
        let official = available(&self.sources.official);
        let share = available(&self.sources.share);

        match (official, share) {
            (Some(official), Some(share)) => {
                let merger = HybridMerger::new(official, share, self.options.adapter_timeout());
                match merger.fetch(window, now).await {
                    Ok(fetched) => {
                        errors.extend(fetched.failures().into_iter().cloned());
                        Some(TierData {
                            readings: fetched.readings(),
                            label: fetched.label(),
                        })
                    }
                    Err(e) => {
                        warn!("Both live feeds failed: {}", e);
                        errors.push(e);
                        None
                    }
                }
            }
            (Some(official), None) => {
                let boundary = official.most_recent_available_date(now);
                let range = plan_legs(window, boundary).official;
                self.fetch_single(official, range, DataSourceLabel::OfficialOnly, errors)
                    .await
            }
            (None, Some(share)) => {
                let range = Some((window.start(), window.end()));
                self.fetch_single(share, range, DataSourceLabel::ShareOnly, errors)
                    .await
            }
            (None, None) => {
                debug!("No live feed is configured");
                None
            }
        }
    }

    async fn fetch_health(
        &self,
        window: &TimeWindow,
        errors: &mut Vec<FeedError>,
    ) -> Option<TierData> {
        // Authorization is a host call, so it is checked on the blocking pool
        // inside `fetch_readings` rather than through `is_available`
        let health = self.sources.health.clone()?;
        let range = Some((window.start(), window.end()));
        self.fetch_single(health, range, DataSourceLabel::HealthStore, errors)
            .await
    }

    async fn fetch_single(
        &self,
        feed: Arc<dyn GlucoseFeed>,
        range: Option<LegRange>,
        label: DataSourceLabel,
        errors: &mut Vec<FeedError>,
    ) -> Option<TierData> {
        let Some((start, end)) = range else {
            debug!("Nothing to ask {} for in this window", feed.source());
            return Some(TierData {
                readings: Vec::new(),
                label,
            });
        };

        let source = feed.source();
        match fetch_with_timeout(feed, start, end, self.options.adapter_timeout()).await {
            Ok(readings) => Some(TierData { readings, label }),
            Err(FeedError::NotConfigured(what)) => {
                debug!("Skipping {}: not configured", what);
                None
            }
            Err(e) => {
                warn!("{} feed failed: {}", source, e);
                errors.push(e);
                None
            }
        }
    }
}

fn superseded(generation: u64) -> RefreshOutcome {
    debug!("Refresh {} superseded by a newer one", generation);
    RefreshOutcome::Superseded { generation }
}

/// Cloud feeds whose `is_available` is an in-memory credential check
fn available(feed: &Option<Arc<dyn GlucoseFeed>>) -> Option<Arc<dyn GlucoseFeed>> {
    feed.as_ref().filter(|f| f.is_available()).cloned()
}

/// Message for an empty series: permission beats authentication beats generic
fn error_message_for(errors: &[FeedError]) -> String {
    if errors.iter().any(|e| matches!(e, FeedError::PermissionDenied)) {
        PERMISSION_MESSAGE.to_string()
    } else if errors
        .iter()
        .any(|e| matches!(e, FeedError::Authentication(_)))
    {
        AUTHENTICATION_MESSAGE.to_string()
    } else {
        NO_DATA_MESSAGE.to_string()
    }
}

/// Run a store call on the blocking pool under a timeout
async fn blocking_store<T, F>(timeout: std::time::Duration, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::time::timeout(timeout, tokio::task::spawn_blocking(f))
        .await
        .context("Reading store did not answer in time")?
        .context("Reading store task failed")?
}
