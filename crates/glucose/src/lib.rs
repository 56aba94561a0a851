//! Glucose crate - Business logic for glucose series aggregation
//!
//! This crate provides platform-independent glucose functionality including:
//! - Domain models (Reading, TimeWindow, DisplayPoint, SeriesSnapshot)
//! - Official, share and device health-store feed adapters
//! - Storage trait abstractions with SQLite and in-memory backends
//! - Time-proximity merging and gap annotation
//! - A debounced, generation-ordered sync orchestrator
//!
//! This crate has zero UI dependencies. The `ffi` module exposes it to
//! Swift/Kotlin via UniFFI.

uniffi::setup_scaffolding!();

pub mod annotate;
pub mod config;
pub mod feeds;
pub mod ffi;
pub mod merge;
pub mod models;
pub mod storage;
pub mod sync;

#[cfg(test)]
mod test_support;

pub use annotate::{GAP_THRESHOLD, Timestamped, annotate, place_meal_markers};
pub use config::{ShareCredentials, ShareServer, SyncOptions};
pub use feeds::{
    FeedError, GlucoseFeed, HealthAuthorization, HealthSample, HealthStore, HealthStoreAdapter,
    OfficialFeedAdapter, OfficialToken, ShareFeedAdapter,
};
pub use merge::{HybridFetch, HybridMerger, LegOutcome, MergeResult, dedupe, merge_into_baseline};
pub use models::{
    DataSourceLabel, DisplayPoint, MealEntry, MealMarker, Reading, ReadingSource, SeriesSnapshot,
    SyncState, TimeWindow,
};
pub use storage::{InMemoryReadingStore, ReadingStore, SqliteReadingStore};
pub use sync::{
    // Orchestration
    RefreshOutcome, SyncOrchestrator, SyncSources, SyncStats,
    // Triggers
    RefreshTrigger, spawn_trigger_listener, trigger_channel,
    // Timing
    Clock, SystemClock, cooldown_elapsed,
};
