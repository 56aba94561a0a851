//! FFI-friendly type wrappers for UniFFI export
//!
//! These types convert internal Rust types to FFI-compatible versions:
//! - `DateTime<Utc>` → `i64` (Unix milliseconds)
//! - `Duration` settings → plain integers
//! - Internal enums → mirrored `uniffi::Enum`s

use chrono::{DateTime, TimeZone, Utc};

use crate::config::SyncOptions;
use crate::feeds::{FeedError, HealthAuthorization, HealthSample};
use crate::models::{
    DataSourceLabel, DisplayPoint, MealEntry, MealMarker, SeriesSnapshot,
};
use crate::sync::{RefreshOutcome, RefreshTrigger, SyncStats};

// ============================================================================
// Error Types
// ============================================================================

/// FFI-friendly error type
#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum GlucoseError {
    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Authentication required: {message}")]
    AuthRequired { message: String },

    #[error("Permission to read glucose data was denied")]
    PermissionDenied,

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Runtime error: {message}")]
    Runtime { message: String },
}

impl From<anyhow::Error> for GlucoseError {
    fn from(e: anyhow::Error) -> Self {
        GlucoseError::Storage {
            message: format!("{e:#}"),
        }
    }
}

impl From<FeedError> for GlucoseError {
    fn from(e: FeedError) -> Self {
        match e {
            FeedError::Authentication(message) => GlucoseError::AuthRequired { message },
            FeedError::PermissionDenied => GlucoseError::PermissionDenied,
            FeedError::NotConfigured(what) => GlucoseError::InvalidArgument {
                message: format!("{what} is not configured"),
            },
            other => GlucoseError::Network {
                message: other.to_string(),
            },
        }
    }
}

/// Error a host health bridge may return from a query
#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum HealthBridgeError {
    #[error("Health query failed: {message}")]
    QueryFailed { message: String },

    #[error("Health callback failed: {message}")]
    Callback { message: String },
}

impl From<uniffi::UnexpectedUniFFICallbackError> for HealthBridgeError {
    fn from(e: uniffi::UnexpectedUniFFICallbackError) -> Self {
        HealthBridgeError::Callback { message: e.reason }
    }
}

// ============================================================================
// Time helpers
// ============================================================================

pub(crate) fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> Result<DateTime<Utc>, GlucoseError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| GlucoseError::InvalidArgument {
            message: format!("timestamp out of range: {ms}"),
        })
}

// ============================================================================
// Options
// ============================================================================

/// FFI-friendly engine settings
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiSyncOptions {
    pub window_hours: u32,
    pub min_refresh_interval_secs: u64,
    pub official_delay_hours: u32,
    pub dedup_tolerance_secs: u64,
    pub gap_threshold_mins: u64,
    pub adapter_timeout_secs: u64,
}

impl From<SyncOptions> for FfiSyncOptions {
    fn from(o: SyncOptions) -> Self {
        Self {
            window_hours: o.window_hours,
            min_refresh_interval_secs: o.min_refresh_interval_secs,
            official_delay_hours: o.official_delay_hours,
            dedup_tolerance_secs: o.dedup_tolerance_secs,
            gap_threshold_mins: o.gap_threshold_mins,
            adapter_timeout_secs: o.adapter_timeout_secs,
        }
    }
}

impl From<FfiSyncOptions> for SyncOptions {
    fn from(o: FfiSyncOptions) -> Self {
        Self {
            window_hours: o.window_hours,
            min_refresh_interval_secs: o.min_refresh_interval_secs,
            official_delay_hours: o.official_delay_hours,
            dedup_tolerance_secs: o.dedup_tolerance_secs,
            gap_threshold_mins: o.gap_threshold_mins,
            adapter_timeout_secs: o.adapter_timeout_secs,
        }
    }
}

// ============================================================================
// Series Types
// ============================================================================

/// Provenance of the published series
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiDataSourceLabel {
    CachedOnly,
    CachedLiveHybrid,
    OfficialOnly,
    ShareOnly,
    HealthStore,
}

impl From<DataSourceLabel> for FfiDataSourceLabel {
    fn from(label: DataSourceLabel) -> Self {
        match label {
            DataSourceLabel::CachedOnly => FfiDataSourceLabel::CachedOnly,
            DataSourceLabel::CachedLiveHybrid => FfiDataSourceLabel::CachedLiveHybrid,
            DataSourceLabel::OfficialOnly => FfiDataSourceLabel::OfficialOnly,
            DataSourceLabel::ShareOnly => FfiDataSourceLabel::ShareOnly,
            DataSourceLabel::HealthStore => FfiDataSourceLabel::HealthStore,
        }
    }
}

/// FFI-friendly chart point
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiDisplayPoint {
    /// Unix timestamp (milliseconds since epoch)
    pub time: i64,
    /// mg/dL
    pub value: f64,
    pub has_gap_before: bool,
}

impl From<DisplayPoint> for FfiDisplayPoint {
    fn from(p: DisplayPoint) -> Self {
        Self {
            time: to_millis(p.time),
            value: p.value,
            has_gap_before: p.has_gap_before,
        }
    }
}

/// FFI-friendly published series
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiSeriesSnapshot {
    pub points: Vec<FfiDisplayPoint>,
    pub label: FfiDataSourceLabel,
    /// Rendered label, e.g. "cached+live-hybrid"
    pub label_text: String,
    pub error_message: Option<String>,
    pub window_start: Option<i64>,
    pub window_end: Option<i64>,
    pub generation: u64,
    pub last_load_time: Option<i64>,
}

impl From<SeriesSnapshot> for FfiSeriesSnapshot {
    fn from(s: SeriesSnapshot) -> Self {
        Self {
            points: s.points.into_iter().map(FfiDisplayPoint::from).collect(),
            label: FfiDataSourceLabel::from(s.label),
            label_text: s.label.as_str().to_string(),
            error_message: s.error_message,
            window_start: s.window.map(|w| to_millis(w.start())),
            window_end: s.window.map(|w| to_millis(w.end())),
            generation: s.generation,
            last_load_time: s.last_load_time.map(to_millis),
        }
    }
}

// ============================================================================
// Refresh Types
// ============================================================================

/// FFI-friendly refresh statistics
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiSyncStats {
    pub baseline_readings: u32,
    pub fetched_readings: u32,
    pub added_readings: u32,
    pub discarded_readings: u32,
    pub persisted_readings: u32,
    pub failed_sources: u32,
    pub duration_ms: u64,
}

impl From<SyncStats> for FfiSyncStats {
    fn from(s: SyncStats) -> Self {
        Self {
            baseline_readings: s.baseline_readings as u32,
            fetched_readings: s.fetched_readings as u32,
            added_readings: s.added_readings as u32,
            discarded_readings: s.discarded_readings as u32,
            persisted_readings: s.persisted_readings as u32,
            failed_sources: s.failed_sources as u32,
            duration_ms: s.duration_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiRefreshStatus {
    Published,
    Debounced,
    Superseded,
}

/// What a refresh call did
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiRefreshResult {
    pub status: FfiRefreshStatus,
    /// Absent when superseded
    pub snapshot: Option<FfiSeriesSnapshot>,
    /// Only present when published
    pub stats: Option<FfiSyncStats>,
}

impl From<RefreshOutcome> for FfiRefreshResult {
    fn from(outcome: RefreshOutcome) -> Self {
        match outcome {
            RefreshOutcome::Published { snapshot, stats } => Self {
                status: FfiRefreshStatus::Published,
                snapshot: Some(snapshot.into()),
                stats: Some(stats.into()),
            },
            RefreshOutcome::Debounced(snapshot) => Self {
                status: FfiRefreshStatus::Debounced,
                snapshot: Some(snapshot.into()),
                stats: None,
            },
            RefreshOutcome::Superseded { .. } => Self {
                status: FfiRefreshStatus::Superseded,
                snapshot: None,
                stats: None,
            },
        }
    }
}

/// Why the host wants a refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiRefreshTrigger {
    Foreground,
    StoreChanged,
    Manual,
}

impl From<FfiRefreshTrigger> for RefreshTrigger {
    fn from(t: FfiRefreshTrigger) -> Self {
        match t {
            FfiRefreshTrigger::Foreground => RefreshTrigger::Foreground,
            FfiRefreshTrigger::StoreChanged => RefreshTrigger::StoreChanged,
            FfiRefreshTrigger::Manual => RefreshTrigger::Manual,
        }
    }
}

// ============================================================================
// Meal Types
// ============================================================================

/// A logged meal, as read from the meal subsystem
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiMealEntry {
    pub id: String,
    /// Unix timestamp (milliseconds since epoch)
    pub eaten_at: i64,
    pub title: Option<String>,
}

impl TryFrom<FfiMealEntry> for MealEntry {
    type Error = GlucoseError;

    fn try_from(m: FfiMealEntry) -> Result<Self, Self::Error> {
        Ok(MealEntry {
            id: m.id,
            eaten_at: from_millis(m.eaten_at)?,
            title: m.title,
        })
    }
}

#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiMealMarker {
    pub meal_id: String,
    pub time: i64,
    pub value: f64,
    pub title: Option<String>,
}

impl From<MealMarker> for FfiMealMarker {
    fn from(m: MealMarker) -> Self {
        Self {
            meal_id: m.meal_id,
            time: to_millis(m.time),
            value: m.value,
            title: m.title,
        }
    }
}

// ============================================================================
// Health Bridge
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiHealthAuthorization {
    Authorized,
    Denied,
    NotDetermined,
    Unavailable,
}

impl From<FfiHealthAuthorization> for HealthAuthorization {
    fn from(a: FfiHealthAuthorization) -> Self {
        match a {
            FfiHealthAuthorization::Authorized => HealthAuthorization::Authorized,
            FfiHealthAuthorization::Denied => HealthAuthorization::Denied,
            FfiHealthAuthorization::NotDetermined => HealthAuthorization::NotDetermined,
            FfiHealthAuthorization::Unavailable => HealthAuthorization::Unavailable,
        }
    }
}

/// Blood glucose sample from the host health store, already in mg/dL
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiHealthSample {
    pub timestamp: i64,
    pub mg_dl: f64,
}

impl TryFrom<FfiHealthSample> for HealthSample {
    type Error = GlucoseError;

    fn try_from(s: FfiHealthSample) -> Result<Self, Self::Error> {
        Ok(HealthSample {
            timestamp: from_millis(s.timestamp)?,
            mg_dl: s.mg_dl,
        })
    }
}

// ============================================================================
// Callback Traits
// ============================================================================

/// Host access to the platform health store (HealthKit on Apple platforms)
///
/// Called from a background thread. Queries may block.
#[uniffi::export(callback_interface)]
pub trait HealthKitBridge: Send + Sync {
    fn authorization_status(&self) -> FfiHealthAuthorization;

    /// Samples with `start <= timestamp <= end` (Unix milliseconds)
    fn glucose_samples(
        &self,
        start: i64,
        end: i64,
    ) -> Result<Vec<FfiHealthSample>, HealthBridgeError>;
}

/// Receives every newly published series
#[uniffi::export(callback_interface)]
pub trait SeriesListener: Send + Sync {
    fn on_series(&self, snapshot: FfiSeriesSnapshot);
}

// ============================================================================
// Log Callback
// ============================================================================

/// Log level for FFI callback
#[derive(Debug, Clone, Copy, uniffi::Enum)]
pub enum FfiLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<log::Level> for FfiLogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => FfiLogLevel::Error,
            log::Level::Warn => FfiLogLevel::Warn,
            log::Level::Info => FfiLogLevel::Info,
            log::Level::Debug => FfiLogLevel::Debug,
            log::Level::Trace => FfiLogLevel::Trace,
        }
    }
}

impl From<FfiLogLevel> for log::Level {
    fn from(level: FfiLogLevel) -> Self {
        match level {
            FfiLogLevel::Error => log::Level::Error,
            FfiLogLevel::Warn => log::Level::Warn,
            FfiLogLevel::Info => log::Level::Info,
            FfiLogLevel::Debug => log::Level::Debug,
            FfiLogLevel::Trace => log::Level::Trace,
        }
    }
}

/// Callback interface for receiving log messages from Rust
///
/// Swift should implement this using os_log/Logger for unified logging.
#[uniffi::export(callback_interface)]
pub trait LogCallback: Send + Sync {
    /// Called when a log message is emitted
    ///
    /// # Arguments
    /// * `level` - The log level (error, warn, info, debug, trace)
    /// * `target` - The logging target (typically module path, e.g., "glucose::sync")
    /// * `message` - The log message
    fn on_log(&self, level: FfiLogLevel, target: String, message: String);
}
