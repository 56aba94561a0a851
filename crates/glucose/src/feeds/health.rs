//! Device health store fallback
//!
//! The platform health API is supplied by the host (HealthKit via FFI, a fake
//! in tests). Access is permission-gated: the adapter checks authorization
//! before every query and reports a denial as `FeedError::PermissionDenied`,
//! which callers must surface and never retry automatically.

use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::sync::Arc;

use super::{FeedError, GlucoseFeed, normalize_health};
use crate::models::{Reading, ReadingSource};

/// Read authorization for blood glucose samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthAuthorization {
    Authorized,
    Denied,
    /// The user has never been asked
    NotDetermined,
    /// The device has no health store at all
    Unavailable,
}

/// A raw blood glucose sample from the platform, already in mg/dL
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthSample {
    pub timestamp: DateTime<Utc>,
    pub mg_dl: f64,
}

/// Platform health-data access
///
/// Looks synchronous on most platforms but is real I/O and may fail.
pub trait HealthStore: Send + Sync {
    fn authorization(&self) -> HealthAuthorization;

    fn glucose_samples(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<HealthSample>>;
}

/// `GlucoseFeed` over a platform `HealthStore`
pub struct HealthStoreAdapter {
    store: Arc<dyn HealthStore>,
}

impl HealthStoreAdapter {
    pub fn new(store: Arc<dyn HealthStore>) -> Self {
        Self { store }
    }
}

impl GlucoseFeed for HealthStoreAdapter {
    fn source(&self) -> ReadingSource {
        ReadingSource::HealthStore
    }

    fn fetch_readings(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Reading>, FeedError> {
        match self.store.authorization() {
            HealthAuthorization::Authorized => {}
            HealthAuthorization::Denied | HealthAuthorization::NotDetermined => {
                warn!("Health store read permission not granted");
                return Err(FeedError::PermissionDenied);
            }
            HealthAuthorization::Unavailable => {
                return Err(FeedError::NotConfigured("health store"));
            }
        }

        let samples = self
            .store
            .glucose_samples(start, end)
            .map_err(|e| FeedError::Network(format!("health store query failed: {e:#}")))?;

        let readings: Vec<Reading> = normalize_health(samples)
            .into_iter()
            .filter(|r| r.timestamp >= start && r.timestamp <= end)
            .collect();

        debug!("Health store returned {} readings", readings.len());
        Ok(readings)
    }
}
