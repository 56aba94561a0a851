//! CGM feed adapters
//!
//! This module provides:
//! - The `GlucoseFeed` trait every data source implements
//! - Official (delayed) and Share (near-real-time) cloud clients
//! - The permission-gated device health store adapter
//! - Response normalization to `Reading`s
//!
//! Adapters never retry. Retry and backoff belong to the caller.

mod health;
mod normalize;
mod official;
mod share;

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::models::{Reading, ReadingSource};

pub use health::{HealthAuthorization, HealthSample, HealthStore, HealthStoreAdapter};
pub use normalize::{normalize_health, normalize_official, normalize_share, parse_feed_time};
pub use official::{OfficialFeedAdapter, OfficialToken};
pub use share::ShareFeedAdapter;

/// Typed failure from a feed adapter
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FeedError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limited by provider")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Permission to read health data was denied")]
    PermissionDenied,

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

impl FeedError {
    /// Errors the user has to fix themselves (sign in, grant access).
    /// These are surfaced instead of the generic message and never retried.
    pub fn is_user_actionable(&self) -> bool {
        matches!(
            self,
            FeedError::Authentication(_) | FeedError::PermissionDenied
        )
    }
}

impl From<ureq::Error> for FeedError {
    fn from(e: ureq::Error) -> Self {
        match e {
            ureq::Error::StatusCode(401 | 403) => {
                FeedError::Authentication(format!("HTTP {}", e))
            }
            ureq::Error::StatusCode(429) => FeedError::RateLimited {
                retry_after_secs: None,
            },
            ureq::Error::Timeout(t) => FeedError::Timeout(t.to_string()),
            ureq::Error::Json(err) => FeedError::Decode(err.to_string()),
            other => FeedError::Network(other.to_string()),
        }
    }
}

/// A source of glucose readings
///
/// Every call may block on I/O; the orchestrator runs them on the blocking
/// pool under a timeout.
pub trait GlucoseFeed: Send + Sync {
    /// Label attached to readings from this feed
    fn source(&self) -> ReadingSource;

    /// Whether the feed is configured well enough to be worth calling
    fn is_available(&self) -> bool {
        true
    }

    /// How long after measurement a reading becomes available
    fn data_delay(&self) -> Duration {
        Duration::zero()
    }

    /// Latest instant this feed can serve. Requests must not extend past it.
    fn most_recent_available_date(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.data_delay())
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Readings with `start <= timestamp <= end`, ascending
    fn fetch_readings(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Reading>, FeedError>;
}

/// Fetch from a feed on the blocking pool, giving up after `timeout`
///
/// A hung adapter becomes `FeedError::Timeout`; the blocking call itself is
/// left to finish in the background and its result dropped.
pub async fn fetch_with_timeout(
    feed: Arc<dyn GlucoseFeed>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    timeout: std::time::Duration,
) -> Result<Vec<Reading>, FeedError> {
    let source = feed.source();
    run_blocking(timeout, source.as_str(), move || feed.fetch_readings(start, end)).await
}

/// Run blocking I/O on the tokio blocking pool under a timeout
pub(crate) async fn run_blocking<T, F>(
    timeout: std::time::Duration,
    what: &str,
    f: F,
) -> Result<T, FeedError>
where
    F: FnOnce() -> Result<T, FeedError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::time::timeout(timeout, tokio::task::spawn_blocking(f)).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(FeedError::Network(format!(
            "{what} call panicked or was cancelled: {join_error}"
        ))),
        Err(_) => Err(FeedError::Timeout(format!(
            "{what} did not answer within {}s",
            timeout.as_secs_f32()
        ))),
    }
}

/// Build an HTTP agent with a global timeout and manual status handling
pub(crate) fn http_agent(timeout: std::time::Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .into()
}

/// Map a non-success response status to a `FeedError`
pub(crate) fn check_status(response: &ureq::http::Response<ureq::Body>) -> Result<(), FeedError> {
    let status = response.status().as_u16();
    match status {
        200..=299 => Ok(()),
        401 | 403 => Err(FeedError::Authentication(format!("HTTP {status}"))),
        429 => {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse().ok());
            Err(FeedError::RateLimited { retry_after_secs })
        }
        _ => Err(FeedError::Network(format!("HTTP {status}"))),
    }
}

/// Feed response payloads
pub mod api {
    use serde::{Deserialize, Serialize};

    /// Response from the official estimated-glucose-values endpoint
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct OfficialResponse {
        #[serde(default)]
        pub records: Vec<OfficialRecord>,
    }

    /// One official record. Either field may be missing on sensor errors.
    #[derive(Debug, Clone, Deserialize, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct OfficialRecord {
        #[serde(alias = "timestamp")]
        pub system_time: Option<String>,
        pub value: Option<f64>,
    }

    /// One share entry
    ///
    /// The service uses PascalCase keys and `Date(<millis>)` times.
    #[derive(Debug, Clone, Deserialize, Serialize)]
    pub struct ShareEntry {
        #[serde(rename = "Value", alias = "value")]
        pub value: Option<f64>,
        #[serde(rename = "WT", alias = "displayTime")]
        pub display_time: Option<String>,
    }

    /// Credentials body for share login calls
    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ShareLoginRequest<'a> {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub account_name: Option<&'a str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub account_id: Option<&'a str>,
        pub password: &'a str,
        pub application_id: &'a str,
    }
}
