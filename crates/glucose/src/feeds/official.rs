//! Official CGM cloud API client
//!
//! The official API only releases readings after a provider-enforced
//! processing delay. That delay is configured in hours and exposed through
//! `most_recent_available_date`; requests are clamped so they never reach past
//! it. Uses synchronous HTTP (ureq) to be executor-agnostic.

use chrono::{DateTime, Duration, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

use super::api::OfficialResponse;
use super::{FeedError, GlucoseFeed, check_status, http_agent, normalize_official};
use crate::models::{Reading, ReadingSource};

/// Token file in the Glyco config directory
const TOKEN_FILE: &str = "official-token.json";

/// Stored bearer token for the official API
///
/// Obtaining the token (OAuth screens) happens outside this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfficialToken {
    pub access_token: String,
    /// Unix timestamp (seconds) after which the token is unusable
    pub expires_at: Option<i64>,
}

impl OfficialToken {
    pub fn new(access_token: impl Into<String>, expires_at: Option<i64>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at,
        }
    }

    /// Load the token from the config directory, if one has been saved
    pub fn load() -> anyhow::Result<Option<Self>> {
        if !config::config_exists(TOKEN_FILE) {
            return Ok(None);
        }
        Ok(Some(config::load_json(TOKEN_FILE)?))
    }

    /// Persist the token to the config directory
    pub fn save(&self) -> anyhow::Result<()> {
        config::save_json(TOKEN_FILE, self)
    }

    /// Whether the token is still valid at `now` (with a one minute buffer)
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty()
            && self
                .expires_at
                .is_none_or(|expires_at| expires_at > now.timestamp() + 60)
    }
}

/// Client for the delayed official feed
pub struct OfficialFeedAdapter {
    agent: ureq::Agent,
    base_url: String,
    token: RwLock<Option<OfficialToken>>,
    delay: Duration,
}

impl OfficialFeedAdapter {
    /// Production API base URL
    pub const BASE_URL: &'static str = "https://api.dexcom.com";

    /// Sandbox API base URL
    pub const SANDBOX_URL: &'static str = "https://sandbox-api.dexcom.com";

    /// Create a client against the production API
    ///
    /// # Arguments
    /// * `token` - Bearer token, or None until the user signs in
    /// * `delay_hours` - Provider processing delay
    /// * `timeout` - Global per-request timeout
    pub fn new(
        token: Option<OfficialToken>,
        delay_hours: u32,
        timeout: std::time::Duration,
    ) -> Self {
        Self::with_base_url(Self::BASE_URL, token, delay_hours, timeout)
    }

    /// Create a client against a custom base URL (sandbox, test server)
    pub fn with_base_url(
        base_url: impl Into<String>,
        token: Option<OfficialToken>,
        delay_hours: u32,
        timeout: std::time::Duration,
    ) -> Self {
        Self {
            agent: http_agent(timeout),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: RwLock::new(token),
            delay: Duration::hours(i64::from(delay_hours)),
        }
    }

    /// Replace the bearer token (after the host app re-authenticates)
    pub fn set_token(&self, token: Option<OfficialToken>) {
        *self.token.write().unwrap() = token;
    }

    fn access_token(&self) -> Result<String, FeedError> {
        let guard = self.token.read().unwrap();
        match guard.as_ref() {
            Some(token) if token.is_valid_at(Utc::now()) => Ok(token.access_token.clone()),
            Some(_) => Err(FeedError::Authentication("official token expired".into())),
            None => Err(FeedError::NotConfigured("official feed")),
        }
    }
}

/// Format used by the official API for query dates (UTC, no offset)
fn format_query_time(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S").to_string()
}

impl GlucoseFeed for OfficialFeedAdapter {
    fn source(&self) -> ReadingSource {
        ReadingSource::Official
    }

    // An expired token still counts so the fetch can report the sign-in error
    fn is_available(&self) -> bool {
        self.token
            .read()
            .unwrap()
            .as_ref()
            .is_some_and(|t| !t.access_token.is_empty())
    }

    fn data_delay(&self) -> Duration {
        self.delay
    }

    fn fetch_readings(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Reading>, FeedError> {
        let end = end.min(self.most_recent_available_date(Utc::now()));
        if start >= end {
            debug!("Official feed has nothing before its delay boundary for this range");
            return Ok(Vec::new());
        }

        let access_token = self.access_token()?;
        let url = format!("{}/v3/users/self/egvs", self.base_url);

        let mut response = self
            .agent
            .get(&url)
            .query("startDate", format_query_time(start))
            .query("endDate", format_query_time(end))
            .header("Authorization", &format!("Bearer {}", access_token))
            .call()?;

        check_status(&response)?;

        let body: OfficialResponse = response
            .body_mut()
            .read_json()
            .map_err(|e| FeedError::Decode(e.to_string()))?;

        let readings: Vec<Reading> = normalize_official(body.records)
            .into_iter()
            .filter(|r| r.timestamp >= start && r.timestamp <= end)
            .collect();

        debug!("Official feed returned {} readings", readings.len());
        Ok(readings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter(token: Option<OfficialToken>) -> OfficialFeedAdapter {
        // Port 9 (discard) on loopback: any accidental request fails fast
        OfficialFeedAdapter::with_base_url(
            "http://127.0.0.1:9/",
            token,
            3,
            std::time::Duration::from_millis(200),
        )
    }

    #[test]
    fn test_token_validity() {
        let now = Utc::now();
        assert!(OfficialToken::new("abc", None).is_valid_at(now));
        assert!(OfficialToken::new("abc", Some(now.timestamp() + 3600)).is_valid_at(now));
        assert!(!OfficialToken::new("abc", Some(now.timestamp() + 30)).is_valid_at(now));
        assert!(!OfficialToken::new("", None).is_valid_at(now));
    }

    #[test]
    fn test_availability_follows_token() {
        let feed = adapter(None);
        assert!(!feed.is_available());

        feed.set_token(Some(OfficialToken::new("abc", None)));
        assert!(feed.is_available());
    }

    #[test]
    fn test_expired_token_reports_authentication() {
        let now = Utc::now();
        let feed = adapter(Some(OfficialToken::new("abc", Some(now.timestamp() - 10))));
        assert!(feed.is_available());

        let err = feed
            .fetch_readings(now - Duration::hours(8), now - Duration::hours(4))
            .unwrap_err();
        assert!(matches!(err, FeedError::Authentication(_)));
        assert!(err.is_user_actionable());
    }

    #[test]
    fn test_delay_boundary() {
        let feed = adapter(None);
        let now = Utc::now();
        assert_eq!(feed.data_delay(), Duration::hours(3));
        assert_eq!(feed.most_recent_available_date(now), now - Duration::hours(3));
    }

    #[test]
    fn test_range_past_boundary_skips_network() {
        let feed = adapter(Some(OfficialToken::new("abc", None)));
        let now = Utc::now();
        let readings = feed
            .fetch_readings(now - Duration::hours(1), now)
            .unwrap();
        assert!(readings.is_empty());
    }

    #[test]
    fn test_missing_token_is_not_configured() {
        let feed = adapter(None);
        let now = Utc::now();
        let err = feed
            .fetch_readings(now - Duration::hours(8), now - Duration::hours(4))
            .unwrap_err();
        assert_eq!(err, FeedError::NotConfigured("official feed"));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let feed = adapter(None);
        assert_eq!(feed.base_url, "http://127.0.0.1:9");
    }

    #[test]
    fn test_query_time_format() {
        use chrono::TimeZone;
        let at = Utc.with_ymd_and_hms(2025, 2, 3, 4, 5, 6).unwrap();
        assert_eq!(format_query_time(at), "2025-02-03T04:05:06");
    }
}
