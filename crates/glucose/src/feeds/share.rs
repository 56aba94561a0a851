//! Share (near-real-time) CGM API client
//!
//! The share service is a polling endpoint meant for live display. It only
//! answers "the latest N minutes", so requests are translated into a minute
//! count reaching back from now and the result is trimmed to the range.
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::sync::Mutex;

use super::api::{ShareEntry, ShareLoginRequest};
use super::{FeedError, GlucoseFeed, check_status, http_agent, normalize_share};
use crate::config::{ShareCredentials, ShareServer};
use crate::models::{Reading, ReadingSource};

/// Returned by the service instead of an error for some bad logins
const NULL_SESSION: &str = "00000000-0000-0000-0000-000000000000";

/// Furthest back the service will answer
const MAX_MINUTES: i64 = 1440;

/// Fault body returned alongside HTTP 500
#[derive(Debug, serde::Deserialize)]
struct ShareFault {
    #[serde(rename = "Code", default)]
    code: String,
}

/// Client for the near-real-time share feed
pub struct ShareFeedAdapter {
    agent: ureq::Agent,
    /// Fixed server, otherwise the credentials' region decides
    base_url: Option<String>,
    credentials: Mutex<Option<ShareCredentials>>,
    session_id: Mutex<Option<String>>,
}

impl ShareFeedAdapter {
    /// Create a client that talks to the credentials' server region
    pub fn new(credentials: Option<ShareCredentials>, timeout: std::time::Duration) -> Self {
        Self {
            agent: http_agent(timeout),
            base_url: None,
            credentials: Mutex::new(credentials),
            session_id: Mutex::new(None),
        }
    }

    /// Create a client against a custom base URL (test server)
    pub fn with_base_url(
        base_url: impl Into<String>,
        credentials: Option<ShareCredentials>,
        timeout: std::time::Duration,
    ) -> Self {
        Self {
            agent: http_agent(timeout),
            base_url: Some(base_url.into().trim_end_matches('/').to_string()),
            credentials: Mutex::new(credentials),
            session_id: Mutex::new(None),
        }
    }

    /// Replace credentials and drop any cached session
    pub fn set_credentials(&self, credentials: Option<ShareCredentials>) {
        *self.credentials.lock().unwrap() = credentials;
        self.invalidate_session();
    }

    fn base_url(&self) -> String {
        if let Some(url) = &self.base_url {
            return url.clone();
        }
        let server = self
            .credentials
            .lock()
            .unwrap()
            .as_ref()
            .map(|c| c.server)
            .unwrap_or(ShareServer::Us);
        server.base_url().to_string()
    }

    fn invalidate_session(&self) {
        *self.session_id.lock().unwrap() = None;
    }

    /// Return the cached session or log in for a new one
    fn session(&self) -> Result<String, FeedError> {
        if let Some(id) = self.session_id.lock().unwrap().clone() {
            return Ok(id);
        }

        let credentials = self
            .credentials
            .lock()
            .unwrap()
            .clone()
            .ok_or(FeedError::NotConfigured("share feed"))?;

        let account_id: String = self.post_login(
            "General/AuthenticatePublisherAccount",
            &ShareLoginRequest {
                account_name: Some(&credentials.account_name),
                account_id: None,
                password: &credentials.password,
                application_id: &credentials.application_id,
            },
        )?;

        let session_id: String = self.post_login(
            "General/LoginPublisherAccountById",
            &ShareLoginRequest {
                account_name: None,
                account_id: Some(&account_id),
                password: &credentials.password,
                application_id: &credentials.application_id,
            },
        )?;

        if session_id.is_empty() || session_id == NULL_SESSION {
            return Err(FeedError::Authentication("share login rejected".into()));
        }

        info!("Share session established");
        *self.session_id.lock().unwrap() = Some(session_id.clone());
        Ok(session_id)
    }

    fn post_login(&self, path: &str, body: &ShareLoginRequest<'_>) -> Result<String, FeedError> {
        let url = format!("{}/{}", self.base_url(), path);
        let mut response = self
            .agent
            .post(&url)
            .header("Accept", "application/json")
            .send_json(body)?;

        if response.status().as_u16() == 500 {
            // Bad credentials come back as a 500 with an account fault code
            let fault: Option<ShareFault> = response.body_mut().read_json().ok();
            let code = fault.map(|f| f.code).unwrap_or_default();
            if code.contains("Account") || code.contains("Password") {
                return Err(FeedError::Authentication(code));
            }
            return Err(FeedError::Network(format!("share login failed: HTTP 500 {code}")));
        }
        check_status(&response)?;

        response
            .body_mut()
            .read_json()
            .map_err(|e| FeedError::Decode(e.to_string()))
    }
}

/// Minutes of history needed to reach back to `start`
fn minutes_since(start: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let seconds = (now - start).num_seconds().max(0);
    ((seconds + 59) / 60).clamp(1, MAX_MINUTES)
}

impl GlucoseFeed for ShareFeedAdapter {
    fn source(&self) -> ReadingSource {
        ReadingSource::Share
    }

    fn is_available(&self) -> bool {
        self.credentials.lock().unwrap().is_some()
    }

    fn fetch_readings(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Reading>, FeedError> {
        if start > end {
            return Ok(Vec::new());
        }

        let session_id = self.session()?;
        let minutes = minutes_since(start, Utc::now());
        let url = format!("{}/Publisher/ReadPublisherLatestGlucoseValues", self.base_url());

        let mut response = self
            .agent
            .post(&url)
            .query("sessionId", &session_id)
            .query("minutes", minutes.to_string())
            // One entry per minute is the densest any supported sensor reports
            .query("maxCount", minutes.to_string())
            .header("Accept", "application/json")
            .send_empty()?;

        match response.status().as_u16() {
            401 | 403 => {
                self.invalidate_session();
                return Err(FeedError::Authentication("share session rejected".into()));
            }
            500..=599 => {
                // Expired sessions surface as server faults; log in again next time
                warn!("Share read failed with HTTP {}, dropping session", response.status());
                self.invalidate_session();
            }
            _ => {}
        }
        check_status(&response)?;

        let entries: Vec<ShareEntry> = response
            .body_mut()
            .read_json()
            .map_err(|e| FeedError::Decode(e.to_string()))?;

        let readings: Vec<Reading> = normalize_share(entries)
            .into_iter()
            .filter(|r| r.timestamp >= start && r.timestamp <= end)
            .collect();

        debug!("Share feed returned {} readings for {} minutes", readings.len(), minutes);
        Ok(readings)
    }
}
