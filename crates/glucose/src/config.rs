//! Configuration loading for the sync engine
//!
//! Two kinds of configuration live in the Glyco config directory:
//! - `sync.json`: engine tuning (`SyncOptions`), every field optional
//! - `share-credentials.json`: share feed login
//!
//! Share credentials are loaded from (in order of priority):
//! 1. Compile-time embedded values (for internal test builds)
//! 2. JSON file in the config directory
//! 3. Runtime environment variables (fallback)

use anyhow::{Context, Result, ensure};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Engine tuning filename in the Glyco config directory
const OPTIONS_FILE: &str = "sync.json";

/// Credentials filename in the Glyco config directory
const CREDENTIALS_FILE: &str = "share-credentials.json";

/// Application id the share service expects from third-party clients
pub const DEFAULT_SHARE_APPLICATION_ID: &str = "d89443d2-327c-4a6f-89e5-496bbb0317db";

/// Engine tuning knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncOptions {
    /// Length of the rolling chart window
    pub window_hours: u32,
    /// Non-forced refreshes closer together than this are skipped
    pub min_refresh_interval_secs: u64,
    /// Processing delay of the official feed
    pub official_delay_hours: u32,
    /// Readings closer together than this are the same sample
    pub dedup_tolerance_secs: u64,
    /// Breaks longer than this are flagged as gaps
    pub gap_threshold_mins: u64,
    /// Upper bound on any single adapter call
    pub adapter_timeout_secs: u64,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            window_hours: 24,
            min_refresh_interval_secs: 30,
            official_delay_hours: 3,
            dedup_tolerance_secs: 60,
            gap_threshold_mins: 15,
            adapter_timeout_secs: 15,
        }
    }
}

impl SyncOptions {
    /// Upper bounds for each knob. Larger values overflow date arithmetic.
    pub const MAX_WINDOW_HOURS: u32 = 24 * 90;
    pub const MAX_REFRESH_INTERVAL_SECS: u64 = 24 * 60 * 60;
    pub const MAX_OFFICIAL_DELAY_HOURS: u32 = 24 * 7;
    pub const MAX_DEDUP_TOLERANCE_SECS: u64 = 60 * 60;
    pub const MAX_GAP_THRESHOLD_MINS: u64 = 24 * 60;
    pub const MAX_ADAPTER_TIMEOUT_SECS: u64 = 10 * 60;

    /// Load `sync.json` from the config directory, defaults if absent
    pub fn load() -> Result<Self> {
        match config::config_path(OPTIONS_FILE) {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load and validate options from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let options: Self = config::load_json_file(path)?;
        options
            .validate()
            .with_context(|| format!("Invalid sync options in {}", path.display()))?;
        Ok(options)
    }

    /// Reject values outside the supported range
    pub fn validate(&self) -> Result<()> {
        ensure!(
            (1..=Self::MAX_WINDOW_HOURS).contains(&self.window_hours),
            "window_hours must be between 1 and {}",
            Self::MAX_WINDOW_HOURS
        );
        ensure!(
            self.min_refresh_interval_secs <= Self::MAX_REFRESH_INTERVAL_SECS,
            "min_refresh_interval_secs must be at most {}",
            Self::MAX_REFRESH_INTERVAL_SECS
        );
        ensure!(
            self.official_delay_hours <= Self::MAX_OFFICIAL_DELAY_HOURS,
            "official_delay_hours must be at most {}",
            Self::MAX_OFFICIAL_DELAY_HOURS
        );
        ensure!(
            self.dedup_tolerance_secs <= Self::MAX_DEDUP_TOLERANCE_SECS,
            "dedup_tolerance_secs must be at most {}",
            Self::MAX_DEDUP_TOLERANCE_SECS
        );
        ensure!(
            self.gap_threshold_mins <= Self::MAX_GAP_THRESHOLD_MINS,
            "gap_threshold_mins must be at most {}",
            Self::MAX_GAP_THRESHOLD_MINS
        );
        ensure!(
            (1..=Self::MAX_ADAPTER_TIMEOUT_SECS).contains(&self.adapter_timeout_secs),
            "adapter_timeout_secs must be between 1 and {}",
            Self::MAX_ADAPTER_TIMEOUT_SECS
        );
        Ok(())
    }

    // Accessors saturate at the bounds

    pub fn window_span(&self) -> Duration {
        Duration::hours(i64::from(self.window_hours.clamp(1, Self::MAX_WINDOW_HOURS)))
    }

    pub fn min_refresh_interval(&self) -> Duration {
        let secs = self.min_refresh_interval_secs.min(Self::MAX_REFRESH_INTERVAL_SECS);
        Duration::seconds(secs as i64)
    }

    pub fn official_delay_hours(&self) -> u32 {
        self.official_delay_hours.min(Self::MAX_OFFICIAL_DELAY_HOURS)
    }

    pub fn dedup_tolerance(&self) -> Duration {
        let secs = self.dedup_tolerance_secs.min(Self::MAX_DEDUP_TOLERANCE_SECS);
        Duration::seconds(secs as i64)
    }

    pub fn gap_threshold(&self) -> Duration {
        let mins = self.gap_threshold_mins.min(Self::MAX_GAP_THRESHOLD_MINS);
        Duration::minutes(mins as i64)
    }

    pub fn adapter_timeout(&self) -> std::time::Duration {
        let secs = self.adapter_timeout_secs.clamp(1, Self::MAX_ADAPTER_TIMEOUT_SECS);
        std::time::Duration::from_secs(secs)
    }
}

/// Share service region
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareServer {
    #[default]
    Us,
    International,
}

impl ShareServer {
    pub fn base_url(&self) -> &'static str {
        match self {
            ShareServer::Us => "https://share2.dexcom.com/ShareWebServices/Services",
            ShareServer::International => {
                "https://shareous1.dexcom.com/ShareWebServices/Services"
            }
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "us" => Some(ShareServer::Us),
            "international" | "ous" | "intl" => Some(ShareServer::International),
            _ => None,
        }
    }
}

/// Login for the share feed
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareCredentials {
    pub account_name: String,
    pub password: String,
    #[serde(default = "default_application_id")]
    pub application_id: String,
    #[serde(default)]
    pub server: ShareServer,
}

fn default_application_id() -> String {
    DEFAULT_SHARE_APPLICATION_ID.to_string()
}

// Keep the password out of logs
impl std::fmt::Debug for ShareCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShareCredentials")
            .field("account_name", &self.account_name)
            .field("server", &self.server)
            .finish_non_exhaustive()
    }
}

impl ShareCredentials {
    pub fn new(account_name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            account_name: account_name.into(),
            password: password.into(),
            application_id: default_application_id(),
            server: ShareServer::Us,
        }
    }

    pub fn with_server(mut self, server: ShareServer) -> Self {
        self.server = server;
        self
    }

    /// Load credentials using the following priority:
    /// 1. Compile-time embedded credentials
    /// 2. JSON file (~/.config/glyco/share-credentials.json)
    /// 3. Runtime environment variables
    pub fn load() -> Result<Self> {
        if let Some(creds) = Self::from_compile_time() {
            return Ok(creds);
        }

        if config::config_exists(CREDENTIALS_FILE) {
            return config::load_json(CREDENTIALS_FILE);
        }

        Self::from_env()
    }

    /// Credentials embedded at build time.
    /// Build with: GLYCO_SHARE_USERNAME=xxx GLYCO_SHARE_PASSWORD=yyy cargo build
    pub fn from_compile_time() -> Option<Self> {
        let account_name = option_env!("GLYCO_SHARE_USERNAME")?;
        let password = option_env!("GLYCO_SHARE_PASSWORD")?;

        if account_name.is_empty() || password.is_empty() {
            return None;
        }

        Some(Self::new(account_name, password))
    }

    /// Load credentials from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        config::load_json_file(path)
    }

    /// Parse credentials from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse share credentials JSON")
    }

    /// Load credentials from environment variables
    pub fn from_env() -> Result<Self> {
        let account_name = std::env::var("GLYCO_SHARE_USERNAME")
            .context("GLYCO_SHARE_USERNAME environment variable not set")?;
        let password = std::env::var("GLYCO_SHARE_PASSWORD")
            .context("GLYCO_SHARE_PASSWORD environment variable not set")?;

        let server = match std::env::var("GLYCO_SHARE_SERVER") {
            Ok(value) => ShareServer::parse(&value)
                .with_context(|| format!("Unknown GLYCO_SHARE_SERVER value: {value}"))?,
            Err(_) => ShareServer::Us,
        };

        Ok(Self::new(account_name, password).with_server(server))
    }

    /// Save credentials to the config directory
    pub fn save(&self) -> Result<()> {
        config::save_json(CREDENTIALS_FILE, self)
    }

    /// Get the default credentials file path
    pub fn default_credentials_path() -> Option<PathBuf> {
        config::config_path(CREDENTIALS_FILE)
    }

    /// Check if credentials are available (compile-time, file, or env vars)
    pub fn is_available() -> bool {
        if Self::from_compile_time().is_some() {
            return true;
        }
        if config::config_exists(CREDENTIALS_FILE) {
            return true;
        }
        std::env::var("GLYCO_SHARE_USERNAME").is_ok()
            && std::env::var("GLYCO_SHARE_PASSWORD").is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = SyncOptions::default();
        assert_eq!(options.dedup_tolerance(), Duration::seconds(60));
        assert_eq!(options.gap_threshold(), Duration::minutes(15));
        assert_eq!(options.window_span(), Duration::hours(24));
        assert_eq!(options.adapter_timeout(), std::time::Duration::from_secs(15));
    }

    #[test]
    fn test_partial_options_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.json");
        std::fs::write(&path, r#"{ "window_hours": 6, "official_delay_hours": 1 }"#).unwrap();

        let options = SyncOptions::from_file(&path).unwrap();
        assert_eq!(options.window_hours, 6);
        assert_eq!(options.official_delay_hours, 1);
        assert_eq!(options.min_refresh_interval_secs, 30);
        assert_eq!(options.dedup_tolerance_secs, 60);
    }

    #[test]
    fn test_out_of_range_options_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.json");
        std::fs::write(
            &path,
            r#"{ "window_hours": 4294967295, "dedup_tolerance_secs": 1152921504606846976 }"#,
        )
        .unwrap();

        let err = SyncOptions::from_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("window_hours"));
    }

    #[test]
    fn test_accessors_saturate_on_extreme_values() {
        let options = SyncOptions {
            window_hours: u32::MAX,
            min_refresh_interval_secs: u64::MAX,
            official_delay_hours: u32::MAX,
            dedup_tolerance_secs: 1 << 60,
            gap_threshold_mins: u64::MAX,
            adapter_timeout_secs: 0,
        };
        assert!(options.validate().is_err());

        assert_eq!(
            options.window_span(),
            Duration::hours(i64::from(SyncOptions::MAX_WINDOW_HOURS))
        );
        assert_eq!(options.dedup_tolerance(), Duration::hours(1));
        assert_eq!(options.gap_threshold(), Duration::days(1));
        assert_eq!(options.min_refresh_interval(), Duration::days(1));
        assert_eq!(options.official_delay_hours(), 24 * 7);
        assert_eq!(options.adapter_timeout(), std::time::Duration::from_secs(1));
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(SyncOptions::default().validate().is_ok());
    }

    #[test]
    fn test_parse_credentials() {
        let json = r#"{
            "account_name": "someone@example.com",
            "password": "hunter2",
            "server": "international"
        }"#;

        let creds = ShareCredentials::from_json(json).unwrap();
        assert_eq!(creds.account_name, "someone@example.com");
        assert_eq!(creds.application_id, DEFAULT_SHARE_APPLICATION_ID);
        assert_eq!(creds.server, ShareServer::International);
    }

    #[test]
    fn test_invalid_credentials_json() {
        assert!(ShareCredentials::from_json(r#"{ "password": "x" }"#).is_err());
    }

    #[test]
    fn test_debug_hides_password() {
        let creds = ShareCredentials::new("someone", "hunter2");
        assert!(!format!("{creds:?}").contains("hunter2"));
    }

    #[test]
    fn test_server_parse() {
        assert_eq!(ShareServer::parse("US"), Some(ShareServer::Us));
        assert_eq!(ShareServer::parse("ous"), Some(ShareServer::International));
        assert_eq!(ShareServer::parse("mars"), None);
    }
}
