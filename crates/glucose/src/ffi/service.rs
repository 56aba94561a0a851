//! GlucoseService facade for UniFFI export
//!
//! This provides a high-level, FFI-friendly API that wraps the reading store,
//! the feed adapters and the sync orchestrator. Calls block the host thread
//! on the service's own tokio runtime.

use chrono::{DateTime, Utc};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use crate::annotate::place_meal_markers;
use crate::config::{ShareCredentials, ShareServer, SyncOptions};
use crate::feeds::{
    HealthAuthorization, HealthSample, HealthStore, HealthStoreAdapter, OfficialFeedAdapter,
    OfficialToken, ShareFeedAdapter,
};
use crate::ffi::types::*;
use crate::models::MealEntry;
use crate::storage::SqliteReadingStore;
use crate::sync::{
    RefreshTrigger, SyncOrchestrator, SyncSources, spawn_trigger_listener, trigger_channel,
};

/// Queued triggers beyond this are dropped; they would coalesce anyway
const TRIGGER_BUFFER: usize = 16;

/// `HealthStore` backed by the host's callback
struct BridgedHealthStore {
    bridge: Box<dyn HealthKitBridge>,
}

impl HealthStore for BridgedHealthStore {
    fn authorization(&self) -> HealthAuthorization {
        self.bridge.authorization_status().into()
    }

    fn glucose_samples(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<HealthSample>> {
        let samples = self
            .bridge
            .glucose_samples(start.timestamp_millis(), end.timestamp_millis())?;
        // Samples with impossible timestamps are dropped like any malformed reading
        Ok(samples
            .into_iter()
            .filter_map(|s| HealthSample::try_from(s).ok())
            .collect())
    }
}

/// Main service object for glucose operations
///
/// This is the primary entry point for Swift/Kotlin code. It owns the tokio
/// runtime the engine runs on.
#[derive(uniffi::Object)]
pub struct GlucoseService {
    runtime: tokio::runtime::Runtime,
    orchestrator: Arc<SyncOrchestrator>,
    official: Arc<OfficialFeedAdapter>,
    share: Arc<ShareFeedAdapter>,
    triggers: mpsc::Sender<RefreshTrigger>,
    series_listener: Mutex<Option<JoinHandle<()>>>,
}

#[uniffi::export]
impl GlucoseService {
    /// Create a new GlucoseService
    ///
    /// # Arguments
    /// * `db_path` - Path to the SQLite reading cache
    /// * `options` - Engine settings, see `default_sync_options()`
    /// * `health` - Platform health store bridge; report `Unavailable` on
    ///   devices without one
    #[uniffi::constructor]
    pub fn new(
        db_path: String,
        options: FfiSyncOptions,
        health: Box<dyn HealthKitBridge>,
    ) -> Result<Arc<Self>, GlucoseError> {
        let options = SyncOptions::from(options);
        options
            .validate()
            .map_err(|e| GlucoseError::InvalidArgument {
                message: format!("{:#}", e),
            })?;

        // Ensure parent directory exists
        if let Some(parent) = PathBuf::from(&db_path).parent() {
            std::fs::create_dir_all(parent).map_err(|e| GlucoseError::Storage {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let store = SqliteReadingStore::new(&db_path).map_err(|e| GlucoseError::Storage {
            message: format!("Failed to open database: {:#}", e),
        })?;

        let timeout = options.adapter_timeout();
        let official = Arc::new(OfficialFeedAdapter::new(
            None,
            options.official_delay_hours(),
            timeout,
        ));
        let share = Arc::new(ShareFeedAdapter::new(None, timeout));

        let health = HealthStoreAdapter::new(Arc::new(BridgedHealthStore { bridge: health }));
        let sources = SyncSources::new(Arc::new(store))
            .with_official(official.clone())
            .with_share(share.clone())
            .with_health(Arc::new(health));

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("glucose-sync")
            .enable_all()
            .build()
            .map_err(|e| GlucoseError::Runtime {
                message: format!("Failed to start runtime: {}", e),
            })?;

        let orchestrator = Arc::new(SyncOrchestrator::new(sources, options));
        let (triggers, receiver) = trigger_channel(TRIGGER_BUFFER);
        {
            let _guard = runtime.enter();
            spawn_trigger_listener(orchestrator.clone(), receiver);
        }

        info!("Glucose service opened at {}", db_path);
        Ok(Arc::new(Self {
            runtime,
            orchestrator,
            official,
            share,
            triggers,
            series_listener: Mutex::new(None),
        }))
    }

    // ========================================================================
    // Credentials
    // ========================================================================

    /// Load credentials saved in the config directory (or the environment)
    ///
    /// Returns true if share credentials were found.
    pub fn load_saved_credentials(&self) -> bool {
        match OfficialToken::load() {
            Ok(token) => self.official.set_token(token),
            Err(e) => warn!("Failed to load official token: {:#}", e),
        }

        match ShareCredentials::load() {
            Ok(credentials) => {
                self.share.set_credentials(Some(credentials));
                true
            }
            Err(e) => {
                info!("No share credentials: {:#}", e);
                false
            }
        }
    }

    /// Set the share account login
    ///
    /// # Arguments
    /// * `international` - Use the servers for accounts outside the US
    /// * `persist` - Also save to the config directory
    pub fn set_share_credentials(
        &self,
        account_name: String,
        password: String,
        international: bool,
        persist: bool,
    ) -> Result<(), GlucoseError> {
        if account_name.is_empty() || password.is_empty() {
            return Err(GlucoseError::InvalidArgument {
                message: "account name and password are required".to_string(),
            });
        }

        let server = if international {
            ShareServer::International
        } else {
            ShareServer::Us
        };
        let credentials = ShareCredentials::new(account_name, password).with_server(server);
        if persist {
            credentials.save()?;
        }
        self.share.set_credentials(Some(credentials));
        Ok(())
    }

    /// Forget the share login for this session
    pub fn clear_share_credentials(&self) {
        self.share.set_credentials(None);
    }

    /// Set the official feed bearer token after the host completes OAuth
    ///
    /// # Arguments
    /// * `expires_at` - Unix timestamp (seconds) when the token expires
    /// * `persist` - Also save to the config directory
    pub fn set_official_token(
        &self,
        access_token: String,
        expires_at: Option<i64>,
        persist: bool,
    ) -> Result<(), GlucoseError> {
        if access_token.is_empty() {
            return Err(GlucoseError::InvalidArgument {
                message: "access token is empty".to_string(),
            });
        }

        let token = OfficialToken::new(access_token, expires_at);
        if persist {
            token.save()?;
        }
        self.official.set_token(Some(token));
        Ok(())
    }

    /// Forget the official token for this session
    pub fn clear_official_token(&self) {
        self.official.set_token(None);
    }

    // ========================================================================
    // Series
    // ========================================================================

    /// Refresh the series, blocking until it is published
    ///
    /// Without `force`, calls inside the minimum refresh interval return the
    /// current series without touching the network.
    pub fn refresh(&self, force: bool) -> FfiRefreshResult {
        let outcome = self.runtime.block_on(self.orchestrator.refresh(force));
        FfiRefreshResult::from(outcome)
    }

    /// The currently published series
    pub fn snapshot(&self) -> FfiSeriesSnapshot {
        FfiSeriesSnapshot::from(self.orchestrator.snapshot())
    }

    /// Request a forced refresh in the background
    pub fn notify(&self, trigger: FfiRefreshTrigger) -> Result<(), GlucoseError> {
        match self.triggers.try_send(trigger.into()) {
            Ok(()) | Err(TrySendError::Full(_)) => Ok(()),
            Err(TrySendError::Closed(_)) => Err(GlucoseError::Runtime {
                message: "refresh listener has stopped".to_string(),
            }),
        }
    }

    /// Receive every published series on `listener`, replacing any previous one
    pub fn set_series_listener(&self, listener: Box<dyn SeriesListener>) {
        let mut updates = self.orchestrator.subscribe();
        let handle = self.runtime.spawn(async move {
            while updates.changed().await.is_ok() {
                let snapshot = updates.borrow_and_update().clone();
                listener.on_series(snapshot.into());
            }
        });

        if let Some(previous) = self.series_listener.lock().unwrap().replace(handle) {
            previous.abort();
        }
    }

    /// Stop delivering series updates
    pub fn clear_series_listener(&self) {
        if let Some(previous) = self.series_listener.lock().unwrap().take() {
            previous.abort();
        }
    }

    /// Place meals on the published series
    ///
    /// Meals outside the series are skipped.
    pub fn meal_markers(
        &self,
        meals: Vec<FfiMealEntry>,
    ) -> Result<Vec<FfiMealMarker>, GlucoseError> {
        let meals = meals
            .into_iter()
            .map(MealEntry::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let snapshot = self.orchestrator.snapshot();

        Ok(place_meal_markers(&snapshot.points, &meals)
            .into_iter()
            .map(FfiMealMarker::from)
            .collect())
    }
}

// ============================================================================
// Free Functions
// ============================================================================

/// Engine defaults, for hosts that only want to override a field or two
#[uniffi::export]
pub fn default_sync_options() -> FfiSyncOptions {
    SyncOptions::default().into()
}

/// Engine settings from `sync.json` in the config directory, defaults if absent
#[uniffi::export]
pub fn load_sync_options() -> Result<FfiSyncOptions, GlucoseError> {
    Ok(SyncOptions::load()?.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedHealth(FfiHealthAuthorization);

    impl HealthKitBridge for FixedHealth {
        fn authorization_status(&self) -> FfiHealthAuthorization {
            self.0
        }

        fn glucose_samples(
            &self,
            _start: i64,
            _end: i64,
        ) -> Result<Vec<FfiHealthSample>, HealthBridgeError> {
            Ok(Vec::new())
        }
    }

    fn service(health: FfiHealthAuthorization) -> (tempfile::TempDir, Arc<GlucoseService>) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("readings.sqlite");
        let service = GlucoseService::new(
            db_path.to_string_lossy().into_owned(),
            default_sync_options(),
            Box::new(FixedHealth(health)),
        )
        .unwrap();
        (dir, service)
    }

    #[test]
    fn test_refresh_without_sources_reports_no_data() {
        let (_dir, service) = service(FfiHealthAuthorization::Unavailable);

        let result = service.refresh(true);
        assert_eq!(result.status, FfiRefreshStatus::Published);
        let snapshot = result.snapshot.unwrap();
        assert!(snapshot.points.is_empty());
        assert_eq!(
            snapshot.error_message.as_deref(),
            Some(crate::sync::NO_DATA_MESSAGE)
        );
        assert_eq!(service.snapshot().generation, 1);
    }

    #[test]
    fn test_denied_health_store_surfaces_permission_message() {
        let (_dir, service) = service(FfiHealthAuthorization::Denied);

        let snapshot = service.refresh(true).snapshot.unwrap();
        assert_eq!(
            snapshot.error_message.as_deref(),
            Some(crate::sync::PERMISSION_MESSAGE)
        );
    }

    #[test]
    fn test_rejects_out_of_range_options() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("readings.sqlite");
        let mut options = default_sync_options();
        options.window_hours = u32::MAX;

        let result = GlucoseService::new(
            db_path.to_string_lossy().into_owned(),
            options,
            Box::new(FixedHealth(FfiHealthAuthorization::Unavailable)),
        );
        assert!(matches!(result, Err(GlucoseError::InvalidArgument { .. })));
        assert!(!db_path.exists());
    }

    #[test]
    fn test_rejects_empty_credentials() {
        let (_dir, service) = service(FfiHealthAuthorization::Unavailable);
        assert!(matches!(
            service.set_share_credentials(String::new(), "pw".into(), false, false),
            Err(GlucoseError::InvalidArgument { .. })
        ));
        assert!(service.set_official_token(String::new(), None, false).is_err());
    }

    #[test]
    fn test_meal_markers_on_empty_series() {
        let (_dir, service) = service(FfiHealthAuthorization::Unavailable);
        let markers = service
            .meal_markers(vec![FfiMealEntry {
                id: "breakfast".into(),
                eaten_at: 1_700_000_000_000,
                title: None,
            }])
            .unwrap();
        assert!(markers.is_empty());
    }
}
